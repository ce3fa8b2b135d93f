use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Fact fields ---

/// Every scalar fact a listing can carry, plus the media URL list.
/// Drives the chapter ownership table and display-value lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactField {
    AskingPriceEur,
    LivingAreaM2,
    PlotAreaM2,
    VolumeM3,
    BuildYear,
    RoomCount,
    BedroomCount,
    BathroomCount,
    EnergyLabel,
    Insulation,
    Heating,
    RoofType,
    Garden,
    Balcony,
    Garage,
    OwnershipType,
    VveContributionEur,
    Address,
    PostalCode,
    City,
    MediaUrls,
}

impl FactField {
    /// Scalar fields, in report order. Used to compute the unknown-field
    /// list ("onbekend / nader te onderzoeken") after enrichment.
    pub const SCALARS: [FactField; 20] = [
        FactField::AskingPriceEur,
        FactField::LivingAreaM2,
        FactField::PlotAreaM2,
        FactField::VolumeM3,
        FactField::BuildYear,
        FactField::RoomCount,
        FactField::BedroomCount,
        FactField::BathroomCount,
        FactField::EnergyLabel,
        FactField::Insulation,
        FactField::Heating,
        FactField::RoofType,
        FactField::Garden,
        FactField::Balcony,
        FactField::Garage,
        FactField::OwnershipType,
        FactField::VveContributionEur,
        FactField::Address,
        FactField::PostalCode,
        FactField::City,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            FactField::AskingPriceEur => "asking_price_eur",
            FactField::LivingAreaM2 => "living_area_m2",
            FactField::PlotAreaM2 => "plot_area_m2",
            FactField::VolumeM3 => "volume_m3",
            FactField::BuildYear => "build_year",
            FactField::RoomCount => "room_count",
            FactField::BedroomCount => "bedroom_count",
            FactField::BathroomCount => "bathroom_count",
            FactField::EnergyLabel => "energy_label",
            FactField::Insulation => "insulation",
            FactField::Heating => "heating",
            FactField::RoofType => "roof_type",
            FactField::Garden => "garden",
            FactField::Balcony => "balcony",
            FactField::Garage => "garage",
            FactField::OwnershipType => "ownership_type",
            FactField::VveContributionEur => "vve_contribution_eur",
            FactField::Address => "address",
            FactField::PostalCode => "postal_code",
            FactField::City => "city",
            FactField::MediaUrls => "media_urls",
        }
    }
}

impl std::fmt::Display for FactField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

// --- Fact store ---

/// Accumulated facts for one run. Typed in memory, serialized to a JSON
/// blob only at the persistence boundary. Append-only per run: pipeline
/// steps merge into it, chapters only read it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactStore {
    pub asking_price_eur: Option<u64>,
    pub living_area_m2: Option<f64>,
    pub plot_area_m2: Option<f64>,
    pub volume_m3: Option<f64>,
    pub build_year: Option<u16>,
    pub room_count: Option<u8>,
    pub bedroom_count: Option<u8>,
    pub bathroom_count: Option<u8>,
    pub energy_label: Option<String>,
    pub insulation: Option<String>,
    pub heating: Option<String>,
    pub roof_type: Option<String>,
    pub garden: Option<String>,
    pub balcony: Option<String>,
    pub garage: Option<String>,
    pub ownership_type: Option<String>,
    pub vve_contribution_eur: Option<u64>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    /// Geocoded coordinates, filled by enrichment. Not listing facts and
    /// not part of `FactField`; they feed the travel-time lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// De-duplicated, order-preserving. User-pasted URLs come first.
    #[serde(default)]
    pub media_urls: Vec<String>,
    /// Free-text facts supplied by the user alongside the paste.
    #[serde(default)]
    pub extra_notes: Vec<String>,
    /// Validation cap messages collected during parsing.
    #[serde(default)]
    pub warnings: Vec<String>,
}

fn merge_num<T: Copy>(existing: &mut Option<T>, incoming: Option<T>) {
    if existing.is_none() {
        *existing = incoming;
    }
}

fn merge_str(existing: &mut Option<String>, incoming: Option<String>) {
    let empty = existing.as_deref().map(str::trim).is_none_or(str::is_empty);
    if empty {
        if let Some(v) = incoming {
            if !v.trim().is_empty() {
                *existing = Some(v);
            }
        }
    }
}

fn append_dedup(existing: &mut Vec<String>, incoming: Vec<String>) {
    for item in incoming {
        if !existing.contains(&item) {
            existing.push(item);
        }
    }
}

impl FactStore {
    /// Merge a parsed or enriched fragment into this store.
    ///
    /// Scalars: first non-empty wins, so existing (user-supplied) values
    /// take precedence over freshly parsed ones. Lists: concatenation
    /// with order-preserving de-duplication. Idempotent.
    pub fn merge(&mut self, fragment: FactStore) {
        merge_num(&mut self.asking_price_eur, fragment.asking_price_eur);
        merge_num(&mut self.living_area_m2, fragment.living_area_m2);
        merge_num(&mut self.plot_area_m2, fragment.plot_area_m2);
        merge_num(&mut self.volume_m3, fragment.volume_m3);
        merge_num(&mut self.build_year, fragment.build_year);
        merge_num(&mut self.room_count, fragment.room_count);
        merge_num(&mut self.bedroom_count, fragment.bedroom_count);
        merge_num(&mut self.bathroom_count, fragment.bathroom_count);
        merge_str(&mut self.energy_label, fragment.energy_label);
        merge_str(&mut self.insulation, fragment.insulation);
        merge_str(&mut self.heating, fragment.heating);
        merge_str(&mut self.roof_type, fragment.roof_type);
        merge_str(&mut self.garden, fragment.garden);
        merge_str(&mut self.balcony, fragment.balcony);
        merge_str(&mut self.garage, fragment.garage);
        merge_str(&mut self.ownership_type, fragment.ownership_type);
        merge_num(&mut self.vve_contribution_eur, fragment.vve_contribution_eur);
        merge_str(&mut self.address, fragment.address);
        merge_str(&mut self.postal_code, fragment.postal_code);
        merge_str(&mut self.city, fragment.city);
        merge_num(&mut self.latitude, fragment.latitude);
        merge_num(&mut self.longitude, fragment.longitude);
        append_dedup(&mut self.media_urls, fragment.media_urls);
        append_dedup(&mut self.extra_notes, fragment.extra_notes);
        append_dedup(&mut self.warnings, fragment.warnings);
    }

    /// Canonical rendered value for a field, as a chapter metric would
    /// display it. `None` for absent fields and for the media URL list.
    pub fn display_value(&self, field: FactField) -> Option<String> {
        match field {
            FactField::AskingPriceEur => self.asking_price_eur.map(format_eur),
            FactField::LivingAreaM2 => self.living_area_m2.map(|v| format!("{} m²", format_area(v))),
            FactField::PlotAreaM2 => self.plot_area_m2.map(|v| format!("{} m²", format_area(v))),
            FactField::VolumeM3 => self.volume_m3.map(|v| format!("{} m³", format_area(v))),
            FactField::BuildYear => self.build_year.map(|v| v.to_string()),
            FactField::RoomCount => self.room_count.map(|v| v.to_string()),
            FactField::BedroomCount => self.bedroom_count.map(|v| v.to_string()),
            FactField::BathroomCount => self.bathroom_count.map(|v| v.to_string()),
            FactField::EnergyLabel => self.energy_label.clone(),
            FactField::Insulation => self.insulation.clone(),
            FactField::Heating => self.heating.clone(),
            FactField::RoofType => self.roof_type.clone(),
            FactField::Garden => self.garden.clone(),
            FactField::Balcony => self.balcony.clone(),
            FactField::Garage => self.garage.clone(),
            FactField::OwnershipType => self.ownership_type.clone(),
            FactField::VveContributionEur => self.vve_contribution_eur.map(format_eur),
            FactField::Address => self.address.clone(),
            FactField::PostalCode => self.postal_code.clone(),
            FactField::City => self.city.clone(),
            FactField::MediaUrls => None,
        }
    }

    /// Scalar fields still absent after parse + enrichment. Rendered as
    /// "onbekend / nader te onderzoeken" in the report instead of being
    /// guessed.
    pub fn unknown_fields(&self) -> Vec<String> {
        FactField::SCALARS
            .iter()
            .filter(|f| self.display_value(**f).is_none())
            .map(|f| f.key().to_string())
            .collect()
    }

    /// True when the facts that anchor KPI computation are all absent.
    pub fn lacks_mandatory_facts(&self) -> bool {
        self.asking_price_eur.is_none() && self.living_area_m2.is_none()
    }
}

/// Dutch-style euro formatting with dot thousands separators: "€ 1.400.000".
pub fn format_eur(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    let offset = digits.len() % 3;
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (i + 3 - offset) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    format!("€ {out}")
}

/// Render an area/volume number without a trailing ".0".
pub fn format_area(v: f64) -> String {
    if (v - v.round()).abs() < f64::EPSILON {
        format!("{}", v.round() as i64)
    } else {
        format!("{v:.1}")
    }
}

// --- KPI set ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Good,
    Moderate,
    Poor,
    Unknown,
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Grade::Good => "good",
            Grade::Moderate => "moderate",
            Grade::Poor => "poor",
            Grade::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceIntensity {
    Low,
    Moderate,
    High,
    Unknown,
}

/// Derived metrics, computed exactly once per run. Every chapter reads
/// from this single instance; none recomputes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSet {
    pub price_per_m2: Option<u64>,
    pub market_deviation_pct: Option<f64>,
    pub maintenance_intensity: MaintenanceIntensity,
    pub energy_future: Grade,
    pub space_grade: Grade,
    pub family_suitable: Option<bool>,
}

// --- Chapters ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeOrigin {
    Ai,
    RuleBased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Where a metric value came from: a listing fact (subject to the
/// ownership invariant) or a derived KPI (shared freely).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum MetricSource {
    Fact(FactField),
    Kpi(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterMetric {
    pub label: String,
    pub value: String,
    pub source: MetricSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterProvenance {
    pub provider: String,
    pub model: Option<String>,
    pub origin: NarrativeOrigin,
    pub confidence: Confidence,
    /// Field keys whose values were derived (KPIs) rather than taken
    /// verbatim from the listing.
    pub inferred_fields: Vec<String>,
}

/// Error block rendered in place of a chapter that failed the data
/// firewall, naming the violated invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterErrorBlock {
    pub invariant: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub slot: u8,
    pub title: String,
    pub narrative: String,
    pub metrics: Vec<ChapterMetric>,
    pub strengths: Vec<String>,
    pub advice: Vec<String>,
    pub provenance: ChapterProvenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ChapterErrorBlock>,
}

pub const CHAPTER_COUNT: usize = 13;

/// Outcome of one report-level consistency check, returned alongside
/// the report payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyCheck {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

// --- Source log ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOutcome {
    Ok,
    Failed,
}

/// One enrichment or AI call attempt. Failures are recorded, never
/// silently swallowed ("no data gokken").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceLogEntry {
    pub source: String,
    pub outcome: SourceOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

impl SourceLogEntry {
    pub fn ok(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            outcome: SourceOutcome::Ok,
            detail: None,
            at: Utc::now(),
        }
    }

    pub fn failed(source: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            outcome: SourceOutcome::Failed,
            detail: Some(detail.into()),
            at: Utc::now(),
        }
    }
}

// --- Run lifecycle ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    WaitingInput,
    Done,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Done | RunStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::WaitingInput => "waiting_input",
            RunStatus::Done => "done",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(RunStatus::Queued),
            "running" => Ok(RunStatus::Running),
            "waiting_input" => Ok(RunStatus::WaitingInput),
            "done" => Ok(RunStatus::Done),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Queued,
    Running,
    Done,
    Failed,
    NeedsInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    ScrapeAttempt,
    AwaitPasteInput,
    ParseInput,
    FetchEnrichmentSources,
    ComputeKpis,
    GenerateChapters,
    FinalizeArtifact,
}

impl PipelineStep {
    pub const ALL: [PipelineStep; 7] = [
        PipelineStep::ScrapeAttempt,
        PipelineStep::AwaitPasteInput,
        PipelineStep::ParseInput,
        PipelineStep::FetchEnrichmentSources,
        PipelineStep::ComputeKpis,
        PipelineStep::GenerateChapters,
        PipelineStep::FinalizeArtifact,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PipelineStep::ScrapeAttempt => "scrape_attempt",
            PipelineStep::AwaitPasteInput => "await_paste_input",
            PipelineStep::ParseInput => "parse_input",
            PipelineStep::FetchEnrichmentSources => "fetch_enrichment_sources",
            PipelineStep::ComputeKpis => "compute_kpis",
            PipelineStep::GenerateChapters => "generate_chapters",
            PipelineStep::FinalizeArtifact => "finalize_artifact",
        }
    }
}

impl std::fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepState {
    pub step: PipelineStep,
    pub status: StepStatus,
}

/// Raw input a run was created with: a listing URL or pasted HTML, plus
/// whatever the user already knows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default)]
    pub media_urls: Vec<String>,
    #[serde(default)]
    pub extra_facts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub kind: String,
    pub path: String,
}

/// The unit of work: one listing, one report. Owned by the run store;
/// mutated only by pipeline steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub status: RunStatus,
    pub steps: Vec<StepState>,
    pub input: RunInput,
    /// HTML supplied via the paste endpoint after a scrape failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pasted_html: Option<String>,
    /// Readable text captured by a successful scrape, kept so a resumed
    /// run can re-parse without hitting the network again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_text: Option<String>,
    pub facts: FactStore,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kpis: Option<KpiSet>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub sources: Vec<SourceLogEntry>,
    #[serde(default)]
    pub unknown_fields: Vec<String>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunRecord {
    pub fn new(input: RunInput) -> Self {
        let now = Utc::now();
        // User-supplied facts are seeded up front; the first-wins merge
        // in the parse step then keeps them ahead of scraped values.
        let facts = FactStore {
            media_urls: input.media_urls.clone(),
            extra_notes: input.extra_facts.clone(),
            ..Default::default()
        };
        Self {
            id: Uuid::new_v4(),
            status: RunStatus::Queued,
            steps: PipelineStep::ALL
                .iter()
                .map(|s| StepState {
                    step: *s,
                    status: StepStatus::Queued,
                })
                .collect(),
            input,
            pasted_html: None,
            scraped_text: None,
            facts,
            kpis: None,
            chapters: Vec::new(),
            sources: Vec::new(),
            unknown_fields: Vec::new(),
            artifacts: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn step_status(&self, step: PipelineStep) -> StepStatus {
        self.steps
            .iter()
            .find(|s| s.step == step)
            .map(|s| s.status)
            .unwrap_or(StepStatus::Queued)
    }

    pub fn set_step_status(&mut self, step: PipelineStep, status: StepStatus) {
        if let Some(state) = self.steps.iter_mut().find(|s| s.step == step) {
            state.status = status;
        }
        self.updated_at = Utc::now();
    }

    /// Fraction of settled steps, as a whole percentage. A failed
    /// scrape_attempt counts as settled: the pipeline never revisits it.
    pub fn progress_percent(&self) -> u8 {
        let settled = self
            .steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Done | StepStatus::Failed))
            .count();
        ((settled * 100) / self.steps.len()) as u8
    }
}

/// Published on the progress bus after every step transition; the SSE
/// boundary fans these out per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub step: String,
    pub step_status: StepStatus,
    pub percent: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment() -> FactStore {
        FactStore {
            asking_price_eur: Some(999_999),
            living_area_m2: Some(453.0),
            media_urls: vec!["https://img.example/1.jpg".into(), "https://img.example/2.jpg".into()],
            ..Default::default()
        }
    }

    #[test]
    fn merge_is_idempotent() {
        let mut store = FactStore::default();
        store.merge(fragment());
        let once = store.clone();
        store.merge(fragment());
        assert_eq!(store, once);
        assert_eq!(store.media_urls.len(), 2);
    }

    #[test]
    fn existing_scalar_wins_over_incoming() {
        let mut store = FactStore {
            asking_price_eur: Some(450_000),
            ..Default::default()
        };
        store.merge(fragment());
        assert_eq!(store.asking_price_eur, Some(450_000));
        assert_eq!(store.living_area_m2, Some(453.0));
    }

    #[test]
    fn empty_string_does_not_block_merge() {
        let mut store = FactStore {
            energy_label: Some(String::new()),
            ..Default::default()
        };
        store.merge(FactStore {
            energy_label: Some("B".into()),
            ..Default::default()
        });
        assert_eq!(store.energy_label.as_deref(), Some("B"));
    }

    #[test]
    fn eur_formatting_uses_dot_separators() {
        assert_eq!(format_eur(1_400_000), "€ 1.400.000");
        assert_eq!(format_eur(450_000), "€ 450.000");
        assert_eq!(format_eur(950), "€ 950");
    }

    #[test]
    fn area_formatting_drops_trailing_zero() {
        assert_eq!(format_area(453.0), "453");
        assert_eq!(format_area(72.5), "72.5");
    }

    #[test]
    fn progress_counts_failed_scrape_as_settled() {
        let mut run = RunRecord::new(RunInput::default());
        assert_eq!(run.progress_percent(), 0);
        run.set_step_status(PipelineStep::ScrapeAttempt, StepStatus::Failed);
        run.set_step_status(PipelineStep::AwaitPasteInput, StepStatus::Done);
        assert_eq!(run.progress_percent(), 28);
    }

    #[test]
    fn unknown_fields_lists_absent_scalars() {
        let store = fragment();
        let unknown = store.unknown_fields();
        assert!(!unknown.contains(&"asking_price_eur".to_string()));
        assert!(unknown.contains(&"energy_label".to_string()));
        assert!(unknown.contains(&"build_year".to_string()));
    }
}
