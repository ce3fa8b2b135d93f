use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, warn};

use ai_client::{util::strip_code_blocks, AiProvider, ProviderError};
use woonrapport_common::{
    Chapter, ChapterMetric, ChapterProvenance, Confidence, FactField, FactStore, KpiSet,
    MetricSource, NarrativeOrigin, ReportError, CHAPTER_COUNT,
};

use super::heuristics::{advice_for, strengths_for};
use super::narrative::{build_prompt, fallback_narrative, MIN_NARRATIVE_CHARS};
use super::ownership::{ChapterSpec, CHAPTERS};
use super::validate::enforce_firewall;

pub const UNKNOWN_MARKER: &str = "onbekend / nader te onderzoeken";

/// The assembled chapter set plus the firewall verdict. On a violation
/// the offending slot already carries its error block, so the caller
/// can persist the set before failing the run.
pub struct GeneratedChapters {
    pub chapters: Vec<Chapter>,
    pub violation: Option<ReportError>,
}

/// Produces the 13 chapter payloads for a run. AI narrative when the
/// provider delivers, rule-based otherwise; the data firewall is
/// enforced over the assembled set before it is accepted.
pub struct ChapterGenerator {
    provider: Arc<dyn AiProvider>,
    fallback_enabled: bool,
}

impl ChapterGenerator {
    pub fn new(provider: Arc<dyn AiProvider>, fallback_enabled: bool) -> Self {
        Self {
            provider,
            fallback_enabled,
        }
    }

    pub async fn generate_all(
        &self,
        facts: &FactStore,
        kpis: &KpiSet,
        unknown_fields: &[String],
    ) -> Result<GeneratedChapters, ReportError> {
        let mut chapters = Vec::with_capacity(CHAPTER_COUNT);
        for spec in &CHAPTERS {
            chapters.push(self.generate_one(spec, facts, kpis, unknown_fields).await?);
        }
        let violation = enforce_firewall(&mut chapters, facts).err();
        Ok(GeneratedChapters {
            chapters,
            violation,
        })
    }

    async fn generate_one(
        &self,
        spec: &ChapterSpec,
        facts: &FactStore,
        kpis: &KpiSet,
        unknown_fields: &[String],
    ) -> Result<Chapter, ReportError> {
        let metrics = metrics_for(spec, facts, kpis);
        let inferred_fields: Vec<String> = metrics
            .iter()
            .filter_map(|m| match &m.source {
                MetricSource::Kpi(name) => Some(name.clone()),
                MetricSource::Fact(_) => None,
            })
            .collect();

        let (narrative, origin) = self.narrative_for(spec, facts, kpis).await?;

        Ok(Chapter {
            slot: spec.slot,
            title: spec.title.to_string(),
            narrative,
            metrics,
            strengths: strengths_for(spec.slot, facts, kpis),
            advice: advice_for(spec.slot, facts, kpis, unknown_fields),
            provenance: ChapterProvenance {
                provider: match origin {
                    NarrativeOrigin::Ai => self.provider.name().to_string(),
                    NarrativeOrigin::RuleBased => "rules".to_string(),
                },
                model: match origin {
                    NarrativeOrigin::Ai => self.provider.model().map(str::to_string),
                    NarrativeOrigin::RuleBased => None,
                },
                origin,
                // Rule-based prose is deterministic over verified facts;
                // model prose can drift.
                confidence: match origin {
                    NarrativeOrigin::Ai => Confidence::Medium,
                    NarrativeOrigin::RuleBased => Confidence::High,
                },
                inferred_fields,
            },
            error: None,
        })
    }

    /// AI narrative with rule-based fallback. Operational provider
    /// failures (timeout, quota, offline, unconfigured) degrade to the
    /// template; they never fail chapter generation.
    async fn narrative_for(
        &self,
        spec: &ChapterSpec,
        facts: &FactStore,
        kpis: &KpiSet,
    ) -> Result<(String, NarrativeOrigin), ReportError> {
        let request = build_prompt(spec, facts, kpis);

        match self.provider.generate(&request).await {
            Ok(text) => {
                let text = strip_code_blocks(&text).to_string();
                if text.len() >= MIN_NARRATIVE_CHARS {
                    return Ok((text, NarrativeOrigin::Ai));
                }
                debug!(
                    slot = spec.slot,
                    chars = text.len(),
                    "AI narrative too short, using rule-based text"
                );
            }
            Err(ProviderError::Unconfigured) => {
                // No provider configured: rule-based by design, not by error.
            }
            Err(e) if e.is_operational() => {
                warn!(slot = spec.slot, error = %e, "AI narrative failed, using rule-based text");
                if !self.fallback_enabled {
                    return Err(ReportError::Anyhow(anyhow!(
                        "AI narrative for chapter {} failed and fallback is disabled: {e}",
                        spec.slot
                    )));
                }
            }
            Err(e) => {
                // Runtime config errors (revoked key) should have been
                // caught at startup; degrade but log loudly.
                warn!(slot = spec.slot, error = %e, "AI provider misconfigured at runtime");
                if !self.fallback_enabled {
                    return Err(ReportError::Config(e.to_string()));
                }
            }
        }

        Ok((
            fallback_narrative(spec.slot, facts, kpis),
            NarrativeOrigin::RuleBased,
        ))
    }
}

/// Metric entries for one chapter: its owned fields (with an explicit
/// unknown marker for absent ones) plus the KPIs it presents.
fn metrics_for(spec: &ChapterSpec, facts: &FactStore, kpis: &KpiSet) -> Vec<ChapterMetric> {
    let mut metrics = Vec::new();

    for field in spec.owned {
        if *field == FactField::MediaUrls {
            if !facts.media_urls.is_empty() {
                metrics.push(ChapterMetric {
                    label: "Foto's".into(),
                    value: format!("{} foto's", facts.media_urls.len()),
                    source: MetricSource::Fact(FactField::MediaUrls),
                });
            }
            continue;
        }
        metrics.push(ChapterMetric {
            label: field_label(*field).into(),
            value: facts
                .display_value(*field)
                .unwrap_or_else(|| UNKNOWN_MARKER.to_string()),
            source: MetricSource::Fact(*field),
        });
    }

    match spec.slot {
        1 => metrics.push(kpi_metric("Ruimte-indruk", kpis.space_grade.to_string(), "space_grade")),
        3 => {
            if let Some(ppm2) = kpis.price_per_m2 {
                metrics.push(kpi_metric(
                    "Prijs per m²",
                    format!("{} per m²", woonrapport_common::format_eur(ppm2)),
                    "price_per_m2",
                ));
            }
            if let Some(dev) = kpis.market_deviation_pct {
                metrics.push(kpi_metric(
                    "Afwijking regio",
                    format!("{dev:+.1}%"),
                    "market_deviation_pct",
                ));
            }
        }
        4 => metrics.push(kpi_metric(
            "Energie-toekomstscore",
            kpis.energy_future.to_string(),
            "energy_future",
        )),
        5 => metrics.push(kpi_metric(
            "Onderhoudsintensiteit",
            format!("{:?}", kpis.maintenance_intensity).to_lowercase(),
            "maintenance_intensity",
        )),
        8 => {
            if let Some(suitable) = kpis.family_suitable {
                metrics.push(kpi_metric(
                    "Gezinsgeschikt",
                    if suitable { "ja" } else { "nee" }.to_string(),
                    "family_suitable",
                ));
            }
        }
        11 => metrics.push(kpi_metric(
            "Energie-toekomstscore",
            kpis.energy_future.to_string(),
            "energy_future",
        )),
        _ => {}
    }

    metrics
}

fn kpi_metric(label: &str, value: String, kpi: &str) -> ChapterMetric {
    ChapterMetric {
        label: label.to_string(),
        value,
        source: MetricSource::Kpi(kpi.to_string()),
    }
}

fn field_label(field: FactField) -> &'static str {
    match field {
        FactField::AskingPriceEur => "Vraagprijs",
        FactField::LivingAreaM2 => "Woonoppervlakte",
        FactField::PlotAreaM2 => "Perceeloppervlakte",
        FactField::VolumeM3 => "Inhoud",
        FactField::BuildYear => "Bouwjaar",
        FactField::RoomCount => "Kamers",
        FactField::BedroomCount => "Slaapkamers",
        FactField::BathroomCount => "Badkamers",
        FactField::EnergyLabel => "Energielabel",
        FactField::Insulation => "Isolatie",
        FactField::Heating => "Verwarming",
        FactField::RoofType => "Daktype",
        FactField::Garden => "Tuin",
        FactField::Balcony => "Balkon",
        FactField::Garage => "Garage",
        FactField::OwnershipType => "Eigendomssituatie",
        FactField::VveContributionEur => "VvE-bijdrage",
        FactField::Address => "Adres",
        FactField::PostalCode => "Postcode",
        FactField::City => "Plaats",
        FactField::MediaUrls => "Foto's",
    }
}
