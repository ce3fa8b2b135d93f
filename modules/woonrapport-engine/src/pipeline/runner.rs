use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use woonrapport_common::{
    Config, PipelineStep, ProgressEvent, ReportError, RunRecord, RunStatus, SourceLogEntry,
    StepStatus,
};

use crate::chapters::ChapterGenerator;
use crate::enrichment::enrich_all;
use crate::kpi::compute_kpis;
use crate::parser::parse_listing;
use crate::report::render_markdown;
use crate::scraper::extract_readable;
use crate::traits::{EnrichmentSource, PageScraper, RunStore};

use super::progress::ProgressBus;

/// Cooperative cancellation, checked at step boundaries. A running
/// network call finishes; the next step never starts.
pub type CancelFlag = Arc<AtomicBool>;

pub struct PipelineDeps {
    pub store: Arc<dyn RunStore>,
    pub scraper: Arc<dyn PageScraper>,
    pub enrichment: Vec<Arc<dyn EnrichmentSource>>,
    pub generator: ChapterGenerator,
    pub progress: ProgressBus,
    pub config: Config,
}

/// Drives one run through the fixed step sequence. Steps already
/// settled in the persisted record are skipped, which is what makes
/// resume after a paste (or a crash) safe: a failed scrape attempt is
/// settled and never retried.
pub struct PipelineRunner {
    deps: Arc<PipelineDeps>,
}

enum StepOutcome {
    Completed,
    /// Scrape failed; record it and fall through to the paste wait.
    FailedSoft(String),
    /// Nothing to work with until the user pastes the page.
    Park,
}

impl PipelineRunner {
    pub fn new(deps: Arc<PipelineDeps>) -> Self {
        Self { deps }
    }

    /// Execute (or resume) a run until it is done, failed, or parked
    /// waiting for pasted input. Domain failures mark the run failed
    /// and return the terminal status; only persistence errors bubble
    /// up as `Err`.
    pub async fn run(&self, run_id: Uuid, cancel: CancelFlag) -> Result<RunStatus, ReportError> {
        let mut run = self
            .deps
            .store
            .load(run_id)
            .await?
            .ok_or(ReportError::RunNotFound(run_id))?;

        if run.status.is_terminal() {
            warn!(run_id = %run_id, status = run.status.as_str(), "run already settled, nothing to do");
            return Ok(run.status);
        }

        run.status = RunStatus::Running;
        self.deps.store.update(&run).await?;

        for step in PipelineStep::ALL {
            match run.step_status(step) {
                StepStatus::Done => continue,
                // A failed scrape is settled: resume goes straight to
                // the paste the user supplied.
                StepStatus::Failed if step == PipelineStep::ScrapeAttempt => continue,
                _ => {}
            }

            if cancel.load(Ordering::Relaxed) {
                return self.fail(&mut run, step, "cancelled by user").await;
            }

            self.transition(&mut run, step, StepStatus::Running).await?;

            match self.execute(step, &mut run).await {
                Ok(StepOutcome::Completed) => {
                    self.transition(&mut run, step, StepStatus::Done).await?;
                }
                Ok(StepOutcome::FailedSoft(reason)) => {
                    warn!(run_id = %run_id, step = step.name(), reason, "step failed, continuing");
                    self.transition(&mut run, step, StepStatus::Failed).await?;
                }
                Ok(StepOutcome::Park) => {
                    run.status = RunStatus::WaitingInput;
                    self.transition(&mut run, step, StepStatus::NeedsInput)
                        .await?;
                    info!(run_id = %run_id, "run parked, waiting for pasted listing");
                    return Ok(RunStatus::WaitingInput);
                }
                Err(e) => {
                    return self.fail(&mut run, step, &e.to_string()).await;
                }
            }
        }

        run.status = RunStatus::Done;
        self.deps.store.update(&run).await?;
        // Terminal marker, distinct from the per-step events so clients
        // never see finalize_artifact announced twice.
        self.deps.progress.publish(ProgressEvent {
            run_id: run.id,
            status: RunStatus::Done,
            step: "completed".to_string(),
            step_status: StepStatus::Done,
            percent: run.progress_percent(),
        });
        info!(run_id = %run_id, "run complete");
        Ok(RunStatus::Done)
    }

    async fn execute(
        &self,
        step: PipelineStep,
        run: &mut RunRecord,
    ) -> Result<StepOutcome, ReportError> {
        match step {
            PipelineStep::ScrapeAttempt => self.scrape_attempt(run).await,
            PipelineStep::AwaitPasteInput => Ok(await_paste_input(run)),
            PipelineStep::ParseInput => self.parse_input(run),
            PipelineStep::FetchEnrichmentSources => Ok(self.fetch_enrichment(run).await),
            PipelineStep::ComputeKpis => {
                let cfg = &self.deps.config;
                run.kpis = Some(compute_kpis(&run.facts, cfg.region_avg_price_m2, &cfg.kpi));
                Ok(StepOutcome::Completed)
            }
            PipelineStep::GenerateChapters => self.generate_chapters(run).await,
            PipelineStep::FinalizeArtifact => self.finalize_artifact(run).await,
        }
    }

    async fn scrape_attempt(&self, run: &mut RunRecord) -> Result<StepOutcome, ReportError> {
        if run.input.html.is_some() {
            // Page supplied up front, nothing to fetch.
            return Ok(StepOutcome::Completed);
        }
        let Some(url) = run.input.url.clone() else {
            return Err(ReportError::Scraping(
                "run has neither a listing url nor pasted html".to_string(),
            ));
        };

        match self.deps.scraper.scrape(&url).await {
            Ok(text) => {
                run.scraped_text = Some(text);
                run.sources
                    .push(SourceLogEntry::ok(self.deps.scraper.name()));
                Ok(StepOutcome::Completed)
            }
            Err(e) => {
                run.sources
                    .push(SourceLogEntry::failed(self.deps.scraper.name(), e.to_string()));
                Ok(StepOutcome::FailedSoft(e.to_string()))
            }
        }
    }

    fn parse_input(&self, run: &mut RunRecord) -> Result<StepOutcome, ReportError> {
        let url = run.input.url.as_deref().unwrap_or("");
        // Pasted html wins: it only exists because the scrape failed.
        let text = if let Some(html) = &run.pasted_html {
            readable_text(url, html)
        } else if let Some(html) = &run.input.html {
            readable_text(url, html)
        } else if let Some(text) = &run.scraped_text {
            text.clone()
        } else {
            return Err(ReportError::Parse(
                "no listing text available to parse".to_string(),
            ));
        };

        let fragment = parse_listing(&text, &self.deps.config.limits);
        run.facts.merge(fragment);

        if run.facts.lacks_mandatory_facts() {
            return Err(ReportError::Parse(
                "geen vraagprijs en geen woonoppervlakte gevonden in de aangeleverde tekst"
                    .to_string(),
            ));
        }
        Ok(StepOutcome::Completed)
    }

    async fn fetch_enrichment(&self, run: &mut RunRecord) -> StepOutcome {
        let (fragment, log) = enrich_all(
            &self.deps.enrichment,
            &run.facts,
            self.deps.config.enrichment_timeout,
        )
        .await;
        run.facts.merge(fragment);
        run.sources.extend(log);
        run.unknown_fields = run.facts.unknown_fields();
        StepOutcome::Completed
    }

    async fn generate_chapters(&self, run: &mut RunRecord) -> Result<StepOutcome, ReportError> {
        let kpis = run
            .kpis
            .clone()
            .ok_or_else(|| ReportError::Parse("chapters requested before KPI computation".to_string()))?;

        let generated = self
            .deps
            .generator
            .generate_all(&run.facts, &kpis, &run.unknown_fields)
            .await?;
        // Persist the set even on a violation so the error block is
        // visible in the stored record.
        run.chapters = generated.chapters;
        match generated.violation {
            Some(violation) => Err(violation),
            None => Ok(StepOutcome::Completed),
        }
    }

    async fn finalize_artifact(&self, run: &mut RunRecord) -> Result<StepOutcome, ReportError> {
        let dir = format!("{}/reports", self.deps.config.data_dir);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ReportError::Config(format!("cannot create report dir {dir}: {e}")))?;

        let path = format!("{dir}/{}.md", run.id);
        tokio::fs::write(&path, render_markdown(run))
            .await
            .map_err(|e| ReportError::Config(format!("cannot write report {path}: {e}")))?;

        run.artifacts.push(woonrapport_common::ArtifactRef {
            kind: "markdown".to_string(),
            path,
        });
        Ok(StepOutcome::Completed)
    }

    async fn fail(
        &self,
        run: &mut RunRecord,
        step: PipelineStep,
        reason: &str,
    ) -> Result<RunStatus, ReportError> {
        warn!(run_id = %run.id, step = step.name(), reason, "run failed");
        run.status = RunStatus::Failed;
        run.error = Some(reason.to_string());
        run.set_step_status(step, StepStatus::Failed);
        self.deps.store.update(run).await?;
        self.publish(run, step, StepStatus::Failed);
        Ok(RunStatus::Failed)
    }

    /// Persist a step transition and publish it, in that order: a
    /// subscriber acting on the event must be able to read it back.
    async fn transition(
        &self,
        run: &mut RunRecord,
        step: PipelineStep,
        status: StepStatus,
    ) -> Result<(), ReportError> {
        run.set_step_status(step, status);
        self.deps.store.update(run).await?;
        self.publish(run, step, status);
        Ok(())
    }

    fn publish(&self, run: &RunRecord, step: PipelineStep, step_status: StepStatus) {
        self.deps.progress.publish(ProgressEvent {
            run_id: run.id,
            status: run.status,
            step: step.name().to_string(),
            step_status,
            percent: run.progress_percent(),
        });
    }
}

fn await_paste_input(run: &RunRecord) -> StepOutcome {
    let have_page = run.pasted_html.is_some()
        || run.input.html.is_some()
        || run.scraped_text.is_some();
    if have_page {
        StepOutcome::Completed
    } else {
        StepOutcome::Park
    }
}

/// Raw pasted content may be a full page or already-plain text. Only
/// full pages go through readability; if that yields nothing the raw
/// text is parsed as-is.
fn readable_text(url: &str, raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let looks_like_html =
        lowered.contains("<html") || lowered.contains("<body") || lowered.contains("<div");
    if looks_like_html {
        let text = extract_readable(url, raw);
        if !text.trim().is_empty() {
            return text;
        }
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use ai_client::NullProvider;
    use woonrapport_common::RunInput;

    const LISTING: &str = "\
        Karakteristiek herenhuis in het centrum.\n\
        Vraagprijs: € 1.400.000 k.k.\n\
        Woonoppervlakte: 453 m²\n\
        Bouwjaar: 1979\n\
        Energielabel B\n\
        10 kamers (4 slaapkamers, 2 badkamers)\n\
        Keizersgracht 123, 1015 CJ Amsterdam\n";

    struct MemoryStore {
        runs: Mutex<HashMap<Uuid, RunRecord>>,
    }

    impl MemoryStore {
        fn new() -> Self {
            Self {
                runs: Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl RunStore for MemoryStore {
        async fn insert(&self, run: &RunRecord) -> Result<(), ReportError> {
            self.runs.lock().unwrap().insert(run.id, run.clone());
            Ok(())
        }

        async fn load(&self, id: Uuid) -> Result<Option<RunRecord>, ReportError> {
            Ok(self.runs.lock().unwrap().get(&id).cloned())
        }

        async fn update(&self, run: &RunRecord) -> Result<(), ReportError> {
            self.runs.lock().unwrap().insert(run.id, run.clone());
            Ok(())
        }

        async fn purge_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64, ReportError> {
            let mut runs = self.runs.lock().unwrap();
            let before = runs.len();
            runs.retain(|_, r| !(r.status.is_terminal() && r.updated_at < cutoff));
            Ok((before - runs.len()) as u64)
        }
    }

    struct OkScraper {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageScraper for OkScraper {
        async fn scrape(&self, _url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(LISTING.to_string())
        }

        fn name(&self) -> &str {
            "ok-scraper"
        }
    }

    struct FailScraper {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageScraper for FailScraper {
        async fn scrape(&self, _url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            bail!("403 Forbidden")
        }

        fn name(&self) -> &str {
            "fail-scraper"
        }
    }

    fn test_config() -> Config {
        let mut config = Config::from_env();
        config.data_dir = std::env::temp_dir()
            .join(format!("woonrapport-test-{}", Uuid::new_v4()))
            .to_string_lossy()
            .into_owned();
        config
    }

    fn runner_with(scraper: Arc<dyn PageScraper>, store: Arc<dyn RunStore>) -> PipelineRunner {
        PipelineRunner::new(Arc::new(PipelineDeps {
            store,
            scraper,
            enrichment: Vec::new(),
            generator: ChapterGenerator::new(Arc::new(NullProvider), true),
            progress: ProgressBus::new(),
            config: test_config(),
        }))
    }

    async fn seeded(store: &dyn RunStore, input: RunInput) -> Uuid {
        let run = RunRecord::new(input);
        let id = run.id;
        store.insert(&run).await.unwrap();
        id
    }

    #[tokio::test]
    async fn url_run_completes_end_to_end() {
        let store = Arc::new(MemoryStore::new());
        let scraper = Arc::new(OkScraper {
            calls: AtomicUsize::new(0),
        });
        let runner = runner_with(scraper.clone(), store.clone());
        let id = seeded(
            store.as_ref(),
            RunInput {
                url: Some("https://listing.example/huis-1".to_string()),
                ..Default::default()
            },
        )
        .await;

        let status = runner.run(id, CancelFlag::default()).await.unwrap();
        assert_eq!(status, RunStatus::Done);

        let run = store.load(id).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Done);
        assert_eq!(run.chapters.len(), 13);
        assert_eq!(run.facts.asking_price_eur, Some(1_400_000));
        assert_eq!(run.kpis.as_ref().unwrap().price_per_m2, Some(3091));
        assert_eq!(run.artifacts.len(), 1);
        assert_eq!(run.progress_percent(), 100);
        assert!(run
            .steps
            .iter()
            .all(|s| s.status == StepStatus::Done));
    }

    #[tokio::test]
    async fn failed_scrape_parks_and_resume_skips_the_scrape() {
        let store = Arc::new(MemoryStore::new());
        let scraper = Arc::new(FailScraper {
            calls: AtomicUsize::new(0),
        });
        let runner = runner_with(scraper.clone(), store.clone());
        let id = seeded(
            store.as_ref(),
            RunInput {
                url: Some("https://listing.example/huis-2".to_string()),
                ..Default::default()
            },
        )
        .await;

        let status = runner.run(id, CancelFlag::default()).await.unwrap();
        assert_eq!(status, RunStatus::WaitingInput);

        let mut run = store.load(id).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::WaitingInput);
        assert_eq!(
            run.step_status(PipelineStep::ScrapeAttempt),
            StepStatus::Failed
        );
        assert_eq!(
            run.step_status(PipelineStep::AwaitPasteInput),
            StepStatus::NeedsInput
        );
        assert!(run
            .sources
            .iter()
            .any(|s| s.source == "fail-scraper"
                && s.outcome == woonrapport_common::SourceOutcome::Failed));

        // User pastes the page; the run resumes without a second fetch.
        run.pasted_html = Some(LISTING.to_string());
        store.update(&run).await.unwrap();

        let status = runner.run(id, CancelFlag::default()).await.unwrap();
        assert_eq!(status, RunStatus::Done);
        assert_eq!(scraper.calls.load(Ordering::SeqCst), 1);

        let run = store.load(id).await.unwrap().unwrap();
        assert_eq!(run.chapters.len(), 13);
        assert_eq!(
            run.step_status(PipelineStep::ScrapeAttempt),
            StepStatus::Failed
        );
    }

    #[tokio::test]
    async fn cancellation_fails_the_run_with_reason() {
        let store = Arc::new(MemoryStore::new());
        let scraper = Arc::new(OkScraper {
            calls: AtomicUsize::new(0),
        });
        let runner = runner_with(scraper, store.clone());
        let id = seeded(
            store.as_ref(),
            RunInput {
                url: Some("https://listing.example/huis-3".to_string()),
                ..Default::default()
            },
        )
        .await;

        let cancel = CancelFlag::default();
        cancel.store(true, Ordering::Relaxed);
        let status = runner.run(id, cancel).await.unwrap();
        assert_eq!(status, RunStatus::Failed);

        let run = store.load(id).await.unwrap().unwrap();
        assert_eq!(run.error.as_deref(), Some("cancelled by user"));
    }

    #[tokio::test]
    async fn unparseable_listing_fails_at_parse() {
        let store = Arc::new(MemoryStore::new());
        let scraper = Arc::new(OkScraper {
            calls: AtomicUsize::new(0),
        });
        let runner = runner_with(scraper, store.clone());
        let id = seeded(
            store.as_ref(),
            RunInput {
                html: Some("lorem ipsum dolor sit amet".to_string()),
                ..Default::default()
            },
        )
        .await;

        let status = runner.run(id, CancelFlag::default()).await.unwrap();
        assert_eq!(status, RunStatus::Failed);

        let run = store.load(id).await.unwrap().unwrap();
        assert_eq!(
            run.step_status(PipelineStep::ParseInput),
            StepStatus::Failed
        );
        assert!(run.error.as_deref().unwrap().contains("vraagprijs"));
    }

    #[tokio::test]
    async fn progress_events_end_with_a_single_terminal_event() {
        let store = Arc::new(MemoryStore::new());
        let scraper = Arc::new(OkScraper {
            calls: AtomicUsize::new(0),
        });
        let progress = ProgressBus::new();
        let runner = PipelineRunner::new(Arc::new(PipelineDeps {
            store: store.clone(),
            scraper,
            enrichment: Vec::new(),
            generator: ChapterGenerator::new(Arc::new(NullProvider), true),
            progress: progress.clone(),
            config: test_config(),
        }));
        let id = seeded(
            store.as_ref(),
            RunInput {
                url: Some("https://listing.example/huis-4".to_string()),
                ..Default::default()
            },
        )
        .await;

        let mut rx = progress.subscribe();
        runner.run(id, CancelFlag::default()).await.unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        let terminal: Vec<_> = events
            .iter()
            .filter(|e| e.status.is_terminal())
            .collect();
        assert_eq!(terminal.len(), 1);
        assert_eq!(terminal[0].status, RunStatus::Done);
        assert_eq!(terminal[0].step, "completed");
        assert_eq!(terminal[0].percent, 100);
        // Every step is announced Done exactly once.
        assert_eq!(
            events
                .iter()
                .filter(|e| e.step == PipelineStep::FinalizeArtifact.name()
                    && e.step_status == StepStatus::Done)
                .count(),
            1
        );
        // Events arrive in step order, monotone progress.
        assert!(events.windows(2).all(|w| w[0].percent <= w[1].percent));
    }
}
