//! Markdown rendering of a finished run. The stored record stays the
//! source of truth; this is the human-readable artifact written next
//! to the database.

use std::fmt::Write;

use woonrapport_common::{Chapter, NarrativeOrigin, RunRecord, SourceOutcome};

pub fn render_markdown(run: &RunRecord) -> String {
    let mut out = String::new();

    let title = run
        .facts
        .address
        .as_deref()
        .unwrap_or("Woningrapport");
    let _ = writeln!(out, "# {title}\n");
    let _ = writeln!(
        out,
        "_Gegenereerd op {} · rapport {}_\n",
        run.updated_at.format("%d-%m-%Y %H:%M"),
        run.id
    );

    for chapter in &run.chapters {
        render_chapter(&mut out, chapter);
    }

    if !run.sources.is_empty() {
        let _ = writeln!(out, "## Bronnenlog\n");
        for entry in &run.sources {
            let mark = match entry.outcome {
                SourceOutcome::Ok => "geslaagd",
                SourceOutcome::Failed => "mislukt",
            };
            match &entry.detail {
                Some(detail) => {
                    let _ = writeln!(out, "- {} — {mark}: {detail}", entry.source);
                }
                None => {
                    let _ = writeln!(out, "- {} — {mark}", entry.source);
                }
            }
        }
        let _ = writeln!(out);
    }

    if !run.facts.warnings.is_empty() {
        let _ = writeln!(out, "## Opmerkingen bij de gegevens\n");
        for warning in &run.facts.warnings {
            let _ = writeln!(out, "- {warning}");
        }
        let _ = writeln!(out);
    }

    out
}

fn render_chapter(out: &mut String, chapter: &Chapter) {
    let _ = writeln!(out, "## {}. {}\n", chapter.slot + 1, chapter.title);

    if let Some(error) = &chapter.error {
        let _ = writeln!(
            out,
            "> **Dit hoofdstuk is geblokkeerd** ({}): {}\n",
            error.invariant, error.detail
        );
        return;
    }

    if !chapter.metrics.is_empty() {
        let _ = writeln!(out, "| Kenmerk | Waarde |");
        let _ = writeln!(out, "| --- | --- |");
        for metric in &chapter.metrics {
            let _ = writeln!(out, "| {} | {} |", metric.label, metric.value);
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "{}\n", chapter.narrative);

    if !chapter.strengths.is_empty() {
        let _ = writeln!(out, "**Sterke punten**\n");
        for point in &chapter.strengths {
            let _ = writeln!(out, "- {point}");
        }
        let _ = writeln!(out);
    }

    if !chapter.advice.is_empty() {
        let _ = writeln!(out, "**Aandachtspunten**\n");
        for point in &chapter.advice {
            let _ = writeln!(out, "- {point}");
        }
        let _ = writeln!(out);
    }

    let origin = match chapter.provenance.origin {
        NarrativeOrigin::Ai => match &chapter.provenance.model {
            Some(model) => format!("{} ({model})", chapter.provenance.provider),
            None => chapter.provenance.provider.clone(),
        },
        NarrativeOrigin::RuleBased => "regelgebaseerde tekst".to_string(),
    };
    let _ = writeln!(out, "_Duiding: {origin}_\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use woonrapport_common::{
        ChapterErrorBlock, ChapterProvenance, Confidence, FactStore, RunInput, SourceLogEntry,
    };

    fn run_with_chapters() -> RunRecord {
        let mut run = RunRecord::new(RunInput::default());
        run.facts = FactStore {
            address: Some("Keizersgracht 123".into()),
            asking_price_eur: Some(1_400_000),
            living_area_m2: Some(453.0),
            ..Default::default()
        };
        run.chapters = (0..13u8)
            .map(|slot| Chapter {
                slot,
                title: format!("Hoofdstuk {slot}"),
                narrative: "Duiding zonder letterlijke waarden.".into(),
                metrics: Vec::new(),
                strengths: vec!["ruim opgezet".into()],
                advice: Vec::new(),
                provenance: ChapterProvenance {
                    provider: "rules".into(),
                    model: None,
                    origin: NarrativeOrigin::RuleBased,
                    confidence: Confidence::High,
                    inferred_fields: Vec::new(),
                },
                error: None,
            })
            .collect();
        run.sources.push(SourceLogEntry::ok("nominatim"));
        run
    }

    #[test]
    fn renders_title_chapters_and_source_log() {
        let run = run_with_chapters();
        let md = render_markdown(&run);

        assert!(md.starts_with("# Keizersgracht 123"));
        assert!(md.contains("## 1. Hoofdstuk 0"));
        assert!(md.contains("## 13. Hoofdstuk 12"));
        assert!(md.contains("## Bronnenlog"));
        assert!(md.contains("nominatim — geslaagd"));
        assert!(md.contains("_Duiding: regelgebaseerde tekst_"));
    }

    #[test]
    fn blocked_chapter_renders_error_not_content() {
        let mut run = run_with_chapters();
        run.chapters[4].error = Some(ChapterErrorBlock {
            invariant: "no_restatement".into(),
            detail: "narrative restates asking_price_eur verbatim".into(),
        });
        run.chapters[4].narrative = "should not appear".into();

        let md = render_markdown(&run);
        assert!(md.contains("Dit hoofdstuk is geblokkeerd"));
        assert!(!md.contains("should not appear"));
    }
}
