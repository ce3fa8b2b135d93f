//! The data-firewall gate.
//!
//! Runs over the assembled chapter set before it is accepted. A
//! violation is a structural failure, not an operational one: the
//! offending slot is replaced with an explicit error block and the run
//! fails with the invariant named, rather than the invalid payload
//! being emitted silently.

use std::collections::HashMap;

use woonrapport_common::{
    Chapter, ChapterErrorBlock, ConsistencyCheck, FactField, FactStore, MetricSource, ReportError,
    CHAPTER_COUNT,
};

use super::ownership::owner_of;

/// Display values shorter than this are not scanned for restatement:
/// single digits and one-letter labels match any prose incidentally.
const MIN_SCAN_LEN: usize = 4;

pub fn enforce_firewall(chapters: &mut [Chapter], facts: &FactStore) -> Result<(), ReportError> {
    if let Some((slot, invariant, detail)) = find_violation(chapters, facts) {
        let chapter = &mut chapters[slot as usize];
        chapter.narrative.clear();
        chapter.metrics.clear();
        chapter.strengths.clear();
        chapter.advice.clear();
        chapter.error = Some(ChapterErrorBlock {
            invariant: invariant.clone(),
            detail,
        });
        return Err(ReportError::FirewallViolation { slot, invariant });
    }
    Ok(())
}

/// Read-only re-run of the gate, returned with the report payload so a
/// reader can see what was verified. A stored report already passed the
/// gate, so these normally all hold.
pub fn consistency_checks(chapters: &[Chapter], facts: &FactStore) -> Vec<ConsistencyCheck> {
    let violation = find_violation(chapters, facts);
    let mut checks = vec![ConsistencyCheck {
        name: "chapter_count".to_string(),
        passed: chapters.len() == CHAPTER_COUNT,
        detail: (chapters.len() != CHAPTER_COUNT)
            .then(|| format!("expected {CHAPTER_COUNT} chapters, found {}", chapters.len())),
    }];
    for invariant in ["ownership", "no_restatement", "narrative_presence"] {
        let failed = violation
            .as_ref()
            .filter(|(_, name, _)| name == invariant)
            .map(|(slot, _, detail)| format!("chapter {slot}: {detail}"));
        checks.push(ConsistencyCheck {
            name: invariant.to_string(),
            passed: failed.is_none(),
            detail: failed,
        });
    }
    checks
}

fn find_violation(chapters: &[Chapter], facts: &FactStore) -> Option<(u8, String, String)> {
    // (a) Every headline fact must sit in the chapter that owns it, and
    // in no other.
    let mut displayed: HashMap<FactField, u8> = HashMap::new();
    for chapter in chapters {
        for metric in &chapter.metrics {
            if let MetricSource::Fact(field) = metric.source {
                if let Some(previous) = displayed.insert(field, chapter.slot) {
                    return Some((
                        chapter.slot,
                        "ownership".to_string(),
                        format!("{field} is already headlined by chapter {previous}"),
                    ));
                }
                match owner_of(field) {
                    Some(owner) if owner == chapter.slot => {}
                    _ => {
                        return Some((
                            chapter.slot,
                            "ownership".to_string(),
                            format!("{field} is not owned by chapter {}", chapter.slot),
                        ));
                    }
                }
            }
        }
    }

    // (b) Narrative must not restate a display value the chapter does
    // not own.
    for chapter in chapters {
        for field in FactField::SCALARS {
            if owner_of(field) == Some(chapter.slot) {
                continue;
            }
            let Some(value) = facts.display_value(field) else {
                continue;
            };
            if value.len() >= MIN_SCAN_LEN && chapter.narrative.contains(&value) {
                return Some((
                    chapter.slot,
                    "no_restatement".to_string(),
                    format!("narrative restates {field} verbatim"),
                ));
            }
        }
    }

    // (c) Every chapter carries an interpretation block.
    for chapter in chapters {
        if chapter.narrative.trim().is_empty() {
            return Some((
                chapter.slot,
                "narrative_presence".to_string(),
                "chapter has no narrative text".to_string(),
            ));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use woonrapport_common::{ChapterProvenance, Confidence, NarrativeOrigin};

    fn chapter(slot: u8) -> Chapter {
        Chapter {
            slot,
            title: format!("Hoofdstuk {slot}"),
            narrative: "Een voldoende lange duiding zonder letterlijke waarden.".into(),
            metrics: Vec::new(),
            strengths: Vec::new(),
            advice: Vec::new(),
            provenance: ChapterProvenance {
                provider: "rules".into(),
                model: None,
                origin: NarrativeOrigin::RuleBased,
                confidence: Confidence::High,
                inferred_fields: Vec::new(),
            },
            error: None,
        }
    }

    fn thirteen() -> Vec<Chapter> {
        (0..13).map(chapter).collect()
    }

    fn facts() -> FactStore {
        FactStore {
            asking_price_eur: Some(1_400_000),
            living_area_m2: Some(453.0),
            ..Default::default()
        }
    }

    #[test]
    fn clean_set_passes() {
        let mut chapters = thirteen();
        assert!(enforce_firewall(&mut chapters, &facts()).is_ok());
    }

    #[test]
    fn foreign_headline_fact_is_rejected() {
        let mut chapters = thirteen();
        // Chapter 2 headlines the price, which chapter 3 owns.
        chapters[2].metrics.push(woonrapport_common::ChapterMetric {
            label: "Vraagprijs".into(),
            value: "€ 1.400.000".into(),
            source: MetricSource::Fact(FactField::AskingPriceEur),
        });

        let err = enforce_firewall(&mut chapters, &facts()).unwrap_err();
        assert!(matches!(
            err,
            ReportError::FirewallViolation { slot: 2, .. }
        ));
        let block = chapters[2].error.as_ref().unwrap();
        assert_eq!(block.invariant, "ownership");
        assert!(chapters[2].narrative.is_empty());
    }

    #[test]
    fn narrative_leak_is_rejected() {
        let mut chapters = thirteen();
        // The energy chapter quotes the exact asking price.
        chapters[4].narrative = "Met een vraagprijs van € 1.400.000 is dit huis stevig geprijsd.".into();

        let err = enforce_firewall(&mut chapters, &facts()).unwrap_err();
        assert!(matches!(
            err,
            ReportError::FirewallViolation { slot: 4, .. }
        ));
        assert_eq!(chapters[4].error.as_ref().unwrap().invariant, "no_restatement");
    }

    #[test]
    fn owner_may_mention_its_own_value() {
        let mut chapters = thirteen();
        chapters[3].narrative =
            "De vraagprijs van € 1.400.000 ligt boven het regionale gemiddelde en vraagt om onderbouwing.".into();
        assert!(enforce_firewall(&mut chapters, &facts()).is_ok());
    }

    #[test]
    fn empty_narrative_is_rejected() {
        let mut chapters = thirteen();
        chapters[7].narrative = "   ".into();
        let err = enforce_firewall(&mut chapters, &facts()).unwrap_err();
        assert!(matches!(
            err,
            ReportError::FirewallViolation { slot: 7, .. }
        ));
    }

    #[test]
    fn consistency_checks_all_pass_on_clean_set() {
        let chapters = thirteen();
        let checks = consistency_checks(&chapters, &facts());
        assert_eq!(checks.len(), 4);
        assert!(checks.iter().all(|c| c.passed && c.detail.is_none()));
    }

    #[test]
    fn consistency_checks_name_the_broken_invariant() {
        let mut chapters = thirteen();
        chapters[4].narrative = "Vraagprijs € 1.400.000, een fors bedrag.".into();
        let checks = consistency_checks(&chapters, &facts());
        let restatement = checks.iter().find(|c| c.name == "no_restatement").unwrap();
        assert!(!restatement.passed);
        assert!(restatement.detail.as_ref().unwrap().contains("chapter 4"));
        assert!(checks.iter().find(|c| c.name == "ownership").unwrap().passed);
    }

    #[test]
    fn short_values_are_not_scanned() {
        let mut chapters = thirteen();
        let mut store = facts();
        store.energy_label = Some("B".into());
        // "B" appears everywhere in Dutch prose; it must not trip the scan.
        chapters[6].narrative = "Bij de Bezichtiging valt de indeling te Beoordelen.".into();
        assert!(enforce_firewall(&mut chapters, &store).is_ok());
    }
}
