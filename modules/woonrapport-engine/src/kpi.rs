//! Derived metrics, computed exactly once per run.
//!
//! Pure function over the completed fact store. Chapters read the
//! resulting set verbatim; nothing here looks at chapter data.

use woonrapport_common::{FactStore, Grade, KpiSet, KpiThresholds, MaintenanceIntensity};

pub fn compute_kpis(facts: &FactStore, region_avg_price_m2: u64, thresholds: &KpiThresholds) -> KpiSet {
    let price_per_m2 = match (facts.asking_price_eur, facts.living_area_m2) {
        (Some(price), Some(area)) if area > 0.0 => Some((price as f64 / area).round() as u64),
        _ => None,
    };

    let market_deviation_pct = price_per_m2.map(|ppm2| {
        let avg = region_avg_price_m2 as f64;
        let pct = (ppm2 as f64 - avg) / avg * 100.0;
        (pct * 10.0).round() / 10.0
    });

    KpiSet {
        price_per_m2,
        market_deviation_pct,
        maintenance_intensity: maintenance_intensity(facts),
        energy_future: energy_future(facts),
        space_grade: space_grade(facts.living_area_m2),
        family_suitable: family_suitable(facts, thresholds),
    }
}

/// Build year drives the bucket; a fully insulated older house moves one
/// step down because the heaviest work has been done.
fn maintenance_intensity(facts: &FactStore) -> MaintenanceIntensity {
    let base = match facts.build_year {
        Some(year) if year >= 2000 => MaintenanceIntensity::Low,
        Some(year) if year >= 1970 => MaintenanceIntensity::Moderate,
        Some(_) => MaintenanceIntensity::High,
        None => return MaintenanceIntensity::Unknown,
    };

    let renovated = facts
        .insulation
        .as_deref()
        .is_some_and(|s| s.to_lowercase().contains("volledig"));

    match (base, renovated) {
        (MaintenanceIntensity::High, true) => MaintenanceIntensity::Moderate,
        (bucket, _) => bucket,
    }
}

/// Energy label A/B → good, C/D → moderate, E/F/G → poor. Without a
/// label, any insulation mention caps the score at moderate.
fn energy_future(facts: &FactStore) -> Grade {
    match facts.energy_label.as_deref() {
        Some(label) => match label.chars().next() {
            Some('A') | Some('B') => Grade::Good,
            Some('C') | Some('D') => Grade::Moderate,
            Some('E') | Some('F') | Some('G') => Grade::Poor,
            _ => Grade::Unknown,
        },
        None if facts.insulation.is_some() => Grade::Moderate,
        None => Grade::Unknown,
    }
}

/// Living area ≥ 120 m² → good, 80–119 → moderate, below 80 → poor.
fn space_grade(living_area_m2: Option<f64>) -> Grade {
    match living_area_m2 {
        Some(area) if area >= 120.0 => Grade::Good,
        Some(area) if area >= 80.0 => Grade::Moderate,
        Some(_) => Grade::Poor,
        None => Grade::Unknown,
    }
}

fn family_suitable(facts: &FactStore, thresholds: &KpiThresholds) -> Option<bool> {
    match (facts.living_area_m2, facts.bedroom_count) {
        (Some(area), Some(bedrooms)) => Some(
            area >= thresholds.family_min_area_m2 && bedrooms >= thresholds.family_min_bedrooms,
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> FactStore {
        FactStore {
            asking_price_eur: Some(1_400_000),
            living_area_m2: Some(453.0),
            build_year: Some(1979),
            bedroom_count: Some(4),
            energy_label: Some("B".into()),
            ..Default::default()
        }
    }

    #[test]
    fn price_per_m2_is_rounded() {
        let kpis = compute_kpis(&facts(), 4200, &KpiThresholds::default());
        assert_eq!(kpis.price_per_m2, Some(3091));
    }

    #[test]
    fn computation_is_deterministic() {
        let input = facts();
        let thresholds = KpiThresholds::default();
        assert_eq!(
            compute_kpis(&input, 4200, &thresholds),
            compute_kpis(&input, 4200, &thresholds)
        );
    }

    #[test]
    fn label_b_grades_good() {
        let kpis = compute_kpis(&facts(), 4200, &KpiThresholds::default());
        assert_eq!(kpis.energy_future, Grade::Good);
        assert_eq!(kpis.space_grade, Grade::Good);
        assert_eq!(kpis.family_suitable, Some(true));
    }

    #[test]
    fn label_f_grades_poor() {
        let mut input = facts();
        input.energy_label = Some("F".into());
        let kpis = compute_kpis(&input, 4200, &KpiThresholds::default());
        assert_eq!(kpis.energy_future, Grade::Poor);
    }

    #[test]
    fn missing_label_with_insulation_grades_moderate() {
        let mut input = facts();
        input.energy_label = None;
        input.insulation = Some("dubbel glas".into());
        let kpis = compute_kpis(&input, 4200, &KpiThresholds::default());
        assert_eq!(kpis.energy_future, Grade::Moderate);
    }

    #[test]
    fn empty_store_yields_unknowns() {
        let kpis = compute_kpis(&FactStore::default(), 4200, &KpiThresholds::default());
        assert_eq!(kpis.price_per_m2, None);
        assert_eq!(kpis.maintenance_intensity, MaintenanceIntensity::Unknown);
        assert_eq!(kpis.energy_future, Grade::Unknown);
        assert_eq!(kpis.family_suitable, None);
    }

    #[test]
    fn pre_war_house_is_high_maintenance_unless_renovated() {
        let mut input = facts();
        input.build_year = Some(1930);
        let thresholds = KpiThresholds::default();
        assert_eq!(
            compute_kpis(&input, 4200, &thresholds).maintenance_intensity,
            MaintenanceIntensity::High
        );
        input.insulation = Some("Volledig geïsoleerd".into());
        assert_eq!(
            compute_kpis(&input, 4200, &thresholds).maintenance_intensity,
            MaintenanceIntensity::Moderate
        );
    }
}
