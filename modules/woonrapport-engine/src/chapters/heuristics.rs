//! Rule-based strengths and advice per chapter slot.
//!
//! Qualitative only: these lines interpret facts and KPIs, they never
//! reprint display values owned by another chapter.

use woonrapport_common::{FactStore, Grade, KpiSet, MaintenanceIntensity};

pub fn strengths_for(slot: u8, facts: &FactStore, kpis: &KpiSet) -> Vec<String> {
    let mut out = Vec::new();
    match slot {
        0 => {
            if !facts.media_urls.is_empty() {
                out.push("Beeldmateriaal beschikbaar voor een eerste indruk".into());
            }
        }
        1 => {
            if kpis.space_grade == Grade::Good {
                out.push("Royale woonoppervlakte voor deze markt".into());
            }
            if facts.plot_area_m2.unwrap_or(0.0) > facts.living_area_m2.unwrap_or(0.0) {
                out.push("Perceel biedt ruimte rondom de woning".into());
            }
        }
        3 => {
            if kpis.market_deviation_pct.is_some_and(|d| d <= -5.0) {
                out.push("Vraagprijs ligt onder het regionale gemiddelde".into());
            }
        }
        4 => {
            if kpis.energy_future == Grade::Good {
                out.push("Energetisch bij de tijd, lage verduurzamingsdruk".into());
            }
            if facts.heating.as_deref().is_some_and(|h| {
                h.to_lowercase().contains("warmtepomp")
            }) {
                out.push("Gasloos verwarmen is al geregeld".into());
            }
        }
        5 => {
            if facts.build_year.is_some_and(|y| y >= 1990) {
                out.push("Moderne bouw, relatief jong casco".into());
            }
            if kpis.maintenance_intensity == MaintenanceIntensity::Low {
                out.push("Weinig achterstallig onderhoud te verwachten".into());
            }
        }
        7 => {
            if facts.garden.is_some() {
                out.push("Eigen buitenruimte op de begane grond".into());
            }
            if facts.garage.is_some() {
                out.push("Parkeren of bergen op eigen terrein".into());
            }
        }
        8 => {
            if kpis.family_suitable == Some(true) {
                out.push("Ruimte en slaapkamers passen bij een gezin".into());
            }
        }
        9 => {
            if facts
                .ownership_type
                .as_deref()
                .is_some_and(|o| o.to_lowercase().contains("eigen grond"))
            {
                out.push("Eigen grond: geen canonverplichtingen".into());
            }
        }
        _ => {}
    }
    out
}

pub fn advice_for(slot: u8, facts: &FactStore, kpis: &KpiSet, unknown_fields: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    match slot {
        2 => {
            if facts.latitude.is_none() {
                out.push("Locatie kon niet worden bevestigd, controleer het adres".into());
            }
        }
        3 => {
            if kpis.market_deviation_pct.is_some_and(|d| d >= 10.0) {
                out.push("Prijs ligt duidelijk boven het regiogemiddelde, neem dit mee in de onderhandeling".into());
            }
        }
        4 => {
            if kpis.energy_future == Grade::Poor {
                out.push("Reserveer budget voor isolatie en verduurzaming".into());
            }
        }
        5 => {
            if kpis.maintenance_intensity == MaintenanceIntensity::High {
                out.push("Laat een bouwkundige keuring uitvoeren voor aankoop".into());
            }
        }
        8 => {
            if kpis.family_suitable == Some(false) {
                out.push("Voor een gezin aan de krappe kant, weeg de indeling zwaar mee".into());
            }
        }
        9 => {
            if facts
                .ownership_type
                .as_deref()
                .is_some_and(|o| o.to_lowercase().contains("erfpacht"))
            {
                out.push("Controleer de erfpachtvoorwaarden en de resterende canonperiode".into());
            }
        }
        10 => {
            if facts.vve_contribution_eur.is_some() {
                out.push("Vraag de VvE-stukken en het meerjarenonderhoudsplan op".into());
            }
        }
        11 => {
            if kpis.energy_future != Grade::Good {
                out.push("Vraag offertes op voor isolatie en zonnepanelen".into());
            }
        }
        12 => {
            if !unknown_fields.is_empty() {
                out.push(format!(
                    "Onderzoek de {} ontbrekende gegevens (onbekend / nader te onderzoeken)",
                    unknown_fields.len()
                ));
            }
            if !facts.warnings.is_empty() {
                out.push("Geparste waarden bevatten gecorrigeerde uitschieters, verifieer ze bij de makelaar".into());
            }
        }
        _ => {}
    }
    out
}
