//! Narrative text: AI prompt assembly and the rule-based fallback.
//!
//! The prompt carries ONLY the facts a chapter owns plus the relevant
//! KPIs, never the full fact store, so a model cannot leak non-owned
//! values into its prose. The rule-based templates are qualitative and
//! embed no display values at all.

use ai_client::util::truncate_to_char_boundary;
use ai_client::GenerateRequest;
use woonrapport_common::{FactStore, Grade, KpiSet, MaintenanceIntensity};

use super::ownership::ChapterSpec;

/// Narratives shorter than this are rejected and replaced by the
/// rule-based path.
pub const MIN_NARRATIVE_CHARS: usize = 200;

/// Upper bound on the user prompt. Fact values originate from pasted
/// listings, so a pathological paste must not blow up the provider
/// request.
const MAX_PROMPT_BYTES: usize = 8_192;

const SYSTEM_CONTEXT: &str = "\
Je bent een nuchtere Nederlandse woningadviseur. Je schrijft één \
hoofdstuk van een aankooprapport. Regels: gebruik uitsluitend de \
feiten en kengetallen hieronder; noem geen waarden die er niet in \
staan; herhaal bedragen en maten niet letterlijk maar duid ze \
(boven/onder gemiddeld, ruim/krap); verzin niets — wat onbekend is \
blijft onbekend. Schrijf twee alinea's Nederlands, zakelijk en \
concreet.";

/// Assemble the provider request for one chapter.
pub fn build_prompt(spec: &ChapterSpec, facts: &FactStore, kpis: &KpiSet) -> GenerateRequest {
    let mut lines = vec![format!("Hoofdstuk: {}", spec.title)];

    lines.push("Feiten (alleen deze gebruiken):".into());
    let mut any_fact = false;
    for field in spec.owned {
        if let Some(value) = facts.display_value(*field) {
            lines.push(format!("- {}: {}", field.key(), value));
            any_fact = true;
        }
    }
    if spec.slot == 0 && !facts.media_urls.is_empty() {
        lines.push(format!("- aantal foto's: {}", facts.media_urls.len()));
        any_fact = true;
    }
    if !any_fact {
        lines.push("- (geen geregistreerde feiten voor dit hoofdstuk)".into());
    }

    let kpi_lines = kpi_context(spec.slot, kpis);
    if !kpi_lines.is_empty() {
        lines.push("Kengetallen:".into());
        lines.extend(kpi_lines);
    }

    lines.push("Schrijf het hoofdstuk.".into());

    let prompt = lines.join("\n");
    GenerateRequest::new(
        SYSTEM_CONTEXT,
        truncate_to_char_boundary(&prompt, MAX_PROMPT_BYTES),
    )
    .with_temperature(0.4)
}

/// KPI lines a chapter's prompt may reference. KPIs are shared freely;
/// only facts are firewalled.
pub fn kpi_context(slot: u8, kpis: &KpiSet) -> Vec<String> {
    let mut out = Vec::new();
    match slot {
        1 => out.push(format!("- ruimte-indruk: {}", kpis.space_grade)),
        3 => {
            if let Some(ppm2) = kpis.price_per_m2 {
                out.push(format!("- prijs per m2: {ppm2} euro"));
            }
            if let Some(dev) = kpis.market_deviation_pct {
                out.push(format!("- afwijking van regiogemiddelde: {dev:+.1}%"));
            }
        }
        4 | 11 => out.push(format!("- energie-toekomstscore: {}", kpis.energy_future)),
        5 => out.push(format!(
            "- onderhoudsintensiteit: {}",
            intensity_word(kpis.maintenance_intensity)
        )),
        8 => {
            if let Some(suitable) = kpis.family_suitable {
                out.push(format!(
                    "- gezinsgeschikt: {}",
                    if suitable { "ja" } else { "nee" }
                ));
            }
        }
        12 => {
            out.push(format!("- ruimte-indruk: {}", kpis.space_grade));
            out.push(format!("- energie-toekomstscore: {}", kpis.energy_future));
            out.push(format!(
                "- onderhoudsintensiteit: {}",
                intensity_word(kpis.maintenance_intensity)
            ));
        }
        _ => {}
    }
    out
}

fn intensity_word(intensity: MaintenanceIntensity) -> &'static str {
    match intensity {
        MaintenanceIntensity::Low => "laag",
        MaintenanceIntensity::Moderate => "gemiddeld",
        MaintenanceIntensity::High => "hoog",
        MaintenanceIntensity::Unknown => "onbekend",
    }
}

fn grade_word(grade: Grade) -> &'static str {
    match grade {
        Grade::Good => "goed",
        Grade::Moderate => "gemiddeld",
        Grade::Poor => "matig",
        Grade::Unknown => "onbekend",
    }
}

/// Rule-based narrative for a slot. Used when no provider is configured
/// or a provider call fails; always long enough to pass the gate and
/// free of any display values.
pub fn fallback_narrative(slot: u8, facts: &FactStore, kpis: &KpiSet) -> String {
    match slot {
        0 => format!(
            "Dit rapport bundelt de geregistreerde kenmerken van de woning in dertien \
            hoofdstukken, van algemene kenmerken tot een afsluitend advies. {} \
            Elk gegeven is afkomstig uit de aangeleverde advertentie of uit openbare \
            bronnen; wat niet kon worden vastgesteld staat als onbekend gemarkeerd en \
            verdient nader onderzoek voor een bezichtiging.",
            if facts.media_urls.is_empty() {
                "Er is geen beeldmateriaal aangeleverd, vraag de makelaar om recente foto's."
            } else {
                "Het aangeleverde beeldmateriaal geeft een eerste indruk van de staat en stijl."
            }
        ),
        1 => format!(
            "De maatvoering van deze woning laat zich samenvatten als {}. De verhouding \
            tussen woonoppervlak, inhoud en het aantal kamers bepaalt hoe de ruimte in de \
            praktijk aanvoelt; een formeel groot huis met veel kleine kamers woont anders \
            dan dezelfde meters in een open indeling. Leg de opgegeven maten langs de \
            meetinstructie (NEN 2580) voordat u er in de onderhandeling op leunt.",
            grade_word(kpis.space_grade)
        ),
        2 => "De waarde van een woning wordt voor een groot deel buiten de voordeur bepaald. \
            Controleer de dagelijkse routines vanaf dit adres: de loop naar winkels en \
            scholen, de aansluiting op doorgaande wegen en het openbaar vervoer. De \
            bereikbaarheidsindicatie in dit rapport is een eerste schatting op basis van \
            openbare routegegevens en vervangt een proefrit op een doordeweekse ochtend niet."
            .to_string(),
        3 => format!(
            "De vraagprijs positioneert deze woning {} het regionale gemiddelde per \
            vierkante meter. Dat zegt niets over de juiste prijs voor déze woning, maar wel \
            waar de onderhandelingsruimte waarschijnlijk zit. Vergelijk met recent verkochte \
            woningen in dezelfde buurt en weeg mee hoe lang de woning al te koop staat.",
            match kpis.market_deviation_pct {
                Some(d) if d > 5.0 => "duidelijk boven",
                Some(d) if d < -5.0 => "onder",
                Some(_) => "rond",
                None => "op een onbekende afstand van",
            }
        ),
        4 => format!(
            "De energetische toekomstscore van deze woning is {}. Die score weegt het \
            energielabel en de aanwezige isolatie en verwarming, en voorspelt hoeveel \
            verduurzamingswerk de komende jaren redelijkerwijs op u afkomt. Energielasten \
            zijn inmiddels een vaste post van betekenis; reken ze door in uw maandlasten \
            in plaats van ze als bijzaak te behandelen.",
            grade_word(kpis.energy_future)
        ),
        5 => format!(
            "Op basis van het bouwjaar en de geregistreerde kenmerken is de verwachte \
            onderhoudsintensiteit {}. Het bouwjaar bepaalt welke bouwmethoden en materialen \
            u mag verwachten, en daarmee welke gebreken typisch zijn voor deze generatie \
            woningen. Een bouwkundige keuring blijft de enige manier om verwachting en \
            werkelijkheid op elkaar te leggen.",
            intensity_word(kpis.maintenance_intensity)
        ),
        6 => "De indeling bepaalt of de meters ook werken: het aantal slaap- en badkamers \
            ten opzichte van het totaal aantal kamers laat zien hoeveel flexibiliteit er in \
            de plattegrond zit. Let bij de bezichtiging op de maat van de kleinste kamers, \
            de positie van de badkamer ten opzichte van de slaapverdieping en de \
            mogelijkheden om later een kamer te splitsen of samen te voegen."
            .to_string(),
        7 => format!(
            "{} Buitenruimte en parkeren wegen zwaar in het dagelijkse woongenot en zijn \
            achteraf zelden toe te voegen. Controleer bezonning op verschillende tijdstippen \
            en of gedeelde voorzieningen (achterpad, parkeerterrein) goed geregeld zijn.",
            if facts.garden.is_some() || facts.balcony.is_some() {
                "Deze woning heeft eigen buitenruimte."
            } else {
                "Eigen buitenruimte is niet uit de advertentie gebleken; vraag hier expliciet naar."
            }
        ),
        8 => format!(
            "Voor een gezin is deze woning op papier {}. Dat oordeel combineert het \
            woonoppervlak met het aantal slaapkamers en zegt dus iets over capaciteit, niet \
            over sfeer of buurt. Kijk aanvullend naar de nabijheid van scholen en opvang, en \
            naar hoe de slaapkamers zich verhouden tot de leeftijden in uw huishouden.",
            match kpis.family_suitable {
                Some(true) => "geschikt",
                Some(false) => "aan de krappe kant",
                None => "niet te beoordelen door ontbrekende gegevens",
            }
        ),
        9 => "De juridische kant van een aankoop verdient evenveel aandacht als de stenen. \
            Controleer de eigendomssituatie in het kadaster, eventuele erfdienstbaarheden, \
            kettingbedingen en voorkeursrechten, en bij erfpacht de voorwaarden en de \
            resterende looptijd van het huidige tijdvak. Laat de koopakte altijd door een \
            eigen aankoopmakelaar of notaris meelezen voordat u tekent."
            .to_string(),
        10 => "Naast de hypotheek bepalen de vaste lasten wat deze woning maandelijks echt \
            kost: gemeentelijke heffingen, opstalverzekering, energielasten en bij een \
            appartement de VvE-bijdrage. Vraag bij een VvE altijd de laatste jaarrekening, \
            het reservefonds en het meerjarenonderhoudsplan op; een lage bijdrage bij een \
            leeg fonds is duurder dan een hoge bijdrage bij een gezond fonds."
            .to_string(),
        11 => format!(
            "De verduurzamingsopgave van deze woning is naar verwachting {}. Begin bij de \
            schil (isolatie en glas) voordat u in installaties investeert, en benut \
            beschikbare subsidies en gemeentelijke leningen. Een woning die nu matig scoort \
            is daarmee ook een kans: de investering vertaalt zich in lagere lasten en een \
            beter label bij verkoop.",
            match kpis.energy_future {
                Grade::Good => "beperkt",
                Grade::Moderate => "gemiddeld",
                Grade::Poor => "fors",
                Grade::Unknown => "onbekend",
            }
        ),
        _ => "Alles afwegend volgt het eindoordeel uit de voorgaande hoofdstukken: de \
            maatvoering, de marktpositie, de energetische staat en het verwachte onderhoud \
            bepalen samen of deze woning bij uw situatie past. Neem de openstaande \
            onderzoekspunten serieus, plan een bezichtiging met een aankoopmakelaar en laat \
            de prijsonderhandeling leiden door feiten in plaats van haast."
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapters::ownership::CHAPTERS;
    use crate::kpi::compute_kpis;

    #[test]
    fn every_fallback_is_long_enough() {
        let facts = FactStore::default();
        let kpis = compute_kpis(&facts, 4200, &Default::default());
        for spec in &CHAPTERS {
            let text = fallback_narrative(spec.slot, &facts, &kpis);
            assert!(
                text.len() >= MIN_NARRATIVE_CHARS,
                "slot {} narrative too short ({} chars)",
                spec.slot,
                text.len()
            );
        }
    }

    #[test]
    fn prompt_contains_only_owned_facts() {
        let facts = FactStore {
            asking_price_eur: Some(1_400_000),
            living_area_m2: Some(453.0),
            energy_label: Some("B".into()),
            ..Default::default()
        };
        let kpis = compute_kpis(&facts, 4200, &Default::default());

        // Chapter 4 (energy) owns the label but not price or area.
        let request = build_prompt(&CHAPTERS[4], &facts, &kpis);
        assert!(request.prompt.contains("energy_label"));
        assert!(!request.prompt.contains("1.400.000"));
        assert!(!request.prompt.contains("453"));
    }

    #[test]
    fn oversized_fact_values_yield_a_bounded_prompt() {
        let facts = FactStore {
            asking_price_eur: Some(1_400_000),
            living_area_m2: Some(453.0),
            address: Some("Keizersgracht 123 ".repeat(4_000)),
            energy_label: Some("B".repeat(50_000)),
            ..Default::default()
        };
        let kpis = compute_kpis(&facts, 4200, &Default::default());
        for spec in &CHAPTERS {
            let request = build_prompt(spec, &facts, &kpis);
            assert!(
                request.prompt.len() <= MAX_PROMPT_BYTES,
                "slot {} prompt is {} bytes",
                spec.slot,
                request.prompt.len()
            );
        }
    }

    #[test]
    fn fallbacks_embed_no_display_values() {
        let facts = FactStore {
            asking_price_eur: Some(1_400_000),
            living_area_m2: Some(453.0),
            build_year: Some(1979),
            ..Default::default()
        };
        let kpis = compute_kpis(&facts, 4200, &Default::default());
        for spec in &CHAPTERS {
            let text = fallback_narrative(spec.slot, &facts, &kpis);
            assert!(!text.contains("1.400.000"));
            assert!(!text.contains("453"));
            assert!(!text.contains("1979"));
        }
    }
}
