//! The data firewall's backbone: which chapter owns which fact.
//!
//! A field may be the primary displayed value in exactly one chapter.
//! Other chapters may use it for computation or qualitative phrasing,
//! never as a headline metric. The table is baked in, not configurable.

use woonrapport_common::FactField;

pub struct ChapterSpec {
    pub slot: u8,
    pub title: &'static str,
    pub owned: &'static [FactField],
}

pub const CHAPTERS: [ChapterSpec; 13] = [
    ChapterSpec {
        slot: 0,
        title: "Samenvatting & media",
        owned: &[FactField::MediaUrls, FactField::Address],
    },
    ChapterSpec {
        slot: 1,
        title: "Algemene kenmerken",
        owned: &[
            FactField::LivingAreaM2,
            FactField::PlotAreaM2,
            FactField::VolumeM3,
            FactField::RoomCount,
        ],
    },
    ChapterSpec {
        slot: 2,
        title: "Locatie & bereikbaarheid",
        owned: &[FactField::PostalCode, FactField::City],
    },
    ChapterSpec {
        slot: 3,
        title: "Prijs & marktpositie",
        owned: &[FactField::AskingPriceEur],
    },
    ChapterSpec {
        slot: 4,
        title: "Energie",
        owned: &[
            FactField::EnergyLabel,
            FactField::Insulation,
            FactField::Heating,
        ],
    },
    ChapterSpec {
        slot: 5,
        title: "Bouwkundige staat",
        owned: &[FactField::BuildYear, FactField::RoofType],
    },
    ChapterSpec {
        slot: 6,
        title: "Indeling",
        owned: &[FactField::BedroomCount, FactField::BathroomCount],
    },
    ChapterSpec {
        slot: 7,
        title: "Buitenruimte",
        owned: &[FactField::Garden, FactField::Balcony, FactField::Garage],
    },
    ChapterSpec {
        slot: 8,
        title: "Gezinsgeschiktheid",
        owned: &[],
    },
    ChapterSpec {
        slot: 9,
        title: "Eigendom & juridisch",
        owned: &[FactField::OwnershipType],
    },
    ChapterSpec {
        slot: 10,
        title: "Vaste lasten & VvE",
        owned: &[FactField::VveContributionEur],
    },
    ChapterSpec {
        slot: 11,
        title: "Verduurzaming & potentie",
        owned: &[],
    },
    ChapterSpec {
        slot: 12,
        title: "Conclusie & advies",
        owned: &[],
    },
];

/// The slot that owns a field, if any.
pub fn owner_of(field: FactField) -> Option<u8> {
    CHAPTERS
        .iter()
        .find(|c| c.owned.contains(&field))
        .map(|c| c.slot)
}
