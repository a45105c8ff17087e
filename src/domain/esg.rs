use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ESG material pulled out of one FRE XML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsgData {
    pub extracted_at: DateTime<Utc>,
    /// Embedded PDF sections keyed by section name (`info_asg`, `gestao_riscos`, ...).
    pub documents: BTreeMap<String, PdfReference>,
    pub quantitative: QuantitativeData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfReference {
    pub file_name: String,
    pub hash: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuantitativeData {
    pub governing_bodies: Vec<GoverningBodyDiversity>,
    pub human_resources: HumanResources,
}

/// Board, executive board or fiscal council composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoverningBodyDiversity {
    pub body: String,
    pub race: Option<RaceBreakdown>,
    pub gender: Option<GenderBreakdown>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HumanResources {
    pub race: Option<RaceBreakdown>,
    pub gender: Option<GenderBreakdown>,
    pub age_bands: Option<AgeBands>,
    pub regions: Option<RegionBreakdown>,
    pub compensation: Option<Compensation>,
}

/// Self-declared color/race, following the IBGE categories used by CVM.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceBreakdown {
    pub asian: u32,
    pub white: u32,
    pub black: u32,
    pub brown: u32,
    pub indigenous: u32,
    pub other: u32,
    pub undeclared: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenderBreakdown {
    pub male: u32,
    pub female: u32,
    pub non_binary: u32,
    pub other: u32,
    pub undeclared: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeBands {
    pub under_30: u32,
    pub from_30_to_50: u32,
    pub over_50: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionBreakdown {
    pub north: u32,
    pub northeast: u32,
    pub center_west: u32,
    pub southeast: u32,
    pub south: u32,
    pub abroad: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Compensation {
    pub highest: f64,
    pub median: f64,
    pub ratio: f64,
}

impl RaceBreakdown {
    pub fn total(&self) -> u32 {
        self.asian
            + self.white
            + self.black
            + self.brown
            + self.indigenous
            + self.other
            + self.undeclared
    }
}

impl GenderBreakdown {
    pub fn total(&self) -> u32 {
        self.male + self.female + self.non_binary + self.other + self.undeclared
    }
}
