//! Chemical mechanism tables
//!
//! A [`MechanismTable`] holds the molecular weights and lumped species maps for one
//! CMAQ chemical mechanism, merged with the species shared by every mechanism
//! (inorganic nitrogen and sulfur, secondary organic aerosol, total PM2.5 and oxidants).
//!
//! # Available Mechanisms
//!
//! - `cb6`: Carbon Bond 6, VOCs reported as mass concentration (`ug/m3`)
//! - `saprc`: SAPRC07, VOCs reported as carbon mixing ratio (`ppbC`). The weights
//!   for SAPRC VOCs are carbon numbers rather than molecular weights.

use crate::species::{OutputUnit, Phase, SpeciesMap};
use inmap_prep_core::errors::{InmapError, InmapResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use OutputUnit::{MicrogramsPerCubicMeter as UGM3, PartsPerBillionCarbon as PPBC};
use Phase::{Aerosol, Gas};

/// Molecular weights shared by all mechanisms
const SHARED_WEIGHTS: &[(&str, f64)] = &[
    ("NH3", 17.031),
    ("NO", 30.01),
    ("INTR", 147.1),
    ("NO2", 46.0),
    ("SO2", 64.0),
    ("SULF", 98.0),
    ("NO3", 62.0),
    ("N2O5", 108.0),
    ("HONO", 47.0),
    ("HNO3", 63.0),
    ("PNA", 79.0),
    ("CRON", 153.0),
    ("CLNO2", 81.5),
    ("PAN", 121.0),
    ("PANX", 121.0),
    ("OPAN", 161.0),
    ("NTR1", 119.1),
    ("NTR2", 135.1),
    ("OH", 17.1),
    ("HO2H", 34.0),
];

const ANTHROPOGENIC_SOA: &[&str] = &[
    "AXYL1J", "AXYL2J", "AXYL3J", "ATOL1J", "ATOL2J", "ATOL3J", "ABNZ1J", "ABNZ2J", "ABNZ3J",
    "AALK1J", "AALK2J", "AOLGAJ", "APAH1J", "APAH2J", "APAH3J",
];

const BIOGENIC_SOA: &[&str] = &[
    "AISO1J", "AISO2J", "AISO3J", "ATRP1J", "ATRP2J", "ASQTJ", "AOLGBJ",
];

const TOTAL_PM25: &[&str] = &[
    "ASO4I", "ANO3I", "ANH4I", "ANAI", "ACLI", "AECI", "AOTHRI", "ASO4J", "ANO3J", "ANH4J",
    "ANAJ", "ACLJ", "AECJ", "AOTHRJ", "AFEJ", "ASIJ", "ATIJ", "ACAJ", "AMGJ", "AMNJ", "AALJ",
    "AKJ", "ALVPO1I", "ASVPO1I", "ASVPO2I", "ALVPO1J", "ASVPO1J", "ASVPO2J", "ASVPO3J",
    "AIVPO1J", "ALVOO1I", "ALVOO2I", "ASVOO1I", "ASVOO2I", "AXYL1J", "AXYL2J", "AXYL3J",
    "ATOL1J", "ATOL2J", "ATOL3J", "ABNZ1J", "ABNZ2J", "ABNZ3J", "AISO1J", "AISO2J", "AISO3J",
    "ATRP1J", "ATRP2J", "ASQTJ", "AALK1J", "AALK2J", "APAH1J", "APAH2J", "APAH3J", "AORGCJ",
    "AOLGBJ", "AOLGAJ", "ALVOO1J", "ALVOO2J", "ASVOO1J", "ASVOO2J", "ASVOO3J", "APCSOJ",
];

/// Other gas-phase reactive nitrogen
const OTHER_NITROGEN: &[&str] = &[
    "NO3", "N2O5", "HONO", "HNO3", "PNA", "CRON", "CLNO2", "PAN", "PANX", "OPAN", "NTR1", "NTR2",
    "INTR",
];

fn shared_maps() -> Vec<SpeciesMap> {
    vec![
        SpeciesMap::new("aSOA", ANTHROPOGENIC_SOA, Aerosol, UGM3),
        SpeciesMap::new("bSOA", BIOGENIC_SOA, Aerosol, UGM3),
        SpeciesMap::new("TotalPM25", TOTAL_PM25, Aerosol, UGM3),
        SpeciesMap::new("gNH", &["NH3"], Gas, UGM3),
        SpeciesMap::new("gNO", &["NO", "NO2"], Gas, UGM3),
        SpeciesMap::new("gS", &["SULF", "SO2"], Gas, UGM3),
        SpeciesMap::new("pNH", &["ANH4I", "ANH4J"], Aerosol, UGM3),
        SpeciesMap::new("pNO", &["ANO3I", "ANO3J"], Aerosol, UGM3),
        SpeciesMap::new("pS", &["ASO4I", "ASO4J"], Aerosol, UGM3),
        SpeciesMap::new("gN", OTHER_NITROGEN, Gas, UGM3),
        SpeciesMap::new("oh", &["OH"], Gas, UGM3),
        SpeciesMap::new("h2o2", &["HO2H"], Gas, UGM3),
    ]
}

const CB6_WEIGHTS: &[(&str, f64)] = &[
    ("PAR", 72.1),
    ("ETH", 28.0),
    ("ETHY", 26.0),
    ("MEOH", 32.0),
    ("ETOH", 46.1),
    ("OLE", 42.1),
    ("TOL", 92.1),
    ("XYLMN", 106.2),
    ("FORM", 30.0),
    ("ALD2", 44.0),
    ("ETHA", 30.1),
    ("IOLE", 56.1),
    ("ALDX", 58.1),
    ("NAPH", 128.2),
    ("PRPA", 44.1),
    ("KET", 72.1),
    ("ISOP", 68.1),
    ("TERP", 136.0),
    ("SESQ", 204.0),
];

fn cb6_maps() -> Vec<SpeciesMap> {
    vec![
        SpeciesMap::new(
            "aVOC",
            &[
                "PAR", "ETH", "ETHY", "MEOH", "ETOH", "OLE", "TOL", "XYLMN", "FORM", "ALD2", "ETHA",
                "IOLE", "ALDX", "NAPH", "PRPA", "KET",
            ],
            Gas,
            UGM3,
        ),
        SpeciesMap::new("bVOC", &["ISOP", "TERP", "SESQ"], Gas, UGM3),
    ]
}

/// Carbon numbers for SAPRC species
const SAPRC_WEIGHTS: &[(&str, f64)] = &[
    ("IPRD", 5.0),
    ("MACR", 4.0),
    ("ISOPRENE", 5.0),
    ("APIN", 10.0),
    ("TERP", 10.0),
    ("SESQ", 15.0),
    ("NPHE", 6.0),
    ("CRES", 7.0),
    ("BALD", 7.0),
    ("BENZENE", 6.0),
    ("TOLUENE", 7.0),
    ("MXYL", 8.0),
    ("OXYL", 8.0),
    ("PXYL", 8.0),
    ("ARO1", 7.0),
    ("ARO2MN", 8.0),
    ("NAPHTHAL", 10.0),
    ("ALK1", 2.0),
    ("ALK2", 3.0),
    ("ALK3", 4.0),
    ("ALK4", 5.0),
    ("ALK5", 8.0),
    ("RCOOH", 3.0),
    ("CCOOH", 2.0),
    ("HCOOH", 1.0),
    ("ACETONE", 3.0),
    ("ACETYLENE", 2.0),
    ("ACROLEIN", 3.0),
    ("BACL", 4.0),
    ("BUTADIENE13", 4.0),
    ("CCHO", 2.0),
    ("ETHENE", 2.0),
    ("ETOH", 2.0),
    ("GLY", 2.0),
    ("HCHO", 1.0),
    ("MEK", 4.0),
    ("MEOH", 1.0),
    ("MGLY", 3.0),
    ("MVK", 4.0),
    ("OLE1", 5.0),
    ("OLE2", 5.0),
    ("PRD2", 6.0),
    ("PROPENE", 3.0),
    ("RCHO", 3.0),
    ("RNO3", 6.0),
];

fn saprc_maps() -> Vec<SpeciesMap> {
    vec![
        SpeciesMap::new(
            "aVOC",
            &[
                "NPHE", "CRES", "BALD", "BENZENE", "TOLUENE", "MXYL", "OXYL", "PXYL", "ARO1",
                "ARO2MN", "NAPHTHAL", "ALK1", "ALK2", "ALK3", "ALK4", "ALK5",
            ],
            Gas,
            PPBC,
        ),
        SpeciesMap::new(
            "bVOC",
            &["IPRD", "MACR", "ISOPRENE", "APIN", "TERP", "SESQ"],
            Gas,
            PPBC,
        ),
    ]
}

/// Supported CMAQ chemical mechanisms
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mechanism {
    Cb6,
    Saprc,
}

impl Mechanism {
    pub fn name(&self) -> &'static str {
        match self {
            Mechanism::Cb6 => "cb6",
            Mechanism::Saprc => "saprc",
        }
    }
}

impl FromStr for Mechanism {
    type Err = InmapError;

    /// Case-insensitive lookup by name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cb6" => Ok(Mechanism::Cb6),
            "saprc" => Ok(Mechanism::Saprc),
            _ => Err(InmapError::UnknownMechanism(s.to_string())),
        }
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Molecular weights and lumped species maps for one mechanism
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MechanismTable {
    name: String,
    molecular_weights: BTreeMap<String, f64>,
    maps: Vec<SpeciesMap>,
}

impl MechanismTable {
    /// Build the merged table for a mechanism
    pub fn new(mechanism: Mechanism) -> InmapResult<Self> {
        let (weights, mut maps) = match mechanism {
            Mechanism::Cb6 => (CB6_WEIGHTS, cb6_maps()),
            Mechanism::Saprc => (SAPRC_WEIGHTS, saprc_maps()),
        };
        maps.extend(shared_maps());

        let molecular_weights = SHARED_WEIGHTS
            .iter()
            .chain(weights.iter())
            .map(|(s, w)| (s.to_string(), *w));
        Self::from_parts(mechanism.name(), molecular_weights.collect(), maps)
    }

    /// Build a table from explicit parts
    ///
    /// Fails if a gas-phase species has no molecular weight.
    pub fn from_parts(
        name: &str,
        molecular_weights: BTreeMap<String, f64>,
        maps: Vec<SpeciesMap>,
    ) -> InmapResult<Self> {
        let table = Self {
            name: name.to_string(),
            molecular_weights,
            maps,
        };
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> InmapResult<()> {
        for map in self.maps.iter().filter(|m| m.phase == Phase::Gas) {
            if let Some(species) = map
                .species
                .iter()
                .find(|s| !self.molecular_weights.contains_key(*s))
            {
                return Err(InmapError::MissingMolecularWeight {
                    mechanism: self.name.clone(),
                    species: species.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn molecular_weight(&self, species: &str) -> Option<f64> {
        self.molecular_weights.get(species).copied()
    }

    /// Lumped maps in output order
    pub fn maps(&self) -> &[SpeciesMap] {
        &self.maps
    }

    pub fn map(&self, name: &str) -> Option<&SpeciesMap> {
        self.maps.iter().find(|m| m.name == name)
    }
}
