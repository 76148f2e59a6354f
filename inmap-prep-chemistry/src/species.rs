use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical phase of a CMAQ species
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Gas,
    Aerosol,
}

/// Unit of a lumped output field
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputUnit {
    /// Mass concentration, `ug/m3`
    #[serde(rename = "ug/m3")]
    MicrogramsPerCubicMeter,
    /// Carbon mixing ratio, `ppbC`
    #[serde(rename = "ppbC")]
    PartsPerBillionCarbon,
}

impl OutputUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputUnit::MicrogramsPerCubicMeter => "ug/m3",
            OutputUnit::PartsPerBillionCarbon => "ppbC",
        }
    }
}

impl fmt::Display for OutputUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A lumped output field and the CMAQ species summed into it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeciesMap {
    pub name: String,
    pub species: Vec<String>,
    pub phase: Phase,
    pub units: OutputUnit,
}

impl SpeciesMap {
    pub fn new(name: &str, species: &[&str], phase: Phase, units: OutputUnit) -> Self {
        Self {
            name: name.to_string(),
            species: species.iter().map(|s| s.to_string()).collect(),
            phase,
            units,
        }
    }

    /// Output description, the contributing species joined with `+`
    pub fn description(&self) -> String {
        self.species.join("+")
    }
}
