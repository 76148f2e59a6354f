//! Run configuration
//!
//! A [`RunConfig`] collects everything about a conversion run that is not a file
//! path. It is normally read from a TOML file and then overridden from the command
//! line:
//!
//! ```toml
//! met_grid = "WRF_1_CA"
//! output_grid = "CMAQ_1_CA"
//! mechanism = "saprc"
//! time_window = "fixed24"
//! chemistry = "prelumped"
//! ```
//!
//! Every key is optional and falls back to [`RunConfig::default`].

use inmap_prep_chemistry::mechanism::Mechanism;
use inmap_prep_core::errors::{InmapError, InmapResult};
use inmap_prep_core::field::FieldSpec;
use inmap_prep_core::met_variables::{meteorology_field, METEOROLOGY_FIELDS};
use inmap_prep_core::time_window::{TimeWindowConvention, STEPS_PER_DAY};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// How lumped chemistry variables are produced
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChemistryMode {
    /// Lump individual mechanism species
    #[default]
    Aggregate,
    /// Copy variables that the chemistry file already provides in lumped form
    #[serde(alias = "pre_lumped")]
    Prelumped,
}

/// Settings for one conversion run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Name of the meteorology grid in the grid description
    pub met_grid: String,
    /// Name of the output grid in the grid description
    pub output_grid: String,
    /// Chemical mechanism of the chemistry file
    pub mechanism: String,
    pub time_window: TimeWindowConvention,
    pub chemistry: ChemistryMode,
    /// Number of time steps in the output file
    pub time_steps: usize,
    /// Number of output layers
    ///
    /// Defaults to the layer count of the chemistry file.
    pub output_layers: Option<usize>,
    /// Meteorological variables copied from WRF
    pub met_variables: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            met_grid: "WRF_1_CA".to_string(),
            output_grid: "CMAQ_1_CA".to_string(),
            mechanism: Mechanism::Cb6.name().to_string(),
            time_window: TimeWindowConvention::default(),
            chemistry: ChemistryMode::default(),
            time_steps: STEPS_PER_DAY,
            output_layers: None,
            met_variables: METEOROLOGY_FIELDS
                .iter()
                .map(|(name, _)| name.to_string())
                .collect(),
        }
    }
}

impl RunConfig {
    pub fn from_toml_str(contents: &str) -> InmapResult<Self> {
        let config: RunConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> InmapResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> InmapResult<()> {
        self.mechanism()?;
        self.met_fields()?;
        if self.time_steps == 0 {
            return Err(InmapError::Config("time_steps must be positive".into()));
        }
        if self.output_layers == Some(0) {
            return Err(InmapError::Config("output_layers must be positive".into()));
        }
        Ok(())
    }

    pub fn mechanism(&self) -> InmapResult<Mechanism> {
        Mechanism::from_str(&self.mechanism)
    }

    /// Field specs for the configured meteorological variables
    pub fn met_fields(&self) -> InmapResult<Vec<FieldSpec>> {
        self.met_variables
            .iter()
            .map(|name| {
                meteorology_field(name).ok_or_else(|| {
                    InmapError::Config(format!("Unknown meteorological variable '{}'", name))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RunConfig::default();
        assert_eq!(config.met_grid, "WRF_1_CA");
        assert_eq!(config.output_grid, "CMAQ_1_CA");
        assert_eq!(config.mechanism().unwrap(), Mechanism::Cb6);
        assert_eq!(config.time_window, TimeWindowConvention::ThroughHour23);
        assert_eq!(config.chemistry, ChemistryMode::Aggregate);
        assert_eq!(config.time_steps, 24);
        assert_eq!(config.met_fields().unwrap().len(), METEOROLOGY_FIELDS.len());
        config.validate().unwrap();
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(RunConfig::from_toml_str("").unwrap(), RunConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = RunConfig::from_toml_str(
            r#"
            mechanism = "SAPRC"
            time_window = "fixed24"
            chemistry = "prelumped"
            met_variables = ["U", "V"]
            "#,
        )
        .unwrap();
        assert_eq!(config.mechanism().unwrap(), Mechanism::Saprc);
        assert_eq!(config.time_window, TimeWindowConvention::Fixed24);
        assert_eq!(config.chemistry, ChemistryMode::Prelumped);
        assert_eq!(config.met_variables, vec!["U", "V"]);
        assert_eq!(config.output_grid, "CMAQ_1_CA");
    }

    #[test]
    fn unknown_mechanism_is_rejected() {
        assert!(matches!(
            RunConfig::from_toml_str("mechanism = \"racm\""),
            Err(InmapError::UnknownMechanism(_))
        ));
    }

    #[test]
    fn unknown_met_variable_is_rejected() {
        assert!(matches!(
            RunConfig::from_toml_str("met_variables = [\"QSNOW\"]"),
            Err(InmapError::Config(_))
        ));
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(matches!(
            RunConfig::from_toml_str("time_steps = \"many\""),
            Err(InmapError::Toml(_))
        ));
    }
}
