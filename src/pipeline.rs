//! Conversion of one simulation day into an InMAP input file
//!
//! # What This Does
//!
//! The [`Pipeline`] runs the whole conversion against three inputs and one output:
//!
//! 1. Looks up the meteorology and output grids and aligns them
//! 2. Finds the run date in the WRF `Times` variable
//! 3. Resolves the vertical layer maps for WRF and CMAQ
//! 4. Creates the output dimensions and copies the WRF global attributes
//! 5. Copies each meteorological field through the alignment window
//! 6. Writes the inverse MCIP density as `ALT`
//! 7. Lumps the CMAQ species onto the output layers and computes the gas/particle
//!    partition fractions, or copies chemistry that is already lumped
//!
//! MCIP density already sits on the output layers; only the CMAQ species go through
//! the layer map.
//!
//! Every step is sequential and any failure aborts the run. The output dataset is
//! synced after each variable so a failed run leaves every completed variable on
//! disk.
//!
//! # Inputs
//!
//! | Input | Provides |
//! |---|---|
//! | WRF output | `Times`, meteorological fields, global attributes, `bottom_top` |
//! | MCIP `METCRO3D` | `DENS` on the output grid and layers |
//! | CMAQ concentrations | species (or lumped variables) on `TSTEP, LAY, ROW, COL` |

use crate::config::{ChemistryMode, RunConfig};
use inmap_prep_chemistry::aggregate::{copy_prelumped, ChemistryWindow, SpeciesAggregator};
use inmap_prep_chemistry::mechanism::MechanismTable;
use inmap_prep_chemistry::partition::PartitionCalculator;
use inmap_prep_core::alignment::{align_grids, AlignmentWindow};
use inmap_prep_core::dataset::{DatasetReader, DatasetWriter};
use inmap_prep_core::density::{append_inverse_density, DENSITY};
use inmap_prep_core::errors::{InmapError, InmapResult};
use inmap_prep_core::field::{Dimension, OutputLayout};
use inmap_prep_core::griddesc::GridRegistry;
use inmap_prep_core::layers::LayerMap;
use inmap_prep_core::met_variables::INVERSE_DENSITY;
use inmap_prep_core::resample::FieldResampler;
use inmap_prep_core::time_window::{find_time_window, RunDate};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::info;

/// Name of the WRF time coordinate
pub const TIMES: &str = "Times";
/// Name of the IOAPI layer dimension in CMAQ and MCIP files
pub const IOAPI_LAYERS: &str = "LAY";

/// What a completed run produced
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub window: AlignmentWindow,
    /// Steps of the WRF file that were copied
    pub time_window: Range<usize>,
    pub layout: OutputLayout,
    /// Output variables in the order they were written
    pub variables: Vec<String>,
}

/// One configured conversion run
#[derive(Clone, Debug)]
pub struct Pipeline {
    config: RunConfig,
    registry: GridRegistry,
    run_date: RunDate,
    layer_map: Option<LayerMap>,
}

impl Pipeline {
    /// Create a pipeline
    ///
    /// # Arguments
    ///
    /// * `config` - Run settings, validated here
    /// * `registry` - Grid description holding both configured grids
    /// * `run_date` - Day to extract
    pub fn new(config: RunConfig, registry: GridRegistry, run_date: RunDate) -> InmapResult<Self> {
        config.validate()?;
        registry.get(&config.met_grid)?;
        registry.get(&config.output_grid)?;
        Ok(Self {
            config,
            registry,
            run_date,
            layer_map: None,
        })
    }

    /// Use `layer_map` when the vertical resolution of an input differs from the output
    pub fn with_layer_map(mut self, layer_map: LayerMap) -> Self {
        self.layer_map = Some(layer_map);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Spatial window between the meteorology grid and the output grid
    pub fn alignment(&self) -> InmapResult<AlignmentWindow> {
        let met_grid = self.registry.get(&self.config.met_grid)?;
        let output_grid = self.registry.get(&self.config.output_grid)?;
        align_grids(met_grid, output_grid)
    }

    /// Run the conversion
    ///
    /// # Arguments
    ///
    /// * `wrf` - WRF output on the meteorology grid
    /// * `mcip` - MCIP `METCRO3D` file on the output grid
    /// * `cmaq` - CMAQ concentrations on the output grid
    /// * `output` - Empty dataset to fill
    pub fn run<Wrf, Mcip, Cmaq, Out>(
        &self,
        wrf: &Wrf,
        mcip: &Mcip,
        cmaq: &Cmaq,
        output: &mut Out,
    ) -> InmapResult<RunSummary>
    where
        Wrf: DatasetReader,
        Mcip: DatasetReader,
        Cmaq: DatasetReader,
        Out: DatasetReader + DatasetWriter,
    {
        let output_grid = self.registry.get(&self.config.output_grid)?;
        let window = self.alignment()?;
        info!(
            met_grid = %self.config.met_grid,
            output_grid = %self.config.output_grid,
            rows = ?window.rows,
            columns = ?window.columns,
            "aligned grids"
        );

        let time_window = self.time_window(wrf)?;
        info!(run_date = %self.run_date, steps = ?time_window, "found run date");

        let cmaq_layers = required_dimension(cmaq, IOAPI_LAYERS)?;
        let output_layers = self.config.output_layers.unwrap_or(cmaq_layers);
        let met_layers = LayerMap::resolve(
            required_dimension(wrf, Dimension::BottomTop.name())?,
            output_layers,
            self.layer_map.clone(),
        )?;
        let chemistry_layers =
            LayerMap::resolve(cmaq_layers, output_layers, self.layer_map.clone())?;

        // Chemistry inputs are checked before anything is written
        let chemistry_window = ChemistryWindow::new(self.config.time_steps, chemistry_layers);
        let aggregator = match self.config.chemistry {
            ChemistryMode::Aggregate => {
                let table = MechanismTable::new(self.config.mechanism()?)?;
                Some(SpeciesAggregator::new(
                    table,
                    chemistry_window.clone(),
                    mcip.read(DENSITY)?,
                )?)
            }
            ChemistryMode::Prelumped => None,
        };

        let layout = OutputLayout::for_grid(output_grid, output_layers, self.config.time_steps);
        layout.define(output)?;
        for (name, value) in wrf.global_attributes() {
            output.set_global_attribute(&name, value)?;
        }

        let mut variables = Vec::new();
        let resampler = FieldResampler::new(&window, &met_layers, time_window.clone());
        for spec in self.config.met_fields()? {
            resampler.resample_field(wrf, output, &spec)?;
            info!(variable = %spec.name, "wrote meteorology");
            variables.push(spec.name);
        }

        append_inverse_density(mcip, output)?;
        info!(variable = INVERSE_DENSITY, "wrote inverse density");
        variables.push(INVERSE_DENSITY.to_string());

        match aggregator {
            Some(aggregator) => {
                info!(mechanism = %aggregator.table().name(), "aggregating chemistry");
                variables.extend(aggregator.aggregate(cmaq, output)?);

                let partitions = PartitionCalculator::default();
                partitions.calculate(output)?;
                variables.extend(partitions.partitions().iter().map(|p| p.name.clone()));
            }
            None => {
                info!("copying pre-lumped chemistry");
                variables.extend(copy_prelumped(cmaq, output, &chemistry_window)?);
            }
        }

        info!(variables = variables.len(), "conversion complete");
        Ok(RunSummary {
            window,
            time_window,
            layout,
            variables,
        })
    }

    /// Locate the run date in the WRF time coordinate
    ///
    /// The window must hold exactly one output day.
    pub fn time_window(&self, wrf: &impl DatasetReader) -> InmapResult<Range<usize>> {
        let times = wrf.read_text(TIMES)?;
        let window = find_time_window(&times, self.run_date, self.config.time_window)?;
        if window.len() != self.config.time_steps {
            return Err(InmapError::Config(format!(
                "Run date {} spans {} WRF time steps but the output holds {}",
                self.run_date,
                window.len(),
                self.config.time_steps
            )));
        }
        Ok(window)
    }
}

fn required_dimension(dataset: &impl DatasetReader, name: &str) -> InmapResult<usize> {
    dataset
        .dimension_len(name)
        .ok_or_else(|| InmapError::MissingDimension(name.to_string()))
}
