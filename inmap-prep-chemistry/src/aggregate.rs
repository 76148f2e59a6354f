//! Species aggregation
//!
//! Lumps CMAQ species into the InMAP chemistry variables defined by a
//! [`MechanismTable`].
//!
//! # What This Component Does
//!
//! 1. Truncates every species to the output time steps and gathers the output layers.
//! 2. Converts each species to the unit of its lumped variable:
//!    - gas, `ug/m3`: `ppmV * mw * 1000 * density / 28.9647`
//!    - gas, `ppbC`: `ppmV * mw * 1000`, where `mw` is a carbon number
//!    - aerosol: already `ug/m3`, copied as is
//! 3. Sums the converted species. Species missing from the chemistry file are
//!    skipped with a warning, so a lumped variable with no species present is zero.
//! 4. Writes the NO to NOx ratio `NO_NO2partitioning` when both NO and NO2 exist.
//!
//! # Inputs
//!
//! - CMAQ concentration file on the output grid (`TSTEP, LAY, ROW, COL`)
//! - MCIP `DENS` (kg/m3) on the same horizontal grid and the output layers
//!
//! # Outputs
//!
//! - One variable per lumped map, described by its `+`-joined species list
//! - `NO_NO2partitioning` (fraction)

use crate::mechanism::MechanismTable;
use crate::species::{OutputUnit, Phase, SpeciesMap};
use inmap_prep_core::dataset::{DatasetReader, DatasetWriter, VariableAttributes};
use inmap_prep_core::errors::{InmapError, InmapResult};
use inmap_prep_core::field::{Dimension, FieldSpec};
use inmap_prep_core::layers::LayerMap;
use inmap_prep_core::FloatValue;
use ndarray::{ArrayD, Axis, Slice, Zip};
use tracing::{info, warn};

/// Molecular weight of dry air in g/mol
pub const DRY_AIR_MOLECULAR_WEIGHT: FloatValue = 28.9647;

/// Name of the NO to NOx ratio field
pub const NO_NO2_RATIO: &str = "NO_NO2partitioning";

/// Lumped variables copied from a chemistry file that is already aggregated
pub const PRELUMPED_VARIABLES: &[&str] = &[
    "TotalPM25", "gS", "pS", "aVOC", "bVOC", "aSOA", "bSOA", "oh", "h2o2", "pNO", "gNO", "pNH",
    "gNH",
];

/// Layout of every chemistry output variable
pub fn chemistry_field(name: &str) -> FieldSpec {
    FieldSpec::new(
        name,
        &[
            Dimension::Time,
            Dimension::BottomTop,
            Dimension::SouthNorth,
            Dimension::WestEast,
        ],
    )
}

/// Create, write and flush one chemistry output variable
pub(crate) fn write_chemistry_field<W: DatasetWriter>(
    output: &mut W,
    name: &str,
    attributes: &VariableAttributes,
    values: &ArrayD<FloatValue>,
) -> InmapResult<()> {
    output.create_variable(name, &chemistry_field(name).dimension_names(), attributes)?;
    output.write(name, values.view())?;
    output.sync()?;
    info!(variable = %name, units = %attributes.units, "wrote chemistry field");
    Ok(())
}

/// Time and layer selection applied to IOAPI `TSTEP, LAY, ROW, COL` fields
#[derive(Clone, Debug, PartialEq)]
pub struct ChemistryWindow {
    time_steps: usize,
    layers: LayerMap,
}

impl ChemistryWindow {
    pub fn new(time_steps: usize, layers: LayerMap) -> Self {
        Self { time_steps, layers }
    }

    /// Number of layers a windowed field has
    pub fn output_layers(&self) -> usize {
        self.layers.len()
    }

    /// Keep the leading time steps of a field
    fn truncate(&self, name: &str, values: ArrayD<FloatValue>) -> InmapResult<ArrayD<FloatValue>> {
        if values.ndim() != 4 {
            return Err(InmapError::ShapeMismatch {
                variable: name.to_string(),
                expected: vec![self.time_steps, self.layers.len()],
                found: values.shape().to_vec(),
            });
        }
        let available = values.len_of(Axis(0));
        if available < self.time_steps {
            return Err(InmapError::TimeWindowOutOfRange {
                start: 0,
                end: self.time_steps,
                available,
            });
        }
        let mut values = values;
        values.slice_axis_inplace(Axis(0), Slice::from(0..self.time_steps));
        Ok(values)
    }

    /// Keep the leading time steps and the mapped layers of a species field
    pub fn apply(&self, name: &str, values: ArrayD<FloatValue>) -> InmapResult<ArrayD<FloatValue>> {
        let values = self.truncate(name, values)?;
        self.layers.gather(&values, 1, false)
    }

    /// Keep the leading time steps of a field already on the output layers
    ///
    /// MCIP density shares the output vertical grid, so no layer map applies.
    pub fn apply_output_layers(
        &self,
        name: &str,
        values: ArrayD<FloatValue>,
    ) -> InmapResult<ArrayD<FloatValue>> {
        let values = self.truncate(name, values)?;
        if values.len_of(Axis(1)) != self.layers.len() {
            let mut expected = values.shape().to_vec();
            expected[1] = self.layers.len();
            return Err(InmapError::ShapeMismatch {
                variable: name.to_string(),
                expected,
                found: values.shape().to_vec(),
            });
        }
        Ok(values)
    }
}

/// Lumps chemistry species into the variables of one mechanism
#[derive(Clone, Debug)]
pub struct SpeciesAggregator {
    table: MechanismTable,
    window: ChemistryWindow,
    density: ArrayD<FloatValue>,
}

impl SpeciesAggregator {
    /// Create an aggregator
    ///
    /// # Arguments
    ///
    /// * `table` - Mechanism table to aggregate with
    /// * `window` - Time and layer selection of the species
    /// * `density` - Raw MCIP air density on the output layers
    pub fn new(
        table: MechanismTable,
        window: ChemistryWindow,
        density: ArrayD<FloatValue>,
    ) -> InmapResult<Self> {
        let density = window.apply_output_layers("DENS", density)?;
        Ok(Self {
            table,
            window,
            density,
        })
    }

    pub fn table(&self) -> &MechanismTable {
        &self.table
    }

    /// Multiplier for one gas-phase species, excluding density
    fn gas_factor(&self, map: &SpeciesMap, species: &str) -> InmapResult<FloatValue> {
        self.table
            .molecular_weight(species)
            .map(|mw| mw * 1000.0)
            .ok_or_else(|| InmapError::MissingMolecularWeight {
                mechanism: self.table.name().to_string(),
                species: format!("{} (in {})", species, map.name),
            })
    }

    /// Read a species and apply the chemistry window
    fn read_species<R: DatasetReader>(
        &self,
        cmaq: &R,
        species: &str,
    ) -> InmapResult<ArrayD<FloatValue>> {
        let values = self.window.apply(species, cmaq.read(species)?)?;
        if values.shape() != self.density.shape() {
            return Err(InmapError::ShapeMismatch {
                variable: species.to_string(),
                expected: self.density.shape().to_vec(),
                found: values.shape().to_vec(),
            });
        }
        Ok(values)
    }

    /// Sum the converted species of one lumped map
    pub fn lump<R: DatasetReader>(
        &self,
        cmaq: &R,
        map: &SpeciesMap,
    ) -> InmapResult<ArrayD<FloatValue>> {
        let mut total = ArrayD::<FloatValue>::zeros(self.density.raw_dim());

        for species in &map.species {
            if !cmaq.has_variable(species) {
                warn!(
                    lumped = %map.name,
                    species = %species,
                    "Species not found in chemistry file; skipping"
                );
                continue;
            }
            let values = self.read_species(cmaq, species)?;

            match (map.phase, map.units) {
                (Phase::Aerosol, _) => total += &values,
                (Phase::Gas, OutputUnit::PartsPerBillionCarbon) => {
                    total.scaled_add(self.gas_factor(map, species)?, &values)
                }
                (Phase::Gas, OutputUnit::MicrogramsPerCubicMeter) => {
                    let factor = self.gas_factor(map, species)? / DRY_AIR_MOLECULAR_WEIGHT;
                    Zip::from(&mut total)
                        .and(&values)
                        .and(&self.density)
                        .for_each(|t, &v, &d| *t += v * factor * d);
                }
            }
        }
        Ok(total)
    }

    /// `NO / (NO + NO2)` from the raw species
    ///
    /// Returns `None` if either species is missing.
    pub fn no_no2_ratio<R: DatasetReader>(
        &self,
        cmaq: &R,
    ) -> InmapResult<Option<ArrayD<FloatValue>>> {
        for species in ["NO", "NO2"] {
            if !cmaq.has_variable(species) {
                warn!(
                    species = %species,
                    "Species not found in chemistry file; skipping {}", NO_NO2_RATIO
                );
                return Ok(None);
            }
        }
        let no = self.read_species(cmaq, "NO")?;
        let no2 = self.read_species(cmaq, "NO2")?;
        let nox = &no + &no2;
        Ok(Some(no / nox))
    }

    /// Write every lumped variable and the NO ratio to the output
    ///
    /// Returns the names of the variables written, in order.
    pub fn aggregate<R, W>(&self, cmaq: &R, output: &mut W) -> InmapResult<Vec<String>>
    where
        R: DatasetReader,
        W: DatasetWriter,
    {
        let mut written = Vec::new();
        for map in self.table.maps() {
            let values = self.lump(cmaq, map)?;
            let attributes = VariableAttributes::new(&map.description(), map.units.as_str());
            write_chemistry_field(output, &map.name, &attributes, &values)?;
            written.push(map.name.clone());
        }

        if let Some(ratio) = self.no_no2_ratio(cmaq)? {
            let attributes = VariableAttributes::new("NO/(NO+NO2)", "fraction");
            write_chemistry_field(output, NO_NO2_RATIO, &attributes, &ratio)?;
            written.push(NO_NO2_RATIO.to_string());
        }
        Ok(written)
    }
}

/// Copy already lumped variables from the chemistry file
///
/// Every variable in [`PRELUMPED_VARIABLES`] must be present.
pub fn copy_prelumped<R, W>(
    cmaq: &R,
    output: &mut W,
    window: &ChemistryWindow,
) -> InmapResult<Vec<String>>
where
    R: DatasetReader,
    W: DatasetWriter,
{
    let mut written = Vec::new();
    for name in PRELUMPED_VARIABLES {
        if !cmaq.has_variable(name) {
            return Err(InmapError::MissingVariable(name.to_string()));
        }
        let values = window.apply(name, cmaq.read(name)?)?;
        let attributes = VariableAttributes::from_ioapi(cmaq, name);
        write_chemistry_field(output, name, &attributes, &values)?;
        written.push(name.to_string());
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mechanism::Mechanism;
    use inmap_prep_core::dataset::MemoryDataset;
    use is_close::is_close;
    use ndarray::IxDyn;
    use std::collections::BTreeMap;

    const IOAPI_DIMS: [&str; 4] = ["TSTEP", "LAY", "ROW", "COL"];

    fn field(value: FloatValue) -> ArrayD<FloatValue> {
        ArrayD::from_elem(IxDyn(&[3, 2, 2, 2]), value)
    }

    fn window() -> ChemistryWindow {
        ChemistryWindow::new(2, LayerMap::identity(2))
    }

    fn custom_table(phase: Phase, units: OutputUnit) -> MechanismTable {
        let weights = BTreeMap::from([("A".to_string(), 10.0), ("B".to_string(), 20.0)]);
        let maps = vec![SpeciesMap::new("AB", &["A", "B"], phase, units)];
        MechanismTable::from_parts("custom", weights, maps).unwrap()
    }

    #[test]
    fn window_truncates_time_and_gathers_layers() {
        let values = ArrayD::from_shape_fn(IxDyn(&[4, 3, 1, 1]), |ix| (ix[0] * 10 + ix[1]) as f64);
        let w = ChemistryWindow::new(2, LayerMap::from_indices(vec![0, 2]).unwrap());
        let out = w.apply("X", values).unwrap();
        assert_eq!(out.shape(), &[2, 2, 1, 1]);
        assert_eq!(out[[1, 1, 0, 0]], 12.0);

        let short = ArrayD::zeros(IxDyn(&[1, 3, 1, 1]));
        assert!(matches!(
            w.apply("X", short),
            Err(InmapError::TimeWindowOutOfRange { .. })
        ));
    }

    #[test]
    fn density_keeps_output_layers() {
        let w = ChemistryWindow::new(2, LayerMap::from_indices(vec![0, 2]).unwrap());
        let density = ArrayD::from_shape_fn(IxDyn(&[3, 2, 1, 1]), |ix| (ix[0] * 10 + ix[1]) as f64);
        let out = w.apply_output_layers("DENS", density).unwrap();
        assert_eq!(out.shape(), &[2, 2, 1, 1]);
        assert_eq!(out[[1, 1, 0, 0]], 11.0);

        let on_source_layers = ArrayD::zeros(IxDyn(&[3, 3, 1, 1]));
        assert!(matches!(
            w.apply_output_layers("DENS", on_source_layers),
            Err(InmapError::ShapeMismatch { variable, .. }) if variable == "DENS"
        ));
    }

    #[test]
    fn finer_species_use_output_layer_density() {
        let table = custom_table(Phase::Gas, OutputUnit::MicrogramsPerCubicMeter);
        let w = ChemistryWindow::new(2, LayerMap::from_indices(vec![0, 2]).unwrap());
        let density = ArrayD::from_shape_fn(IxDyn(&[3, 2, 2, 2]), |ix| 1.0 + ix[1] as f64);
        let agg = SpeciesAggregator::new(table, w, density).unwrap();

        let mut cmaq = MemoryDataset::new();
        let a = ArrayD::from_shape_fn(IxDyn(&[3, 3, 2, 2]), |ix| 0.1 * (ix[1] + 1) as f64);
        cmaq.insert_variable("A", &IOAPI_DIMS, a).unwrap();

        let map = agg.table().map("AB").unwrap().clone();
        let lumped = agg.lump(&cmaq, &map).unwrap();
        assert_eq!(lumped.shape(), &[2, 2, 2, 2]);
        let factor = 10.0 * 1000.0 / DRY_AIR_MOLECULAR_WEIGHT;
        // Output layer 1 holds source layer 2 with the density of output layer 1
        assert!(is_close!(lumped[[0, 0, 0, 0]], 0.1 * factor * 1.0));
        assert!(is_close!(lumped[[1, 1, 1, 1]], 0.3 * factor * 2.0));
    }

    #[test]
    fn ppbc_factor_ignores_density() {
        let table = custom_table(Phase::Gas, OutputUnit::PartsPerBillionCarbon);
        let agg = SpeciesAggregator::new(table, window(), field(5.0)).unwrap();

        let mut cmaq = MemoryDataset::new();
        cmaq.insert_variable("A", &IOAPI_DIMS, field(0.5)).unwrap();
        cmaq.insert_variable("B", &IOAPI_DIMS, field(0.25)).unwrap();

        let map = agg.table().map("AB").unwrap().clone();
        let lumped = agg.lump(&cmaq, &map).unwrap();
        assert_eq!(lumped.shape(), &[2, 2, 2, 2]);
        assert!(is_close!(lumped[[0, 0, 0, 0]], 10.0 * 1000.0 * 0.5 + 20.0 * 1000.0 * 0.25));
    }

    #[test]
    fn aerosol_is_copied_as_is() {
        let table = custom_table(Phase::Aerosol, OutputUnit::MicrogramsPerCubicMeter);
        let agg = SpeciesAggregator::new(table, window(), field(2.0)).unwrap();

        let mut cmaq = MemoryDataset::new();
        let a = ArrayD::from_shape_fn(IxDyn(&[3, 2, 2, 2]), |ix| ix[3] as f64 + 0.5);
        cmaq.insert_variable("A", &IOAPI_DIMS, a).unwrap();

        let map = agg.table().map("AB").unwrap().clone();
        let lumped = agg.lump(&cmaq, &map).unwrap();
        assert_eq!(lumped[[1, 1, 0, 0]], 0.5);
        assert_eq!(lumped[[1, 1, 0, 1]], 1.5);
    }

    #[test]
    fn no_species_present_gives_zero() {
        let table = custom_table(Phase::Gas, OutputUnit::MicrogramsPerCubicMeter);
        let agg = SpeciesAggregator::new(table, window(), field(2.0)).unwrap();
        let cmaq = MemoryDataset::new();

        let map = agg.table().map("AB").unwrap().clone();
        let lumped = agg.lump(&cmaq, &map).unwrap();
        assert!(lumped.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn species_must_match_density_grid() {
        let table = custom_table(Phase::Aerosol, OutputUnit::MicrogramsPerCubicMeter);
        let agg = SpeciesAggregator::new(table, window(), field(2.0)).unwrap();

        let mut cmaq = MemoryDataset::new();
        cmaq.insert_variable("A", &IOAPI_DIMS, ArrayD::zeros(IxDyn(&[3, 2, 3, 2])))
            .unwrap();
        let map = agg.table().map("AB").unwrap().clone();
        assert!(matches!(
            agg.lump(&cmaq, &map),
            Err(InmapError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn no_ratio_needs_both_species() {
        let table = MechanismTable::new(Mechanism::Cb6).unwrap();
        let agg = SpeciesAggregator::new(table, window(), field(1.0)).unwrap();

        let mut cmaq = MemoryDataset::new();
        cmaq.insert_variable("NO", &IOAPI_DIMS, field(1.0)).unwrap();
        assert!(agg.no_no2_ratio(&cmaq).unwrap().is_none());

        cmaq.insert_variable("NO2", &IOAPI_DIMS, field(3.0)).unwrap();
        let ratio = agg.no_no2_ratio(&cmaq).unwrap().unwrap();
        assert!(ratio.iter().all(|v| is_close!(*v, 0.25)));
    }

    #[test]
    fn zero_nox_gives_nan() {
        let table = MechanismTable::new(Mechanism::Cb6).unwrap();
        let agg = SpeciesAggregator::new(table, window(), field(1.0)).unwrap();

        let mut cmaq = MemoryDataset::new();
        cmaq.insert_variable("NO", &IOAPI_DIMS, field(0.0)).unwrap();
        cmaq.insert_variable("NO2", &IOAPI_DIMS, field(0.0)).unwrap();
        let ratio = agg.no_no2_ratio(&cmaq).unwrap().unwrap();
        assert!(ratio.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn prelumped_copy_requires_every_variable() {
        let mut cmaq = MemoryDataset::new();
        for name in PRELUMPED_VARIABLES.iter().skip(1) {
            cmaq.insert_variable(name, &IOAPI_DIMS, field(1.0)).unwrap();
        }
        let mut out = MemoryDataset::new();
        for (name, len) in [("Time", 2), ("bottom_top", 2), ("south_north", 2), ("west_east", 2)] {
            out.create_dimension(name, len).unwrap();
        }

        assert!(matches!(
            copy_prelumped(&cmaq, &mut out, &window()),
            Err(InmapError::MissingVariable(name)) if name == "TotalPM25"
        ));

        cmaq.insert_variable("TotalPM25", &IOAPI_DIMS, field(7.0))
            .unwrap();
        cmaq.insert_variable_attribute("TotalPM25", "var_desc", "total PM2.5  ".into())
            .unwrap();
        cmaq.insert_variable_attribute("TotalPM25", "units", "ug/m3 ".into())
            .unwrap();

        let mut out = MemoryDataset::new();
        for (name, len) in [("Time", 2), ("bottom_top", 2), ("south_north", 2), ("west_east", 2)] {
            out.create_dimension(name, len).unwrap();
        }
        let written = copy_prelumped(&cmaq, &mut out, &window()).unwrap();
        assert_eq!(written.len(), PRELUMPED_VARIABLES.len());
        assert_eq!(out.read("TotalPM25").unwrap()[[1, 1, 1, 1]], 7.0);
        assert_eq!(
            out.variable_attribute("TotalPM25", "description"),
            Some("total PM2.5".into())
        );
        assert_eq!(out.sync_count(), PRELUMPED_VARIABLES.len());
    }
}
