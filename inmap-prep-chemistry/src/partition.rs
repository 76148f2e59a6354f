//! Gas/particle partition fractions
//!
//! Partitions are computed from lumped variables that have already been written
//! to the output, so this runs strictly after aggregation.
//!
//! # Outputs
//!
//! - `bOrgPartitioning` = bSOA / (bSOA + bVOC)
//! - `aOrgPartitioning` = aSOA / (aSOA + aVOC)
//! - `NHPartitioning` = pNH / (gNH + pNH)
//! - `NOPartitioning` = pNO / (gNO + pNO + gN)
//! - `SPartitioning` = pS / (gS + pS)
//!
//! Cells where the denominator is zero produce NaN or infinity.

use crate::aggregate::write_chemistry_field;
use inmap_prep_core::dataset::{DatasetReader, DatasetWriter, VariableAttributes};
use inmap_prep_core::errors::{InmapError, InmapResult};
use inmap_prep_core::FloatValue;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

/// A fraction `numerator / sum(denominators)` of lumped variables
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSpec {
    pub name: String,
    pub numerator: String,
    pub denominators: Vec<String>,
}

impl PartitionSpec {
    pub fn new(name: &str, numerator: &str, denominators: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            numerator: numerator.to_string(),
            denominators: denominators.iter().map(|d| d.to_string()).collect(),
        }
    }

    pub fn description(&self) -> String {
        format!("{}/({})", self.numerator, self.denominators.join("+"))
    }

    /// Evaluate the fraction from fields in `dataset`
    pub fn compute<R: DatasetReader>(&self, dataset: &R) -> InmapResult<ArrayD<FloatValue>> {
        let numerator = dataset.read(&self.numerator)?;
        let mut denominator = ArrayD::<FloatValue>::zeros(numerator.raw_dim());
        for name in &self.denominators {
            let term = dataset.read(name)?;
            if term.shape() != numerator.shape() {
                return Err(InmapError::ShapeMismatch {
                    variable: name.clone(),
                    expected: numerator.shape().to_vec(),
                    found: term.shape().to_vec(),
                });
            }
            denominator += &term;
        }
        Ok(numerator / denominator)
    }
}

/// The partitions written for every InMAP input file
pub fn standard_partitions() -> Vec<PartitionSpec> {
    vec![
        PartitionSpec::new("bOrgPartitioning", "bSOA", &["bSOA", "bVOC"]),
        PartitionSpec::new("aOrgPartitioning", "aSOA", &["aSOA", "aVOC"]),
        PartitionSpec::new("NHPartitioning", "pNH", &["gNH", "pNH"]),
        PartitionSpec::new("NOPartitioning", "pNO", &["gNO", "pNO", "gN"]),
        PartitionSpec::new("SPartitioning", "pS", &["gS", "pS"]),
    ]
}

/// Computes partition fractions in the output dataset
#[derive(Clone, Debug)]
pub struct PartitionCalculator {
    partitions: Vec<PartitionSpec>,
}

impl Default for PartitionCalculator {
    fn default() -> Self {
        Self::new(standard_partitions())
    }
}

impl PartitionCalculator {
    pub fn new(partitions: Vec<PartitionSpec>) -> Self {
        Self { partitions }
    }

    pub fn partitions(&self) -> &[PartitionSpec] {
        &self.partitions
    }

    /// Compute and write every partition
    ///
    /// A lumped variable missing from `output` is an error.
    pub fn calculate<D>(&self, output: &mut D) -> InmapResult<()>
    where
        D: DatasetReader + DatasetWriter,
    {
        for partition in &self.partitions {
            let values = partition.compute(&*output)?;
            let attributes = VariableAttributes::new(&partition.description(), "fraction");
            write_chemistry_field(output, &partition.name, &attributes, &values)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inmap_prep_core::dataset::MemoryDataset;
    use ndarray::IxDyn;

    const DIMS: [&str; 4] = ["Time", "bottom_top", "south_north", "west_east"];

    fn lumped(values: &[(&str, f64)]) -> MemoryDataset {
        let mut ds = MemoryDataset::new();
        for (name, value) in values {
            ds.insert_variable(name, &DIMS, ArrayD::from_elem(IxDyn(&[1, 1, 2, 2]), *value))
                .unwrap();
        }
        ds
    }

    #[test]
    fn descriptions() {
        let specs = standard_partitions();
        assert_eq!(specs[3].description(), "pNO/(gNO+pNO+gN)");
        assert_eq!(specs[2].description(), "pNH/(gNH+pNH)");
    }

    #[test]
    fn fraction_of_sum() {
        let ds = lumped(&[("pNO", 1.0), ("gNO", 2.0), ("gN", 1.0)]);
        let spec = PartitionSpec::new("NOPartitioning", "pNO", &["gNO", "pNO", "gN"]);
        let fraction = spec.compute(&ds).unwrap();
        assert!(fraction.iter().all(|v| *v == 0.25));
    }

    #[test]
    fn zero_denominator_is_nan() {
        let ds = lumped(&[("pS", 0.0), ("gS", 0.0)]);
        let spec = PartitionSpec::new("SPartitioning", "pS", &["gS", "pS"]);
        assert!(spec.compute(&ds).unwrap().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn missing_lumped_field_is_an_error() {
        let mut ds = lumped(&[("pS", 1.0), ("gS", 1.0)]);
        assert!(matches!(
            PartitionCalculator::default().calculate(&mut ds),
            Err(InmapError::MissingVariable(_))
        ));
    }

    #[test]
    fn writes_every_partition() {
        let mut ds = lumped(&[
            ("bSOA", 1.0),
            ("bVOC", 3.0),
            ("aSOA", 2.0),
            ("aVOC", 2.0),
            ("pNH", 1.0),
            ("gNH", 1.0),
            ("pNO", 1.0),
            ("gNO", 1.0),
            ("gN", 2.0),
            ("pS", 3.0),
            ("gS", 1.0),
        ]);
        PartitionCalculator::default().calculate(&mut ds).unwrap();

        let expected = [
            ("bOrgPartitioning", 0.25),
            ("aOrgPartitioning", 0.5),
            ("NHPartitioning", 0.5),
            ("NOPartitioning", 0.25),
            ("SPartitioning", 0.75),
        ];
        for (name, value) in expected {
            let field = ds.read(name).unwrap();
            assert!(field.iter().all(|v| *v == value), "{}", name);
            assert_eq!(ds.variable_attribute(name, "units"), Some("fraction".into()));
        }
        assert_eq!(ds.sync_count(), 5);
    }
}
