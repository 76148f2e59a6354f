//! Inverse air density from MCIP
//!
//! MCIP `DENS` is already on the output grid, so it is only truncated to the output
//! time steps and inverted.

use crate::dataset::{DatasetReader, DatasetWriter, VariableAttributes};
use crate::errors::{InmapError, InmapResult};
use crate::met_variables::{inverse_density_field, INVERSE_DENSITY};
use crate::FloatValue;
use ndarray::{ArrayD, Axis, Slice};
use tracing::debug;

/// Name of the MCIP air density variable
pub const DENSITY: &str = "DENS";

/// Read `DENS` from MCIP and write its inverse as `ALT`
pub fn append_inverse_density<R, W>(mcip: &R, output: &mut W) -> InmapResult<()>
where
    R: DatasetReader,
    W: DatasetWriter,
{
    let spec = inverse_density_field();
    output.create_variable(
        INVERSE_DENSITY,
        &spec.dimension_names(),
        &VariableAttributes::new("Inverse MCIP DENS", "m**3/kg"),
    )?;
    let shape = output.variable_shape(INVERSE_DENSITY)?;

    let density = mcip.read(DENSITY)?;
    let alt = inverse_density(density, &shape)?;
    output.write(INVERSE_DENSITY, alt.view())?;
    output.sync()?;

    debug!(variable = INVERSE_DENSITY, "wrote inverse density");
    Ok(())
}

/// Invert the leading time steps of a density field
///
/// The truncated field must match `shape` exactly.
pub fn inverse_density(
    density: ArrayD<FloatValue>,
    shape: &[usize],
) -> InmapResult<ArrayD<FloatValue>> {
    let mismatch = |found: &[usize]| InmapError::ShapeMismatch {
        variable: INVERSE_DENSITY.to_string(),
        expected: shape.to_vec(),
        found: found.to_vec(),
    };
    if density.ndim() != shape.len() || shape.is_empty() || density.len_of(Axis(0)) < shape[0] {
        return Err(mismatch(density.shape()));
    }

    let mut density = density;
    density.slice_axis_inplace(Axis(0), Slice::from(0..shape[0]));
    if density.shape() != shape {
        return Err(mismatch(density.shape()));
    }
    Ok(density.mapv(|v| 1.0 / v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MemoryDataset;
    use crate::field::OutputLayout;
    use ndarray::IxDyn;

    #[test]
    fn truncates_and_inverts() {
        let dens = ArrayD::from_elem(IxDyn(&[25, 2, 3, 3]), 1.25);
        let alt = inverse_density(dens, &[24, 2, 3, 3]).unwrap();
        assert_eq!(alt.shape(), &[24, 2, 3, 3]);
        assert!(alt.iter().all(|v| (*v - 0.8).abs() < 1e-12));
    }

    #[test]
    fn mismatched_grid_is_an_error() {
        let dens = ArrayD::from_elem(IxDyn(&[24, 2, 4, 3]), 1.0);
        assert!(matches!(
            inverse_density(dens, &[24, 2, 3, 3]),
            Err(InmapError::ShapeMismatch { .. })
        ));

        let short = ArrayD::from_elem(IxDyn(&[10, 2, 3, 3]), 1.0);
        assert!(inverse_density(short, &[24, 2, 3, 3]).is_err());
    }

    #[test]
    fn appends_alt() {
        let mut mcip = MemoryDataset::new();
        mcip.insert_variable(
            DENSITY,
            &["TSTEP", "LAY", "ROW", "COL"],
            ArrayD::from_elem(IxDyn(&[25, 2, 3, 3]), 2.0),
        )
        .unwrap();

        let mut out = MemoryDataset::new();
        OutputLayout {
            time_steps: 24,
            layers: 2,
            rows: 3,
            columns: 3,
        }
        .define(&mut out)
        .unwrap();

        append_inverse_density(&mcip, &mut out).unwrap();
        let alt = out.read("ALT").unwrap();
        assert_eq!(alt[[23, 1, 2, 2]], 0.5);
        assert_eq!(
            out.variable_attribute("ALT", "description"),
            Some("Inverse MCIP DENS".into())
        );
        assert_eq!(out.sync_count(), 1);
    }
}
