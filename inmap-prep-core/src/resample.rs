//! Windowed copy of WRF fields onto the output grid
//!
//! [`FieldResampler`] applies, in order, the time window, the vertical layer map and
//! the spatial [`AlignmentWindow`] to a source field. Destination cells outside the
//! overlap stay zero.

use crate::alignment::{AlignmentWindow, AxisWindow};
use crate::dataset::{DatasetReader, DatasetWriter, VariableAttributes};
use crate::errors::{InmapError, InmapResult};
use crate::field::{AxisKind, FieldSpec};
use crate::layers::LayerMap;
use crate::FloatValue;
use ndarray::{ArrayD, Axis, IxDyn, Slice};
use std::ops::Range;
use tracing::debug;

/// Copies source fields into the output through an alignment window
#[derive(Debug, Clone)]
pub struct FieldResampler<'a> {
    window: &'a AlignmentWindow,
    layers: &'a LayerMap,
    time_window: Range<usize>,
}

impl<'a> FieldResampler<'a> {
    pub fn new(window: &'a AlignmentWindow, layers: &'a LayerMap, time_window: Range<usize>) -> Self {
        Self {
            window,
            layers,
            time_window,
        }
    }

    /// Resample one field in memory
    ///
    /// # Arguments
    ///
    /// * `spec` - Layout shared by the source and output field
    /// * `source` - Full source values
    /// * `output_shape` - Shape of the output variable
    pub fn resample(
        &self,
        spec: &FieldSpec,
        source: ArrayD<FloatValue>,
        output_shape: &[usize],
    ) -> InmapResult<ArrayD<FloatValue>> {
        if source.ndim() != spec.dimensions.len() || output_shape.len() != spec.dimensions.len() {
            return Err(InmapError::ShapeMismatch {
                variable: spec.name.clone(),
                expected: output_shape.to_vec(),
                found: source.shape().to_vec(),
            });
        }

        let mut values = source;
        if let Some((axis, _)) = spec.axis(AxisKind::Time) {
            let available = values.len_of(Axis(axis));
            if self.time_window.end > available {
                return Err(InmapError::TimeWindowOutOfRange {
                    start: self.time_window.start,
                    end: self.time_window.end,
                    available,
                });
            }
            values.slice_axis_inplace(Axis(axis), Slice::from(self.time_window.clone()));
        }

        if let Some((axis, dimension)) = spec.axis(AxisKind::Vertical) {
            values = self
                .layers
                .gather(&values, axis, dimension.is_staggered())?;
        }

        let row = spec
            .axis(AxisKind::Row)
            .map(|(axis, d)| (axis, self.axis_window(&self.window.rows, d.is_staggered())));
        let column = spec
            .axis(AxisKind::Column)
            .map(|(axis, d)| (axis, self.axis_window(&self.window.columns, d.is_staggered())));

        // Every non-spatial axis must already match the output
        let mismatch = || InmapError::ShapeMismatch {
            variable: spec.name.clone(),
            expected: output_shape.to_vec(),
            found: values.shape().to_vec(),
        };
        for (axis, (&have, &want)) in values.shape().iter().zip(output_shape).enumerate() {
            let spatial = [row.as_ref(), column.as_ref()]
                .into_iter()
                .flatten()
                .find(|(a, _)| *a == axis);
            match spatial {
                Some((_, w)) => {
                    if w.source.len() != w.destination.len()
                        || w.source.end > have
                        || w.destination.end > want
                    {
                        return Err(mismatch());
                    }
                }
                None => {
                    if have != want {
                        return Err(mismatch());
                    }
                }
            }
        }

        let mut output = ArrayD::zeros(IxDyn(output_shape));
        let mut src = values.view();
        let mut dst = output.view_mut();
        for (axis, w) in [row, column].into_iter().flatten() {
            src.slice_axis_inplace(Axis(axis), Slice::from(w.source));
            dst.slice_axis_inplace(Axis(axis), Slice::from(w.destination));
        }
        dst.assign(&src);
        Ok(output)
    }

    fn axis_window(&self, window: &AxisWindow, staggered: bool) -> AxisWindow {
        if staggered {
            window.staggered()
        } else {
            window.clone()
        }
    }

    /// Read, resample and write one WRF field, then flush the output
    ///
    /// The output variable is created with the WRF variable's attributes.
    pub fn resample_field<R, W>(&self, input: &R, output: &mut W, spec: &FieldSpec) -> InmapResult<()>
    where
        R: DatasetReader,
        W: DatasetWriter,
    {
        if !input.has_variable(&spec.name) {
            return Err(InmapError::MissingVariable(spec.name.clone()));
        }
        let source = input.read(&spec.name)?;
        let attributes = VariableAttributes::from_wrf(input, &spec.name);

        output.create_variable(&spec.name, &spec.dimension_names(), &attributes)?;
        let shape = output.variable_shape(&spec.name)?;
        let values = self.resample(spec, source, &shape)?;
        output.write(&spec.name, values.view())?;
        output.sync()?;

        debug!(variable = %spec.name, shape = ?shape, "resampled field");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{AttributeValue, MemoryDataset};
    use crate::field::{Dimension, OutputLayout};
    use ndarray::Array;

    use Dimension::*;

    fn window(source: Range<usize>, destination: Range<usize>) -> AlignmentWindow {
        let axis = AxisWindow {
            source,
            destination,
        };
        AlignmentWindow {
            rows: axis.clone(),
            columns: axis,
            cell_ratio: 1.0,
        }
    }

    #[test]
    fn ones_land_inside_the_window() {
        let w = window(0..10, 2..12);
        let layers = LayerMap::identity(1);
        let resampler = FieldResampler::new(&w, &layers, 0..1);
        let spec = FieldSpec::new("PBLH", &[Time, SouthNorth, WestEast]);

        let source = ArrayD::ones(IxDyn(&[1, 10, 10]));
        let out = resampler.resample(&spec, source, &[1, 14, 14]).unwrap();

        for r in 0..14 {
            for c in 0..14 {
                let inside = (2..12).contains(&r) && (2..12).contains(&c);
                assert_eq!(out[[0, r, c]], if inside { 1.0 } else { 0.0 }, "({}, {})", r, c);
            }
        }
    }

    #[test]
    fn staggered_axis_copies_one_more_point() {
        let w = window(0..10, 2..12);
        let layers = LayerMap::identity(2);
        let resampler = FieldResampler::new(&w, &layers, 0..1);
        let spec = FieldSpec::new("U", &[Time, BottomTop, SouthNorth, WestEastStag]);

        let source = Array::from_shape_fn(IxDyn(&[1, 2, 10, 11]), |ix| ix[3] as f64 + 1.0);
        let out = resampler.resample(&spec, source, &[1, 2, 14, 15]).unwrap();

        assert_eq!(out[[0, 0, 5, 2]], 1.0);
        assert_eq!(out[[0, 1, 5, 12]], 11.0);
        assert_eq!(out[[0, 1, 5, 13]], 0.0);
        assert_eq!(out[[0, 1, 5, 1]], 0.0);
    }

    #[test]
    fn time_and_layers_are_selected_first() {
        let w = window(0..4, 0..4);
        let layers = LayerMap::from_indices(vec![0, 3]).unwrap();
        let resampler = FieldResampler::new(&w, &layers, 2..4);
        let spec = FieldSpec::new("W", &[Time, BottomTopStag, SouthNorth, WestEast]);

        // Value encodes time * 10 + level
        let source = Array::from_shape_fn(IxDyn(&[6, 6, 4, 4]), |ix| (ix[0] * 10 + ix[1]) as f64);
        let out = resampler.resample(&spec, source, &[2, 3, 4, 4]).unwrap();

        assert_eq!(out[[0, 0, 1, 1]], 20.0);
        assert_eq!(out[[0, 1, 1, 1]], 21.0);
        assert_eq!(out[[1, 2, 3, 3]], 34.0);
    }

    #[test]
    fn short_time_axis_is_an_error() {
        let w = window(0..4, 0..4);
        let layers = LayerMap::identity(1);
        let resampler = FieldResampler::new(&w, &layers, 0..24);
        let spec = FieldSpec::new("HFX", &[Time, SouthNorth, WestEast]);

        let res = resampler.resample(&spec, ArrayD::zeros(IxDyn(&[12, 4, 4])), &[24, 4, 4]);
        assert!(matches!(
            res,
            Err(InmapError::TimeWindowOutOfRange { available: 12, .. })
        ));
    }

    #[test]
    fn window_larger_than_output_is_an_error() {
        let w = window(0..10, 2..12);
        let layers = LayerMap::identity(1);
        let resampler = FieldResampler::new(&w, &layers, 0..1);
        let spec = FieldSpec::new("HFX", &[Time, SouthNorth, WestEast]);

        let res = resampler.resample(&spec, ArrayD::zeros(IxDyn(&[1, 10, 10])), &[1, 10, 10]);
        assert!(matches!(res, Err(InmapError::ShapeMismatch { .. })));
    }

    #[test]
    fn unequal_window_ranges_are_an_error() {
        let w = AlignmentWindow {
            rows: AxisWindow {
                source: 0..4,
                destination: 0..4,
            },
            columns: AxisWindow {
                source: 0..3,
                destination: 0..4,
            },
            cell_ratio: 1.0,
        };
        let layers = LayerMap::identity(1);
        let resampler = FieldResampler::new(&w, &layers, 0..1);
        let spec = FieldSpec::new("HFX", &[Time, SouthNorth, WestEast]);

        let res = resampler.resample(&spec, ArrayD::zeros(IxDyn(&[1, 4, 4])), &[1, 4, 4]);
        assert!(matches!(res, Err(InmapError::ShapeMismatch { .. })));
    }

    #[test]
    fn identity_layers_leave_fields_unchanged() {
        let w = window(0..4, 0..4);
        let layers = LayerMap::identity(3);
        let resampler = FieldResampler::new(&w, &layers, 0..2);

        let mass = FieldSpec::new("T", &[Time, BottomTop, SouthNorth, WestEast]);
        let source = Array::from_shape_fn(IxDyn(&[2, 3, 4, 4]), |ix| {
            (ix[0] * 1000 + ix[1] * 100 + ix[2] * 10 + ix[3]) as f64
        });
        let out = resampler.resample(&mass, source.clone(), &[2, 3, 4, 4]).unwrap();
        assert_eq!(out, source);

        let stag = FieldSpec::new("PH", &[Time, BottomTopStag, SouthNorth, WestEast]);
        let source = Array::from_shape_fn(IxDyn(&[2, 4, 4, 4]), |ix| {
            (ix[0] * 1000 + ix[1] * 100 + ix[2] * 10 + ix[3]) as f64
        });
        let out = resampler.resample(&stag, source.clone(), &[2, 4, 4, 4]).unwrap();
        assert_eq!(out, source);
    }

    #[test]
    fn resample_field_writes_and_syncs() {
        let mut wrf = MemoryDataset::new();
        wrf.insert_variable(
            "T",
            &["Time", "bottom_top", "south_north", "west_east"],
            ArrayD::from_elem(IxDyn(&[3, 2, 4, 4]), 290.0),
        )
        .unwrap();
        wrf.insert_variable_attribute("T", "units", AttributeValue::from("K"))
            .unwrap();
        wrf.insert_variable_attribute("T", "stagger", AttributeValue::from(""))
            .unwrap();

        let w = window(0..4, 1..5);
        let layers = LayerMap::identity(2);
        let resampler = FieldResampler::new(&w, &layers, 1..3);

        let mut out = MemoryDataset::new();
        OutputLayout {
            time_steps: 2,
            layers: 2,
            rows: 5,
            columns: 5,
        }
        .define(&mut out)
        .unwrap();

        let spec = FieldSpec::new("T", &[Time, BottomTop, SouthNorth, WestEast]);
        resampler.resample_field(&wrf, &mut out, &spec).unwrap();

        let t = out.read("T").unwrap();
        assert_eq!(t.shape(), &[2, 2, 5, 5]);
        assert_eq!(t[[1, 1, 4, 4]], 290.0);
        assert_eq!(t[[1, 1, 0, 4]], 0.0);
        assert_eq!(out.variable_attribute("T", "units"), Some("K".into()));
        assert_eq!(out.sync_count(), 1);

        let missing = FieldSpec::new("QRAIN", &[Time, BottomTop, SouthNorth, WestEast]);
        assert!(matches!(
            resampler.resample_field(&wrf, &mut out, &missing),
            Err(InmapError::MissingVariable(_))
        ));
    }
}
