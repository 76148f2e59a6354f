//! Overlap windows between two compatible grids
//!
//! [`align_grids`] computes, independently for rows and columns, which source cells
//! overlap the destination grid and where they land. Only same-resolution grids are
//! supported, so the windows on both sides have equal length.
//!
//! # Examples
//!
//! ```rust
//! use inmap_prep_core::alignment::align_grids;
//! use inmap_prep_core::grid::{GridDescriptor, Projection, ProjectionParameters};
//!
//! let params = ProjectionParameters::new(33.0, 45.0, -97.0, -97.0, 40.0);
//! let source = GridDescriptor::new("WRF", Projection::LambertConformal, params, (0.0, 0.0), (1.0, 1.0), 10, 10);
//! let destination = GridDescriptor::new("CMAQ", Projection::LambertConformal, params, (2.0, 2.0), (1.0, 1.0), 10, 10);
//!
//! let window = align_grids(&source, &destination).unwrap();
//! assert_eq!(window.columns.source, 2..10);
//! assert_eq!(window.columns.destination, 0..8);
//! ```

use crate::errors::{InmapError, InmapResult};
use crate::grid::GridDescriptor;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Cell offsets are snapped to this many decimals before rounding up
const OFFSET_DECIMALS: i32 = 6;

/// Matching index ranges along one axis
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisWindow {
    pub source: Range<usize>,
    pub destination: Range<usize>,
}

impl AxisWindow {
    /// Number of cells copied along this axis
    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Window for a staggered axis
    ///
    /// Staggered fields have one extra point, so both ends are extended by one.
    pub fn staggered(&self) -> AxisWindow {
        AxisWindow {
            source: self.source.start..self.source.end + 1,
            destination: self.destination.start..self.destination.end + 1,
        }
    }
}

/// Row and column windows between a source and destination grid
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlignmentWindow {
    pub rows: AxisWindow,
    pub columns: AxisWindow,
    /// Destination cell width divided by source cell width
    pub cell_ratio: f64,
}

/// Compute the overlap of `source` onto `destination`
///
/// The grids must pass [`GridDescriptor::check_compatible`]. Fails if they do not
/// overlap, if their origins are not a whole number of cells apart or if their cell
/// sizes differ.
pub fn align_grids(
    source: &GridDescriptor,
    destination: &GridDescriptor,
) -> InmapResult<AlignmentWindow> {
    source.check_compatible(destination)?;

    let cell_ratio = destination.cell_size.0 / source.cell_size.0;
    if (cell_ratio - 1.0).abs() > 1e-9 {
        return Err(InmapError::UnsupportedCellRatio(cell_ratio));
    }

    let columns = align_axis(
        "column",
        (source.origin.0, source.cell_size.0, source.columns),
        (
            destination.origin.0,
            destination.cell_size.0,
            destination.columns,
        ),
    )?;
    let rows = align_axis(
        "row",
        (source.origin.1, source.cell_size.1, source.rows),
        (destination.origin.1, destination.cell_size.1, destination.rows),
    )?;

    Ok(AlignmentWindow {
        rows,
        columns,
        cell_ratio,
    })
}

fn snap(value: f64) -> f64 {
    let scale = 10f64.powi(OFFSET_DECIMALS);
    (value * scale).round() / scale
}

/// Align one axis given `(origin, cell, count)` of each grid
fn align_axis(
    axis: &str,
    (src_origin, src_cell, src_count): (f64, f64, usize),
    (dst_origin, dst_cell, dst_count): (f64, f64, usize),
) -> InmapResult<AxisWindow> {
    let start_distance = dst_origin - src_origin;
    let (src_start, dst_start) = if start_distance < 0.0 {
        (0, (start_distance.abs() / dst_cell).round() as usize)
    } else {
        ((start_distance / src_cell).round() as usize, 0)
    };

    let src_extent = src_origin + src_count as f64 * src_cell;
    let dst_extent = dst_origin + dst_count as f64 * dst_cell;
    let end_distance = dst_extent - src_extent;
    let (src_end, dst_end) = if end_distance > 0.0 {
        let end = snap(dst_count as f64 - end_distance / dst_cell).ceil();
        (src_count, end.max(0.0) as usize)
    } else {
        let trimmed = (end_distance.abs() / src_cell).round() as usize;
        (src_count.saturating_sub(trimmed), dst_count)
    };

    if src_start >= src_end || dst_start >= dst_end {
        return Err(InmapError::NoOverlap {
            axis: axis.to_string(),
        });
    }
    let offset_cells = snap(start_distance / src_cell);
    if offset_cells.fract() != 0.0 || src_end - src_start != dst_end - dst_start {
        return Err(InmapError::NonIntegralOffset {
            axis: axis.to_string(),
            source_len: src_end - src_start,
            destination_len: dst_end - dst_start,
        });
    }

    Ok(AxisWindow {
        source: src_start..src_end,
        destination: dst_start..dst_end,
    })
}
