//! Rectilinear grid definitions for gridded model domains
//!
//! This module provides [`GridDescriptor`], an immutable description of a projected
//! rectilinear grid in the IOAPI convention, and the compatibility predicate used
//! before two grids can be aligned.
//!
//! A grid is defined by:
//!
//! - [`Projection`]: the map projection family (geographic, Lambert conformal conic,
//!   polar stereographic)
//! - [`ProjectionParameters`]: the IOAPI `P_ALP`, `P_BET`, `P_GAM`, `XCENT` and `YCENT` values
//! - The projected origin of the south-west corner of cell `[0, 0]`
//! - Cell width/height and the column/row counts
//!
//! # Examples
//!
//! ```rust
//! use inmap_prep_core::grid::{GridDescriptor, Projection, ProjectionParameters};
//!
//! let params = ProjectionParameters::new(33.0, 45.0, -97.0, -97.0, 40.0);
//! let source = GridDescriptor::new("WRF", Projection::LambertConformal, params, (0.0, 0.0), (1000.0, 1000.0), 10, 10);
//! let destination = GridDescriptor::new("CMAQ", Projection::LambertConformal, params, (-2000.0, -2000.0), (1000.0, 1000.0), 14, 14);
//!
//! assert!(source.check_compatible(&destination).is_ok());
//! assert_eq!(destination.extent(), (12000.0, 12000.0));
//! ```

use crate::dataset::DatasetReader;
use crate::errors::{InmapError, InmapResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of decimal places used when comparing projection parameters and cell sizes
const COMPARISON_DECIMALS: i32 = 4;

/// Round a value to the precision used for grid comparisons
pub fn round_to_precision(value: f64) -> f64 {
    let scale = 10f64.powi(COMPARISON_DECIMALS);
    (value * scale).round() / scale
}

/// Map projection family of a grid
///
/// The discriminants match the IOAPI `GDTYP` codes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Projection {
    /// Latitude/longitude grid (`GDTYP = 1`)
    Geographic = 1,
    /// Lambert conformal conic (`GDTYP = 2`)
    LambertConformal = 2,
    /// Polar stereographic (`GDTYP = 6`)
    PolarStereographic = 6,
}

impl Projection {
    /// Resolve an IOAPI `GDTYP` code
    pub fn from_ioapi_code(code: i64) -> InmapResult<Self> {
        match code {
            1 => Ok(Projection::Geographic),
            2 => Ok(Projection::LambertConformal),
            6 => Ok(Projection::PolarStereographic),
            other => Err(InmapError::UnknownProjection(other)),
        }
    }

    /// Resolve a WRF `MAP_PROJ` global attribute
    pub fn from_wrf_map_proj(code: i64) -> InmapResult<Self> {
        match code {
            1 => Ok(Projection::LambertConformal),
            2 => Ok(Projection::PolarStereographic),
            6 => Ok(Projection::Geographic),
            other => Err(InmapError::UnknownProjection(other)),
        }
    }

    /// IOAPI `GDTYP` code for this projection
    pub fn ioapi_code(&self) -> i64 {
        *self as i64
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projection::Geographic => write!(f, "Geographic"),
            Projection::LambertConformal => write!(f, "LambertConformal"),
            Projection::PolarStereographic => write!(f, "PolarStereographic"),
        }
    }
}

/// Projection parameters in degrees, named after their IOAPI attributes
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectionParameters {
    /// First true latitude (`P_ALP`)
    pub alpha: f64,
    /// Second true latitude (`P_BET`)
    pub beta: f64,
    /// Central meridian (`P_GAM`)
    pub gamma: f64,
    /// Longitude of the projection centre (`XCENT`)
    pub x_center: f64,
    /// Latitude of the projection centre (`YCENT`)
    pub y_center: f64,
}

impl ProjectionParameters {
    pub fn new(alpha: f64, beta: f64, gamma: f64, x_center: f64, y_center: f64) -> Self {
        Self {
            alpha,
            beta,
            gamma,
            x_center,
            y_center,
        }
    }

    /// Named values in IOAPI attribute order
    fn named(&self) -> [(&'static str, f64); 5] {
        [
            ("P_ALP", self.alpha),
            ("P_BET", self.beta),
            ("P_GAM", self.gamma),
            ("XCENT", self.x_center),
            ("YCENT", self.y_center),
        ]
    }
}

/// Immutable description of a projected rectilinear grid
///
/// The origin is the projected position (metres) of the south-west corner of
/// cell `[0, 0]`. Rows increase northwards and columns increase eastwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridDescriptor {
    /// Grid name as it appears in the grid registry
    pub name: String,
    pub projection: Projection,
    pub parameters: ProjectionParameters,
    /// South-west corner of the grid (`XORIG`, `YORIG`)
    pub origin: (f64, f64),
    /// Cell width and height (`XCELL`, `YCELL`)
    pub cell_size: (f64, f64),
    /// Number of columns (`NCOLS`)
    pub columns: usize,
    /// Number of rows (`NROWS`)
    pub rows: usize,
    /// Boundary thickness in cells (`NTHIK`), informational only
    pub boundary_thickness: usize,
}

impl GridDescriptor {
    pub fn new(
        name: &str,
        projection: Projection,
        parameters: ProjectionParameters,
        origin: (f64, f64),
        cell_size: (f64, f64),
        columns: usize,
        rows: usize,
    ) -> Self {
        Self {
            name: name.to_string(),
            projection,
            parameters,
            origin,
            cell_size,
            columns,
            rows,
            boundary_thickness: 1,
        }
    }

    /// Set the informational boundary thickness
    pub fn with_boundary_thickness(mut self, boundary_thickness: usize) -> Self {
        self.boundary_thickness = boundary_thickness;
        self
    }

    /// Build the WRF domain grid from the global attributes of a WRF output file
    ///
    /// `sw_centroid` is the projected position of the centre of the south-west cell
    /// (`XLONG[0,0,0]`, `XLAT[0,0,0]` run through the grid's projection). The origin
    /// is snapped to the nearest whole cell so that it can be compared against
    /// registry grids.
    pub fn from_wrf_attributes(
        dataset: &impl DatasetReader,
        sw_centroid: (f64, f64),
    ) -> InmapResult<Self> {
        let float_attribute = |name: &str| -> InmapResult<f64> {
            dataset
                .global_attribute(name)
                .and_then(|v| v.as_f64())
                .map(round_to_precision)
                .ok_or_else(|| InmapError::Error(format!("Missing WRF global attribute {}", name)))
        };

        let truelat1 = float_attribute("TRUELAT1")?;
        let truelat2 = float_attribute("TRUELAT2")?;
        let stand_lon = float_attribute("STAND_LON")?;
        let moad_cen_lat = float_attribute("MOAD_CEN_LAT")?;
        let dx = float_attribute("DX")?;
        let dy = float_attribute("DY")?;
        let map_proj = dataset
            .global_attribute("MAP_PROJ")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| InmapError::Error("Missing WRF global attribute MAP_PROJ".into()))?;

        let columns = dataset
            .dimension_len("west_east")
            .ok_or_else(|| InmapError::MissingDimension("west_east".into()))?;
        let rows = dataset
            .dimension_len("south_north")
            .ok_or_else(|| InmapError::MissingDimension("south_north".into()))?;

        let (x, y) = sw_centroid;
        let origin = (
            ((x - 0.5 * dx) / dx).round() * dx,
            ((y - 0.5 * dy) / dy).round() * dy,
        );

        Ok(Self::new(
            "WRF",
            Projection::from_wrf_map_proj(map_proj)?,
            ProjectionParameters::new(truelat1, truelat2, stand_lon, stand_lon, moad_cen_lat),
            origin,
            (dx, dy),
            columns,
            rows,
        ))
    }

    /// Projected position of the north-east corner of the grid
    pub fn extent(&self) -> (f64, f64) {
        (
            self.origin.0 + self.columns as f64 * self.cell_size.0,
            self.origin.1 + self.rows as f64 * self.cell_size.1,
        )
    }

    /// Check that another grid shares this grid's projection and cell size
    ///
    /// Values are compared after rounding to four decimal places. Any mismatch is a
    /// configuration error; grids are never adjusted to match.
    pub fn check_compatible(&self, other: &GridDescriptor) -> InmapResult<()> {
        if self.projection != other.projection {
            return Err(self.projection_mismatch(
                other,
                "GDTYP",
                self.projection.to_string(),
                other.projection.to_string(),
            ));
        }

        for ((attribute, mine), (_, theirs)) in self
            .parameters
            .named()
            .into_iter()
            .zip(other.parameters.named())
        {
            if round_to_precision(mine) != round_to_precision(theirs) {
                return Err(self.projection_mismatch(
                    other,
                    attribute,
                    mine.to_string(),
                    theirs.to_string(),
                ));
            }
        }

        if round_to_precision(self.cell_size.0) != round_to_precision(other.cell_size.0)
            || round_to_precision(self.cell_size.1) != round_to_precision(other.cell_size.1)
        {
            return Err(InmapError::CellSizeMismatch {
                source_grid: self.name.clone(),
                destination_grid: other.name.clone(),
                source_cell: self.cell_size,
                destination_cell: other.cell_size,
            });
        }
        Ok(())
    }

    fn projection_mismatch(
        &self,
        other: &GridDescriptor,
        attribute: &str,
        source_value: String,
        destination_value: String,
    ) -> InmapError {
        InmapError::ProjectionMismatch {
            source_grid: self.name.clone(),
            destination_grid: other.name.clone(),
            attribute: attribute.to_string(),
            source_value,
            destination_value,
        }
    }

    /// proj4 definition string for this grid's projection
    ///
    /// Only formats the parameters; no projection maths is performed.
    pub fn proj4(&self) -> String {
        let p = &self.parameters;
        match self.projection {
            Projection::Geographic => "+proj=latlon".to_string(),
            Projection::LambertConformal => format!(
                "+proj=lcc +lat_1={} +lat_2={} +lon_0={} +lat_0={} +a=6370000 +b=6370000 +units=m +no_defs",
                p.alpha, p.beta, p.x_center, p.y_center
            ),
            Projection::PolarStereographic => format!(
                "+proj=stere +lat_ts={} +lat_0={} +lon_0={}",
                p.beta, p.y_center, p.x_center
            ),
        }
    }
}
