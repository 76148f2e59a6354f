//! Standard meteorological fields copied from WRF into the InMAP input file
//!
//! # Available Fields
//!
//! ## Three dimensional
//! - `U`, `V` - staggered horizontal wind components
//! - `W`, `PH`, `PHB` - vertically staggered vertical wind and geopotential
//! - `T`, `P`, `PB`, `QRAIN`, `QCLOUD`, `CLDFRA` - mass-point fields
//!
//! ## Surface
//! - `GLW`, `SWDOWN`, `HFX`, `UST`, `PBLH`, `LU_INDEX`

use crate::field::{Dimension, FieldSpec};

use Dimension::{
    BottomTop, BottomTopStag, SouthNorth, SouthNorthStag, Time, WestEast, WestEastStag,
};

const MASS_3D: &[Dimension] = &[Time, BottomTop, SouthNorth, WestEast];
const STAG_3D: &[Dimension] = &[Time, BottomTopStag, SouthNorth, WestEast];
const SURFACE: &[Dimension] = &[Time, SouthNorth, WestEast];

/// Meteorological fields in output order
pub const METEOROLOGY_FIELDS: &[(&str, &[Dimension])] = &[
    ("U", &[Time, BottomTop, SouthNorth, WestEastStag]),
    ("V", &[Time, BottomTop, SouthNorthStag, WestEast]),
    ("W", STAG_3D),
    ("PH", STAG_3D),
    ("PHB", STAG_3D),
    ("T", MASS_3D),
    ("P", MASS_3D),
    ("PB", MASS_3D),
    ("QRAIN", MASS_3D),
    ("QCLOUD", MASS_3D),
    ("CLDFRA", MASS_3D),
    ("GLW", SURFACE),
    ("SWDOWN", SURFACE),
    ("HFX", SURFACE),
    ("UST", SURFACE),
    ("PBLH", SURFACE),
    ("LU_INDEX", SURFACE),
];

/// Inverse density written from the MCIP `DENS` field
pub const INVERSE_DENSITY: &str = "ALT";

pub fn standard_meteorology_fields() -> Vec<FieldSpec> {
    METEOROLOGY_FIELDS
        .iter()
        .map(|(name, dims)| FieldSpec::new(name, dims))
        .collect()
}

pub fn meteorology_field(name: &str) -> Option<FieldSpec> {
    METEOROLOGY_FIELDS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(n, dims)| FieldSpec::new(n, dims))
}

/// Layout of the inverse density field
pub fn inverse_density_field() -> FieldSpec {
    FieldSpec::new(INVERSE_DENSITY, MASS_3D)
}
