//! Output dimensions and field layouts
//!
//! Every output variable uses the WRF dimension names. Staggered dimensions have one
//! more element than their mass-point counterpart.

use crate::dataset::DatasetWriter;
use crate::errors::{InmapError, InmapResult};
use crate::grid::GridDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Time,
    BottomTop,
    BottomTopStag,
    SouthNorth,
    SouthNorthStag,
    WestEast,
    WestEastStag,
}

/// Role of a dimension within a field
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AxisKind {
    Time,
    Vertical,
    Row,
    Column,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Dimension::Time,
        Dimension::BottomTop,
        Dimension::BottomTopStag,
        Dimension::SouthNorth,
        Dimension::SouthNorthStag,
        Dimension::WestEast,
        Dimension::WestEastStag,
    ];

    /// Name of the dimension in WRF and output files
    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Time => "Time",
            Dimension::BottomTop => "bottom_top",
            Dimension::BottomTopStag => "bottom_top_stag",
            Dimension::SouthNorth => "south_north",
            Dimension::SouthNorthStag => "south_north_stag",
            Dimension::WestEast => "west_east",
            Dimension::WestEastStag => "west_east_stag",
        }
    }

    pub fn from_name(name: &str) -> InmapResult<Self> {
        Dimension::ALL
            .into_iter()
            .find(|d| d.name() == name)
            .ok_or_else(|| InmapError::UnknownDimension(name.to_string()))
    }

    pub fn kind(&self) -> AxisKind {
        match self {
            Dimension::Time => AxisKind::Time,
            Dimension::BottomTop | Dimension::BottomTopStag => AxisKind::Vertical,
            Dimension::SouthNorth | Dimension::SouthNorthStag => AxisKind::Row,
            Dimension::WestEast | Dimension::WestEastStag => AxisKind::Column,
        }
    }

    pub fn is_staggered(&self) -> bool {
        matches!(
            self,
            Dimension::BottomTopStag | Dimension::SouthNorthStag | Dimension::WestEastStag
        )
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Name and ordered dimensions of a field
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub dimensions: Vec<Dimension>,
}

impl FieldSpec {
    pub fn new(name: &str, dimensions: &[Dimension]) -> Self {
        Self {
            name: name.to_string(),
            dimensions: dimensions.to_vec(),
        }
    }

    /// Build a spec from dimension names, such as those reported by a dataset
    pub fn from_names<S: AsRef<str>>(name: &str, dimensions: &[S]) -> InmapResult<Self> {
        let dimensions = dimensions
            .iter()
            .map(|d| Dimension::from_name(d.as_ref()))
            .collect::<InmapResult<Vec<_>>>()?;
        Ok(Self {
            name: name.to_string(),
            dimensions,
        })
    }

    /// Index and dimension of the axis playing the given role
    pub fn axis(&self, kind: AxisKind) -> Option<(usize, Dimension)> {
        self.dimensions
            .iter()
            .enumerate()
            .find(|(_, d)| d.kind() == kind)
            .map(|(i, d)| (i, *d))
    }

    pub fn dimension_names(&self) -> Vec<&'static str> {
        self.dimensions.iter().map(|d| d.name()).collect()
    }
}

/// Sizes of the output dimensions
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLayout {
    pub time_steps: usize,
    pub layers: usize,
    pub rows: usize,
    pub columns: usize,
}

impl OutputLayout {
    /// Layout for the destination grid with `layers` vertical levels
    pub fn for_grid(grid: &GridDescriptor, layers: usize, time_steps: usize) -> Self {
        Self {
            time_steps,
            layers,
            rows: grid.rows,
            columns: grid.columns,
        }
    }

    pub fn len(&self, dimension: Dimension) -> usize {
        match dimension {
            Dimension::Time => self.time_steps,
            Dimension::BottomTop => self.layers,
            Dimension::BottomTopStag => self.layers + 1,
            Dimension::SouthNorth => self.rows,
            Dimension::SouthNorthStag => self.rows + 1,
            Dimension::WestEast => self.columns,
            Dimension::WestEastStag => self.columns + 1,
        }
    }

    pub fn shape(&self, spec: &FieldSpec) -> Vec<usize> {
        spec.dimensions.iter().map(|d| self.len(*d)).collect()
    }

    /// Create every output dimension
    pub fn define(&self, writer: &mut impl DatasetWriter) -> InmapResult<()> {
        for dimension in Dimension::ALL {
            writer.create_dimension(dimension.name(), self.len(dimension))?;
        }
        Ok(())
    }
}
