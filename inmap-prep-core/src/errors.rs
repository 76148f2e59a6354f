use thiserror::Error;

/// Error type for invalid operations.
///
/// Every variant is fatal for a conversion run. Partial chemistry availability
/// is not an error and is reported through logging instead.
#[derive(Error, Debug)]
pub enum InmapError {
    #[error("{0}")]
    Error(String),
    #[error("Projection mismatch between the {source_grid} input domain and the {destination_grid} output domain: {attribute} differs ({source_value} != {destination_value})")]
    ProjectionMismatch {
        source_grid: String,
        destination_grid: String,
        attribute: String,
        source_value: String,
        destination_value: String,
    },
    #[error("Grid cell size mismatch between {source_grid} ({source_cell:?}) and {destination_grid} ({destination_cell:?})")]
    CellSizeMismatch {
        source_grid: String,
        destination_grid: String,
        source_cell: (f64, f64),
        destination_cell: (f64, f64),
    },
    #[error("Unsupported cell ratio {0}. Only same-resolution windowing is supported; no interpolation is performed")]
    UnsupportedCellRatio(f64),
    #[error("Grids do not overlap along the {axis} axis")]
    NoOverlap { axis: String },
    #[error("Grid origins are not a whole number of cells apart along the {axis} axis (source window {source_len} cells, destination window {destination_len} cells)")]
    NonIntegralOffset {
        axis: String,
        source_len: usize,
        destination_len: usize,
    },
    #[error("Unknown projection type code {0}")]
    UnknownProjection(i64),
    #[error("Grid '{0}' not found in the grid description")]
    GridNotFound(String),
    #[error("Invalid grid description at line {line}: {message}")]
    GridDescription { line: usize, message: String },
    #[error("Unknown chemical mechanism '{0}'. Expected one of: cb6, saprc")]
    UnknownMechanism(String),
    #[error("Mechanism {mechanism} has no molecular weight for gas-phase species {species}")]
    MissingMolecularWeight { mechanism: String, species: String },
    #[error("Invalid run date '{0}'. Expected YYYYMMDD or YYYYMMDDHH")]
    InvalidRunDate(String),
    #[error("Could not find {0} in the time coordinate")]
    RunDateNotFound(String),
    #[error("Time window [{start}, {end}) exceeds the {available} available time steps")]
    TimeWindowOutOfRange {
        start: usize,
        end: usize,
        available: usize,
    },
    #[error("Invalid layer mapping: {0}")]
    LayerMapping(String),
    #[error("Missing variable: {0}")]
    MissingVariable(String),
    #[error("Missing dimension: {0}")]
    MissingDimension(String),
    #[error("Unknown dimension name: {0}")]
    UnknownDimension(String),
    #[error("Variable {0} already exists in the output dataset")]
    DuplicateVariable(String),
    #[error("Shape of {variable} does not match output dimensions. Expected {expected:?}, got {found:?}")]
    ShapeMismatch {
        variable: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

/// Convenience type for `Result<T, InmapError>`.
pub type InmapResult<T> = Result<T, InmapError>;
