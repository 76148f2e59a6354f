pub mod alignment;
pub mod dataset;
pub mod density;
pub mod field;
pub mod grid;
pub mod griddesc;
pub mod layers;
pub mod met_variables;
pub mod resample;
pub mod time_window;

pub mod errors;

/// Floating point type used for all in-memory field values
pub type FloatValue = f64;
