//! CMAQ chemistry for InMAP input files
//!
//! This crate turns a CMAQ concentration file into the lumped chemistry variables
//! InMAP expects.
//!
//! # Module Organisation
//!
//! - `species`: lumped species maps, phases and output units
//! - `mechanism`: molecular weights and maps for the CB6 and SAPRC mechanisms
//! - `aggregate`: unit conversion and summation of species into lumped variables
//! - `partition`: gas/particle partition fractions from the lumped variables

pub mod aggregate;
pub mod mechanism;
pub mod partition;
pub mod species;
