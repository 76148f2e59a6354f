//! Merge WRF meteorology and CMAQ chemistry into an InMAP input file
//!
//! The heavy lifting lives in the member crates:
//!
//! - [`inmap_prep_core`]: grids, alignment, datasets and the meteorology resampler
//! - [`inmap_prep_chemistry`]: mechanism tables, species aggregation and partitions
//!
//! This crate ties them together into a [`pipeline::Pipeline`] driven by a
//! [`config::RunConfig`]. With the `netcdf` feature it also provides NetCDF file
//! access and the `inmap-prep` command line tool.

pub mod config;
#[cfg(feature = "netcdf")]
pub mod netcdf_io;
pub mod pipeline;

pub use inmap_prep_chemistry;
pub use inmap_prep_core;
