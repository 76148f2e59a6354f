//! inmap-prep command line tool
//!
//! Builds one day of InMAP input from WRF, MCIP and CMAQ output.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=inmap_prep=debug inmap-prep \
//!   wrfout_d01_2018-07-01 METCRO3D_20180701.nc CCTM_CONC_20180701.nc 20180701 \
//!   inmap_20180701.nc vert_layers_50_to_28.csv GRIDDESC --mechanism saprc
//! ```

use clap::Parser;
use inmap_prep::config::{ChemistryMode, RunConfig};
use inmap_prep::netcdf_io::{NetcdfReader, NetcdfWriter};
use inmap_prep::pipeline::Pipeline;
use inmap_prep_core::errors::InmapResult;
use inmap_prep_core::griddesc::GridRegistry;
use inmap_prep_core::layers::LayerMap;
use inmap_prep_core::time_window::{RunDate, TimeWindowConvention};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Merge WRF meteorology and CMAQ chemistry into an InMAP input file
#[derive(Parser, Debug)]
#[command(name = "inmap-prep")]
#[command(about = "Merge WRF meteorology and CMAQ chemistry into an InMAP input file")]
struct Args {
    /// WRF output file
    wrf: PathBuf,

    /// MCIP METCRO3D file on the output grid
    mcip: PathBuf,

    /// CMAQ concentration file on the output grid
    cmaq: PathBuf,

    /// Day to process (YYYYMMDD)
    rundate: RunDate,

    /// Output file, must not exist
    output: PathBuf,

    /// CSV mapping WRF layers (lay1) to output layers (lay2)
    layers_csv: PathBuf,

    /// IOAPI GRIDDESC file holding both grids
    griddesc: PathBuf,

    /// TOML run configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Chemical mechanism of the CMAQ file (cb6 or saprc)
    #[arg(long)]
    mechanism: Option<String>,

    /// Name of the WRF grid in the GRIDDESC file
    #[arg(long)]
    met_grid: Option<String>,

    /// Name of the output grid in the GRIDDESC file
    #[arg(long)]
    output_grid: Option<String>,

    /// How the end of the day is found (hour23 or fixed24)
    #[arg(long)]
    time_window: Option<TimeWindowConvention>,

    /// Copy already lumped variables from the CMAQ file
    #[arg(long)]
    prelumped: bool,
}

impl Args {
    /// Configuration file values overridden by command line flags
    fn run_config(&self) -> InmapResult<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_path(path)?,
            None => RunConfig::default(),
        };
        if let Some(mechanism) = &self.mechanism {
            config.mechanism = mechanism.clone();
        }
        if let Some(met_grid) = &self.met_grid {
            config.met_grid = met_grid.clone();
        }
        if let Some(output_grid) = &self.output_grid {
            config.output_grid = output_grid.clone();
        }
        if let Some(time_window) = self.time_window {
            config.time_window = time_window;
        }
        if self.prelumped {
            config.chemistry = ChemistryMode::Prelumped;
        }
        Ok(config)
    }
}

fn run(args: &Args) -> InmapResult<()> {
    let config = args.run_config()?;
    let registry = GridRegistry::from_path(&args.griddesc)?;
    let pipeline = Pipeline::new(config, registry, args.rundate)?;

    // The layer map is only needed when WRF and the output differ in resolution
    let pipeline = if args.layers_csv.exists() {
        pipeline.with_layer_map(LayerMap::from_path(&args.layers_csv)?)
    } else {
        pipeline
    };

    let wrf = NetcdfReader::open(&args.wrf)?;
    let mcip = NetcdfReader::open(&args.mcip)?;
    let cmaq = NetcdfReader::open(&args.cmaq)?;
    let mut output = NetcdfWriter::create(&args.output)?;

    let summary = pipeline.run(&wrf, &mcip, &cmaq, &mut output)?;
    info!(
        output = %output.path().display(),
        variables = summary.variables.len(),
        "wrote InMAP input"
    );
    Ok(())
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("inmap_prep=info"));
    fmt().with_env_filter(filter).with_target(false).init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        error!("{}", e);
        std::process::exit(1);
    }
}
