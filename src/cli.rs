//! Defines command-line interface options using `clap` for the mld-regrid application.

use chrono::NaiveDate;
use clap::{Args as ClapArgs, Parser, Subcommand};
use mld_regrid::config::{ConcatMode, PipelineConfig};
use mld_regrid::regrid::InterpMethod;
use std::path::PathBuf;

/// Preprocess ocean mixed-layer-depth fields for model input
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    name = "mld-regrid",
    about = "Regrid, quality-control and land-mask mixed-layer-depth NetCDF files"
)]
pub struct Args {
    /// JSON pipeline configuration; absent fields keep their defaults
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Per-day coarse regridding followed by concatenation along time
    Daily(PipelineOverrides),
    /// Land-mask file and full-file regridding onto the mask grid
    Masked(PipelineOverrides),
    /// Both passes, daily first
    Run(PipelineOverrides),
    /// Regrid variables of one file onto the grid of a mask file
    Regrid {
        /// Source NetCDF file
        #[arg(short, long)]
        source: PathBuf,
        /// Variables to regrid, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        variables: Vec<String>,
        /// Output NetCDF file
        #[arg(short, long)]
        output: PathBuf,
        /// File holding the land mask and the target grid
        #[arg(short, long)]
        mask: PathBuf,
        /// Name of the mask variable
        #[arg(long, default_value = "LANDMASK")]
        mask_variable: String,
        /// linear, nearest or cubic
        #[arg(long, default_value_t = InterpMethod::Linear)]
        method: InterpMethod,
    },
    /// Print dimensions, variables, coordinates and time axis of a file
    Info {
        /// Path to the NetCDF file
        file: PathBuf,
    },
}

/// Command-line values that take precedence over the configuration file
#[derive(ClapArgs, Debug, Default, Clone)]
pub struct PipelineOverrides {
    /// Source NetCDF file
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Directory that relative paths are resolved against
    #[arg(short, long)]
    pub work_dir: Option<PathBuf>,

    /// Variables to process, comma separated
    #[arg(long, value_delimiter = ',')]
    pub variables: Option<Vec<String>>,

    /// Days to process as YYYY-MM-DD, comma separated
    #[arg(long, value_delimiter = ',', value_parser = parse_date)]
    pub dates: Option<Vec<NaiveDate>>,

    /// Keep every N-th coordinate on the coarse grid
    #[arg(long)]
    pub stride: Option<usize>,

    /// Keep source longitudes strictly greater than this
    #[arg(long, allow_negative_numbers = true)]
    pub lon_min: Option<f64>,

    /// ncrcat or native
    #[arg(long)]
    pub concat: Option<ConcatMode>,

    /// linear, nearest or cubic
    #[arg(long)]
    pub method: Option<InterpMethod>,
}

impl PipelineOverrides {
    pub fn apply(self, config: &mut PipelineConfig) {
        if let Some(source) = self.source {
            config.source = source;
        }
        if let Some(work_dir) = self.work_dir {
            config.work_dir = work_dir;
        }
        if let Some(variables) = self.variables {
            config.variables = variables;
        }
        if let Some(dates) = self.dates {
            config.dates = dates;
        }
        if let Some(stride) = self.stride {
            config.stride = stride;
        }
        if let Some(lon_min) = self.lon_min {
            config.lon_min = Some(lon_min);
        }
        if let Some(concat) = self.concat {
            config.concat = concat;
        }
        if let Some(method) = self.method {
            config.method = method;
        }
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
        .map_err(|_| format!("Invalid date '{}': expected YYYY-MM-DD", s))
}
