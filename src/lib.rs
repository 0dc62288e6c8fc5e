//! mld_regrid: mixed-layer-depth preprocessing for ocean model input
//!
//! Reads gridded mixed-layer-depth fields from NetCDF, fills gaps and regrids
//! them onto coarser or externally defined grids, clamps them to a plausible
//! depth range, applies land masks and writes the results back to NetCDF with
//! time-merging semantics.
//!
//! ## Module Organization
//!
//! - [`reader`]: coordinate resolution and variable reading with selections
//! - [`regrid`]: gap filling and 2-D interpolation of one field
//! - [`file_regrid`]: whole-file regridding onto the grid of a land-mask file
//! - [`writer`]: time-merging writes into template-created files
//! - [`dataset`]: in-memory NetCDF model, CF decoding and time concatenation
//! - [`qc`]: land masks and value clamps
//! - [`pipeline`]: the daily (Pass A) and masked (Pass B) preprocessing runs
//! - [`config`]: pipeline configuration
//! - [`metadata`]: file inspection
//! - [`tools`]: `ncgen` and `ncrcat` invocation
//! - [`grid`], [`time`]: coordinate and time helpers
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//! ```rust,no_run
//! use mld_regrid::prelude::*;
//! use std::path::Path;
//!
//! let aliases = CoordinateAliases::default();
//! let grid = read_grid(Path::new("HYCOM_inv_20190101-0103.nc"), &aliases).unwrap();
//! let coarse = grid.coarsen(10).unwrap();
//! println!("{:?} -> {:?}", grid.shape(), coarse.shape());
//! ```

pub mod config;
pub mod dataset;
pub mod errors;
pub mod file_regrid;
pub mod grid;
pub mod metadata;
pub mod pipeline;
pub mod qc;
pub mod reader;
pub mod regrid;
pub mod time;
pub mod tools;
pub mod writer;

pub use errors::{MldError, Result};

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::config::{ConcatMode, PipelineConfig};
    pub use crate::dataset::{concat_time, DataVariable, Dataset};
    pub use crate::errors::{MldError, Result};
    pub use crate::file_regrid::{regrid_file, RegridRequest, LANDMASK_VAR};
    pub use crate::grid::{Grid, LonConvention};
    pub use crate::pipeline::{run_all, run_daily, run_masked, DailyOutputs};
    pub use crate::qc::{clamp, ClampRange};
    pub use crate::reader::{read_grid, read_variables, CoordinateAliases, Selection};
    pub use crate::regrid::{regrid_field, InterpMethod};
    pub use crate::time::TimeUnits;
    pub use crate::writer::{FileTemplate, GridWriter, Layout, VariableUpdate};
}
