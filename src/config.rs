//! Pipeline configuration
//!
//! Every field has a default reproducing the standard three-day HYCOM run, so a
//! JSON config file only needs the fields that differ. Relative paths are
//! resolved against `work_dir`.

use crate::errors::{MldError, Result};
use crate::file_regrid::LANDMASK_VAR;
use crate::qc::ClampRange;
use crate::reader::CoordinateAliases;
use crate::regrid::InterpMethod;
use crate::tools::ExternalTools;
use chrono::NaiveDate;
use serde::Deserialize;
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

/// How per-day files are combined into one multi-time file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcatMode {
    /// External `ncrcat`
    #[default]
    Ncrcat,
    /// In-process concatenation along time
    Native,
}

impl FromStr for ConcatMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ncrcat" => Ok(Self::Ncrcat),
            "native" => Ok(Self::Native),
            other => Err(format!(
                "Unknown concatenation mode '{}': expected ncrcat or native",
                other
            )),
        }
    }
}

impl fmt::Display for ConcatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ncrcat => "ncrcat",
            Self::Native => "native",
        })
    }
}

/// Settings shared by both pipeline passes
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory that relative paths are resolved against
    pub work_dir: PathBuf,
    /// Source file holding the full-resolution fields
    pub source: PathBuf,
    /// Variables to regrid
    pub variables: Vec<String>,
    /// Days to process, in order
    pub dates: Vec<NaiveDate>,
    /// Keep source longitudes strictly greater than this
    pub lon_min: Option<f64>,
    /// Keep every `stride`-th coordinate on the coarse grid
    pub stride: usize,
    pub clamp: ClampRange,
    pub method: InterpMethod,
    /// Per-day output name; `{date}` becomes `YYYYMMDD`
    pub daily_pattern: String,
    pub combined_output: PathBuf,
    pub mask_file: PathBuf,
    pub mask_variable: String,
    pub masked_output: PathBuf,
    /// CDL schema for per-day files; a native layout is used when unset
    pub daily_template: Option<PathBuf>,
    /// CDL schema for the mask file; a native layout is used when unset
    pub mask_template: Option<PathBuf>,
    pub concat: ConcatMode,
    pub tools: ExternalTools,
    /// Candidate coordinate names when reading
    pub aliases: CoordinateAliases,
    /// Coordinate names written to new files
    pub output_lon_name: String,
    pub output_lat_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let dates = (1..=3)
            .filter_map(|day| NaiveDate::from_ymd_opt(2019, 1, day))
            .collect();
        Self {
            work_dir: PathBuf::from("."),
            source: PathBuf::from("HYCOM_inv_20190101-0103.nc"),
            variables: vec!["MLD_Tdiff_est".to_string(), "MLD_Tdiff_dia".to_string()],
            dates,
            lon_min: Some(120.0),
            stride: 10,
            clamp: ClampRange::default(),
            method: InterpMethod::Linear,
            daily_pattern: "HYCOM_inv_{date}_int.nc".to_string(),
            combined_output: PathBuf::from("HYCOM_inv_20190101-0103_int_eg1.nc"),
            mask_file: PathBuf::from("nwp_mask.nc"),
            mask_variable: LANDMASK_VAR.to_string(),
            masked_output: PathBuf::from("HYCOM_inv_20190101-0103_int_eg2.nc"),
            daily_template: None,
            mask_template: None,
            concat: ConcatMode::Ncrcat,
            tools: ExternalTools::default(),
            aliases: CoordinateAliases::default(),
            output_lon_name: "longitude".to_string(),
            output_lat_name: "latitude".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config; absent fields keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no pass could run with
    pub fn validate(&self) -> Result<()> {
        if self.variables.is_empty() {
            return Err(MldError::ConfigError("no variables configured".into()));
        }
        if self.dates.is_empty() {
            return Err(MldError::ConfigError("no dates configured".into()));
        }
        if self.stride == 0 {
            return Err(MldError::ConfigError("stride must be at least 1".into()));
        }
        if !self.daily_pattern.contains("{date}") {
            return Err(MldError::ConfigError(format!(
                "daily_pattern '{}' has no {{date}} placeholder",
                self.daily_pattern
            )));
        }
        ClampRange::new(self.clamp.min, self.clamp.max)?;
        Ok(())
    }

    /// `path` relative to `work_dir` unless absolute
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.work_dir.join(path)
    }

    pub fn source_path(&self) -> PathBuf {
        self.resolve(&self.source)
    }

    /// Per-day output file for `date`
    pub fn daily_path(&self, date: NaiveDate) -> PathBuf {
        let name = self
            .daily_pattern
            .replace("{date}", &date.format("%Y%m%d").to_string());
        self.resolve(Path::new(&name))
    }

    pub fn daily_paths(&self) -> Vec<PathBuf> {
        self.dates.iter().map(|&d| self.daily_path(d)).collect()
    }
}
