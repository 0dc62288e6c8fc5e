//! External NetCDF command-line tools
//!
//! `ncgen` turns a CDL schema into an empty file and `ncrcat` concatenates files
//! along their record dimension. Both run synchronously; a spawn failure or a
//! non-zero exit status is an [`MldError::ExternalTool`].

use crate::errors::{MldError, Result};
use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, info};

/// Executables used for schema generation and record concatenation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExternalTools {
    pub ncgen: String,
    pub ncrcat: String,
}

impl Default for ExternalTools {
    fn default() -> Self {
        Self {
            ncgen: "ncgen".to_string(),
            ncrcat: "ncrcat".to_string(),
        }
    }
}

impl ExternalTools {
    /// `ncgen -o <target> <cdl>`
    pub fn generate_from_cdl(&self, cdl: &Path, target: &Path) -> Result<()> {
        let mut command = Command::new(&self.ncgen);
        command.arg("-o").arg(target).arg(cdl);
        run(command)?;
        info!(file = %target.display(), template = %cdl.display(), "Created file from schema");
        Ok(())
    }

    /// `ncrcat -O <inputs...> <output>`
    pub fn concatenate_records(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        let mut command = Command::new(&self.ncrcat);
        command.arg("-O").args(inputs).arg(output);
        run(command)?;
        info!(inputs = inputs.len(), output = %output.display(), "Concatenated files along time");
        Ok(())
    }
}

fn run(mut command: Command) -> Result<()> {
    let rendered = format!("{:?}", command);
    debug!(command = %rendered, "Running external tool");

    let output = command.output().map_err(|e| MldError::ExternalTool {
        command: rendered.clone(),
        status: None,
        stderr: e.to_string(),
    })?;

    if output.status.success() {
        Ok(())
    } else {
        Err(MldError::ExternalTool {
            command: rendered,
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
