//! Centralized error handling for mld-regrid
//!
//! Every fallible operation in the crate returns [`Result`]. Nothing is retried:
//! an error aborts the current pipeline pass and is reported by `main`.

use std::fmt;

/// Main error type for mld-regrid operations
#[derive(Debug)]
pub enum MldError {
    /// NetCDF file operation errors
    NetCDFError(netcdf::Error),

    /// I/O operation errors
    IoError(std::io::Error),

    /// Array shape or dimension error
    ArrayError(ndarray::ShapeError),

    /// None of the candidate coordinate names is declared in the file
    CoordinateNotFound { axis: String, candidates: Vec<String> },

    /// Values array does not fit the supplied coordinates, even transposed
    GridMismatch { message: String },

    /// Target file is absent and no schema template was supplied
    MissingTemplate { path: String },

    /// An external command could not be run or exited non-zero
    ExternalTool {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    /// Variable not found in NetCDF file
    VariableNotFound { var: String },

    /// Dimension not found in variable
    DimensionNotFound { var: String, dim: String },

    /// Requested timestamp is not on the file's time axis
    TimeNotFound { time: String },

    /// Unparseable timestamp or time-units string
    InvalidTime { message: String },

    /// Interpolation kernel rejected its inputs
    InterpolationError(String),

    /// Invalid pipeline configuration
    ConfigError(String),

    /// Generic error for everything else
    Generic(String),
}

impl fmt::Display for MldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MldError::NetCDFError(e) => write!(f, "NetCDF error: {}", e),
            MldError::IoError(e) => write!(f, "I/O error: {}", e),
            MldError::ArrayError(e) => write!(f, "Array error: {}", e),
            MldError::CoordinateNotFound { axis, candidates } => write!(
                f,
                "No {} coordinate found (tried: {})",
                axis,
                candidates.join(", ")
            ),
            MldError::GridMismatch { message } => write!(f, "Grid mismatch: {}", message),
            MldError::MissingTemplate { path } => write!(
                f,
                "File '{}' does not exist and no schema template was supplied",
                path
            ),
            MldError::ExternalTool {
                command,
                status,
                stderr,
            } => {
                match status {
                    Some(code) => write!(f, "Command '{}' exited with status {}", command, code)?,
                    None => write!(f, "Command '{}' did not complete", command)?,
                }
                if !stderr.trim().is_empty() {
                    write!(f, ": {}", stderr.trim())?;
                }
                Ok(())
            }
            MldError::VariableNotFound { var } => write!(f, "Variable '{}' not found in file", var),
            MldError::DimensionNotFound { var, dim } => {
                write!(f, "Dimension '{}' not found in variable '{}'", dim, var)
            }
            MldError::TimeNotFound { time } => write!(f, "Time '{}' not found on time axis", time),
            MldError::InvalidTime { message } => write!(f, "Invalid time: {}", message),
            MldError::InterpolationError(msg) => write!(f, "Interpolation error: {}", msg),
            MldError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            MldError::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for MldError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MldError::NetCDFError(e) => Some(e),
            MldError::IoError(e) => Some(e),
            MldError::ArrayError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<netcdf::Error> for MldError {
    fn from(error: netcdf::Error) -> Self {
        MldError::NetCDFError(error)
    }
}

impl From<std::io::Error> for MldError {
    fn from(error: std::io::Error) -> Self {
        MldError::IoError(error)
    }
}

impl From<ndarray::ShapeError> for MldError {
    fn from(error: ndarray::ShapeError) -> Self {
        MldError::ArrayError(error)
    }
}

impl From<serde_json::Error> for MldError {
    fn from(error: serde_json::Error) -> Self {
        MldError::ConfigError(error.to_string())
    }
}

impl From<String> for MldError {
    fn from(error: String) -> Self {
        MldError::Generic(error)
    }
}

impl From<&str> for MldError {
    fn from(error: &str) -> Self {
        MldError::Generic(error.to_string())
    }
}

impl MldError {
    /// Shorthand for a [`MldError::GridMismatch`]
    pub fn grid_mismatch(message: impl Into<String>) -> Self {
        MldError::GridMismatch {
            message: message.into(),
        }
    }
}

/// Result type alias for mld-regrid operations
pub type Result<T> = std::result::Result<T, MldError>;
