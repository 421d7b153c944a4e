//! Error types for accelerator-dispatched statistics
//!
//! Provides a unified error type for all accel-stats crates.

use thiserror::Error;

/// Core error type for engine, device and ingestion operations
#[derive(Error, Debug)]
pub enum Error {
    /// The engine was instantiated with an element type that has no kernels
    #[error("Unsupported element type: {0} (supported types are i32 and f32)")]
    UnsupportedElementType(&'static str),

    /// Invalid parameter provided to a function
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Launch configuration that cannot produce a correct answer
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Insufficient data for the requested operation
    #[error("Insufficient data: expected at least {expected} samples, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    /// Failure reported by the compute device
    #[error("Device error {code} ({name}): {message}")]
    Device {
        code: i32,
        name: &'static str,
        message: String,
    },

    /// Kernel program failed to build for the selected device
    #[error("Program build failed\nBuild Status: {status}\nBuild Options:\t{options}\nBuild Log:\t{log}")]
    Build {
        status: i32,
        options: String,
        log: String,
    },

    /// A statistic was requested before the values it depends on
    #[error("Missing prerequisite: {0}")]
    MissingPrerequisite(String),

    /// The sort convergence loop hit its pass bound
    #[error("Sort did not converge after {passes} passes")]
    NotConverged { passes: usize },

    /// A record in an input file could not be parsed
    #[error("Parse error on line {line}: cannot parse {token:?}")]
    Parse { line: usize, token: String },

    /// IO error (for file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an error for empty input
    pub fn empty_input() -> Self {
        Self::InsufficientData {
            expected: 1,
            actual: 0,
        }
    }

    /// Create an error for a zero work-group size
    pub fn zero_group_size() -> Self {
        Self::InvalidParameter("work-group size must be at least 1".to_string())
    }

    /// Whether the error is a device-side failure
    pub fn is_device(&self) -> bool {
        matches!(self, Self::Device { .. } | Self::Build { .. })
    }

    /// Whether the run can continue after this error
    ///
    /// Only the sort pass bound is recoverable; every other error aborts the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotConverged { .. })
    }
}
