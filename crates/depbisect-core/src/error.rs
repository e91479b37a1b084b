//! Error types for release bisection.

use thiserror::Error;

/// Errors that can occur while bisecting a dependency's releases.
#[derive(Error, Debug)]
pub enum BisectError {
    /// Release list could not be fetched or decoded
    #[error("release fetch failed: {0}")]
    Fetch(String),

    /// A named range bound is absent from the fetched release window
    #[error("release bound '{0}' not found in the fetched window")]
    BoundNotFound(String),

    /// Package manager failed to pin the candidate version; fatal to the run
    #[error("failed to install {package}@{version}: {reason}")]
    Install {
        /// Dependency being pinned
        package: String,
        /// Release tag that failed to install
        version: String,
        /// Underlying failure
        reason: String,
    },

    /// Verification command crashed (non-zero exit that was not an interrupt)
    #[error("verification command '{command}' exited with status {status}")]
    Verification {
        /// Command line that was run
        command: String,
        /// Its exit code
        status: i32,
    },

    /// Operator interrupt with no human fallback left; ends the run quietly
    #[error("interrupted by operator")]
    Interrupted,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for BisectError {
    fn from(err: reqwest::Error) -> Self {
        BisectError::Fetch(err.to_string())
    }
}

/// Result type for bisection operations
pub type Result<T> = std::result::Result<T, BisectError>;
