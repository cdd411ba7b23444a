//! Error types for the marker nesting engine.

use thiserror::Error;

/// Result type alias for nesting operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while preparing or running a nest.
///
/// Per-piece problems never abort a run: the orchestrator turns them into
/// unplaced entries. Only an unusable request surfaces as an `Err`.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid piece geometry (too few points, zero area, non-finite coordinates).
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Invalid strip (fabric) description.
    #[error("Invalid strip: {0}")]
    InvalidStrip(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// NFP computation failed.
    #[error("NFP computation failed: {0}")]
    NfpError(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
