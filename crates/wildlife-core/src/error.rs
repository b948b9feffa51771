//! Error types for the wildlife browser.

use std::time::Duration;
use thiserror::Error;

/// Record source errors - surfaced to the user as a failed load.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Save data could not be read.
    #[error("IO error: {0}")]
    Io(String),

    /// Save data could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Fetch did not complete in time.
    #[error("Fetch timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// The load was dropped before the fetch finished.
    #[error("Load cancelled")]
    Cancelled,

    /// Source-specific failure.
    #[error("Source error: {0}")]
    Source(String),
}

/// Errors from controller operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    /// A load is in flight; commands are disabled.
    #[error("Query in progress")]
    Busy,

    /// No partition has been requested yet.
    #[error("No partition selected")]
    NoPartition,

    /// Fetch failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No config directory found.
    #[error("Config directory not found")]
    NoConfigDir,

    /// IO error.
    #[error("IO error: {0}")]
    Io(String),

    /// Parse error.
    #[error("Parse error: {0}")]
    Parse(String),
}
