//! Error types for hashsync
//!
//! Provides a unified error type for all operations. Saturation of a bounded
//! counter is not an error; see [`crate::bound::BoundedOutcome::Refused`].

use thiserror::Error;

/// Result type alias using SyncError
pub type Result<T> = std::result::Result<T, SyncError>;

/// Unified error type for hashsync operations
#[derive(Debug, Error)]
pub enum SyncError {
    // -------------------------------------------------------------------------
    // Mapping Errors
    // -------------------------------------------------------------------------
    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Field `{field}` does not exist on record type `{record}`")]
    InvalidField { record: String, field: String },

    // -------------------------------------------------------------------------
    // Caller Input Errors
    // -------------------------------------------------------------------------
    #[error("Invalid bound: min {min} is greater than max {max}")]
    InvalidBound { min: i64, max: i64 },

    #[error("Invalid delta {0}: bounded steps must be strictly positive")]
    InvalidDelta(i64),

    #[error("Key must not be blank")]
    BlankKey,

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Value {value:?} at {target} is not an integer")]
    Parse { target: String, value: String },

    #[error("Increment at {0} would overflow")]
    Overflow(String),

    #[error("Operation against a key holding the wrong kind of value: {0}")]
    WrongType(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Build a parse error for a value stored under `key` (and optionally `field`)
    pub fn parse(key: &str, field: Option<&str>, value: impl Into<String>) -> Self {
        SyncError::Parse {
            target: target(key, field),
            value: value.into(),
        }
    }

    /// Build an overflow error for `key` (and optionally `field`)
    pub fn overflow(key: &str, field: Option<&str>) -> Self {
        SyncError::Overflow(target(key, field))
    }

    /// True when the error means the store could not be reached at all
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SyncError::StoreUnavailable(_))
    }
}

fn target(key: &str, field: Option<&str>) -> String {
    match field {
        Some(field) => format!("{}/{}", key, field),
        None => key.to_string(),
    }
}
