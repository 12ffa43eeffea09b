//! Error types for imgsync core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in imgsync core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage primitive error.
    #[error("storage error: {0}")]
    Storage(#[from] imgsync_storage::StorageError),

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A caller passed a malformed or empty identifier.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A configuration value is out of bounds.
    #[error("invalid config: {field} {reason}")]
    InvalidConfig {
        /// The offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl CoreError {
    /// Creates an invalid config error.
    pub fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

/// Rejects an empty identifier before it reaches storage.
///
/// # Errors
///
/// Returns [`CoreError::InvalidArgument`] if `value` is empty or blank.
pub fn require_id(name: &str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::InvalidArgument(format!("{name} must not be empty")));
    }
    Ok(())
}
