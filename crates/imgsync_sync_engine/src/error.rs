//! Error types for the sync engine.

use imgsync_core::CoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A caller passed a malformed or empty identifier.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// A configuration update was rejected.
    #[error("invalid config: {0}")]
    Config(String),

    /// The upload or URL provider failed. Displays the provider's message
    /// unchanged.
    #[error("{0}")]
    Provider(String),

    /// Persistence or serialization failed.
    #[error("storage error: {0}")]
    Storage(#[source] CoreError),
}

impl SyncError {
    /// Creates a provider error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }

    /// Returns true if trying again later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Provider(_))
    }
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidArgument(message) => Self::Validation(message),
            CoreError::InvalidConfig { field, reason } => Self::Config(format!("{field} {reason}")),
            other => Self::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgsync_storage::StorageError;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::provider("Network error").is_retryable());
        assert!(!SyncError::Validation("localRef must not be empty".into()).is_retryable());
        assert!(!SyncError::Config("batchSize out of range".into()).is_retryable());
    }

    #[test]
    fn provider_message_is_verbatim() {
        assert_eq!(SyncError::provider("Network error").to_string(), "Network error");
    }

    #[test]
    fn core_errors_map_to_taxonomy() {
        let err: SyncError = CoreError::InvalidArgument("ownerId must not be empty".into()).into();
        assert!(matches!(err, SyncError::Validation(_)));

        let err: SyncError = CoreError::invalid_config("batchSize", "must be between 1 and 50").into();
        assert_eq!(err.to_string(), "invalid config: batchSize must be between 1 and 50");

        let err: SyncError = CoreError::Storage(StorageError::Corrupted("bad".into())).into();
        assert!(matches!(err, SyncError::Storage(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
