use certflow_types::{ApplicationId, WorkflowError};
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage-layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("stale write to {id}: expected version {expected}, found {found}")]
    Stale {
        id: ApplicationId,
        expected: u64,
        found: u64,
    },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Failures where the backend's state is unknown and a retry may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Backend(_))
    }
}

impl From<StorageError> for WorkflowError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Stale {
                id,
                expected,
                found,
            } => WorkflowError::StaleState {
                id,
                expected,
                found,
            },
            StorageError::InvalidInput(msg) | StorageError::Conflict(msg) => {
                WorkflowError::Validation(msg)
            }
            other => WorkflowError::PersistenceFailure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_maps_to_stale_state() {
        let err: WorkflowError = StorageError::Stale {
            id: ApplicationId::new("a1"),
            expected: 2,
            found: 3,
        }
        .into();
        assert!(matches!(
            err,
            WorkflowError::StaleState {
                expected: 2,
                found: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_backend_maps_to_persistence_failure() {
        let err: WorkflowError = StorageError::Backend("connection refused".into()).into();
        assert!(matches!(err, WorkflowError::PersistenceFailure(_)));
        assert!(StorageError::Backend("x".into()).is_transient());
        assert!(!StorageError::NotFound("x".into()).is_transient());
    }
}
