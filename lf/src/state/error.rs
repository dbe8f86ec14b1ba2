//! State error types

use docstore::StoreError;
use thiserror::Error;

/// Errors from repository and task lifecycle operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl StateError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StateError::NotFound(_))
    }

    /// A store failure that may clear up on retry (disk or lock trouble)
    pub fn is_transient(&self) -> bool {
        match self {
            StateError::Store(e) => e.is_persistence() || matches!(e, StoreError::Locked(_)),
            _ => false,
        }
    }
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;
