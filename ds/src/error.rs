//! Store error types

use thiserror::Error;

/// Errors from store operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Failed to lock store: {0}")]
    Locked(String),

    #[error("Failed to start store actor: {0}")]
    Actor(String),

    #[error("Channel error")]
    ChannelError,

    #[error("Store is closed")]
    Closed,
}

impl StoreError {
    /// True when the failure happened while writing or reading the backing file
    pub fn is_persistence(&self) -> bool {
        matches!(self, StoreError::Persistence(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Response from store operations
pub type StoreResponse<T> = Result<T, StoreError>;
