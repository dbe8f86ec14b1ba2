//! Automation error types

use std::time::Duration;
use thiserror::Error;

/// Errors raised at the automation boundary
///
/// These never reach the store; the scheduler records them on the task
/// as its `errorMessage`.
#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("Session error: {0}")]
    Session(String),

    #[error("Scrape failed: {0}")]
    Scrape(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl AutomationError {
    /// Session problems need operator action (new cookie, browser path)
    pub fn is_session(&self) -> bool {
        matches!(self, AutomationError::Session(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AutomationError::Timeout(_))
    }
}

impl From<serde_json::Error> for AutomationError {
    fn from(e: serde_json::Error) -> Self {
        AutomationError::Protocol(e.to_string())
    }
}
