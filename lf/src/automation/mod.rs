//! Automation boundary
//!
//! The scheduler talks to the browser only through [`AutomationClient`].
//! A run is `acquire` (from the task's settings snapshot), `scrape`, then
//! `release`. Raw profiles pass through [`dedupe_profiles`] before they
//! are stored as leads.

mod client;
mod command;
mod error;
mod extract;

pub use client::{AutomationClient, RESULTS_PER_PAGE, ScrapeRequest, Session};
pub use command::CommandAutomationClient;
pub use error::AutomationError;
pub use extract::{ExtractOptions, ExtractedProfile, dedupe_profiles};

#[cfg(test)]
pub use client::mock;
