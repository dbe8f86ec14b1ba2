//! LeadFlow - lead-generation task orchestrator
//!
//! LeadFlow keeps a user's ideal customer profile, search presets, scrape
//! tasks, collected leads and browser settings in one JSON document, and
//! drives due tasks through an external browser automation command.
//!
//! # Core Concepts
//!
//! - **One Document**: every entity lives in a single document committed
//!   atomically by the `docstore` actor; no partial writes survive a crash
//! - **Serialized Transactions**: each operation is one read-modify-write
//!   transaction, so concurrent callers never lose updates
//! - **Settings Snapshots**: a task copies the live settings when created
//!   and always runs with that copy
//! - **Deduplicated Leads**: leads are keyed by profile URL; a re-scraped
//!   profile keeps its position and takes the newer content
//!
//! # Modules
//!
//! - [`domain`] - Persisted types and the task wire format
//! - [`state`] - Repository, task lifecycle and crash recovery
//! - [`automation`] - Browser automation boundary and profile extraction
//! - [`scheduler`] - Claims due tasks and records their outcome
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod automation;
pub mod cli;
pub mod config;
pub mod domain;
pub mod scheduler;
pub mod state;

// Re-export commonly used types
pub use automation::{AutomationClient, AutomationError, CommandAutomationClient, ExtractedProfile};
pub use config::Config;
pub use domain::{
    AutomationSettings, Document, IdealCustomerProfile, LeadRecord, SearchPreset, SearchTask, TaskKind, TaskPatch,
    TaskStatus, TaskType,
};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use state::{LeadStore, StateError, StateRepository, TaskLifecycleManager};
