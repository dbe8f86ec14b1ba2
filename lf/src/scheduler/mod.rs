//! Scheduler for task execution
//!
//! Picks up due tasks, runs them through the automation client with a
//! concurrency limit, and records the outcome.

mod config;
mod core;
mod lock;

pub use config::SchedulerConfig;
pub use core::Scheduler;
pub use lock::RunLock;
