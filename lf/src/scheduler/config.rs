//! Scheduler configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SchedulerConfig {
    /// Fallback polling interval; commits wake the scheduler sooner
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Max tasks running at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Max tasks claimed per tick
    #[serde(default = "default_claim_batch")]
    pub claim_batch: usize,

    /// Base URL for resolving relative profile links
    #[serde(default)]
    pub origin: Option<String>,
}

fn default_poll_interval_ms() -> u64 {
    30_000
}

fn default_max_concurrent() -> usize {
    1
}

fn default_claim_batch() -> usize {
    5
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_concurrent: default_max_concurrent(),
            claim_batch: default_claim_batch(),
            origin: None,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// How many tasks may be claimed with `in_flight` already running
    pub fn claim_capacity(&self, in_flight: usize) -> usize {
        self.max_concurrent.max(1).saturating_sub(in_flight).min(self.claim_batch.max(1))
    }
}
