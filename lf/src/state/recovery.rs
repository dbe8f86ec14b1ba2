//! Crash recovery
//!
//! A task left `running` means the process died mid-scrape. On startup
//! those tasks go back to `pending` so the scheduler picks them up again.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::domain::{Document, TaskPatch, TaskStatus};

use super::error::{StateError, StateResponse};
use super::tasks::{TaskLifecycleManager, apply_status};

/// Recovery statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Tasks found in `running` state
    pub tasks_to_recover: usize,
}

impl std::fmt::Display for RecoveryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "running tasks: {}", self.tasks_to_recover)
    }
}

/// Count tasks interrupted mid-run
pub async fn scan_for_recovery(tasks: &TaskLifecycleManager) -> StateResponse<RecoveryStats> {
    let running = tasks.list_by_status(TaskStatus::Running).await?;
    for task in &running {
        debug!(task_id = %task.id, started_at = ?task.started_at, "Found running task needing recovery");
    }

    let stats = RecoveryStats {
        tasks_to_recover: running.len(),
    };
    if stats.tasks_to_recover > 0 {
        info!("Recovery scan found incomplete work: {}", stats);
    } else {
        debug!("Recovery scan found no incomplete work");
    }
    Ok(stats)
}

/// Return every `running` task to `pending` in one transaction
///
/// Each keeps its `scheduledFor` (or gets now) so it is due immediately.
/// Returns the ids that were requeued.
pub async fn recover(tasks: &TaskLifecycleManager) -> StateResponse<Vec<String>> {
    debug!("recover: called");
    let requeued = tasks
        .store()
        .maybe_update(|mut doc: Document| {
            let now = Utc::now();
            let mut ids = Vec::new();
            for task in doc.tasks.iter_mut().filter(|t| t.status == TaskStatus::Running) {
                warn!(task_id = %task.id, "Requeueing interrupted task");
                apply_status(task, TaskStatus::Pending, TaskPatch::new(), now);
                ids.push(task.id.clone());
            }
            if ids.is_empty() {
                Ok::<_, StateError>((None, ids))
            } else {
                Ok((Some(doc), ids))
            }
        })
        .await?;

    if !requeued.is_empty() {
        info!(count = requeued.len(), "Recovered interrupted tasks");
    }
    Ok(requeued)
}
