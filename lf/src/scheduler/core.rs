//! Scheduler - claims due tasks and runs them through automation
//!
//! Claiming, completing and failing are store transactions. The scrape
//! itself runs outside any transaction, so a slow browser never blocks
//! other writers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use eyre::Result;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use docstore::StoreEvent;

use crate::automation::{AutomationClient, ExtractOptions, ScrapeRequest, dedupe_profiles};
use crate::domain::{SearchTask, TaskStatus};
use crate::state::{LeadStore, StateRepository, StateResponse, TaskLifecycleManager, recover};

use super::SchedulerConfig;

const RECORD_ATTEMPTS: u32 = 3;
const RECORD_BACKOFF: Duration = Duration::from_millis(500);

/// Runs one claimed task; cheap to clone into a spawned future
#[derive(Clone)]
struct Runner {
    tasks: TaskLifecycleManager,
    repo: StateRepository,
    client: Arc<dyn AutomationClient>,
    origin: Option<String>,
}

impl Runner {
    async fn execute(self, task: SearchTask) -> StateResponse<SearchTask> {
        debug!(task_id = %task.id, task_type = %task.task_type(), "execute: called");

        let preset = match task.kind.preset_id() {
            Some(preset_id) => match self.repo.find_preset(preset_id).await {
                Ok(Some(preset)) => Some(preset),
                Ok(None) => return self.fail(&task.id, format!("Preset {} not found", preset_id)).await,
                Err(e) => {
                    warn!(task_id = %task.id, error = %e, "Failed to load preset");
                    return self.fail(&task.id, format!("Failed to load preset {}: {}", preset_id, e)).await;
                }
            },
            None => None,
        };
        let request = ScrapeRequest::for_task(&task, preset.as_ref());

        // Always the snapshot taken at creation, never the live settings
        let session = match self.client.acquire(&task.settings_snapshot).await {
            Ok(session) => session,
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Failed to open automation session");
                return self.fail(&task.id, e.to_string()).await;
            }
        };
        let scraped = self.client.scrape(&session, &request).await;
        self.client.release(session).await;

        match scraped {
            Ok(profiles) => {
                let options = ExtractOptions {
                    limit: request.limit,
                    origin: self.origin.clone(),
                };
                let now = Utc::now();
                let list_name = task.kind.target_lead_list_name();
                let leads: Vec<_> = dedupe_profiles(profiles, &options)
                    .into_iter()
                    .map(|profile| profile.into_lead(&task.id, list_name, now))
                    .collect();
                record(&task.id, || self.tasks.complete(&task.id, leads.clone())).await
            }
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Scrape failed");
                self.fail(&task.id, e.to_string()).await
            }
        }
    }

    async fn fail(&self, id: &str, message: String) -> StateResponse<SearchTask> {
        record(id, || self.tasks.fail(id, message.clone())).await
    }
}

/// Write a task outcome, retrying while the store reports transient failures
async fn record<F, Fut>(id: &str, mut write: F) -> StateResponse<SearchTask>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StateResponse<SearchTask>>,
{
    let mut attempt = 1;
    loop {
        match write().await {
            Err(e) if e.is_transient() && attempt < RECORD_ATTEMPTS => {
                warn!(task_id = %id, attempt, error = %e, "Failed to record task outcome, retrying");
                tokio::time::sleep(RECORD_BACKOFF * attempt).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Drives due tasks from `pending`/`queued` to `completed`/`failed`
pub struct Scheduler {
    runner: Runner,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(store: LeadStore, client: Arc<dyn AutomationClient>, config: SchedulerConfig) -> Self {
        debug!(?config, "Scheduler::new: called");
        Self {
            runner: Runner {
                tasks: TaskLifecycleManager::new(store.clone()),
                repo: StateRepository::new(store),
                client,
                origin: config.origin.clone(),
            },
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run until `shutdown_rx` fires
    ///
    /// Interrupted tasks are requeued first. After that the scheduler claims
    /// work on every poll tick and whenever the store commits. A failed claim
    /// is logged and retried on the next tick; only shutdown ends the loop,
    /// and running tasks finish before this returns.
    pub async fn run(&self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        debug!("run: called");
        info!("Scheduler starting");

        let mut events = Some(self.runner.tasks.store().subscribe());
        let requeued = recover(&self.runner.tasks).await?;
        if !requeued.is_empty() {
            info!(count = requeued.len(), "Requeued interrupted tasks");
        }

        let mut in_flight: JoinSet<StateResponse<SearchTask>> = JoinSet::new();
        let mut interval = tokio::time::interval(self.config.poll_interval());

        loop {
            tokio::select! {
                event = recv_event(&mut events) => {
                    if self.handle_store_event(event, &mut events) {
                        self.try_fill(&mut in_flight).await;
                    }
                }

                _ = interval.tick() => {
                    debug!("run: poll tick");
                    self.try_fill(&mut in_flight).await;
                }

                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    report(joined);
                    self.try_fill(&mut in_flight).await;
                }

                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        // Let running scrapes record their outcome
        if !in_flight.is_empty() {
            info!(count = in_flight.len(), "Waiting for running tasks");
        }
        while let Some(joined) = in_flight.join_next().await {
            report(joined);
        }

        info!("Scheduler stopped");
        Ok(())
    }

    /// Claim and run due tasks until none are left
    ///
    /// Returns every task this call finished, in completion order.
    pub async fn run_until_idle(&self) -> Result<Vec<SearchTask>> {
        debug!("run_until_idle: called");
        recover(&self.runner.tasks).await?;

        let mut in_flight: JoinSet<StateResponse<SearchTask>> = JoinSet::new();
        let mut finished = Vec::new();
        loop {
            if let Err(e) = self.fill(&mut in_flight).await {
                warn!(error = %e, "Failed to claim due tasks");
                while let Some(joined) = in_flight.join_next().await {
                    if let Some(task) = report(joined) {
                        finished.push(task);
                    }
                }
                return Err(e.into());
            }
            match in_flight.join_next().await {
                Some(joined) => {
                    if let Some(task) = report(joined) {
                        finished.push(task);
                    }
                }
                None => break,
            }
        }
        Ok(finished)
    }

    /// [`fill`](Self::fill) for the long-running loop: errors are logged
    async fn try_fill(&self, in_flight: &mut JoinSet<StateResponse<SearchTask>>) {
        if let Err(e) = self.fill(in_flight).await {
            warn!(error = %e, in_flight = in_flight.len(), "Failed to claim due tasks, retrying next tick");
        }
    }

    /// Claim as many due tasks as capacity allows and spawn them
    async fn fill(&self, in_flight: &mut JoinSet<StateResponse<SearchTask>>) -> StateResponse<usize> {
        let capacity = self.config.claim_capacity(in_flight.len());
        if capacity == 0 {
            debug!(in_flight = in_flight.len(), "fill: at capacity");
            return Ok(0);
        }

        let claimed = self.runner.tasks.claim_due(Utc::now(), capacity).await?;
        let count = claimed.len();
        for task in claimed {
            info!(task_id = %task.id, name = %task.display_name(), "Starting task");
            in_flight.spawn(self.runner.clone().execute(task));
        }
        Ok(count)
    }

    /// Whether the event should trigger a claim; drops the receiver once closed
    fn handle_store_event(
        &self,
        event: Result<StoreEvent, broadcast::error::RecvError>,
        events: &mut Option<broadcast::Receiver<StoreEvent>>,
    ) -> bool {
        match event {
            Ok(StoreEvent::Committed { revision }) => {
                debug!(revision, "handle_store_event: commit");
                true
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                debug!(n, "handle_store_event: lagged behind");
                true
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!("Store event channel closed, falling back to polling only");
                *events = None;
                false
            }
        }
    }
}

async fn recv_event(
    events: &mut Option<broadcast::Receiver<StoreEvent>>,
) -> Result<StoreEvent, broadcast::error::RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn report(joined: Result<StateResponse<SearchTask>, tokio::task::JoinError>) -> Option<SearchTask> {
    match joined {
        Ok(Ok(task)) => {
            match task.status {
                TaskStatus::Completed => {
                    info!(task_id = %task.id, leads = task.result_lead_ids.len(), "Task completed")
                }
                _ => warn!(task_id = %task.id, status = %task.status, error = ?task.error_message, "Task finished"),
            }
            Some(task)
        }
        Ok(Err(e)) => {
            // Typically the task was deleted while it ran
            warn!(error = %e, "Could not record task outcome");
            None
        }
        Err(e) => {
            error!(error = %e, "Task runner panicked");
            None
        }
    }
}
