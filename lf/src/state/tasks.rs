//! TaskLifecycleManager - task creation and status transitions
//!
//! Status flow in practice:
//!
//! ```text
//! draft ──schedule──► pending/queued ──claim_due──► running ──► completed
//!   ▲                                                   └─────► failed
//!   └──────────────── update_status(draft) from anywhere
//! ```
//!
//! The manager does not forbid other transitions; `update_status` applies
//! the per-status resets and nothing more.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{
    AccountFollowersPayload, AutomationSettings, Document, LeadRecord, PostEngagementPayload, ProfileScrapePayload,
    SalesNavigatorPayload, SearchTask, TaskKind, TaskPatch, TaskStatus,
};

use super::error::{StateError, StateResponse};
use super::merge::merge_leads;
use super::LeadStore;

/// Number of tasks in each status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub draft: usize,
    pub pending: usize,
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl TaskCounts {
    pub fn total(&self) -> usize {
        self.draft + self.pending + self.queued + self.running + self.completed + self.failed
    }

    fn bump(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Draft => self.draft += 1,
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Queued => self.queued += 1,
            TaskStatus::Running => self.running += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
        }
    }
}

/// Merge `updates` onto `task`, force `status`, then apply that status's resets
///
/// - `draft`: scheduling, timing, error and results are cleared.
/// - `pending`/`queued`: `scheduledFor` becomes the one in `updates`, else
///   the task's current one, else `now`; timing, error and results are
///   cleared.
/// - `running`/`completed`/`failed`: only the merge applies.
pub fn apply_status(task: &mut SearchTask, status: TaskStatus, updates: TaskPatch, now: DateTime<Utc>) {
    let requested_schedule = updates.scheduled_for.flatten();
    let current_schedule = task.scheduled_for;

    updates.apply_to(task);
    task.status = status;

    match status {
        TaskStatus::Draft => {
            task.scheduled_for = None;
            clear_run_fields(task);
        }
        TaskStatus::Pending | TaskStatus::Queued => {
            task.scheduled_for = Some(requested_schedule.or(current_schedule).unwrap_or(now));
            clear_run_fields(task);
        }
        TaskStatus::Running | TaskStatus::Completed | TaskStatus::Failed => {}
    }
}

fn clear_run_fields(task: &mut SearchTask) {
    task.started_at = None;
    task.completed_at = None;
    task.error_message = None;
    task.result_lead_ids.clear();
}

fn not_found(id: &str) -> StateError {
    StateError::NotFound(format!("Task {}", id))
}

/// Trim entries and drop blanks; reject an empty result
fn clean_urls(urls: Vec<String>, what: &str) -> StateResponse<Vec<String>> {
    let cleaned: Vec<String> = urls
        .into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect();
    if cleaned.is_empty() {
        return Err(StateError::Validation(format!("{} must not be empty", what)));
    }
    Ok(cleaned)
}

fn require_preset_id(preset_id: &str) -> StateResponse<String> {
    let trimmed = preset_id.trim();
    if trimmed.is_empty() {
        return Err(StateError::Validation("presetId must not be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

/// Creates tasks and moves them through their lifecycle
#[derive(Clone)]
pub struct TaskLifecycleManager {
    store: LeadStore,
}

impl TaskLifecycleManager {
    pub fn new(store: LeadStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &LeadStore {
        &self.store
    }

    // === Creation ===

    /// New `sales_navigator` task in `draft`
    pub async fn create_draft(
        &self,
        preset_id: &str,
        settings: &AutomationSettings,
        name: Option<String>,
        payload: Option<SalesNavigatorPayload>,
    ) -> StateResponse<SearchTask> {
        debug!(%preset_id, ?name, "create_draft: called");
        let preset_id = require_preset_id(preset_id)?;
        let kind = TaskKind::SalesNavigator {
            preset_id: Some(preset_id),
            payload: payload.unwrap_or_default(),
        };
        self.insert(kind, TaskStatus::Draft, settings, name, None).await
    }

    /// New `account_followers` task in `draft`
    pub async fn create_accounts_task(
        &self,
        mut payload: AccountFollowersPayload,
        settings: &AutomationSettings,
        name: Option<String>,
    ) -> StateResponse<SearchTask> {
        debug!(count = payload.account_urls.len(), "create_accounts_task: called");
        payload.account_urls = clean_urls(payload.account_urls, "accountUrls")?;
        self.insert(TaskKind::AccountFollowers(payload), TaskStatus::Draft, settings, name, None)
            .await
    }

    /// New `post_engagement` task in `draft`
    pub async fn create_post_task(
        &self,
        mut payload: PostEngagementPayload,
        settings: &AutomationSettings,
        name: Option<String>,
    ) -> StateResponse<SearchTask> {
        debug!(count = payload.post_urls.len(), "create_post_task: called");
        payload.post_urls = clean_urls(payload.post_urls, "postUrls")?;
        if !payload.scrape_reactions && !payload.scrape_commenters {
            return Err(StateError::Validation(
                "post task must scrape reactions, commenters, or both".to_string(),
            ));
        }
        self.insert(TaskKind::PostEngagement(payload), TaskStatus::Draft, settings, name, None)
            .await
    }

    /// New `profile_scrape` task in `draft`
    pub async fn create_profile_task(
        &self,
        mut payload: ProfileScrapePayload,
        settings: &AutomationSettings,
        name: Option<String>,
    ) -> StateResponse<SearchTask> {
        debug!(count = payload.profile_urls.len(), "create_profile_task: called");
        payload.profile_urls = clean_urls(payload.profile_urls, "profileUrls")?;
        self.insert(TaskKind::ProfileScrape(payload), TaskStatus::Draft, settings, name, None)
            .await
    }

    /// New `sales_navigator` task directly in `pending`
    pub async fn queue(
        &self,
        preset_id: &str,
        settings: &AutomationSettings,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> StateResponse<SearchTask> {
        debug!(%preset_id, ?scheduled_for, "queue: called");
        let preset_id = require_preset_id(preset_id)?;
        let scheduled_for = scheduled_for.unwrap_or_else(Utc::now);
        let task = self
            .insert(
                TaskKind::sales_navigator(preset_id),
                TaskStatus::Pending,
                settings,
                None,
                Some(scheduled_for),
            )
            .await?;
        info!(task_id = %task.id, %scheduled_for, "Queued task");
        Ok(task)
    }

    async fn insert(
        &self,
        kind: TaskKind,
        status: TaskStatus,
        settings: &AutomationSettings,
        name: Option<String>,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> StateResponse<SearchTask> {
        // Snapshot taken here, by value: later edits to the live settings
        // never reach this task
        let snapshot = settings.clone();
        let task = self
            .store
            .update(move |mut doc: Document| {
                if let Some(preset_id) = kind.preset_id()
                    && doc.preset_index(preset_id).is_none()
                {
                    return Err(StateError::NotFound(format!("Preset {}", preset_id)));
                }

                let mut task = SearchTask::new(kind, status, &snapshot, Utc::now());
                let label = task.task_type();
                task.id = doc.free_task_id(std::mem::take(&mut task.id), label.as_str());
                task.name = name.or_else(|| task.task_type().default_name().map(str::to_string));
                task.scheduled_for = scheduled_for;
                doc.tasks.push(task.clone());
                Ok((doc, task))
            })
            .await?;
        info!(task_id = %task.id, task_type = %task.task_type(), status = %task.status, "Created task");
        Ok(task)
    }

    // === Reads ===

    pub async fn list(&self) -> StateResponse<Vec<SearchTask>> {
        debug!("list: called");
        Ok(self.store.view(|doc: &Document| doc.tasks.clone()).await?)
    }

    pub async fn list_by_status(&self, status: TaskStatus) -> StateResponse<Vec<SearchTask>> {
        debug!(%status, "list_by_status: called");
        Ok(self
            .store
            .view(move |doc: &Document| doc.tasks.iter().filter(|t| t.status == status).cloned().collect())
            .await?)
    }

    pub async fn get(&self, id: &str) -> StateResponse<Option<SearchTask>> {
        debug!(%id, "get: called");
        let id = id.to_string();
        Ok(self
            .store
            .view(move |doc: &Document| doc.tasks.iter().find(|t| t.id == id).cloned())
            .await?)
    }

    /// Get a task by ID, returning error if not found
    pub async fn get_required(&self, id: &str) -> StateResponse<SearchTask> {
        self.get(id).await?.ok_or_else(|| not_found(id))
    }

    pub async fn counts(&self) -> StateResponse<TaskCounts> {
        debug!("counts: called");
        Ok(self
            .store
            .view(|doc: &Document| {
                let mut counts = TaskCounts::default();
                for task in &doc.tasks {
                    counts.bump(task.status);
                }
                counts
            })
            .await?)
    }

    // === Mutation ===

    /// Shallow-merge `patch` onto the task. No status side effects.
    pub async fn update(&self, id: &str, patch: TaskPatch) -> StateResponse<SearchTask> {
        debug!(%id, ?patch, "update: called");
        let id = id.to_string();
        self.store
            .update(move |mut doc: Document| {
                let idx = doc.task_index(&id).ok_or_else(|| not_found(&id))?;
                patch.apply_to(&mut doc.tasks[idx]);
                let task = doc.tasks[idx].clone();
                Ok::<_, StateError>((doc, task))
            })
            .await
    }

    /// Merge `updates`, force `status`, apply that status's resets
    pub async fn update_status(&self, id: &str, status: TaskStatus, updates: TaskPatch) -> StateResponse<SearchTask> {
        debug!(%id, %status, "update_status: called");
        let id = id.to_string();
        let task = self
            .store
            .update(move |mut doc: Document| {
                let idx = doc.task_index(&id).ok_or_else(|| not_found(&id))?;
                apply_status(&mut doc.tasks[idx], status, updates, Utc::now());
                let task = doc.tasks[idx].clone();
                Ok::<_, StateError>((doc, task))
            })
            .await?;
        info!(task_id = %task.id, status = %task.status, "Task status changed");
        Ok(task)
    }

    /// Move a task to `pending`, at `at` or now
    pub async fn schedule(&self, id: &str, at: Option<DateTime<Utc>>) -> StateResponse<SearchTask> {
        debug!(%id, ?at, "schedule: called");
        let updates = match at {
            Some(at) => TaskPatch::new().scheduled_for(at),
            None => TaskPatch::new(),
        };
        self.update_status(id, TaskStatus::Pending, updates).await
    }

    /// Remove a task; absent ids are a no-op. Returns whether it existed.
    pub async fn delete(&self, id: &str) -> StateResponse<bool> {
        debug!(%id, "delete: called");
        let id = id.to_string();
        self.store
            .maybe_update(move |mut doc: Document| match doc.task_index(&id) {
                Some(idx) => {
                    doc.tasks.remove(idx);
                    Ok::<_, StateError>((Some(doc), true))
                }
                None => Ok((None, false)),
            })
            .await
    }

    // === Scheduler hooks ===

    /// Claim up to `limit` due tasks, flipping them to `running`
    ///
    /// Oldest `scheduledFor` first. Tasks come back already running with
    /// `startedAt = now`.
    pub async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> StateResponse<Vec<SearchTask>> {
        debug!(%now, limit, "claim_due: called");
        self.store
            .maybe_update(move |mut doc: Document| {
                let mut due: Vec<usize> = doc
                    .tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.is_due(now))
                    .map(|(i, _)| i)
                    .collect();
                if due.is_empty() || limit == 0 {
                    return Ok::<_, StateError>((None, Vec::new()));
                }

                due.sort_by_key(|&i| (doc.tasks[i].scheduled_for.unwrap_or(doc.tasks[i].created_at), i));
                due.truncate(limit);

                let mut claimed = Vec::with_capacity(due.len());
                for i in due {
                    apply_status(&mut doc.tasks[i], TaskStatus::Running, TaskPatch::new().started_at(now), now);
                    claimed.push(doc.tasks[i].clone());
                }
                debug!(count = claimed.len(), "claim_due: claimed");
                Ok((Some(doc), claimed))
            })
            .await
    }

    /// Record a successful run in one transaction
    ///
    /// Leads are merged like `append_leads`, tagged with the task id and
    /// its target list. The task becomes `completed` with `resultLeadIds`
    /// pointing at the stored leads. A sales navigator task also stamps its
    /// preset's last run.
    pub async fn complete(&self, id: &str, leads: Vec<LeadRecord>) -> StateResponse<SearchTask> {
        debug!(%id, count = leads.len(), "complete: called");
        let id = id.to_string();
        let task = self
            .store
            .update(move |mut doc: Document| {
                let idx = doc.task_index(&id).ok_or_else(|| not_found(&id))?;
                let now = Utc::now();
                let list_name = doc.tasks[idx].kind.target_lead_list_name().map(str::to_string);

                let leads: Vec<LeadRecord> = leads
                    .into_iter()
                    .map(|mut lead| {
                        lead.source_task_id.get_or_insert_with(|| id.clone());
                        if lead.list_name.is_none() {
                            lead.list_name = list_name.clone();
                        }
                        lead
                    })
                    .collect();
                doc.leads = merge_leads(std::mem::take(&mut doc.leads), &leads);

                let mut result_ids: Vec<String> = Vec::with_capacity(leads.len());
                for lead in &leads {
                    let key = lead.dedupe_key();
                    if let Some(stored) = doc.leads.iter().find(|l| l.dedupe_key() == key)
                        && !result_ids.contains(&stored.id)
                    {
                        result_ids.push(stored.id.clone());
                    }
                }

                let result_count = result_ids.len();
                let updates = TaskPatch {
                    error_message: Some(None),
                    ..TaskPatch::new().completed_at(now).result_lead_ids(result_ids)
                };
                apply_status(&mut doc.tasks[idx], TaskStatus::Completed, updates, now);

                if let Some(preset_id) = doc.tasks[idx].kind.preset_id().map(str::to_string)
                    && let Some(preset) = doc.presets.iter_mut().find(|p| p.id == preset_id)
                {
                    preset.last_run_at = Some(now);
                    preset.last_result_count = Some(u64::try_from(result_count).unwrap_or(u64::MAX));
                }

                let task = doc.tasks[idx].clone();
                Ok::<_, StateError>((doc, task))
            })
            .await?;
        info!(task_id = %task.id, leads = task.result_lead_ids.len(), "Task completed");
        Ok(task)
    }

    /// Mark a task `failed` with `message`
    pub async fn fail(&self, id: &str, message: impl Into<String>) -> StateResponse<SearchTask> {
        let message = message.into();
        debug!(%id, %message, "fail: called");
        let updates = TaskPatch::new().error_message(message).completed_at(Utc::now());
        self.update_status(id, TaskStatus::Failed, updates).await
    }
}
