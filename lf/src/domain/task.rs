//! SearchTask domain type
//!
//! A task is a unit of automation work. Its type-specific inputs live in
//! [`TaskKind`], a tagged union: each variant carries exactly the fields
//! that kind of scrape needs.
//!
//! On disk a task is a flat record with `type`, `presetId` and a loose
//! `payload` object. Decoding normalizes it on every read: a missing
//! `type` means `sales_navigator` and a missing `payload` means the
//! variant's empty payload.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::id::generate_id;
use super::settings::AutomationSettings;

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet scheduled
    Draft,
    /// Scheduled, waiting for its `scheduledFor` time
    Pending,
    /// Scheduled; handled exactly like `Pending`
    Queued,
    /// Claimed by the scheduler, automation in progress
    Running,
    /// Automation finished and results were recorded
    Completed,
    /// Automation reported a failure
    Failed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Draft,
        TaskStatus::Pending,
        TaskStatus::Queued,
        TaskStatus::Running,
        TaskStatus::Completed,
        TaskStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Statuses the scheduler picks up once `scheduledFor` has passed
    pub fn is_due_state(&self) -> bool {
        matches!(self, Self::Pending | Self::Queued)
    }

    /// Conventionally final. Nothing enforces it.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown task status: {}", s))
    }
}

/// Task type discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    #[default]
    SalesNavigator,
    AccountFollowers,
    PostEngagement,
    ProfileScrape,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SalesNavigator => "sales_navigator",
            Self::AccountFollowers => "account_followers",
            Self::PostEngagement => "post_engagement",
            Self::ProfileScrape => "profile_scrape",
        }
    }

    /// Name given to a task of this type when the caller supplies none
    pub fn default_name(&self) -> Option<&'static str> {
        match self {
            Self::SalesNavigator => None,
            Self::AccountFollowers => Some("Account Followers"),
            Self::PostEngagement => Some("Post Engagement"),
            Self::ProfileScrape => Some("Profile List"),
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SalesNavigatorPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_lead_list_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccountFollowersPayload {
    pub account_urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_lead_list_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PostEngagementPayload {
    pub post_urls: Vec<String>,
    pub scrape_reactions: bool,
    pub scrape_commenters: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_lead_list_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileScrapePayload {
    pub profile_urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_lead_list_name: Option<String>,
}

/// Type-specific task inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    SalesNavigator {
        preset_id: Option<String>,
        payload: SalesNavigatorPayload,
    },
    AccountFollowers(AccountFollowersPayload),
    PostEngagement(PostEngagementPayload),
    ProfileScrape(ProfileScrapePayload),
}

impl TaskKind {
    pub fn sales_navigator(preset_id: impl Into<String>) -> Self {
        Self::SalesNavigator {
            preset_id: Some(preset_id.into()),
            payload: SalesNavigatorPayload::default(),
        }
    }

    pub fn task_type(&self) -> TaskType {
        match self {
            Self::SalesNavigator { .. } => TaskType::SalesNavigator,
            Self::AccountFollowers(_) => TaskType::AccountFollowers,
            Self::PostEngagement(_) => TaskType::PostEngagement,
            Self::ProfileScrape(_) => TaskType::ProfileScrape,
        }
    }

    pub fn preset_id(&self) -> Option<&str> {
        match self {
            Self::SalesNavigator { preset_id, .. } => preset_id.as_deref(),
            _ => None,
        }
    }

    pub fn target_lead_list_name(&self) -> Option<&str> {
        match self {
            Self::SalesNavigator { payload, .. } => payload.target_lead_list_name.as_deref(),
            Self::AccountFollowers(p) => p.target_lead_list_name.as_deref(),
            Self::PostEngagement(p) => p.target_lead_list_name.as_deref(),
            Self::ProfileScrape(p) => p.target_lead_list_name.as_deref(),
        }
    }

    /// Input URLs for URL-driven task kinds (empty for sales navigator)
    pub fn urls(&self) -> &[String] {
        match self {
            Self::SalesNavigator { .. } => &[],
            Self::AccountFollowers(p) => &p.account_urls,
            Self::PostEngagement(p) => &p.post_urls,
            Self::ProfileScrape(p) => &p.profile_urls,
        }
    }

    fn payload_value(&self) -> Value {
        let encoded = match self {
            Self::SalesNavigator { payload, .. } => serde_json::to_value(payload),
            Self::AccountFollowers(p) => serde_json::to_value(p),
            Self::PostEngagement(p) => serde_json::to_value(p),
            Self::ProfileScrape(p) => serde_json::to_value(p),
        };
        encoded.unwrap_or_default()
    }
}

/// A unit of automation work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TaskRecord", into = "TaskRecord")]
pub struct SearchTask {
    pub id: String,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub result_lead_ids: Vec<String>,
    /// Copy of the live settings taken at creation; never follows later edits
    pub settings_snapshot: AutomationSettings,
}

impl SearchTask {
    /// Create a task with a generated ID and empty scheduling fields
    pub fn new(kind: TaskKind, status: TaskStatus, settings: &AutomationSettings, now: DateTime<Utc>) -> Self {
        let task_type = kind.task_type();
        Self {
            id: generate_id("task", task_type.as_str()),
            kind,
            status,
            name: None,
            created_at: now,
            scheduled_for: None,
            started_at: None,
            completed_at: None,
            error_message: None,
            result_lead_ids: Vec::new(),
            settings_snapshot: settings.clone(),
        }
    }

    pub fn task_type(&self) -> TaskType {
        self.kind.task_type()
    }

    /// Display name, falling back to the type's default name
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.task_type().default_name().map(str::to_string))
            .unwrap_or_else(|| self.task_type().to_string())
    }

    /// Due when waiting in a due state and `scheduledFor` has passed
    ///
    /// A waiting task without `scheduledFor` counts as due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status.is_due_state() && self.scheduled_for.is_none_or(|at| at <= now)
    }
}

/// Shallow patch over a task
///
/// `None` leaves a field alone. For optional fields, `Some(None)` clears
/// the field. Identity, creation time and the settings snapshot are not
/// patchable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub name: Option<Option<String>>,
    pub kind: Option<TaskKind>,
    pub status: Option<TaskStatus>,
    pub scheduled_for: Option<Option<DateTime<Utc>>>,
    pub started_at: Option<Option<DateTime<Utc>>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub error_message: Option<Option<String>>,
    pub result_lead_ids: Option<Vec<String>>,
}

impl TaskPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(Some(name.into()));
        self
    }

    pub fn kind(mut self, kind: TaskKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(Some(at));
        self
    }

    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(Some(at));
        self
    }

    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(Some(at));
        self
    }

    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(Some(message.into()));
        self
    }

    pub fn result_lead_ids(mut self, ids: Vec<String>) -> Self {
        self.result_lead_ids = Some(ids);
        self
    }

    /// Merge this patch onto `task`
    pub fn apply_to(self, task: &mut SearchTask) {
        if let Some(name) = self.name {
            task.name = name;
        }
        if let Some(kind) = self.kind {
            task.kind = kind;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(at) = self.scheduled_for {
            task.scheduled_for = at;
        }
        if let Some(at) = self.started_at {
            task.started_at = at;
        }
        if let Some(at) = self.completed_at {
            task.completed_at = at;
        }
        if let Some(message) = self.error_message {
            task.error_message = message;
        }
        if let Some(ids) = self.result_lead_ids {
            task.result_lead_ids = ids;
        }
    }
}

/// Flat on-disk shape of a task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskRecord {
    id: String,
    #[serde(rename = "type", default)]
    task_type: Option<TaskType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preset_id: Option<String>,
    status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scheduled_for: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(default)]
    result_lead_ids: Vec<String>,
    #[serde(default)]
    settings_snapshot: AutomationSettings,
    #[serde(default)]
    payload: Option<Value>,
}

fn decode_payload<T: DeserializeOwned + Default>(task_type: TaskType, payload: Option<Value>) -> Result<T, String> {
    match payload {
        Some(Value::Null) | None => Ok(T::default()),
        Some(value) => serde_json::from_value(value).map_err(|e| format!("invalid {} payload: {}", task_type, e)),
    }
}

impl TryFrom<TaskRecord> for SearchTask {
    type Error = String;

    fn try_from(record: TaskRecord) -> Result<Self, Self::Error> {
        let task_type = record.task_type.unwrap_or_default();
        let kind = match task_type {
            TaskType::SalesNavigator => TaskKind::SalesNavigator {
                preset_id: record.preset_id,
                payload: decode_payload(task_type, record.payload)?,
            },
            TaskType::AccountFollowers => TaskKind::AccountFollowers(decode_payload(task_type, record.payload)?),
            TaskType::PostEngagement => TaskKind::PostEngagement(decode_payload(task_type, record.payload)?),
            TaskType::ProfileScrape => TaskKind::ProfileScrape(decode_payload(task_type, record.payload)?),
        };

        Ok(Self {
            id: record.id,
            kind,
            status: record.status,
            name: record.name,
            created_at: record.created_at,
            scheduled_for: record.scheduled_for,
            started_at: record.started_at,
            completed_at: record.completed_at,
            error_message: record.error_message,
            result_lead_ids: record.result_lead_ids,
            settings_snapshot: record.settings_snapshot,
        })
    }
}

impl From<SearchTask> for TaskRecord {
    fn from(task: SearchTask) -> Self {
        Self {
            id: task.id,
            task_type: Some(task.kind.task_type()),
            preset_id: task.kind.preset_id().map(str::to_string),
            status: task.status,
            name: task.name,
            created_at: task.created_at,
            scheduled_for: task.scheduled_for,
            started_at: task.started_at,
            completed_at: task.completed_at,
            error_message: task.error_message,
            result_lead_ids: task.result_lead_ids,
            settings_snapshot: task.settings_snapshot,
            payload: Some(task.kind.payload_value()),
        }
    }
}
