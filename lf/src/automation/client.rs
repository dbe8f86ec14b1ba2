//! AutomationClient trait definition

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AutomationSettings, SearchFilters, SearchPreset, SearchTask, TaskKind, TaskType};

use super::{AutomationError, ExtractedProfile};

/// Profiles on one sales navigator results page
pub const RESULTS_PER_PAGE: usize = 25;

/// A live browser session opened from a settings snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub settings: AutomationSettings,
    pub opened_at: DateTime<Utc>,
}

impl Session {
    pub fn open(settings: &AutomationSettings) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            settings: settings.clone(),
            opened_at: Utc::now(),
        }
    }
}

/// What to scrape for one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRequest {
    pub task_id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<SearchFilters>,
    #[serde(default)]
    pub scrape_reactions: bool,
    #[serde(default)]
    pub scrape_commenters: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl ScrapeRequest {
    /// Build the request for `task`; sales navigator tasks need their preset
    pub fn for_task(task: &SearchTask, preset: Option<&SearchPreset>) -> Self {
        let (scrape_reactions, scrape_commenters) = match &task.kind {
            TaskKind::PostEngagement(p) => (p.scrape_reactions, p.scrape_commenters),
            _ => (false, false),
        };
        let (filters, limit) = match (&task.kind, preset) {
            (TaskKind::SalesNavigator { .. }, Some(preset)) => (
                Some(preset.filters.clone()),
                preset.page_limit.map(|pages| pages as usize * RESULTS_PER_PAGE),
            ),
            _ => (None, None),
        };

        Self {
            task_id: task.id.clone(),
            task_type: task.task_type(),
            urls: task.kind.urls().to_vec(),
            filters,
            scrape_reactions,
            scrape_commenters,
            limit,
        }
    }
}

/// Drives a browser on behalf of the scheduler
///
/// Each call works from the settings snapshot it is handed; a client
/// never reads the live settings.
#[async_trait]
pub trait AutomationClient: Send + Sync {
    /// Open a session for one task run
    async fn acquire(&self, settings: &AutomationSettings) -> Result<Session, AutomationError>;

    /// Run the scrape and return raw profiles
    async fn scrape(&self, session: &Session, request: &ScrapeRequest) -> Result<Vec<ExtractedProfile>, AutomationError>;

    /// Close the session; called whether or not the scrape succeeded
    async fn release(&self, session: Session);
}
