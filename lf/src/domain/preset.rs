//! Search presets
//!
//! A preset is a reusable, named search configuration that
//! `sales_navigator` tasks point at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::generate_id;

/// Search filters for a preset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    pub titles: Vec<String>,
    pub locations: Vec<String>,
    pub industries: Vec<String>,
    pub company_sizes: Vec<String>,
    pub seniority: Vec<String>,
    /// Platform-specific filters passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Caller-supplied fields for creating or replacing a preset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewPreset {
    pub name: String,
    pub description: String,
    pub icp_id: Option<String>,
    pub filters: SearchFilters,
    pub page_limit: Option<u32>,
}

impl NewPreset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("preset name must not be empty".to_string());
        }
        if self.page_limit == Some(0) {
            return Err("pageLimit must be at least 1".to_string());
        }
        Ok(())
    }
}

/// A stored search configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPreset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icp_id: Option<String>,
    #[serde(default)]
    pub filters: SearchFilters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_limit: Option<u32>,
}

impl SearchPreset {
    /// Build a fresh preset: id and both timestamps are assigned here
    pub fn create(input: NewPreset, now: DateTime<Utc>) -> Self {
        Self {
            id: generate_id("preset", &input.name),
            name: input.name,
            description: input.description,
            icp_id: input.icp_id,
            filters: input.filters,
            created_at: now,
            updated_at: now,
            last_run_at: None,
            last_result_count: None,
            page_limit: input.page_limit,
        }
    }

    /// Whole-record replacement keeping identity, creation time and run history
    pub fn replace(&self, input: NewPreset, now: DateTime<Utc>) -> Self {
        Self {
            id: self.id.clone(),
            name: input.name,
            description: input.description,
            icp_id: input.icp_id,
            filters: input.filters,
            created_at: self.created_at,
            updated_at: now,
            last_run_at: self.last_run_at,
            last_result_count: self.last_result_count,
            page_limit: input.page_limit,
        }
    }
}
