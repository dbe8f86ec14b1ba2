//! Extracted profiles and the rules every extractor follows
//!
//! Whatever drives the browser, its output goes through
//! [`dedupe_profiles`] before it becomes leads: URLs are normalized,
//! unusable entries are dropped, the first occurrence of a profile wins,
//! and the result is capped at the requested limit.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{LeadRecord, normalize_profile_url};

/// One person as scraped from a results page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtractedProfile {
    pub full_name: String,
    pub profile_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

impl ExtractedProfile {
    pub fn new(full_name: impl Into<String>, profile_url: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            profile_url: profile_url.into(),
            ..Default::default()
        }
    }

    /// Turn into a lead attributed to `task_id`
    pub fn into_lead(self, task_id: &str, list_name: Option<&str>, captured_at: DateTime<Utc>) -> LeadRecord {
        let mut lead = LeadRecord::new(self.full_name, self.profile_url);
        lead.headline = self.headline;
        lead.location = self.location;
        lead.company = self.company;
        lead.source_task_id = Some(task_id.to_string());
        lead.list_name = list_name.map(str::to_string);
        lead.captured_at = captured_at;
        lead
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Keep at most this many profiles
    pub limit: Option<usize>,
    /// Base for resolving relative profile links
    pub origin: Option<String>,
}

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Normalize, filter, dedupe and cap scraped profiles
pub fn dedupe_profiles(profiles: Vec<ExtractedProfile>, options: &ExtractOptions) -> Vec<ExtractedProfile> {
    let limit = options.limit.unwrap_or(usize::MAX);
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept = Vec::new();

    for profile in profiles {
        if kept.len() >= limit {
            break;
        }

        let full_name = profile.full_name.trim().to_string();
        if full_name.is_empty() {
            continue;
        }
        let Some(profile_url) = normalize_profile_url(&profile.profile_url, options.origin.as_deref()) else {
            continue;
        };
        if !seen.insert(profile_url.to_lowercase()) {
            continue;
        }

        kept.push(ExtractedProfile {
            full_name,
            profile_url,
            headline: clean(profile.headline),
            location: clean(profile.location),
            company: clean(profile.company),
        });
    }

    kept
}
