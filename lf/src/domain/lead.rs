//! Lead records
//!
//! A lead is a contact discovered by a task. The profile URL is the
//! business key: two records whose URLs match case-insensitively are the
//! same lead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::id::generate_id;

/// Email enrichment state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    #[default]
    None,
    Pending,
    Resolved,
    NotFound,
}

/// A discovered contact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadRecord {
    pub id: String,
    pub profile_url: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub email_status: EmailStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_name: Option<String>,
    #[serde(default = "Utc::now")]
    pub captured_at: DateTime<Utc>,
}

impl LeadRecord {
    /// Create a lead with a generated ID
    pub fn new(full_name: impl Into<String>, profile_url: impl Into<String>) -> Self {
        let full_name = full_name.into();
        Self {
            id: generate_id("lead", &full_name),
            profile_url: profile_url.into(),
            full_name,
            headline: None,
            location: None,
            company: None,
            title: None,
            email: None,
            email_status: EmailStatus::None,
            source_task_id: None,
            list_name: None,
            captured_at: Utc::now(),
        }
    }

    /// Create with a specific ID (for tests and imports)
    pub fn with_id(id: impl Into<String>, full_name: impl Into<String>, profile_url: impl Into<String>) -> Self {
        let mut lead = Self::new(full_name, profile_url);
        lead.id = id.into();
        lead
    }

    pub fn with_headline(mut self, headline: impl Into<String>) -> Self {
        self.headline = Some(headline.into());
        self
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Deduplication key: the profile URL, lowercased
    pub fn dedupe_key(&self) -> String {
        self.profile_url.to_lowercase()
    }
}

/// Canonical form of a profile URL
///
/// Relative URLs are resolved against `origin`. Query string, fragment and
/// trailing slashes are dropped. Returns `None` for anything that is not an
/// http(s) URL.
pub fn normalize_profile_url(raw: &str, origin: Option<&str>) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let mut url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse(origin?).ok()?;
            base.join(raw).ok()?
        }
        Err(_) => return None,
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    url.set_query(None);
    url.set_fragment(None);
    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(&path);

    let mut normalized = url.to_string();
    while normalized.ends_with('/') {
        normalized.pop();
    }
    Some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_key_is_case_insensitive() {
        let a = LeadRecord::new("A", "https://example.com/in/Alice");
        let b = LeadRecord::new("B", "HTTPS://EXAMPLE.COM/IN/ALICE");
        assert_eq!(a.dedupe_key(), b.dedupe_key());
    }

    #[test]
    fn test_normalize_strips_query_fragment_and_slash() {
        assert_eq!(
            normalize_profile_url("https://www.example.com/in/jane-doe/?miniProfile=1#top", None).as_deref(),
            Some("https://www.example.com/in/jane-doe")
        );
    }

    #[test]
    fn test_normalize_resolves_relative_against_origin() {
        assert_eq!(
            normalize_profile_url("/in/jane-doe/", Some("https://www.example.com")).as_deref(),
            Some("https://www.example.com/in/jane-doe")
        );
        assert_eq!(normalize_profile_url("/in/jane-doe/", None), None);
    }

    #[test]
    fn test_normalize_rejects_non_http() {
        assert_eq!(normalize_profile_url("javascript:void(0)", None), None);
        assert_eq!(normalize_profile_url("   ", None), None);
    }

    #[test]
    fn test_missing_optional_fields_decode() {
        let lead: LeadRecord =
            serde_json::from_str(r#"{"id":"x","profileUrl":"https://e.com/in/x","fullName":"X"}"#).unwrap();
        assert_eq!(lead.email_status, EmailStatus::None);
        assert!(lead.headline.is_none());
    }
}
