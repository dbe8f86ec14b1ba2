//! Automation settings
//!
//! One live copy sits in the document. Tasks carry their own clone taken
//! when they are created or queued.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Browser automation settings
///
/// Every field has a default, so a partially stored record reads back
/// merged over the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AutomationSettings {
    /// Run the browser without a visible window
    pub headless: bool,

    /// Path to the browser executable (empty = let the client decide)
    pub executable_path: String,

    /// Persistent browser profile directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data_dir: Option<String>,

    /// Session credential (cookie value) for the target platform
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_cookie: Option<String>,

    /// Minimum delay between actions in milliseconds
    pub min_delay_ms: u64,

    /// Maximum delay between actions in milliseconds
    pub max_delay_ms: u64,

    /// Pick a random delay in [min, max] instead of always using min
    pub randomize_delay: bool,
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self {
            headless: true,
            executable_path: String::new(),
            user_data_dir: None,
            session_cookie: None,
            min_delay_ms: 2_000,
            max_delay_ms: 5_000,
            randomize_delay: true,
        }
    }
}

impl AutomationSettings {
    /// Check the settings are usable
    pub fn validate(&self) -> Result<(), String> {
        if self.min_delay_ms > self.max_delay_ms {
            return Err(format!(
                "minDelayMs ({}) must not exceed maxDelayMs ({})",
                self.min_delay_ms, self.max_delay_ms
            ));
        }
        Ok(())
    }

    /// Delay to wait before the next action
    pub fn pace_delay(&self) -> Duration {
        let ms = if self.randomize_delay && self.max_delay_ms > self.min_delay_ms {
            rand::rng().random_range(self.min_delay_ms..=self.max_delay_ms)
        } else {
            self.min_delay_ms
        };
        Duration::from_millis(ms)
    }

    /// Copy safe to print: the session credential is masked
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.session_cookie.is_some() {
            copy.session_cookie = Some("********".to_string());
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_record_merges_over_defaults() {
        let settings: AutomationSettings = serde_json::from_str(r#"{"headless": false}"#).unwrap();
        assert!(!settings.headless);
        assert_eq!(settings.min_delay_ms, 2_000);
        assert_eq!(settings.max_delay_ms, 5_000);
        assert!(settings.randomize_delay);
    }

    #[test]
    fn test_validate_rejects_inverted_delays() {
        let settings = AutomationSettings {
            min_delay_ms: 10,
            max_delay_ms: 5,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
        assert!(AutomationSettings::default().validate().is_ok());
    }

    #[test]
    fn test_pace_delay_within_bounds() {
        let settings = AutomationSettings {
            min_delay_ms: 100,
            max_delay_ms: 200,
            randomize_delay: true,
            ..Default::default()
        };
        for _ in 0..50 {
            let d = settings.pace_delay();
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(200));
        }
    }

    #[test]
    fn test_pace_delay_fixed_when_not_randomized() {
        let settings = AutomationSettings {
            min_delay_ms: 150,
            max_delay_ms: 900,
            randomize_delay: false,
            ..Default::default()
        };
        assert_eq!(settings.pace_delay(), Duration::from_millis(150));
    }

    #[test]
    fn test_redacted_masks_cookie() {
        let settings = AutomationSettings {
            session_cookie: Some("secret".to_string()),
            ..Default::default()
        };
        assert_eq!(settings.redacted().session_cookie.as_deref(), Some("********"));
        assert_eq!(settings.session_cookie.as_deref(), Some("secret"));
    }
}
