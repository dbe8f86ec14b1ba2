//! The persisted aggregate

use serde::{Deserialize, Serialize};

use super::id::ensure_unique_id;
use super::{AutomationSettings, IdealCustomerProfile, LeadRecord, SearchPreset, SearchTask};

/// Everything LeadFlow persists, stored and committed as one unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Document {
    pub profile: IdealCustomerProfile,
    pub presets: Vec<SearchPreset>,
    pub tasks: Vec<SearchTask>,
    pub leads: Vec<LeadRecord>,
    pub settings: AutomationSettings,
}

impl Document {
    pub fn task_index(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    pub fn preset_index(&self, id: &str) -> Option<usize> {
        self.presets.iter().position(|p| p.id == id)
    }

    pub fn lead_index(&self, id: &str) -> Option<usize> {
        self.leads.iter().position(|l| l.id == id)
    }

    /// `candidate` unless a stored task already has it
    pub fn free_task_id(&self, candidate: String, label: &str) -> String {
        ensure_unique_id(candidate, "task", label, |id| self.task_index(id).is_some())
    }

    /// `candidate` unless a stored preset already has it
    pub fn free_preset_id(&self, candidate: String, label: &str) -> String {
        ensure_unique_id(candidate, "preset", label, |id| self.preset_index(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_decodes_to_default() {
        let doc: Document = serde_json::from_str("{}").unwrap();
        assert_eq!(doc, Document::default());
    }

    #[test]
    fn test_partial_settings_merge_over_defaults() {
        let doc: Document = serde_json::from_str(r#"{"settings": {"maxDelayMs": 9000}}"#).unwrap();
        assert_eq!(doc.settings.max_delay_ms, 9000);
        assert_eq!(doc.settings.min_delay_ms, AutomationSettings::default().min_delay_ms);
    }

    #[test]
    fn test_free_task_id_replaces_taken_id() {
        use super::super::{TaskKind, TaskStatus};

        let mut doc = Document::default();
        let task = SearchTask::new(
            TaskKind::sales_navigator("p1"),
            TaskStatus::Draft,
            &AutomationSettings::default(),
            chrono::Utc::now(),
        );
        let taken = task.id.clone();
        doc.tasks.push(task);

        let id = doc.free_task_id(taken.clone(), "sales_navigator");
        assert_ne!(id, taken);
        assert!(doc.task_index(&id).is_none());
        assert_eq!(doc.free_task_id("unused".to_string(), "sales_navigator"), "unused");
    }
}
