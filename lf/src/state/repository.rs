//! StateRepository - typed operations over the lead document
//!
//! Each method is one serialized store transaction. Reads go through
//! `view`, mutations through `update`/`maybe_update`; nothing here keeps a
//! document around between calls.

use chrono::Utc;
use tracing::{debug, info};

use crate::domain::{
    AutomationSettings, Document, IdealCustomerProfile, LeadRecord, NewPreset, SearchPreset, SearchTask,
};

use super::error::{StateError, StateResponse};
use super::merge::merge_leads;
use super::LeadStore;

/// Typed access to profile, presets, tasks, leads and settings
#[derive(Clone)]
pub struct StateRepository {
    store: LeadStore,
}

impl StateRepository {
    pub fn new(store: LeadStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &LeadStore {
        &self.store
    }

    // === Ideal customer profile ===

    pub async fn get_profile(&self) -> StateResponse<IdealCustomerProfile> {
        debug!("get_profile: called");
        Ok(self.store.view(|doc: &Document| doc.profile.clone()).await?)
    }

    /// Replace the profile, stamping `updatedAt`
    pub async fn save_profile(&self, mut profile: IdealCustomerProfile) -> StateResponse<IdealCustomerProfile> {
        debug!(profile_id = %profile.id, "save_profile: called");
        self.store
            .update(move |mut doc: Document| {
                profile.updated_at = Some(Utc::now());
                doc.profile = profile.clone();
                Ok::<_, StateError>((doc, profile))
            })
            .await
    }

    // === Search presets ===

    pub async fn list_presets(&self) -> StateResponse<Vec<SearchPreset>> {
        debug!("list_presets: called");
        Ok(self.store.view(|doc: &Document| doc.presets.clone()).await?)
    }

    pub async fn find_preset(&self, id: &str) -> StateResponse<Option<SearchPreset>> {
        debug!(%id, "find_preset: called");
        let id = id.to_string();
        Ok(self
            .store
            .view(move |doc: &Document| doc.presets.iter().find(|p| p.id == id).cloned())
            .await?)
    }

    pub async fn create_preset(&self, input: NewPreset) -> StateResponse<SearchPreset> {
        debug!(name = %input.name, "create_preset: called");
        input.validate().map_err(StateError::Validation)?;

        let preset = self
            .store
            .update(move |mut doc: Document| {
                let mut preset = SearchPreset::create(input, Utc::now());
                preset.id = doc.free_preset_id(preset.id, &preset.name);
                doc.presets.push(preset.clone());
                Ok::<_, StateError>((doc, preset))
            })
            .await?;
        info!(preset_id = %preset.id, name = %preset.name, "Created preset");
        Ok(preset)
    }

    /// Whole-record replacement; id, creation time and run history are kept
    pub async fn update_preset(&self, id: &str, input: NewPreset) -> StateResponse<SearchPreset> {
        debug!(%id, "update_preset: called");
        input.validate().map_err(StateError::Validation)?;

        let id = id.to_string();
        self.store
            .update(move |mut doc: Document| {
                let idx = doc
                    .preset_index(&id)
                    .ok_or_else(|| StateError::NotFound(format!("Preset {}", id)))?;
                let replaced = doc.presets[idx].replace(input, Utc::now());
                doc.presets[idx] = replaced.clone();
                Ok((doc, replaced))
            })
            .await
    }

    pub async fn delete_preset(&self, id: &str) -> StateResponse<()> {
        debug!(%id, "delete_preset: called");
        let id = id.to_string();
        self.store
            .update(move |mut doc: Document| {
                let idx = doc
                    .preset_index(&id)
                    .ok_or_else(|| StateError::NotFound(format!("Preset {}", id)))?;
                doc.presets.remove(idx);
                Ok((doc, ()))
            })
            .await
    }

    // === Tasks ===

    pub async fn list_tasks(&self) -> StateResponse<Vec<SearchTask>> {
        debug!("list_tasks: called");
        Ok(self.store.view(|doc: &Document| doc.tasks.clone()).await?)
    }

    pub async fn find_task(&self, id: &str) -> StateResponse<Option<SearchTask>> {
        debug!(%id, "find_task: called");
        let id = id.to_string();
        Ok(self
            .store
            .view(move |doc: &Document| doc.tasks.iter().find(|t| t.id == id).cloned())
            .await?)
    }

    /// Insert or replace a task by id
    pub async fn save_task(&self, task: SearchTask) -> StateResponse<SearchTask> {
        debug!(task_id = %task.id, status = %task.status, "save_task: called");
        self.store
            .update(move |mut doc: Document| {
                match doc.task_index(&task.id) {
                    Some(idx) => doc.tasks[idx] = task.clone(),
                    None => doc.tasks.push(task.clone()),
                }
                Ok::<_, StateError>((doc, task))
            })
            .await
    }

    /// Remove a task; returns whether it existed
    pub async fn delete_task(&self, id: &str) -> StateResponse<bool> {
        debug!(%id, "delete_task: called");
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

    // === Leads ===

    /// Merge `leads` into the stored leads and return the input unchanged
    pub async fn append_leads(&self, leads: Vec<LeadRecord>) -> StateResponse<Vec<LeadRecord>> {
        debug!(count = leads.len(), "append_leads: called");
        self.store
            .update(move |mut doc: Document| {
                doc.leads = merge_leads(std::mem::take(&mut doc.leads), &leads);
                debug!(total = doc.leads.len(), "append_leads: merged");
                Ok::<_, StateError>((doc, leads))
            })
            .await
    }

    pub async fn list_leads(&self) -> StateResponse<Vec<LeadRecord>> {
        debug!("list_leads: called");
        Ok(self.store.view(|doc: &Document| doc.leads.clone()).await?)
    }

    /// A window of the ordered lead sequence
    pub async fn list_leads_page(&self, offset: usize, limit: usize) -> StateResponse<Vec<LeadRecord>> {
        debug!(offset, limit, "list_leads_page: called");
        Ok(self
            .store
            .view(move |doc: &Document| doc.leads.iter().skip(offset).take(limit).cloned().collect())
            .await?)
    }

    pub async fn count_leads(&self) -> StateResponse<usize> {
        Ok(self.store.view(|doc: &Document| doc.leads.len()).await?)
    }

    /// Replace one lead in place with `updater(lead)`; the id cannot change
    pub async fn update_lead<F>(&self, id: &str, updater: F) -> StateResponse<LeadRecord>
    where
        F: FnOnce(LeadRecord) -> LeadRecord + Send + 'static,
    {
        debug!(%id, "update_lead: called");
        let id = id.to_string();
        self.store
            .update(move |mut doc: Document| {
                let idx = doc
                    .lead_index(&id)
                    .ok_or_else(|| StateError::NotFound(format!("Lead {}", id)))?;
                let mut updated = updater(doc.leads[idx].clone());
                updated.id = id;
                doc.leads[idx] = updated.clone();
                Ok((doc, updated))
            })
            .await
    }

    // === Automation settings ===

    pub async fn get_settings(&self) -> StateResponse<AutomationSettings> {
        debug!("get_settings: called");
        Ok(self.store.view(|doc: &Document| doc.settings.clone()).await?)
    }

    pub async fn save_settings(&self, settings: AutomationSettings) -> StateResponse<AutomationSettings> {
        debug!("save_settings: called");
        settings.validate().map_err(StateError::Validation)?;
        self.store
            .update(move |mut doc: Document| {
                doc.settings = settings.clone();
                Ok::<_, StateError>((doc, settings))
            })
            .await
    }

    /// Edit the live settings in place; the result is validated before it commits
    pub async fn update_settings<F>(&self, edit: F) -> StateResponse<AutomationSettings>
    where
        F: FnOnce(&mut AutomationSettings) + Send + 'static,
    {
        debug!("update_settings: called");
        self.store
            .update(move |mut doc: Document| {
                edit(&mut doc.settings);
                doc.settings.validate().map_err(StateError::Validation)?;
                let settings = doc.settings.clone();
                Ok((doc, settings))
            })
            .await
    }
}
