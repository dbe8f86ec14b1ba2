//! Domain types for LeadFlow
//!
//! Everything persisted lives inside one [`Document`]: the ideal customer
//! profile, search presets, tasks, leads and the live automation settings.
//! Entities are never persisted on their own.

mod document;
mod id;
mod lead;
mod preset;
mod profile;
mod settings;
mod task;

pub use document::Document;
pub use id::{ensure_unique_id, generate_id};
pub use lead::{EmailStatus, LeadRecord, normalize_profile_url};
pub use preset::{NewPreset, SearchFilters, SearchPreset};
pub use profile::IdealCustomerProfile;
pub use settings::AutomationSettings;
pub use task::{
    AccountFollowersPayload, PostEngagementPayload, ProfileScrapePayload, SalesNavigatorPayload, SearchTask, TaskKind,
    TaskPatch, TaskStatus, TaskType,
};
