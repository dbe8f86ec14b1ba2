//! State management over the document store
//!
//! [`StateRepository`] and [`TaskLifecycleManager`] hold a handle to one
//! [`LeadStore`]; every operation they expose is exactly one store
//! transaction.

mod error;
mod merge;
mod recovery;
mod repository;
mod tasks;

use std::path::Path;

use docstore::{DocumentStore, FileBackend, MemoryBackend};
use tracing::debug;

use crate::domain::Document;

pub use error::{StateError, StateResponse};
pub use merge::merge_leads;
pub use recovery::{RecoveryStats, recover, scan_for_recovery};
pub use repository::StateRepository;
pub use tasks::{TaskCounts, TaskLifecycleManager, apply_status};

/// The store every LeadFlow component shares
pub type LeadStore = DocumentStore<Document>;

/// Open the file-backed store at `path`, seeding an empty document if needed
pub fn open_store(path: impl AsRef<Path>) -> StateResponse<LeadStore> {
    debug!(path = %path.as_ref().display(), "open_store: called");
    let backend = FileBackend::open(path)?;
    Ok(DocumentStore::open(backend)?)
}

/// Open a store that lives only in memory
pub fn open_memory_store() -> StateResponse<LeadStore> {
    Ok(DocumentStore::open(MemoryBackend::new())?)
}
