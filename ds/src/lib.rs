//! DocStore - single-document persistent store
//!
//! Keeps one serializable aggregate on disk and serializes every
//! read-modify-write against it through a single actor. Stores opened on
//! the same file (from any process) stay consistent: each write locks the
//! file, reloads, applies and persists.
//!
//! # Architecture
//!
//! ```text
//! DocumentStore<D> (cloneable handle)
//!        │  mpsc (FIFO = transaction order)
//!        ▼
//! actor thread ── owns ──► committed D + Backend
//!        │
//!        ├── lock <name>.lock, reload <name> if it changed
//!        └── persist: write <name>.<uuid>.tmp, fsync, rename onto <name>
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docstore::{DocumentStore, FileBackend};
//!
//! let store = DocumentStore::<MyDoc>::open(FileBackend::open("state.json")?)?;
//! let count = store
//!     .update(|mut doc| {
//!         doc.items.push(item);
//!         let count = doc.items.len();
//!         Ok::<_, docstore::StoreError>((doc, count))
//!     })
//!     .await?;
//! ```

mod backend;
mod error;
mod messages;
mod store;

pub use backend::{Backend, FileBackend, MemoryBackend};
pub use error::{StoreError, StoreResponse};
pub use store::{DocumentStore, StoreEvent};

/// Bound shared by every document type the store can hold
pub trait Document: serde::Serialize + serde::de::DeserializeOwned + Default + Clone + Send + 'static {}

impl<T> Document for T where T: serde::Serialize + serde::de::DeserializeOwned + Default + Clone + Send + 'static {}
