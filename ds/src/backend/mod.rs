//! Storage backends
//!
//! A backend moves the encoded document to and from durable storage. The
//! actor owns exactly one backend and never calls it concurrently, but
//! other stores (in this process or another) may share the same storage.
//! Writers hold the backend lock from reload to persist.

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::error::StoreResponse;

/// Durable home of the encoded document
pub trait Backend: Send + 'static {
    /// Block until no other store is inside a write on this storage
    fn lock(&mut self) -> StoreResponse<()> {
        Ok(())
    }

    /// Release what `lock` took
    fn unlock(&mut self) {}

    /// Load the committed bytes, `None` when nothing was ever persisted
    fn load(&mut self) -> StoreResponse<Option<Vec<u8>>>;

    /// Replace the committed bytes. Must be all-or-nothing: after an error
    /// the previously committed bytes are still what `load` returns.
    fn persist(&mut self, bytes: &[u8]) -> StoreResponse<()>;

    /// Human readable location, used in logs
    fn describe(&self) -> String;
}

impl Backend for Box<dyn Backend> {
    fn lock(&mut self) -> StoreResponse<()> {
        (**self).lock()
    }

    fn unlock(&mut self) {
        (**self).unlock()
    }

    fn load(&mut self) -> StoreResponse<Option<Vec<u8>>> {
        (**self).load()
    }

    fn persist(&mut self, bytes: &[u8]) -> StoreResponse<()> {
        (**self).persist(bytes)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
