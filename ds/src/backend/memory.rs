//! In-memory backend for tests and ephemeral stores

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use tracing::debug;

use super::Backend;
use crate::error::{StoreError, StoreResponse};

/// Keeps the encoded document in memory
///
/// Clones share the same storage and the same write lock, so a test can
/// hand one clone to the store and keep another to inspect writes, inject
/// failures, or open a second store on the same data.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    bytes: Arc<Mutex<Option<Vec<u8>>>>,
    held: Arc<(Mutex<bool>, Condvar)>,
    fail_writes: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl MemoryBackend {
    /// Empty backend: the store will seed a default document
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that already holds committed bytes
    pub fn with_contents(bytes: impl Into<Vec<u8>>) -> Self {
        let backend = Self::default();
        *backend.bytes.lock().unwrap_or_else(|e| e.into_inner()) = Some(bytes.into());
        backend
    }

    /// Make every subsequent persist fail until switched back
    pub fn set_fail_writes(&self, fail: bool) {
        debug!(fail, "MemoryBackend::set_fail_writes: called");
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Currently committed bytes
    pub fn contents(&self) -> Option<Vec<u8>> {
        self.bytes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of successful persists
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Backend for MemoryBackend {
    fn lock(&mut self) -> StoreResponse<()> {
        let (held, released) = &*self.held;
        let mut held = held.lock().unwrap_or_else(|e| e.into_inner());
        while *held {
            held = released.wait(held).unwrap_or_else(|e| e.into_inner());
        }
        *held = true;
        Ok(())
    }

    fn unlock(&mut self) {
        let (held, released) = &*self.held;
        *held.lock().unwrap_or_else(|e| e.into_inner()) = false;
        released.notify_one();
    }

    fn load(&mut self) -> StoreResponse<Option<Vec<u8>>> {
        Ok(self.contents())
    }

    fn persist(&mut self, bytes: &[u8]) -> StoreResponse<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            debug!("MemoryBackend::persist: injected failure");
            return Err(StoreError::Persistence("injected write failure".to_string()));
        }
        *self.bytes.lock().unwrap_or_else(|e| e.into_inner()) = Some(bytes.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
