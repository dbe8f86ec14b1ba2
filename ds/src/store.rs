//! DocumentStore - actor that owns the committed document
//!
//! Every operation is a message on one FIFO channel, so transactions run
//! one at a time in admission order and each sees the result of all the
//! transactions before it.
//!
//! The actor runs on its own OS thread: backend calls block (file locks,
//! fsync, rename) and must stay off the async workers. Before each
//! command it reloads the backend if another store committed in the
//! meantime, and writes hold the backend lock from that reload to persist.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::Document;
use crate::backend::Backend;
use crate::error::{StoreError, StoreResponse};
use crate::messages::{StoreCommand, Transaction, TxOutcome, View};

const COMMAND_BUFFER: usize = 256;
const EVENT_BUFFER: usize = 64;

/// Event broadcast after the committed document changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A write or update was persisted
    Committed { revision: u64 },
}

/// Handle to send commands to the store actor
pub struct DocumentStore<D: Document> {
    tx: mpsc::Sender<StoreCommand<D>>,
    event_tx: broadcast::Sender<StoreEvent>,
    revision: Arc<AtomicU64>,
}

impl<D: Document> Clone for DocumentStore<D> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            event_tx: self.event_tx.clone(),
            revision: self.revision.clone(),
        }
    }
}

impl<D: Document> DocumentStore<D> {
    /// Load the document from `backend` and start the actor thread
    ///
    /// When the backend holds nothing yet, a default document is seeded
    /// and persisted before this returns.
    pub fn open<B: Backend>(mut backend: B) -> StoreResponse<Self> {
        debug!(backend = %backend.describe(), "DocumentStore::open: called");

        backend.lock()?;
        let loaded = load_or_seed::<D, B>(&mut backend);
        backend.unlock();
        let (doc, seen) = loaded?;

        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        let revision = Arc::new(AtomicU64::new(0));

        let actor = Actor {
            backend,
            doc,
            seen,
            event_tx: event_tx.clone(),
            revision: revision.clone(),
        };
        std::thread::Builder::new()
            .name("docstore".to_string())
            .spawn(move || actor.run(rx))
            .map_err(|e| StoreError::Actor(e.to_string()))?;

        info!("DocumentStore spawned");
        Ok(Self { tx, event_tx, revision })
    }

    /// Subscribe to commit notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_tx.subscribe()
    }

    /// Number of commits seen since the store was opened, including
    /// commits other stores made to the same backend
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    /// Copy of the committed document
    pub async fn read(&self) -> StoreResponse<D> {
        debug!("read: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(StoreCommand::Read { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)?
    }

    /// Run a read-only closure against the committed document
    ///
    /// Serialized with updates like any other command, but never writes.
    pub async fn view<R, F>(&self, f: F) -> StoreResponse<R>
    where
        F: FnOnce(&D) -> R + Send + 'static,
        R: Send + 'static,
    {
        debug!("view: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        let view: View<D> = Box::new(move |doc: StoreResponse<&D>| {
            let _ = reply_tx.send(doc.map(f));
        });
        self.send(StoreCommand::View { view }).await?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)?
    }

    /// Replace the document wholesale
    pub async fn write(&self, doc: D) -> StoreResponse<()> {
        debug!("write: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(StoreCommand::Write { doc, reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)?
    }

    /// Run one serialized read-modify-write transaction
    ///
    /// `f` receives a private copy of the committed document. Returning
    /// `Ok((doc, value))` persists `doc` and yields `value`; returning
    /// `Err` leaves the store untouched and hands the error back. A failed
    /// persist also leaves the committed document unchanged.
    ///
    /// `f` runs on the actor: it must not call back into this store.
    pub async fn update<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(D) -> Result<(D, R), E> + Send + 'static,
        R: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        debug!("update: called");
        let (reply_tx, reply_rx) = oneshot::channel::<Result<R, E>>();
        let tx: Transaction<D> = Box::new(move |doc: StoreResponse<D>| match doc.map_err(E::from).and_then(f) {
            Ok((next, value)) => TxOutcome::Commit {
                doc: next,
                finish: Box::new(move |committed: StoreResponse<()>| {
                    let _ = reply_tx.send(committed.map(|()| value).map_err(E::from));
                }),
            },
            Err(e) => {
                let _ = reply_tx.send(Err(e));
                TxOutcome::Abort
            }
        });
        self.send(StoreCommand::Update { tx }).await.map_err(E::from)?;
        reply_rx.await.map_err(|_| E::from(StoreError::ChannelError))?
    }

    /// Like [`update`](Self::update), but the transaction may decline to write
    ///
    /// `Ok((Some(doc), value))` commits `doc`; `Ok((None, value))` yields
    /// `value` and leaves the document and the backing file untouched.
    pub async fn maybe_update<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(D) -> Result<(Option<D>, R), E> + Send + 'static,
        R: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        debug!("maybe_update: called");
        let (reply_tx, reply_rx) = oneshot::channel::<Result<R, E>>();
        let tx: Transaction<D> = Box::new(move |doc: StoreResponse<D>| match doc.map_err(E::from).and_then(f) {
            Ok((Some(next), value)) => TxOutcome::Commit {
                doc: next,
                finish: Box::new(move |committed: StoreResponse<()>| {
                    let _ = reply_tx.send(committed.map(|()| value).map_err(E::from));
                }),
            },
            Ok((None, value)) => {
                let _ = reply_tx.send(Ok(value));
                TxOutcome::Abort
            }
            Err(e) => {
                let _ = reply_tx.send(Err(e));
                TxOutcome::Abort
            }
        });
        self.send(StoreCommand::Update { tx }).await.map_err(E::from)?;
        reply_rx.await.map_err(|_| E::from(StoreError::ChannelError))?
    }

    /// Stop the actor once every command queued before this one has run
    pub async fn shutdown(&self) -> StoreResponse<()> {
        debug!("shutdown: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(StoreCommand::Shutdown { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)
    }

    async fn send(&self, cmd: StoreCommand<D>) -> StoreResponse<()> {
        self.tx.send(cmd).await.map_err(|_| StoreError::Closed)
    }
}

struct Actor<D, B> {
    backend: B,
    doc: D,
    /// Encoded form of `doc` as last loaded or persisted
    seen: Vec<u8>,
    event_tx: broadcast::Sender<StoreEvent>,
    revision: Arc<AtomicU64>,
}

impl<D: Document, B: Backend> Actor<D, B> {
    fn run(mut self, mut rx: mpsc::Receiver<StoreCommand<D>>) {
        debug!(backend = %self.backend.describe(), "actor_loop: started");

        while let Some(cmd) = rx.blocking_recv() {
            match cmd {
                StoreCommand::Read { reply } => {
                    debug!("actor_loop: Read command");
                    let _ = reply.send(self.refresh().map(|()| self.doc.clone()));
                }

                StoreCommand::View { view } => {
                    debug!("actor_loop: View command");
                    let current = self.refresh().map(|()| &self.doc);
                    if catch_unwind(AssertUnwindSafe(|| view(current))).is_err() {
                        warn!("View panicked; committed document untouched");
                    }
                }

                StoreCommand::Write { doc, reply } => {
                    debug!("actor_loop: Write command");
                    let result = self.begin().and_then(|()| {
                        let committed = self.commit(doc);
                        self.backend.unlock();
                        committed
                    });
                    let _ = reply.send(result);
                }

                StoreCommand::Update { tx } => {
                    debug!("actor_loop: Update command");
                    let working = self.begin().map(|()| self.doc.clone());
                    let locked = working.is_ok();
                    match catch_unwind(AssertUnwindSafe(move || tx(working))) {
                        Ok(TxOutcome::Commit { doc, finish }) => {
                            let result = self.commit(doc);
                            finish(result);
                        }
                        Ok(TxOutcome::Abort) => {
                            debug!("actor_loop: Update aborted by transaction");
                        }
                        Err(_) => {
                            warn!("Transaction panicked; committed document untouched");
                        }
                    }
                    if locked {
                        self.backend.unlock();
                    }
                }

                StoreCommand::Shutdown { reply } => {
                    info!("DocumentStore shutting down");
                    let _ = reply.send(());
                    break;
                }
            }
        }

        debug!("DocumentStore actor stopped");
    }

    /// Take the backend lock and bring `doc` up to date; unlocked again on error
    fn begin(&mut self) -> StoreResponse<()> {
        self.backend.lock()?;
        if let Err(e) = self.refresh() {
            self.backend.unlock();
            return Err(e);
        }
        Ok(())
    }

    /// Pick up a commit another store made to the same backend
    fn refresh(&mut self) -> StoreResponse<()> {
        let Some(bytes) = self.backend.load()? else {
            return Ok(());
        };
        if bytes == self.seen {
            return Ok(());
        }
        debug!(len = bytes.len(), "actor_loop: backend changed elsewhere, reloading");
        self.doc = serde_json::from_slice(&bytes)?;
        self.seen = bytes;
        self.publish();
        Ok(())
    }

    /// Persist `doc` and make it the committed document
    fn commit(&mut self, doc: D) -> StoreResponse<()> {
        let bytes = encode(&doc)?;
        if let Err(e) = self.backend.persist(&bytes) {
            warn!(error = %e, "Commit failed; keeping previous document");
            return Err(e);
        }
        self.doc = doc;
        self.seen = bytes;
        self.publish();
        Ok(())
    }

    fn publish(&self) {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(revision, "actor_loop: committed");
        let _ = self.event_tx.send(StoreEvent::Committed { revision });
    }
}

/// Decode the stored document, or seed and persist a default one
fn load_or_seed<D: Document, B: Backend>(backend: &mut B) -> StoreResponse<(D, Vec<u8>)> {
    match backend.load()? {
        Some(bytes) => {
            debug!(len = bytes.len(), "DocumentStore::open: decoding committed document");
            let doc = serde_json::from_slice::<D>(&bytes)?;
            Ok((doc, bytes))
        }
        None => {
            info!(backend = %backend.describe(), "No document found, seeding default");
            let doc = D::default();
            let bytes = encode(&doc)?;
            backend.persist(&bytes)?;
            Ok((doc, bytes))
        }
    }
}

fn encode<D: Document>(doc: &D) -> StoreResponse<Vec<u8>> {
    serde_json::to_vec_pretty(doc).map_err(StoreError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FileBackend, MemoryBackend};
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        value: u64,
        names: Vec<String>,
    }

    #[derive(Debug, PartialEq)]
    enum TestError {
        Rejected,
        Store(StoreError),
    }

    impl From<StoreError> for TestError {
        fn from(e: StoreError) -> Self {
            TestError::Store(e)
        }
    }

    #[tokio::test]
    async fn test_open_seeds_default_document() {
        let backend = MemoryBackend::new();
        let store = DocumentStore::<Counter>::open(backend.clone()).unwrap();

        assert!(backend.contents().is_some());
        assert_eq!(store.read().await.unwrap(), Counter::default());
    }

    #[tokio::test]
    async fn test_open_loads_existing_document() {
        let backend = MemoryBackend::with_contents(r#"{"value":7,"names":["a"]}"#);
        let store = DocumentStore::<Counter>::open(backend).unwrap();

        let doc = store.read().await.unwrap();
        assert_eq!(doc.value, 7);
        assert_eq!(doc.names, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_open_rejects_corrupt_document() {
        let backend = MemoryBackend::with_contents("{not json");
        let result = DocumentStore::<Counter>::open(backend);
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_update_returns_value_and_commits() {
        let store = DocumentStore::<Counter>::open(MemoryBackend::new()).unwrap();

        let seen = store
            .update(|mut doc: Counter| {
                doc.value += 5;
                let v = doc.value;
                Ok::<_, StoreError>((doc, v))
            })
            .await
            .unwrap();

        assert_eq!(seen, 5);
        assert_eq!(store.read().await.unwrap().value, 5);
        assert_eq!(store.revision(), 1);
    }

    #[tokio::test]
    async fn test_update_error_leaves_document_unchanged() {
        let backend = MemoryBackend::new();
        let store = DocumentStore::<Counter>::open(backend.clone()).unwrap();
        let writes_before = backend.write_count();

        let result: Result<(), TestError> = store
            .update(|mut doc: Counter| {
                doc.value = 99;
                let _ = doc;
                Err(TestError::Rejected)
            })
            .await;

        assert_eq!(result, Err(TestError::Rejected));
        assert_eq!(store.read().await.unwrap().value, 0);
        assert_eq!(backend.write_count(), writes_before);
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_previous_document() {
        let backend = MemoryBackend::new();
        let store = DocumentStore::<Counter>::open(backend.clone()).unwrap();
        store
            .update(|mut doc: Counter| {
                doc.value = 1;
                Ok::<_, StoreError>((doc, ()))
            })
            .await
            .unwrap();

        backend.set_fail_writes(true);
        let result = store
            .update(|mut doc: Counter| {
                doc.value = 2;
                Ok::<_, StoreError>((doc, ()))
            })
            .await;
        assert!(matches!(result, Err(StoreError::Persistence(_))));
        assert_eq!(store.read().await.unwrap().value, 1);

        backend.set_fail_writes(false);
        let value = store
            .update(|doc: Counter| {
                let v = doc.value;
                Ok::<_, StoreError>((doc, v))
            })
            .await
            .unwrap();
        assert_eq!(value, 1);
    }

    #[tokio::test]
    async fn test_maybe_update_without_change_skips_write() {
        let backend = MemoryBackend::new();
        let store = DocumentStore::<Counter>::open(backend.clone()).unwrap();
        let writes_before = backend.write_count();

        let value = store
            .maybe_update(|doc: Counter| Ok::<_, StoreError>((None, doc.value + 1)))
            .await
            .unwrap();
        assert_eq!(value, 1);
        assert_eq!(backend.write_count(), writes_before);
        assert_eq!(store.revision(), 0);

        store
            .maybe_update(|mut doc: Counter| {
                doc.value = 4;
                Ok::<_, StoreError>((Some(doc), ()))
            })
            .await
            .unwrap();
        assert_eq!(store.read().await.unwrap().value, 4);
        assert_eq!(backend.write_count(), writes_before + 1);
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_serialized() {
        let store = DocumentStore::<Counter>::open(MemoryBackend::new()).unwrap();

        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update(move |mut doc: Counter| {
                        doc.value += 1;
                        doc.names.push(format!("n{}", i));
                        Ok::<_, StoreError>((doc, ()))
                    })
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let doc = store.read().await.unwrap();
        assert_eq!(doc.value, 50);
        assert_eq!(doc.names.len(), 50);
    }

    #[tokio::test]
    async fn test_read_returns_independent_copy() {
        let store = DocumentStore::<Counter>::open(MemoryBackend::new()).unwrap();
        let mut copy = store.read().await.unwrap();
        copy.value = 42;
        assert_eq!(store.read().await.unwrap().value, 0);
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let temp = tempdir().unwrap();
        let store = DocumentStore::<Counter>::open(FileBackend::open(temp.path().join("doc.json")).unwrap()).unwrap();
        let doc = Counter {
            value: 3,
            names: vec!["x".to_string(), "y".to_string()],
        };
        store.write(doc.clone()).await.unwrap();
        assert_eq!(store.read().await.unwrap(), doc);
    }

    #[tokio::test]
    async fn test_view_sees_committed_state() {
        let store = DocumentStore::<Counter>::open(MemoryBackend::new()).unwrap();
        store
            .write(Counter {
                value: 9,
                names: vec![],
            })
            .await
            .unwrap();
        let value = store.view(|doc| doc.value).await.unwrap();
        assert_eq!(value, 9);
    }

    #[tokio::test]
    async fn test_panicking_transaction_does_not_kill_actor() {
        let store = DocumentStore::<Counter>::open(MemoryBackend::new()).unwrap();

        let result: Result<(), StoreError> = store
            .update(|_doc: Counter| -> Result<(Counter, ()), StoreError> { panic!("boom") })
            .await;
        assert_eq!(result, Err(StoreError::ChannelError));

        store
            .update(|mut doc: Counter| {
                doc.value = 1;
                Ok::<_, StoreError>((doc, ()))
            })
            .await
            .unwrap();
        assert_eq!(store.read().await.unwrap().value, 1);
    }

    #[tokio::test]
    async fn test_commit_event_broadcast() {
        let store = DocumentStore::<Counter>::open(MemoryBackend::new()).unwrap();
        let mut events = store.subscribe();

        store.write(Counter::default()).await.unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, StoreEvent::Committed { revision: 1 });
    }

    #[tokio::test]
    async fn test_second_store_sees_commits_of_the_first() {
        let backend = MemoryBackend::new();
        let first = DocumentStore::<Counter>::open(backend.clone()).unwrap();
        let second = DocumentStore::<Counter>::open(backend).unwrap();
        let mut events = second.subscribe();

        first
            .update(|mut doc: Counter| {
                doc.value = 7;
                Ok::<_, StoreError>((doc, ()))
            })
            .await
            .unwrap();

        assert_eq!(second.read().await.unwrap().value, 7);
        assert_eq!(second.revision(), 1);
        assert_eq!(events.try_recv().unwrap(), StoreEvent::Committed { revision: 1 });
    }

    #[tokio::test]
    async fn test_updates_through_two_stores_are_not_lost() {
        let backend = MemoryBackend::new();
        let stores = [
            DocumentStore::<Counter>::open(backend.clone()).unwrap(),
            DocumentStore::<Counter>::open(backend).unwrap(),
        ];

        let mut handles = Vec::new();
        for i in 0..40 {
            let store = stores[i % 2].clone();
            handles.push(tokio::spawn(async move {
                store
                    .update(move |mut doc: Counter| {
                        doc.value += 1;
                        doc.names.push(format!("n{}", i));
                        Ok::<_, StoreError>((doc, ()))
                    })
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        for store in &stores {
            let doc = store.read().await.unwrap();
            assert_eq!(doc.value, 40);
            assert_eq!(doc.names.len(), 40);
        }
    }

    #[tokio::test]
    async fn test_calls_after_shutdown_fail_closed() {
        let store = DocumentStore::<Counter>::open(MemoryBackend::new()).unwrap();
        store.shutdown().await.unwrap();
        tokio::task::yield_now().await;

        let result = store.read().await;
        assert!(matches!(result, Err(StoreError::Closed) | Err(StoreError::ChannelError)));
    }
}
