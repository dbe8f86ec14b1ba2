//! Store actor messages
//!
//! Commands and transaction plumbing for the actor pattern.

use tokio::sync::oneshot;

use crate::error::StoreResponse;

/// Called by the actor once the outcome of a commit is known
pub(crate) type CommitHook = Box<dyn FnOnce(StoreResponse<()>) + Send>;

/// A type-erased read-modify-write transaction
///
/// Handed the working copy, or the error that kept the actor from
/// preparing one (lock or reload failure).
pub(crate) type Transaction<D> = Box<dyn FnOnce(StoreResponse<D>) -> TxOutcome<D> + Send>;

/// A type-erased read-only view over the committed document
pub(crate) type View<D> = Box<dyn FnOnce(StoreResponse<&D>) + Send>;

/// What a transaction asks the actor to do with its working copy
pub(crate) enum TxOutcome<D> {
    /// Persist `doc` and make it the committed document, then run `finish`
    Commit { doc: D, finish: CommitHook },
    /// Discard the working copy; the transaction already replied
    Abort,
}

/// Commands sent to the store actor
pub(crate) enum StoreCommand<D> {
    Read {
        reply: oneshot::Sender<StoreResponse<D>>,
    },
    View {
        view: View<D>,
    },
    Write {
        doc: D,
        reply: oneshot::Sender<StoreResponse<()>>,
    },
    Update {
        tx: Transaction<D>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}
