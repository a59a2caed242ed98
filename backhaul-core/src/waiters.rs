//! Waiter table: one-shot rendezvous points keyed by correlation ID
//!
//! Every relayed request registers a [`Waiter`] here *before* its frame is
//! written to the control connection, so a response can never arrive while
//! nobody is listening. The response reader fulfils waiters by ID in
//! whatever order responses complete.

use backhaul_common::{Result, TunnelError};
use backhaul_protocol::ResponseFrame;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Concurrency-safe registry of pending requests.
///
/// Invariants: at most one live entry per ID, and an entry is fulfilled at
/// most once (fulfilment removes it atomically).
#[derive(Clone, Debug, Default)]
pub struct WaiterTable {
    inner: Arc<DashMap<String, oneshot::Sender<ResponseFrame>>>,
}

/// A registered rendezvous slot for one in-flight request.
#[derive(Debug)]
pub struct Waiter {
    id: String,
    rx: oneshot::Receiver<ResponseFrame>,
}

impl WaiterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh waiter for `id`.
    ///
    /// Atomic with respect to concurrent registrations; a second
    /// registration under a live ID is refused.
    pub fn register(&self, id: impl Into<String>) -> Result<Waiter> {
        let id = id.into();
        match self.inner.entry(id.clone()) {
            Entry::Occupied(_) => Err(TunnelError::InvalidState(format!(
                "waiter already registered for {id}"
            ))),
            Entry::Vacant(entry) => {
                let (tx, rx) = oneshot::channel();
                entry.insert(tx);
                Ok(Waiter { id, rx })
            }
        }
    }

    /// Deliver `frame` to the waiter registered under its ID.
    ///
    /// Returns `false` (a no-op) when the ID is unknown or the waiter has
    /// already given up — late and bogus responses are dropped, never
    /// fatal.
    pub fn fulfill(&self, id: &str, frame: ResponseFrame) -> bool {
        match self.inner.remove(id) {
            Some((_, tx)) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    /// Remove the entry for `id` without fulfilling it.
    ///
    /// Called by a waiter's owner on deadline expiry so abandoned entries
    /// are reclaimed instead of leaked.
    pub fn take(&self, id: &str) {
        self.inner.remove(id);
    }

    /// Drop every pending entry.
    ///
    /// Each dropped sender wakes its waiter with a closed-channel outcome;
    /// used when the control connection is lost so no waiter blocks
    /// forever on a response that can no longer arrive.
    pub fn fail_all(&self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Waiter {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Block until the correlated response arrives.
    ///
    /// Resolves with [`TunnelError::TunnelClosed`] when the table drops
    /// the entry (connection loss) before a response is delivered.
    pub async fn wait(self) -> Result<ResponseFrame> {
        self.rx.await.map_err(|_| TunnelError::TunnelClosed)
    }
}
