//! Where snapshots are persisted and how remote changes arrive.
//!
//! Both sides are untrusted from the engine's point of view: saves can fail, and the feed
//! may deliver our own writes back, duplicates, or snapshots out of order.

pub mod file;
pub mod memory;
pub mod recovery;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use recovery::{RecoveryHint, RecoveryStore};

use rand::Rng;

use crate::clock::Millis;
use crate::error::GatewayError;
use crate::grid::Snapshot;

/// Acknowledgement of a successful save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    pub id: String,
    pub server_timestamp: Millis,
}

/// A snapshot as last written to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSnapshot {
    pub snapshot: Snapshot,
    pub server_timestamp: Millis,
}

pub trait PersistenceGateway: Send + Sync {
    /// Write the full snapshot. A snapshot without an id creates a new document.
    /// `silent` saves are background writes the user is not waiting on.
    fn save(&self, snapshot: &Snapshot, silent: bool) -> Result<SaveReceipt, GatewayError>;

    fn load(&self, id: &str) -> Result<StoredSnapshot, GatewayError>;
}

/// Called with every remote snapshot of a subscribed document and its server timestamp
pub type ChangeCallback = Box<dyn Fn(Snapshot, Millis) + Send + Sync>;

pub trait RealtimeFeed: Send + Sync {
    fn subscribe(&self, id: &str, on_change: ChangeCallback) -> Subscription;
}

/// Live feed subscription. Dropping it unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self { cancel: Some(Box::new(cancel)) }
    }

    #[cfg(test)]
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Fresh document id: 16 hex digits
pub(crate) fn new_document_id() -> String {
    format!("{:016x}", rand::thread_rng().gen::<u64>())
}
