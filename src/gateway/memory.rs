use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::debug;

use super::{
    new_document_id, ChangeCallback, PersistenceGateway, RealtimeFeed, SaveReceipt, StoredSnapshot,
    Subscription,
};
use crate::clock::{Clock, Millis};
use crate::error::GatewayError;
use crate::grid::Snapshot;

type SharedCallback = Arc<ChangeCallback>;

#[derive(Default)]
struct Inner {
    docs: HashMap<String, StoredSnapshot>,
    subscribers: HashMap<String, Vec<(u64, SharedCallback)>>,
    next_subscriber: u64,
    last_timestamp: Millis,
    offline: bool,
}

impl Inner {
    /// Server timestamps never go backwards and never repeat
    fn stamp(&mut self, now: Millis) -> Millis {
        self.last_timestamp = now.max(self.last_timestamp + 1);
        self.last_timestamp
    }

    fn callbacks_for(&self, id: &str) -> Vec<SharedCallback> {
        self.subscribers
            .get(id)
            .map(|subs| subs.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default()
    }
}

/// In-process store and feed. Every write, ours or external, is pushed to all subscribers
/// of that document, so the engine sees its own saves echo back just as it would from a
/// real backend. Clones share the same documents.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// While offline every save fails with `Unavailable`
    #[cfg(test)]
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Write as another client would, notifying subscribers. Returns the server timestamp.
    #[cfg(test)]
    pub fn external_write(&self, id: &str, snapshot: Snapshot) -> Millis {
        self.write(id, snapshot)
    }

    /// Deliver a snapshot to subscribers without storing it, stamped as given
    #[cfg(test)]
    pub fn push(&self, id: &str, snapshot: Snapshot, server_timestamp: Millis) {
        let callbacks = self.lock().callbacks_for(id);
        for callback in callbacks {
            callback(snapshot.clone(), server_timestamp);
        }
    }

    pub fn document(&self, id: &str) -> Option<StoredSnapshot> {
        self.lock().docs.get(id).cloned()
    }

    #[cfg(test)]
    pub fn subscriber_count(&self, id: &str) -> usize {
        self.lock().subscribers.get(id).map_or(0, Vec::len)
    }

    fn write(&self, id: &str, snapshot: Snapshot) -> Millis {
        let now = self.clock.now_ms();
        let snapshot = snapshot.with_id(id);

        let (server_timestamp, callbacks) = {
            let mut inner = self.lock();
            let server_timestamp = inner.stamp(now);
            inner.docs.insert(
                id.to_string(),
                StoredSnapshot { snapshot: snapshot.clone(), server_timestamp },
            );
            (server_timestamp, inner.callbacks_for(id))
        };

        // Outside the lock: a callback may call back into the store
        for callback in callbacks {
            callback(snapshot.clone(), server_timestamp);
        }
        server_timestamp
    }
}

impl PersistenceGateway for MemoryStore {
    fn save(&self, snapshot: &Snapshot, silent: bool) -> Result<SaveReceipt, GatewayError> {
        if self.lock().offline {
            return Err(GatewayError::Unavailable("memory store is offline".to_string()));
        }

        let id = snapshot.id.clone().unwrap_or_else(new_document_id);
        let server_timestamp = self.write(&id, snapshot.clone());
        debug!(id = %id, server_timestamp, silent, "memory store save");
        Ok(SaveReceipt { id, server_timestamp })
    }

    fn load(&self, id: &str) -> Result<StoredSnapshot, GatewayError> {
        self.document(id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }
}

impl RealtimeFeed for MemoryStore {
    fn subscribe(&self, id: &str, on_change: ChangeCallback) -> Subscription {
        let key = {
            let mut inner = self.lock();
            let key = inner.next_subscriber;
            inner.next_subscriber += 1;
            inner
                .subscribers
                .entry(id.to_string())
                .or_default()
                .push((key, Arc::new(on_change)));
            key
        };

        let weak: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        let id = id.to_string();
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(subs) = inner.subscribers.get_mut(&id) {
                    subs.retain(|(k, _)| *k != key);
                }
            }
        })
    }
}
