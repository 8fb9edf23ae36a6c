//! Receipt storage interface and live snapshot subscriptions

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::debug;

use crate::error::Result;
use crate::models::{Receipt, ReceiptDraft, ReceiptField};

/// Called with the full receipt list whenever it changes
pub type SnapshotCallback = Arc<dyn Fn(&[Receipt]) + Send + Sync>;

/// Keyed receipt storage with change notification
pub trait ReceiptStore {
    /// Store a new receipt under a freshly generated id
    fn create(&self, draft: &ReceiptDraft) -> Result<Receipt>;

    /// Write a receipt under `id`, replacing whatever was there
    fn put(&self, id: &str, draft: &ReceiptDraft) -> Result<Receipt>;

    fn get(&self, id: &str) -> Result<Option<Receipt>>;

    /// All receipts, ordered by name
    fn list(&self) -> Result<Vec<Receipt>>;

    /// Change a single field. Editing a chemical field recomputes `kilos`.
    fn update_field(&self, id: &str, field: ReceiptField, value: &str) -> Result<Receipt>;

    fn delete(&self, id: &str) -> Result<()>;

    /// Register `callback` and deliver the current snapshot to it at once.
    /// The callback stays registered until the returned handle is dropped.
    fn subscribe(&self, callback: SnapshotCallback) -> Result<Subscription>;
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    callbacks: BTreeMap<u64, SnapshotCallback>,
}

/// Set of live subscribers owned by a store
#[derive(Clone, Default)]
pub struct Subscribers {
    inner: Arc<Mutex<Registry>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add(&self, callback: SnapshotCallback) -> Subscription {
        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.callbacks.insert(id, callback);
        debug!(subscription = id, "subscriber added");

        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `snapshot` to every subscriber.
    ///
    /// Callbacks run outside the lock, so a callback may drop its own
    /// subscription.
    pub fn notify(&self, snapshot: &[Receipt]) {
        let callbacks: Vec<SnapshotCallback> = self.lock().callbacks.values().cloned().collect();
        debug!(subscribers = callbacks.len(), receipts = snapshot.len(), "notifying");
        for callback in callbacks {
            callback(snapshot);
        }
    }
}

/// Handle for a live subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            registry.callbacks.remove(&self.id);
            debug!(subscription = self.id, "subscriber removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dropping_handle_stops_delivery() {
        let subscribers = Subscribers::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let handle = subscribers.add(Arc::new(move |_: &[Receipt]| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        subscribers.notify(&[]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        drop(handle);
        assert!(subscribers.is_empty());
        subscribers.notify(&[]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handle_outliving_registry_is_harmless() {
        let subscribers = Subscribers::new();
        let handle = subscribers.add(Arc::new(|_: &[Receipt]| {}));
        drop(subscribers);
        handle.unsubscribe();
    }
}
