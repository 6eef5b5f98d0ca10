use std::collections::{BTreeMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use siteblock_core::ids::ListenerId;

use crate::traits::{ChangeEvent, NativeListener};

/// Native listeners of one store, plus the queue of events not yet delivered.
///
/// Stores enqueue while still holding their own write lock, so queue order is
/// write order. Delivery happens in [`ListenerRegistry::flush`] with no store
/// lock held; only one thread drains at a time, which keeps every listener
/// seeing events in the order the writes landed.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<BTreeMap<ListenerId, NativeListener>>,
    pending: Mutex<VecDeque<ChangeEvent>>,
    draining: Mutex<()>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: NativeListener) -> ListenerId {
        let id = ListenerId::new();
        self.listeners().insert(id, listener);
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        self.listeners().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn listeners(&self) -> MutexGuard<'_, BTreeMap<ListenerId, NativeListener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending(&self) -> MutexGuard<'_, VecDeque<ChangeEvent>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `event` for delivery. Empty events are dropped.
    pub fn enqueue(&self, event: ChangeEvent) {
        if !event.is_empty() {
            self.pending().push_back(event);
        }
    }

    /// Deliver queued events in order. If another thread (or an outer call on
    /// this thread, when a listener writes to the store) is already draining,
    /// it delivers ours too and this returns at once.
    pub fn flush(&self) {
        loop {
            let guard = match self.draining.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };
            loop {
                let next = self.pending().pop_front();
                let Some(event) = next else { break };
                self.deliver(&event);
            }
            drop(guard);
            if self.pending().is_empty() {
                return;
            }
        }
    }

    pub fn dispatch(&self, event: ChangeEvent) {
        self.enqueue(event);
        self.flush();
    }

    /// Listeners registered at the time of delivery each see `event` once.
    /// The registry lock is released first, so listeners may read the store
    /// or (un)register listeners. A panicking listener is logged and skipped.
    fn deliver(&self, event: &ChangeEvent) {
        let snapshot: Vec<NativeListener> = self.listeners().values().cloned().collect();
        tracing::debug!(
            area = event.area.as_str(),
            keys = event.changes.len(),
            listeners = snapshot.len(),
            "dispatching change event"
        );
        for listener in snapshot {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::error!(area = event.area.as_str(), "change listener panicked");
            }
        }
    }
}
