use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;
use siteblock_core::ids::{ListenerId, SubscriptionId};
use siteblock_core::StorageKey;
use siteblock_storage::{AreaName, ChangeEvent, HostStore, NativeListener};

type Decoder<T> = Arc<dyn Fn(Option<&Value>) -> T + Send + Sync>;
type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Turns the host's raw change stream into validated values for one key.
///
/// At most one native listener is attached per notifier, and only while at
/// least one callback is subscribed. Events from other areas or for other
/// keys are ignored. Callbacks run inside the store's dispatch, in write order.
pub struct ChangeNotifier<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ChangeNotifier<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

struct Inner<T> {
    store: Arc<dyn HostStore>,
    key: StorageKey,
    decode: Decoder<T>,
    state: Mutex<State<T>>,
}

struct State<T> {
    callbacks: BTreeMap<SubscriptionId, Callback<T>>,
    native: Option<ListenerId>,
}

impl<T: Send + Sync + 'static> ChangeNotifier<T> {
    pub fn new(
        store: Arc<dyn HostStore>,
        key: StorageKey,
        decode: impl Fn(Option<&Value>) -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                key,
                decode: Arc::new(decode),
                state: Mutex::new(State {
                    callbacks: BTreeMap::new(),
                    native: None,
                }),
            }),
        }
    }

    pub fn key(&self) -> &StorageKey {
        &self.inner.key
    }

    /// Register `callback`. It stays registered until the returned
    /// [`Subscription`] is dropped or unsubscribed.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = SubscriptionId::new();
        {
            let mut state = self.inner.state();
            state.callbacks.insert(id, Arc::new(callback));
            if state.native.is_none() {
                let weak = Arc::downgrade(&self.inner);
                let listener: NativeListener = Arc::new(move |event: &ChangeEvent| {
                    if let Some(inner) = weak.upgrade() {
                        inner.handle(event);
                    }
                });
                let native = self.inner.store.add_listener(listener);
                tracing::debug!(key = %self.inner.key, %native, "attached native listener");
                state.native = Some(native);
            }
        }

        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        Subscription {
            id,
            cancel: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.unsubscribe(id);
                }
            })),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.state().callbacks.len()
    }

    /// Whether a native listener is currently registered with the store.
    pub fn is_attached(&self) -> bool {
        self.inner.state().native.is_some()
    }
}

impl<T> Inner<T> {
    fn state(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, event: &ChangeEvent) {
        if event.area != AreaName::Local {
            return;
        }
        let Some(change) = event.change(self.key.as_str()) else {
            return;
        };
        let value = (self.decode)(change.new_value.as_ref());
        let callbacks: Vec<Callback<T>> = self.state().callbacks.values().cloned().collect();
        tracing::debug!(key = %self.key, callbacks = callbacks.len(), "delivering change");
        for callback in callbacks {
            callback(&value);
        }
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let detached = {
            let mut state = self.state();
            state.callbacks.remove(&id);
            if state.callbacks.is_empty() { state.native.take() } else { None }
        };
        if let Some(native) = detached {
            self.store.remove_listener(native);
            tracing::debug!(key = %self.key, %native, "detached native listener");
        }
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        let native = self.state().native.take();
        if let Some(native) = native {
            self.store.remove_listener(native);
        }
    }
}

/// Keeps a callback registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriptionId,
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
