use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::notifier::{ChangeNotifier, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Idle,
    Loading,
    Ready,
}

struct Cell<T> {
    phase: HookPhase,
    value: T,
    events: u64,
}

type Seed<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Keeps a consumer's copy of one stored value current.
///
/// Activation subscribes first and then seeds with a single read, so a write
/// landing in between is never lost: if an event arrives while the seed read
/// is in flight, the event wins. Every later event replaces the value
/// wholesale. Deactivation drops the subscription and forgets the value.
pub struct SyncHook<T> {
    notifier: ChangeNotifier<T>,
    seed: Seed<T>,
    initial: T,
    cell: Arc<Mutex<Cell<T>>>,
    subscription: Option<Subscription>,
}

impl<T: Clone + Send + Sync + 'static> SyncHook<T> {
    /// `seed` must not fail; callers degrade read errors to a default
    /// before returning.
    pub fn new(
        notifier: ChangeNotifier<T>,
        initial: T,
        seed: impl Fn() -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            notifier,
            seed: Arc::new(seed),
            cell: Arc::new(Mutex::new(Cell {
                phase: HookPhase::Idle,
                value: initial.clone(),
                events: 0,
            })),
            initial,
            subscription: None,
        }
    }

    pub fn activate(&mut self) {
        if self.subscription.is_some() {
            return;
        }
        {
            let mut cell = lock(&self.cell);
            cell.phase = HookPhase::Loading;
            cell.value = self.initial.clone();
        }

        let cell = Arc::clone(&self.cell);
        self.subscription = Some(self.notifier.subscribe(move |value: &T| {
            let mut cell = lock(&cell);
            cell.value = value.clone();
            cell.phase = HookPhase::Ready;
            cell.events += 1;
        }));

        let seeded = (self.seed)();
        let mut cell = lock(&self.cell);
        if cell.phase == HookPhase::Loading {
            cell.value = seeded;
            cell.phase = HookPhase::Ready;
        } else {
            tracing::debug!(key = %self.notifier.key(), "change arrived during seed; keeping it");
        }
    }

    pub fn deactivate(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        let mut cell = lock(&self.cell);
        cell.phase = HookPhase::Idle;
        cell.value = self.initial.clone();
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn phase(&self) -> HookPhase {
        lock(&self.cell).phase
    }

    pub fn current(&self) -> T {
        lock(&self.cell).value.clone()
    }

    /// Borrow the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&lock(&self.cell).value)
    }

    /// Change events applied since construction.
    pub fn events_seen(&self) -> u64 {
        lock(&self.cell).events
    }
}

fn lock<T>(cell: &Mutex<Cell<T>>) -> MutexGuard<'_, Cell<T>> {
    cell.lock().unwrap_or_else(PoisonError::into_inner)
}
