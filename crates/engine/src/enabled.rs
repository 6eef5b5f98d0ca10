use std::sync::Arc;

use serde_json::Value;
use siteblock_core::website::validate_boolean;
use siteblock_core::{Outcome, StorageKey};
use siteblock_storage::HostStore;

use crate::error::EngineError;
use crate::notifier::ChangeNotifier;
use crate::sync::SyncHook;

/// The global on/off switch for blocking.
#[derive(Clone)]
pub struct EnabledFlag {
    store: Arc<dyn HostStore>,
    key: StorageKey,
    default: bool,
}

impl EnabledFlag {
    pub fn new(store: Arc<dyn HostStore>, default: bool) -> Self {
        Self {
            store,
            key: StorageKey::enabled(),
            default,
        }
    }

    pub fn key(&self) -> &StorageKey {
        &self.key
    }

    pub fn default_value(&self) -> bool {
        self.default
    }

    /// Absent reads as the default; anything stored is coerced by truthiness.
    pub fn parse(raw: Option<&Value>, default: bool) -> bool {
        match raw {
            None => default,
            Some(_) => validate_boolean(raw),
        }
    }

    pub fn try_get(&self) -> Result<bool, EngineError> {
        let raw = self.store.get(self.key.as_str())?;
        Ok(Self::parse(raw.as_ref(), self.default))
    }

    /// Never fails; a read error yields the default.
    pub fn get(&self) -> bool {
        Outcome::from(self.try_get()).unwrap_or(self.default)
    }

    /// Store `enabled` and return it.
    pub fn set(&self, enabled: bool) -> Result<bool, EngineError> {
        self.store.set(self.key.as_str(), Value::Bool(enabled))?;
        tracing::debug!(enabled, "set enabled flag");
        Ok(enabled)
    }

    /// Flip the stored flag and return the new value.
    pub fn toggle(&self) -> Result<bool, EngineError> {
        let current = self.try_get()?;
        self.set(!current)
    }

    pub fn notifier(&self) -> ChangeNotifier<bool> {
        let default = self.default;
        ChangeNotifier::new(Arc::clone(&self.store), self.key.clone(), move |raw| {
            Self::parse(raw, default)
        })
    }

    pub fn hook(&self, notifier: ChangeNotifier<bool>) -> SyncHook<bool> {
        let flag = self.clone();
        SyncHook::new(notifier, self.default, move || flag.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use siteblock_storage::MemoryStore;

    #[test]
    fn absent_uses_default() {
        let store = Arc::new(MemoryStore::new());
        assert!(!EnabledFlag::new(store.clone(), false).get());
        assert!(EnabledFlag::new(store, true).get());
    }

    #[test]
    fn stored_values_are_coerced() {
        let store = Arc::new(MemoryStore::new());
        let flag = EnabledFlag::new(store.clone(), true);
        for (raw, expected) in [(json!(0), false), (json!("on"), true), (json!(null), false)] {
            store.set("enabled-v1", raw).unwrap();
            assert_eq!(flag.get(), expected);
        }
    }

    #[test]
    fn read_failure_degrades_to_default() {
        let store = Arc::new(MemoryStore::new());
        let flag = EnabledFlag::new(store.clone(), true);
        flag.set(false).unwrap();
        store.fail_reads(true);
        assert!(flag.try_get().is_err());
        assert!(flag.get());
        assert!(flag.toggle().is_err());
    }

    #[test]
    fn toggle_round_trips() {
        let store = Arc::new(MemoryStore::new());
        let flag = EnabledFlag::new(store, false);
        assert!(flag.toggle().unwrap());
        assert!(flag.get());
        assert!(!flag.toggle().unwrap());
        assert!(!flag.get());
    }

    #[test]
    fn hook_follows_writes() {
        let store = Arc::new(MemoryStore::new());
        let flag = EnabledFlag::new(store, false);
        let mut hook = flag.hook(flag.notifier());
        hook.activate();
        assert!(!hook.current());
        flag.set(true).unwrap();
        assert!(hook.current());
    }
}
