use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use siteblock_core::ids::ListenerId;

use crate::error::StorageError;
use crate::listeners::ListenerRegistry;
use crate::traits::{entry_size, AreaName, ChangeEvent, HostStore, NativeListener, StorageChange};

/// Scripted failures for [`MemoryStore`].
#[derive(Debug, Default, Clone)]
pub struct FaultPlan {
    pub fail_reads: bool,
    pub fail_writes: bool,
    /// Fail this many upcoming writes, then succeed again.
    pub failing_writes: usize,
}

/// In-process host store. Optionally fails reads or writes on demand so that
/// recovery paths can be exercised.
pub struct MemoryStore {
    area: AreaName,
    quota_bytes: Option<u64>,
    entries: Mutex<BTreeMap<String, Value>>,
    faults: Mutex<FaultPlan>,
    listeners: ListenerRegistry,
    writes: Mutex<u64>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_area(AreaName::Local)
    }

    pub fn with_area(area: AreaName) -> Self {
        Self {
            area,
            quota_bytes: None,
            entries: Mutex::new(BTreeMap::new()),
            faults: Mutex::new(FaultPlan::default()),
            listeners: ListenerRegistry::new(),
            writes: Mutex::new(0),
        }
    }

    pub fn with_quota(mut self, quota_bytes: Option<u64>) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    pub fn fail_reads(&self, fail: bool) {
        self.faults().fail_reads = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.faults().fail_writes = fail;
    }

    pub fn fail_next_writes(&self, count: usize) {
        self.faults().failing_writes = count;
    }

    pub fn heal(&self) {
        *self.faults() = FaultPlan::default();
    }

    /// Number of successful writes so far, including no-op writes.
    pub fn write_count(&self) -> u64 {
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, FaultPlan> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Value>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_read(&self) -> Result<(), StorageError> {
        if self.faults().fail_reads {
            return Err(StorageError::Unavailable("injected read failure".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StorageError> {
        let mut faults = self.faults();
        if faults.fail_writes {
            return Err(StorageError::Unavailable("injected write failure".into()));
        }
        if faults.failing_writes > 0 {
            faults.failing_writes -= 1;
            return Err(StorageError::Unavailable("injected write failure".into()));
        }
        Ok(())
    }

    fn record_write(&self) {
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn total_size(entries: &BTreeMap<String, Value>) -> Result<u64, StorageError> {
        entries
            .iter()
            .map(|(k, v)| entry_size(k, v))
            .sum()
    }

    fn event(&self, changes: BTreeMap<String, StorageChange>) -> ChangeEvent {
        ChangeEvent { area: self.area, changes }
    }
}

impl HostStore for MemoryStore {
    fn area(&self) -> AreaName {
        self.area
    }

    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        self.check_read()?;
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.check_write()?;
        let mut changes = BTreeMap::new();
        {
            let mut entries = self.entries();
            if let Some(quota) = self.quota_bytes {
                let current = Self::total_size(&entries)?;
                let old = match entries.get(key) {
                    Some(v) => entry_size(key, v)?,
                    None => 0,
                };
                let needed = current - old + entry_size(key, &value)?;
                if needed > quota {
                    return Err(StorageError::QuotaExceeded { needed, quota });
                }
            }
            let old_value = entries.insert(key.to_string(), value.clone());
            if old_value.as_ref() != Some(&value) {
                changes.insert(
                    key.to_string(),
                    StorageChange { old_value, new_value: Some(value) },
                );
            }
            tracing::debug!(key, changed = !changes.is_empty(), "memory store set");
            self.listeners.enqueue(self.event(changes));
        }
        self.record_write();
        self.listeners.flush();
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_write()?;
        let mut changes = BTreeMap::new();
        {
            let mut entries = self.entries();
            if let Some(old_value) = entries.remove(key) {
                changes.insert(
                    key.to_string(),
                    StorageChange { old_value: Some(old_value), new_value: None },
                );
            }
            self.listeners.enqueue(self.event(changes));
        }
        self.record_write();
        self.listeners.flush();
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.check_write()?;
        {
            let mut entries = self.entries();
            let changes = std::mem::take(&mut *entries)
                .into_iter()
                .map(|(key, old_value)| {
                    (key, StorageChange { old_value: Some(old_value), new_value: None })
                })
                .collect();
            self.listeners.enqueue(self.event(changes));
        }
        self.record_write();
        self.listeners.flush();
        Ok(())
    }

    fn add_listener(&self, listener: NativeListener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}
