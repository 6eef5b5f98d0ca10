use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use siteblock_core::ids::ListenerId;

use crate::error::StorageError;

/// Which storage area of the host a store (and its events) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AreaName {
    Local,
    Sync,
    Session,
    Managed,
}

impl AreaName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Sync => "sync",
            Self::Session => "session",
            Self::Managed => "managed",
        }
    }
}

/// Previous and new raw value of one key. `None` means absent.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// One native change notification: every key touched by a single write.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub area: AreaName,
    pub changes: BTreeMap<String, StorageChange>,
}

impl ChangeEvent {
    pub fn change(&self, key: &str) -> Option<&StorageChange> {
        self.changes.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Listener on a store's native change stream. Invoked after the write has
/// landed, once per event, in write order.
pub type NativeListener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// The persistent key-value service shared by every execution context.
///
/// Writes that leave a value unchanged emit no event. Reads are immediately
/// visible to the writer; there is no flush.
pub trait HostStore: Send + Sync {
    fn area(&self) -> AreaName;

    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Remove every key in the area.
    fn clear(&self) -> Result<(), StorageError>;

    fn add_listener(&self, listener: NativeListener) -> ListenerId;

    /// Returns false if the id was not registered.
    fn remove_listener(&self, id: ListenerId) -> bool;

    fn listener_count(&self) -> usize;
}

/// Size of one entry as counted against the quota: key plus JSON encoding.
pub fn entry_size(key: &str, value: &Value) -> Result<u64, StorageError> {
    let json = serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok((key.len() + json.len()) as u64)
}
