use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use siteblock_core::config::StoreConfig;
use siteblock_core::ids::ListenerId;

use crate::error::StorageError;
use crate::listeners::ListenerRegistry;
use crate::traits::{entry_size, AreaName, ChangeEvent, HostStore, NativeListener, StorageChange};

fn encode(value: &Value) -> Result<Vec<u8>, StorageError> {
    rmp_serde::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Decode a stored blob, refusing it if the checksum does not match.
fn decode(key: &str, blob: &[u8], checksum: &[u8]) -> Result<Value, StorageError> {
    if blake3::hash(blob).as_bytes().as_slice() != checksum {
        return Err(StorageError::Corrupt { key: key.to_string() });
    }
    rmp_serde::from_slice(blob).map_err(|_| StorageError::Corrupt { key: key.to_string() })
}

/// Host store persisted in a single SQLite table. Values are msgpack blobs
/// with a blake3 checksum; change events go to listeners in this process.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    area: AreaName,
    quota_bytes: Option<u64>,
    listeners: ListenerRegistry,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Open the store described by `config`: on disk when a path is given,
    /// in memory otherwise.
    pub fn from_config(config: &StoreConfig) -> Result<Self, StorageError> {
        let store = match &config.sqlite_path {
            Some(path) => Self::open(path)?,
            None => Self::open_in_memory()?,
        };
        tracing::info!(path = ?config.sqlite_path, quota = ?config.quota_bytes, "opened sqlite store");
        Ok(store.with_quota(config.quota_bytes))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            area: AreaName::Local,
            quota_bytes: None,
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn with_area(mut self, area: AreaName) -> Self {
        self.area = area;
        self
    }

    pub fn with_quota(mut self, quota_bytes: Option<u64>) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_row(
        conn: &Connection,
        key: &str,
    ) -> Result<Option<(Vec<u8>, Vec<u8>, i64)>, StorageError> {
        Ok(conn
            .query_row(
                "SELECT value, checksum, size FROM kv WHERE key = ?1",
                rusqlite::params![key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?)
    }

    /// Previous value for an event. A corrupt old value is reported as absent
    /// so that it can still be overwritten.
    fn previous_value(key: &str, row: Option<&(Vec<u8>, Vec<u8>, i64)>) -> Option<Value> {
        let (blob, checksum, _) = row?;
        match decode(key, blob, checksum) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "overwriting unreadable value");
                None
            }
        }
    }

    fn event(&self, changes: BTreeMap<String, StorageChange>) -> ChangeEvent {
        ChangeEvent { area: self.area, changes }
    }
}

impl HostStore for SqliteStore {
    fn area(&self) -> AreaName {
        self.area
    }

    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let conn = self.conn();
        match Self::read_row(&conn, key)? {
            Some((blob, checksum, _)) => Ok(Some(decode(key, &blob, &checksum)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let blob = encode(&value)?;
        let checksum = blake3::hash(&blob);
        let size = entry_size(key, &value)?;

        let mut changes = BTreeMap::new();
        {
            let mut conn = self.conn();
            let tx = conn.transaction()?;
            let old_row = Self::read_row(&tx, key)?;

            if let Some(quota) = self.quota_bytes {
                let total: i64 =
                    tx.query_row("SELECT COALESCE(SUM(size), 0) FROM kv", [], |row| row.get(0))?;
                let old_size = old_row.as_ref().map_or(0, |(_, _, s)| *s);
                let needed = (total - old_size) as u64 + size;
                if needed > quota {
                    return Err(StorageError::QuotaExceeded { needed, quota });
                }
            }

            tx.execute(
                "INSERT INTO kv (key, value, checksum, size) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    checksum = excluded.checksum,
                    size = excluded.size,
                    updated_at = CAST(unixepoch('now','subsec') * 1000 AS INTEGER)",
                rusqlite::params![key, blob, checksum.as_bytes().as_slice(), size as i64],
            )?;
            tx.commit()?;

            let old_value = Self::previous_value(key, old_row.as_ref());
            if old_value.as_ref() != Some(&value) {
                changes.insert(
                    key.to_string(),
                    StorageChange { old_value, new_value: Some(value) },
                );
            }
            tracing::debug!(key, size, changed = !changes.is_empty(), "sqlite store set");
            self.listeners.enqueue(self.event(changes));
        }
        self.listeners.flush();
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut changes = BTreeMap::new();
        {
            let mut conn = self.conn();
            let tx = conn.transaction()?;
            let old_row = Self::read_row(&tx, key)?;
            tx.execute("DELETE FROM kv WHERE key = ?1", rusqlite::params![key])?;
            tx.commit()?;
            if old_row.is_some() {
                changes.insert(
                    key.to_string(),
                    StorageChange {
                        old_value: Self::previous_value(key, old_row.as_ref()),
                        new_value: None,
                    },
                );
            }
            self.listeners.enqueue(self.event(changes));
        }
        self.listeners.flush();
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut changes = BTreeMap::new();
        {
            let mut conn = self.conn();
            let tx = conn.transaction()?;
            let rows: Vec<(String, Vec<u8>, Vec<u8>, i64)> = {
                let mut stmt = tx.prepare("SELECT key, value, checksum, size FROM kv ORDER BY key")?;
                stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
                    .collect::<Result<Vec<_>, _>>()?
            };
            tx.execute("DELETE FROM kv", [])?;
            tx.commit()?;
            for (key, blob, checksum, size) in rows {
                let old_value = Self::previous_value(&key, Some(&(blob, checksum, size)));
                changes.insert(key, StorageChange { old_value, new_value: None });
            }
            self.listeners.enqueue(self.event(changes));
        }
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

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("area", &self.area)
            .field("quota_bytes", &self.quota_bytes)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn values_roundtrip_through_sqlite() {
        let store = SqliteStore::open_in_memory().unwrap();
        let value = json!([{"domain": "a.com", "title": "A", "favicon": "null", "blocked": true}]);
        store.set("blockedDomains-v2", value.clone()).unwrap();
        assert_eq!(store.get("blockedDomains-v2").unwrap(), Some(value));
        assert_eq!(store.get("enabled-v1").unwrap(), None);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("enabled-v1", json!(true)).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("enabled-v1").unwrap(), Some(json!(true)));
    }

    #[test]
    fn checksum_mismatch_is_corruption() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("k", json!({"a": 1})).unwrap();
        store
            .conn()
            .execute("UPDATE kv SET value = X'C0' WHERE key = 'k'", [])
            .unwrap();
        assert!(matches!(store.get("k"), Err(StorageError::Corrupt { .. })));

        // A corrupt value can still be replaced.
        store.set("k", json!(2)).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(json!(2)));
    }

    #[test]
    fn emits_events_and_skips_noops() {
        let store = SqliteStore::open_in_memory().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        store.add_listener(Arc::new(move |e: &ChangeEvent| sink.lock().unwrap().push(e.clone())));

        store.set("k", json!(1)).unwrap();
        store.set("k", json!(1)).unwrap();
        store.set("j", json!("x")).unwrap();
        store.clear().unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2].changes.len(), 2);
        assert_eq!(seen[2].change("k").unwrap().old_value, Some(json!(1)));
    }

    #[test]
    fn quota_counts_existing_entries() {
        let store = SqliteStore::open_in_memory().unwrap().with_quota(Some(20));
        store.set("a", json!("0123456789")).unwrap(); // 1 + 12
        let err = store.set("b", json!("0123456789")).unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { needed: 26, quota: 20 }));
        // Replacing an entry only counts the difference.
        store.set("a", json!("01234567890123")).unwrap();
    }

    #[test]
    fn from_config_applies_quota() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            quota_bytes: Some(8),
            sqlite_path: Some(dir.path().join("cfg.db")),
        };
        let store = SqliteStore::from_config(&config).unwrap();
        assert!(matches!(
            store.set("key", json!("too long for eight")),
            Err(StorageError::QuotaExceeded { quota: 8, .. })
        ));
        assert!(dir.path().join("cfg.db").exists());
    }
}
