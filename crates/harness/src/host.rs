use std::sync::Arc;

use siteblock_core::SyncConfig;
use siteblock_storage::{HostStore, MemoryStore, SqliteStore, StorageError};
use tempfile::TempDir;

use crate::TestSurface;

/// One host store shared by any number of surfaces.
pub struct TestHost {
    config: SyncConfig,
    store: Arc<dyn HostStore>,
    memory: Option<Arc<MemoryStore>>,
    surfaces: Vec<TestSurface>,
    _dir: Option<TempDir>,
}

impl TestHost {
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    /// In-memory host with quota taken from `config`.
    pub fn with_config(config: SyncConfig) -> Self {
        crate::init_tracing(&config);
        let memory = Arc::new(MemoryStore::new().with_quota(config.store.quota_bytes));
        Self {
            store: memory.clone(),
            memory: Some(memory),
            config,
            surfaces: Vec::new(),
            _dir: None,
        }
    }

    /// Host backed by a SQLite file in a fresh temporary directory.
    pub fn sqlite() -> Result<Self, StorageError> {
        let dir = tempfile::tempdir().map_err(|e| StorageError::Unavailable(e.to_string()))?;
        let mut config = SyncConfig::default();
        config.store.sqlite_path = Some(dir.path().join("host.db"));
        crate::init_tracing(&config);
        let store = SqliteStore::from_config(&config.store)?;
        Ok(Self {
            store: Arc::new(store),
            memory: None,
            config,
            surfaces: Vec::new(),
            _dir: Some(dir),
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn HostStore> {
        Arc::clone(&self.store)
    }

    /// The in-memory store, for fault injection. `None` on SQLite hosts.
    pub fn memory(&self) -> Option<&MemoryStore> {
        self.memory.as_deref()
    }

    pub fn add_surface(&mut self) -> usize {
        let surface = TestSurface::new(self.store(), &self.config);
        self.surfaces.push(surface);
        let index = self.surfaces.len() - 1;
        tracing::debug!(index, context = %self.surfaces[index].blocker.context_id(), "added surface");
        index
    }

    pub fn surface(&self, index: usize) -> &TestSurface {
        &self.surfaces[index]
    }

    pub fn surface_mut(&mut self, index: usize) -> &mut TestSurface {
        &mut self.surfaces[index]
    }

    pub fn surfaces(&self) -> &[TestSurface] {
        &self.surfaces
    }
}

impl Default for TestHost {
    fn default() -> Self {
        Self::new()
    }
}
