use siteblock_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A full replace failed and so did the write meant to restore the
    /// previous collection. Stored state may no longer match either version.
    #[error("rollback failed after write error ({original}): {recovery}")]
    Rollback {
        original: StorageError,
        #[source]
        recovery: StorageError,
    },
}

impl EngineError {
    /// True when storage may hold neither the old nor the new collection.
    pub fn is_inconsistent(&self) -> bool {
        matches!(self, Self::Rollback { .. })
    }
}
