use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("quota exceeded: write needs {needed} bytes, quota is {quota}")]
    QuotaExceeded { needed: u64, quota: u64 },

    #[error("corrupt value under key {key}")]
    Corrupt { key: String },
}
