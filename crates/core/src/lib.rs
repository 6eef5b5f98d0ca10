pub mod config;
pub mod error;
pub mod ids;
pub mod language;
pub mod outcome;
pub mod storage_key;
pub mod website;

pub use config::{StoreConfig, SyncConfig};
pub use error::{ConfigError, ValidationError};
pub use ids::*;
pub use language::Language;
pub use outcome::Outcome;
pub use storage_key::StorageKey;
pub use website::{ActivePage, BlockedWebsite, DEFAULT_FAVICON};
