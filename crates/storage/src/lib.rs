pub mod error;
pub mod listeners;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use error::StorageError;
pub use memory::{FaultPlan, MemoryStore};
pub use sqlite::SqliteStore;
pub use traits::*;
