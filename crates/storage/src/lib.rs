//! RecordStore implementations for wallcost.

#[cfg(any(test, feature = "test-util"))]
pub mod failing;
pub mod file_backend;
pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(test, feature = "test-util"))]
pub use failing::FailingStore;
pub use file_backend::FileStore;
pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
