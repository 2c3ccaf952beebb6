//! Error types for the wallcost domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Storage failures have their own bounded-context enum so backends can be
//! implemented without depending on the catalog or assembly layers.

use thiserror::Error;

/// The top-level error type for all wallcost operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Input validation (upload headers, mapping sheet, slot names) ---
    #[error("Validation error: {0}")]
    Validation(String),

    // --- Lookups ---
    #[error("Record not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Content key '{key}' is already used by item {existing_id}")]
    DuplicateKey { key: String, existing_id: String },

    // --- Storage ---
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    // --- Spreadsheet bytes ---
    #[error("Workbook error: {0}")]
    Workbook(String),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(collection: &str, id: &str) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised by a [`RecordStore`](crate::store::RecordStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Corrupt record {collection}/{id}: {reason}")]
    Corrupt {
        collection: String,
        id: String,
        reason: String,
    },
}
