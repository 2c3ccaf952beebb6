//! Notifications: success/failure notices for whoever drives the workflows.
//!
//! Catalog and assembly operations publish a [`Notice`] when they finish.
//! The CLI logs them through [`TracingSink`]; embedding applications can
//! subscribe to an [`EventBus`] instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Outcome of a user-visible operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Notice {
    /// A price list was uploaded into the catalog
    CatalogUpserted {
        inserted: usize,
        updated: usize,
        skipped_rows: usize,
        timestamp: DateTime<Utc>,
    },

    /// An interchange workbook was imported
    AssembliesImported {
        created: usize,
        updated: usize,
        diagnostics: usize,
        timestamp: DateTime<Utc>,
    },

    /// Assemblies were exported to a workbook
    AssembliesExported {
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// The extra-column schema changed and every assembly was migrated
    SchemaMigrated {
        columns: usize,
        assemblies: usize,
        timestamp: DateTime<Utc>,
    },

    /// An operation failed
    Failed {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl Notice {
    pub fn failed(context: &str, error: &dyn std::error::Error) -> Self {
        Notice::Failed {
            context: context.to_string(),
            error_message: error.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Notice::Failed { .. })
    }
}

/// Receives notices. Must never fail the operation that produced them.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Logs notices with `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notice: Notice) {
        match &notice {
            Notice::CatalogUpserted {
                inserted,
                updated,
                skipped_rows,
                ..
            } => tracing::info!(inserted, updated, skipped_rows, "Price list uploaded"),
            Notice::AssembliesImported {
                created,
                updated,
                diagnostics,
                ..
            } => tracing::info!(created, updated, diagnostics, "Assemblies imported"),
            Notice::AssembliesExported { count, .. } => {
                tracing::info!(count, "Assemblies exported")
            }
            Notice::SchemaMigrated {
                columns,
                assemblies,
                ..
            } => tracing::info!(columns, assemblies, "Extra-column schema migrated"),
            Notice::Failed {
                context,
                error_message,
                ..
            } => tracing::error!(%context, error = %error_message, "Operation failed"),
        }
    }
}

/// A broadcast-based bus for notices.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<Notice>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to receive notices.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Notice>> {
        self.sender.subscribe()
    }
}

impl NotificationSink for EventBus {
    fn notify(&self, notice: Notice) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(notice));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
