pub mod assembly;
pub mod catalog;
pub mod onboard;
pub mod status;
pub mod transfer;

use std::sync::Arc;
use wallcost_assembly::Workspace;
use wallcost_config::{AppConfig, StorageBackend, StorageConfig};
use wallcost_core::event::TracingSink;
use wallcost_core::store::RecordStore;
use wallcost_storage::{FileStore, InMemoryStore};

pub type CmdResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Open the configured record store backend.
pub async fn open_store(storage: &StorageConfig) -> CmdResult<Arc<dyn RecordStore>> {
    let path = storage.resolved_path();
    let store: Arc<dyn RecordStore> = match storage.backend {
        StorageBackend::Memory => Arc::new(InMemoryStore::new()),
        StorageBackend::File => Arc::new(FileStore::new(path.clone())),
        #[cfg(feature = "sqlite")]
        StorageBackend::Sqlite => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Arc::new(wallcost_storage::SqliteStore::new(&path.to_string_lossy()).await?)
        }
        #[cfg(not(feature = "sqlite"))]
        StorageBackend::Sqlite => {
            return Err("this build has no SQLite support; set storage.backend = \"file\"".into());
        }
    };
    tracing::debug!(backend = store.name(), path = %path.display(), "Record store opened");
    Ok(store)
}

/// Load the config and open a workspace over the configured store.
pub async fn open_workspace() -> CmdResult<(AppConfig, Workspace)> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let store = open_store(&config.storage).await?;
    let workspace =
        Workspace::open(store, &config.assemblies.name_prefix, Arc::new(TracingSink)).await?;
    Ok((config, workspace))
}

/// Format a price with thousands separators.
pub fn money(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut out = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if rounded < 0 { format!("-{out}") } else { out }
}
