//! File-based store: one JSON-lines file per collection.
//!
//! Each line of `<dir>/<collection>.jsonl` is a JSON-encoded `StoredRecord`.
//! Collections are loaded into memory on open and the touched collections are
//! rewritten on every mutation. A failed write restores the in-memory copy so
//! it never runs ahead of the files. A multi-collection commit that fails
//! part-way also rewrites the files it already replaced.
//!
//! Default location: `~/.wallcost/data/`

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use wallcost_core::error::StoreError;
use wallcost_core::store::{RecordStore, StoredRecord, WriteBatch};

use crate::in_memory::{CollectionMap, apply_ops, matching};

/// A file-backed store using JSONL.
///
/// Reads are served from memory; writes are durable before they return.
pub struct FileStore {
    dir: PathBuf,
    collections: Arc<RwLock<HashMap<String, CollectionMap>>>,
}

impl FileStore {
    /// Open (or prepare) a store rooted at `dir`.
    ///
    /// Existing `*.jsonl` files are loaded; the directory is created on the
    /// first write.
    pub fn new(dir: PathBuf) -> Self {
        let collections = Self::load_from_disk(&dir);
        debug!(
            dir = %dir.display(),
            collections = collections.len(),
            "File store loaded"
        );
        Self {
            dir,
            collections: Arc::new(RwLock::new(collections)),
        }
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.jsonl"))
    }

    fn load_from_disk(dir: &Path) -> HashMap<String, CollectionMap> {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return HashMap::new(); // Directory doesn't exist yet, start empty
        };

        let mut collections = HashMap::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|e| e != "jsonl") {
                continue;
            }
            let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            collections.insert(name, Self::load_collection(&path));
        }
        collections
    }

    fn load_collection(path: &Path) -> CollectionMap {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable collection file");
                return CollectionMap::new();
            }
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<StoredRecord>(line) {
                Ok(record) => Some((record.id.clone(), record)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping corrupted record");
                    None
                }
            })
            .collect()
    }

    /// Rewrite one collection file via a temp file + rename.
    fn flush(&self, collection: &str, records: &CollectionMap) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            StoreError::Storage(format!("Failed to create data directory: {e}"))
        })?;

        let mut content = String::new();
        for record in records.values() {
            let line = serde_json::to_string(record).map_err(|e| {
                StoreError::Storage(format!("Failed to serialize record {}: {e}", record.id))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        let path = self.collection_path(collection);
        let tmp = path.with_extension("jsonl.tmp");
        std::fs::write(&tmp, &content)
            .map_err(|e| StoreError::Storage(format!("Failed to write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &path).map_err(|e| {
            StoreError::Storage(format!("Failed to replace {}: {e}", path.display()))
        })?;
        Ok(())
    }

    /// Apply `mutate` to one collection and flush it, restoring the previous
    /// contents if the flush fails.
    async fn mutate<T>(
        &self,
        collection: &str,
        mutate: impl FnOnce(&mut CollectionMap) -> T,
    ) -> Result<T, StoreError> {
        let mut collections = self.collections.write().await;
        let map = collections.entry(collection.to_string()).or_default();
        let snapshot = map.clone();
        let out = mutate(map);
        if let Err(e) = self.flush(collection, map) {
            *map = snapshot;
            return Err(e);
        }
        Ok(out)
    }
}

#[async_trait]
impl RecordStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredRecord>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn get_all(&self, collection: &str) -> Result<Vec<StoredRecord>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_by_index(
        &self,
        collection: &str,
        index: &str,
        value: &str,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|c| matching(c, index, value))
            .unwrap_or_default())
    }

    async fn put(&self, collection: &str, record: StoredRecord) -> Result<(), StoreError> {
        self.mutate(collection, |map| {
            map.insert(record.id.clone(), record);
        })
        .await
    }

    async fn put_many(
        &self,
        collection: &str,
        records: Vec<StoredRecord>,
    ) -> Result<(), StoreError> {
        let count = records.len();
        self.mutate(collection, |map| {
            for record in records {
                map.insert(record.id.clone(), record);
            }
        })
        .await?;
        debug!(collection, count, "Batch written");
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        if self.get(collection, id).await?.is_none() {
            return Ok(false);
        }
        self.mutate(collection, |map| map.remove(id).is_some()).await
    }

    async fn delete_many(&self, collection: &str, ids: &[String]) -> Result<usize, StoreError> {
        self.mutate(collection, |map| {
            ids.iter().filter(|id| map.remove(id.as_str()).is_some()).count()
        })
        .await
    }

    async fn clear(&self, collection: &str) -> Result<(), StoreError> {
        self.mutate(collection, |map| map.clear()).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let touched: Vec<String> = batch.collections().into_iter().map(String::from).collect();
        let count = batch.len();
        let mut collections = self.collections.write().await;
        let snapshots: Vec<(String, Option<CollectionMap>)> = touched
            .iter()
            .map(|name| (name.clone(), collections.get(name).cloned()))
            .collect();

        apply_ops(&mut collections, batch.into_ops());

        let empty = CollectionMap::new();
        for (flushed, name) in touched.iter().enumerate() {
            let result = self.flush(name, collections.get(name).unwrap_or(&empty));
            let Err(e) = result else { continue };

            for (name, snapshot) in &snapshots[..flushed] {
                if let Err(restore) = self.flush(name, snapshot.as_ref().unwrap_or(&empty)) {
                    warn!(
                        collection = %name,
                        error = %restore,
                        "Could not restore collection file"
                    );
                }
            }
            for (name, snapshot) in snapshots {
                match snapshot {
                    Some(map) => collections.insert(name, map),
                    None => collections.remove(&name),
                };
            }
            return Err(e);
        }

        debug!(collections = touched.len(), count, "Batch committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use tempfile::TempDir;
    use wallcost_core::store::WriteOp;

    fn record(id: &str, name: &str) -> StoredRecord {
        StoredRecord {
            id: id.into(),
            indexes: BTreeMap::from([("name".to_string(), name.to_string())]),
            body: json!({ "id": id, "name": name }),
        }
    }

    #[tokio::test]
    async fn put_persists_across_reopen() {
        let dir = TempDir::new().unwrap();

        let store = FileStore::new(dir.path().to_path_buf());
        store.put("walls", record("w1", "W-01")).await.unwrap();

        let content = std::fs::read_to_string(dir.path().join("walls.jsonl")).unwrap();
        assert!(content.contains("W-01"));

        let reopened = FileStore::new(dir.path().to_path_buf());
        let fetched = reopened.get("walls", "w1").await.unwrap().unwrap();
        assert_eq!(fetched.body["name"], "W-01");
        let by_name = reopened.get_by_index("walls", "name", "W-01").await.unwrap();
        assert_eq!(by_name.len(), 1);
    }

    #[tokio::test]
    async fn delete_persists() {
        let dir = TempDir::new().unwrap();

        let store = FileStore::new(dir.path().to_path_buf());
        store
            .put_many("walls", vec![record("w1", "A"), record("w2", "B")])
            .await
            .unwrap();
        assert!(store.delete("walls", "w1").await.unwrap());
        assert!(!store.delete("walls", "w1").await.unwrap());

        let reopened = FileStore::new(dir.path().to_path_buf());
        assert!(reopened.get("walls", "w1").await.unwrap().is_none());
        assert_eq!(reopened.get_all("walls").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clear_persists() {
        let dir = TempDir::new().unwrap();

        let store = FileStore::new(dir.path().to_path_buf());
        store.put("walls", record("w1", "A")).await.unwrap();
        store.clear("walls").await.unwrap();

        let reopened = FileStore::new(dir.path().to_path_buf());
        assert!(reopened.get_all("walls").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn handles_missing_directory_gracefully() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("not-created-yet"));
        assert!(store.get_all("walls").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn skips_corrupted_lines() {
        let dir = TempDir::new().unwrap();
        let good = serde_json::to_string(&record("w1", "A")).unwrap();
        std::fs::write(
            dir.path().join("walls.jsonl"),
            format!("{good}\nthis is not json\n"),
        )
        .unwrap();

        let store = FileStore::new(dir.path().to_path_buf());
        assert_eq!(store.get_all("walls").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_flush_leaves_memory_unchanged() {
        let dir = TempDir::new().unwrap();
        // A regular file where the data directory should be makes every write fail
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, "").unwrap();

        let store = FileStore::new(blocker);
        let result = store.put("walls", record("w1", "A")).await;
        assert!(result.is_err());
        assert!(store.get("walls", "w1").await.unwrap().is_none());
    }

    fn batch(ops: Vec<WriteOp>) -> WriteBatch {
        let mut batch = WriteBatch::new();
        for op in ops {
            batch.push(op);
        }
        batch
    }

    fn put_op(collection: &str, record: StoredRecord) -> WriteOp {
        WriteOp::Put {
            collection: collection.into(),
            record,
        }
    }

    #[tokio::test]
    async fn commit_writes_every_collection() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        store.put("walls", record("w1", "A")).await.unwrap();

        store
            .commit(batch(vec![
                put_op("schema", record("extra_slots", "s")),
                WriteOp::Delete {
                    collection: "walls".into(),
                    id: "w1".into(),
                },
                put_op("walls", record("w2", "B")),
            ]))
            .await
            .unwrap();

        let reopened = FileStore::new(dir.path().to_path_buf());
        assert!(reopened.get("schema", "extra_slots").await.unwrap().is_some());
        assert!(reopened.get("walls", "w1").await.unwrap().is_none());
        assert!(reopened.get("walls", "w2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_commit_restores_files_already_written() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        store.put("schema", record("extra_slots", "old")).await.unwrap();
        store.put("walls", record("w1", "A")).await.unwrap();

        // A directory in place of the temp file makes the walls flush fail
        std::fs::create_dir(dir.path().join("walls.jsonl.tmp")).unwrap();

        let result = store
            .commit(batch(vec![
                put_op("schema", record("extra_slots", "new")),
                put_op("walls", record("w2", "B")),
            ]))
            .await;
        assert!(result.is_err());

        let schema = store.get("schema", "extra_slots").await.unwrap().unwrap();
        assert_eq!(schema.body["name"], "old");
        assert!(store.get("walls", "w2").await.unwrap().is_none());

        let reopened = FileStore::new(dir.path().to_path_buf());
        let schema = reopened.get("schema", "extra_slots").await.unwrap().unwrap();
        assert_eq!(schema.body["name"], "old");
        assert_eq!(reopened.get_all("walls").await.unwrap().len(), 1);
    }
}
