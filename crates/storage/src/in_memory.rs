//! In-memory store: useful for testing and throwaway sessions.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use wallcost_core::error::StoreError;
use wallcost_core::store::{RecordStore, StoredRecord, WriteBatch, WriteOp};

pub(crate) type CollectionMap = BTreeMap<String, StoredRecord>;

/// A store that keeps every collection in a map keyed by record id.
pub struct InMemoryStore {
    collections: Arc<RwLock<HashMap<String, CollectionMap>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply every op of a batch to `collections`.
pub(crate) fn apply_ops(collections: &mut HashMap<String, CollectionMap>, ops: Vec<WriteOp>) {
    for op in ops {
        match op {
            WriteOp::Put { collection, record } => {
                collections
                    .entry(collection)
                    .or_default()
                    .insert(record.id.clone(), record);
            }
            WriteOp::Delete { collection, id } => {
                if let Some(map) = collections.get_mut(&collection) {
                    map.remove(&id);
                }
            }
        }
    }
}

/// Records of `map` whose `index` equals `value`.
pub(crate) fn matching(map: &CollectionMap, index: &str, value: &str) -> Vec<StoredRecord> {
    map.values()
        .filter(|r| r.indexes.get(index).is_some_and(|v| v == value))
        .cloned()
        .collect()
}

#[async_trait]
impl RecordStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
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
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(record.id.clone(), record);
        Ok(())
    }

    async fn put_many(
        &self,
        collection: &str,
        records: Vec<StoredRecord>,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let map = collections.entry(collection.to_string()).or_default();
        for record in records {
            map.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .is_some_and(|c| c.remove(id).is_some()))
    }

    async fn delete_many(&self, collection: &str, ids: &[String]) -> Result<usize, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(map) = collections.get_mut(collection) else {
            return Ok(0);
        };
        Ok(ids.iter().filter(|id| map.remove(id.as_str()).is_some()).count())
    }

    async fn clear(&self, collection: &str) -> Result<(), StoreError> {
        self.collections.write().await.remove(collection);
        Ok(())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        apply_ops(&mut collections, batch.into_ops());
        Ok(())
    }
}
