//! Store wrapper that fails writes to chosen collections.
//!
//! Reads always pass through. A failing write (or a commit that touches a
//! failing collection) returns `StoreError::Storage` before reaching the
//! inner store, the same outcome an atomic backend gives on a full disk.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use wallcost_core::error::StoreError;
use wallcost_core::store::{RecordStore, StoredRecord, WriteBatch};

use crate::in_memory::InMemoryStore;

pub struct FailingStore {
    inner: Arc<dyn RecordStore>,
    failing: Mutex<HashSet<String>>,
}

impl FailingStore {
    pub fn new(inner: Arc<dyn RecordStore>) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    /// Make every later write to `collection` fail.
    pub fn fail_writes(&self, collection: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(collection.to_string());
        }
    }

    pub fn heal(&self) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.clear();
        }
    }

    fn check(&self, collection: &str) -> Result<(), StoreError> {
        let blocked = self
            .failing
            .lock()
            .map(|failing| failing.contains(collection))
            .unwrap_or(true);
        if blocked {
            return Err(StoreError::Storage(format!("disk full writing {collection}")));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredRecord>, StoreError> {
        self.inner.get(collection, id).await
    }

    async fn get_all(&self, collection: &str) -> Result<Vec<StoredRecord>, StoreError> {
        self.inner.get_all(collection).await
    }

    async fn get_by_index(
        &self,
        collection: &str,
        index: &str,
        value: &str,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        self.inner.get_by_index(collection, index, value).await
    }

    async fn put(&self, collection: &str, record: StoredRecord) -> Result<(), StoreError> {
        self.check(collection)?;
        self.inner.put(collection, record).await
    }

    async fn put_many(
        &self,
        collection: &str,
        records: Vec<StoredRecord>,
    ) -> Result<(), StoreError> {
        self.check(collection)?;
        self.inner.put_many(collection, records).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        self.check(collection)?;
        self.inner.delete(collection, id).await
    }

    async fn delete_many(&self, collection: &str, ids: &[String]) -> Result<usize, StoreError> {
        self.check(collection)?;
        self.inner.delete_many(collection, ids).await
    }

    async fn clear(&self, collection: &str) -> Result<(), StoreError> {
        self.check(collection)?;
        self.inner.clear(collection).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        for collection in batch.collections() {
            self.check(collection)?;
        }
        self.inner.commit(batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use wallcost_core::store::WriteOp;

    fn record(id: &str) -> StoredRecord {
        StoredRecord {
            id: id.into(),
            indexes: BTreeMap::new(),
            body: json!({ "id": id }),
        }
    }

    #[tokio::test]
    async fn blocked_commit_writes_nothing() {
        let store = FailingStore::in_memory();
        store.fail_writes("walls");

        let mut batch = WriteBatch::new();
        batch
            .push(WriteOp::Put {
                collection: "schema".into(),
                record: record("s"),
            })
            .push(WriteOp::Put {
                collection: "walls".into(),
                record: record("w"),
            });
        assert!(store.commit(batch).await.is_err());
        assert!(store.get("schema", "s").await.unwrap().is_none());

        store.heal();
        store.put("walls", record("w")).await.unwrap();
        assert!(store.get("walls", "w").await.unwrap().is_some());
    }
}
