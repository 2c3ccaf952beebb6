//! RecordStore trait: durable keyed records with per-collection indexes.
//!
//! Backends see opaque JSON bodies plus the index values each record
//! declares, so one implementation serves every collection. Domain code uses
//! the typed [`Collection`] view instead of the raw trait.
//!
//! Implementations: in-memory (for testing), JSON-lines files, SQLite.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::assembly::WallAssembly;
use crate::error::StoreError;
use crate::item::PricedItem;
use crate::schema::{SCHEMA_RECORD_ID, SchemaDescriptor};

/// Index on [`PricedItem::key`].
pub const ITEM_KEY_INDEX: &str = "key";

/// Index on [`WallAssembly::name`].
pub const ASSEMBLY_NAME_INDEX: &str = "name";

/// A record as the backend stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,

    /// Index name → value, maintained by the backend for `get_by_index`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub indexes: BTreeMap<String, String>,

    pub body: serde_json::Value,
}

impl StoredRecord {
    pub fn encode<R: Record>(record: &R) -> Result<Self, StoreError> {
        let body = serde_json::to_value(record).map_err(|e| StoreError::Corrupt {
            collection: R::COLLECTION.to_string(),
            id: record.id().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            id: record.id().to_string(),
            indexes: record.index_values(),
            body,
        })
    }

    pub fn decode<R: Record>(&self) -> Result<R, StoreError> {
        serde_json::from_value(self.body.clone()).map_err(|e| StoreError::Corrupt {
            collection: R::COLLECTION.to_string(),
            id: self.id.clone(),
            reason: e.to_string(),
        })
    }
}

/// One write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Put {
        collection: String,
        record: StoredRecord,
    },
    Delete {
        collection: String,
        id: String,
    },
}

impl WriteOp {
    pub fn collection(&self) -> &str {
        match self {
            WriteOp::Put { collection, .. } | WriteOp::Delete { collection, .. } => collection,
        }
    }
}

/// Writes spanning several collections, applied by [`RecordStore::commit`]
/// as one unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<R: Record>(&mut self, record: &R) -> Result<&mut Self, StoreError> {
        self.ops.push(WriteOp::Put {
            collection: R::COLLECTION.to_string(),
            record: StoredRecord::encode(record)?,
        });
        Ok(self)
    }

    pub fn put_all<'a, R: Record + 'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a R>,
    ) -> Result<&mut Self, StoreError> {
        for record in records {
            self.put(record)?;
        }
        Ok(self)
    }

    pub fn delete<R: Record>(&mut self, id: &str) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            collection: R::COLLECTION.to_string(),
            id: id.to_string(),
        });
        self
    }

    /// Append an already-encoded op.
    pub fn push(&mut self, op: WriteOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Touched collections in order of first appearance.
    pub fn collections(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for op in &self.ops {
            if !seen.contains(&op.collection()) {
                seen.push(op.collection());
            }
        }
        seen
    }
}

/// The core RecordStore trait.
///
/// Batch operations are atomic: either every record in the batch is
/// written or none is.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "file", "in_memory").
    fn name(&self) -> &str;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredRecord>, StoreError>;

    async fn get_all(&self, collection: &str) -> Result<Vec<StoredRecord>, StoreError>;

    /// Records whose `index` value equals `value` exactly.
    async fn get_by_index(
        &self,
        collection: &str,
        index: &str,
        value: &str,
    ) -> Result<Vec<StoredRecord>, StoreError>;

    /// Insert or replace a record by id.
    async fn put(&self, collection: &str, record: StoredRecord) -> Result<(), StoreError>;

    /// Insert or replace several records as one unit.
    async fn put_many(
        &self,
        collection: &str,
        records: Vec<StoredRecord>,
    ) -> Result<(), StoreError>;

    /// Returns whether a record was removed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    /// Remove several records as one unit, returning how many existed.
    async fn delete_many(&self, collection: &str, ids: &[String]) -> Result<usize, StoreError>;

    async fn clear(&self, collection: &str) -> Result<(), StoreError>;

    /// Apply puts and deletes across collections as one unit.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}

/// A domain type persisted in its own collection.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: &'static str;

    fn id(&self) -> &str;

    fn index_values(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

impl Record for PricedItem {
    const COLLECTION: &'static str = "priced_items";

    fn id(&self) -> &str {
        &self.id
    }

    fn index_values(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(ITEM_KEY_INDEX.to_string(), self.key.clone())])
    }
}

impl Record for WallAssembly {
    const COLLECTION: &'static str = "wall_assemblies";

    fn id(&self) -> &str {
        &self.id
    }

    fn index_values(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(ASSEMBLY_NAME_INDEX.to_string(), self.name.clone())])
    }
}

impl Record for SchemaDescriptor {
    const COLLECTION: &'static str = "schema";

    fn id(&self) -> &str {
        SCHEMA_RECORD_ID
    }
}

/// Typed view of one collection in a [`RecordStore`].
pub struct Collection<R> {
    store: Arc<dyn RecordStore>,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for Collection<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _record: PhantomData,
        }
    }
}

impl<R: Record> Collection<R> {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.store.name()
    }

    pub async fn get(&self, id: &str) -> Result<Option<R>, StoreError> {
        match self.store.get(R::COLLECTION, id).await? {
            Some(record) => Ok(Some(record.decode()?)),
            None => Ok(None),
        }
    }

    pub async fn get_all(&self) -> Result<Vec<R>, StoreError> {
        self.store
            .get_all(R::COLLECTION)
            .await?
            .iter()
            .map(|record| record.decode::<R>())
            .collect()
    }

    pub async fn find_by(&self, index: &str, value: &str) -> Result<Vec<R>, StoreError> {
        self.store
            .get_by_index(R::COLLECTION, index, value)
            .await?
            .iter()
            .map(|record| record.decode::<R>())
            .collect()
    }

    pub async fn put(&self, record: &R) -> Result<(), StoreError> {
        self.store
            .put(R::COLLECTION, StoredRecord::encode(record)?)
            .await
    }

    pub async fn put_many(&self, records: &[R]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let encoded = records
            .iter()
            .map(StoredRecord::encode)
            .collect::<Result<Vec<_>, _>>()?;
        self.store.put_many(R::COLLECTION, encoded).await
    }

    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.store.delete(R::COLLECTION, id).await
    }

    pub async fn delete_many(&self, ids: &[String]) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.store.delete_many(R::COLLECTION, ids).await
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store.clear(R::COLLECTION).await
    }
}
