//! SQLite store.
//!
//! Uses a single SQLite database file with two tables:
//! - `records`: one row per (collection, id) with the JSON body
//! - `record_indexes`: one row per declared index value, for `get_by_index`
//!
//! Every write runs in a transaction so a record and its index rows never
//! diverge, and `put_many`/`delete_many`/`commit` commit or roll back as a
//! unit.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info};
use wallcost_core::error::StoreError;
use wallcost_core::store::{RecordStore, StoredRecord, WriteBatch, WriteOp};

/// A SQLite-backed record store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path`.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // Every connection to `:memory:` is its own database
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                collection  TEXT NOT NULL,
                id          TEXT NOT NULL,
                indexes     TEXT NOT NULL DEFAULT '{}',
                body        TEXT NOT NULL,
                written_at  TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("records table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS record_indexes (
                collection  TEXT NOT NULL,
                id          TEXT NOT NULL,
                index_name  TEXT NOT NULL,
                value       TEXT NOT NULL,
                PRIMARY KEY (collection, id, index_name),
                FOREIGN KEY (collection, id) REFERENCES records(collection, id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("record_indexes table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_record_indexes_lookup \
             ON record_indexes(collection, index_name, value)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("lookup index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<StoredRecord, StoreError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let indexes_json: String = row
            .try_get("indexes")
            .map_err(|e| StoreError::QueryFailed(format!("indexes column: {e}")))?;
        let body_json: String = row
            .try_get("body")
            .map_err(|e| StoreError::QueryFailed(format!("body column: {e}")))?;

        let indexes: BTreeMap<String, String> =
            serde_json::from_str(&indexes_json).unwrap_or_default();
        let body = serde_json::from_str(&body_json).map_err(|e| StoreError::Corrupt {
            collection: row.try_get("collection").unwrap_or_default(),
            id: id.clone(),
            reason: e.to_string(),
        })?;

        Ok(StoredRecord { id, indexes, body })
    }

    async fn begin(&self) -> Result<Transaction<'static, Sqlite>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("BEGIN failed: {e}")))
    }

    async fn finish(tx: Transaction<'static, Sqlite>) -> Result<(), StoreError> {
        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("COMMIT failed: {e}")))
    }

    async fn put_in(
        tx: &mut Transaction<'static, Sqlite>,
        collection: &str,
        record: &StoredRecord,
    ) -> Result<(), StoreError> {
        let indexes_json = serde_json::to_string(&record.indexes)
            .map_err(|e| StoreError::Storage(format!("Index serialization: {e}")))?;
        let body_json = serde_json::to_string(&record.body)
            .map_err(|e| StoreError::Storage(format!("Body serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO records (collection, id, indexes, body, written_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(collection, id) DO UPDATE SET
                indexes = excluded.indexes,
                body = excluded.body,
                written_at = excluded.written_at
            "#,
        )
        .bind(collection)
        .bind(&record.id)
        .bind(&indexes_json)
        .bind(&body_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut **tx)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT failed: {e}")))?;

        sqlx::query("DELETE FROM record_indexes WHERE collection = ?1 AND id = ?2")
            .bind(collection)
            .bind(&record.id)
            .execute(&mut **tx)
            .await
            .map_err(|e| StoreError::Storage(format!("Index reset failed: {e}")))?;

        for (name, value) in &record.indexes {
            sqlx::query(
                "INSERT INTO record_indexes (collection, id, index_name, value) \
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(collection)
            .bind(&record.id)
            .bind(name)
            .bind(value)
            .execute(&mut **tx)
            .await
            .map_err(|e| StoreError::Storage(format!("Index insert failed: {e}")))?;
        }

        Ok(())
    }

    async fn delete_in(
        tx: &mut Transaction<'static, Sqlite>,
        collection: &str,
        id: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM records WHERE collection = ?1 AND id = ?2")
            .bind(collection)
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM records WHERE collection = ?1 AND id = ?2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET by ID: {e}")))?;

        match row {
            Some(ref r) => Ok(Some(Self::row_to_record(r)?)),
            None => Ok(None),
        }
    }

    async fn get_all(&self, collection: &str) -> Result<Vec<StoredRecord>, StoreError> {
        let rows = sqlx::query("SELECT * FROM records WHERE collection = ?1 ORDER BY id")
            .bind(collection)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET ALL: {e}")))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn get_by_index(
        &self,
        collection: &str,
        index: &str,
        value: &str,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT r.*
            FROM record_indexes i
            JOIN records r ON r.collection = i.collection AND r.id = i.id
            WHERE i.collection = ?1 AND i.index_name = ?2 AND i.value = ?3
            ORDER BY r.id
            "#,
        )
        .bind(collection)
        .bind(index)
        .bind(value)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Index lookup: {e}")))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn put(&self, collection: &str, record: StoredRecord) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        Self::put_in(&mut tx, collection, &record).await?;
        Self::finish(tx).await?;
        debug!(collection, id = %record.id, "Stored record");
        Ok(())
    }

    async fn put_many(
        &self,
        collection: &str,
        records: Vec<StoredRecord>,
    ) -> Result<(), StoreError> {
        // Dropping the transaction on error rolls the whole batch back
        let mut tx = self.begin().await?;
        for record in &records {
            Self::put_in(&mut tx, collection, record).await?;
        }
        Self::finish(tx).await?;
        debug!(collection, count = records.len(), "Stored batch");
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut tx = self.begin().await?;
        let deleted = Self::delete_in(&mut tx, collection, id).await?;
        Self::finish(tx).await?;
        Ok(deleted)
    }

    async fn delete_many(&self, collection: &str, ids: &[String]) -> Result<usize, StoreError> {
        let mut tx = self.begin().await?;
        let mut count = 0;
        for id in ids {
            if Self::delete_in(&mut tx, collection, id).await? {
                count += 1;
            }
        }
        Self::finish(tx).await?;
        Ok(count)
    }

    async fn clear(&self, collection: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM records WHERE collection = ?1")
            .bind(collection)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("CLEAR failed: {e}")))?;

        Ok(())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let count = batch.len();
        let mut tx = self.begin().await?;
        for op in batch.into_ops() {
            match op {
                WriteOp::Put { collection, record } => {
                    Self::put_in(&mut tx, &collection, &record).await?;
                }
                WriteOp::Delete { collection, id } => {
                    Self::delete_in(&mut tx, &collection, &id).await?;
                }
            }
        }
        Self::finish(tx).await?;
        debug!(count, "Committed batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.unwrap()
    }

    fn record(id: &str, key: &str) -> StoredRecord {
        StoredRecord {
            id: id.into(),
            indexes: BTreeMap::from([("key".to_string(), key.to_string())]),
            body: json!({ "id": id, "key": key, "price": 9000.0 }),
        }
    }

    #[tokio::test]
    async fn put_and_get() {
        let db = test_store().await;
        db.put("items", record("a", "cstud_65형")).await.unwrap();

        let fetched = db.get("items", "a").await.unwrap().unwrap();
        assert_eq!(fetched.body["key"], "cstud_65형");
        assert_eq!(fetched.indexes.get("key").map(String::as_str), Some("cstud_65형"));
        assert!(db.get("walls", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_replaces_body_and_index() {
        let db = test_store().await;
        db.put("items", record("a", "k1")).await.unwrap();
        db.put("items", record("a", "k2")).await.unwrap();

        assert_eq!(db.get_all("items").await.unwrap().len(), 1);
        assert!(db.get_by_index("items", "key", "k1").await.unwrap().is_empty());
        let hits = db.get_by_index("items", "key", "k2").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn put_many_and_delete_many() {
        let db = test_store().await;
        db.put_many(
            "items",
            vec![record("a", "k1"), record("b", "k2"), record("c", "k3")],
        )
        .await
        .unwrap();
        assert_eq!(db.get_all("items").await.unwrap().len(), 3);

        let removed = db
            .delete_many("items", &["a".into(), "b".into(), "zz".into()])
            .await
            .unwrap();
        assert_eq!(removed, 2);
        // Index rows cascade with their record
        assert!(db.get_by_index("items", "key", "k1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_nonexistent() {
        let db = test_store().await;
        assert!(!db.delete("items", "no_such_id").await.unwrap());
    }

    #[tokio::test]
    async fn clear_only_touches_one_collection() {
        let db = test_store().await;
        db.put("items", record("a", "k1")).await.unwrap();
        db.put("walls", record("w", "W-01")).await.unwrap();

        db.clear("items").await.unwrap();
        assert!(db.get_all("items").await.unwrap().is_empty());
        assert_eq!(db.get_all("walls").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn persists_to_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = format!("sqlite://{}", dir.path().join("wallcost.sqlite").display());
        {
            let db = SqliteStore::new(&path).await.unwrap();
            db.put("items", record("a", "k1")).await.unwrap();
        }
        let db = SqliteStore::new(&path).await.unwrap();
        assert!(db.get("items", "a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn commit_spans_collections() {
        let db = test_store().await;
        db.put("walls", record("w1", "W-01")).await.unwrap();

        let mut batch = WriteBatch::new();
        batch
            .push(WriteOp::Put {
                collection: "schema".into(),
                record: record("extra_slots", "s"),
            })
            .push(WriteOp::Delete {
                collection: "walls".into(),
                id: "w1".into(),
            });
        db.commit(batch).await.unwrap();

        assert!(db.get("schema", "extra_slots").await.unwrap().is_some());
        assert!(db.get("walls", "w1").await.unwrap().is_none());
        assert!(db.get_by_index("walls", "key", "W-01").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn backend_name() {
        assert_eq!(test_store().await.name(), "sqlite");
    }
}
