//! The priced-item catalog.
//!
//! Items are persisted through a [`RecordStore`] and mirrored in memory. The
//! mirror is only touched after the store write succeeds, so a failed write
//! leaves both sides as they were.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;
use wallcost_core::error::{Error, Result};
use wallcost_core::item::{CatalogIndex, ItemPatch, NewPricedItem, PricedItem, normalize};
use wallcost_core::store::{Collection, Record, RecordStore};
use wallcost_core::workbook::Workbook;

use crate::price_list::parse_price_list;

/// Counts reported by [`PricedItemCatalog::upsert_many`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    pub inserted_count: usize,
    pub updated_count: usize,
}

/// Counts reported by [`PricedItemCatalog::upload_price_list`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    pub inserted_count: usize,
    pub updated_count: usize,
    pub skipped_rows: usize,
}

#[derive(Default)]
struct Mirror {
    by_id: HashMap<String, PricedItem>,
    /// content key → id
    by_key: HashMap<String, String>,
}

impl Mirror {
    fn insert(&mut self, item: PricedItem) {
        if let Some(previous) = self.by_id.get(&item.id) {
            self.by_key.remove(&previous.key);
        }
        self.by_key.insert(item.key.clone(), item.id.clone());
        self.by_id.insert(item.id.clone(), item);
    }

    fn remove(&mut self, id: &str) -> Option<PricedItem> {
        let item = self.by_id.remove(id)?;
        self.by_key.remove(&item.key);
        Some(item)
    }

    fn id_for_key(&self, key: &str) -> Option<&String> {
        self.by_key.get(key)
    }
}

/// Durable collection of priced items, unique by content key.
pub struct PricedItemCatalog {
    items: Collection<PricedItem>,
    mirror: RwLock<Mirror>,
}

impl PricedItemCatalog {
    /// Open the catalog and load every stored item into memory.
    pub async fn open(store: Arc<dyn RecordStore>) -> Result<Self> {
        let items = Collection::<PricedItem>::new(store);
        let mut mirror = Mirror::default();
        for item in items.get_all().await? {
            mirror.insert(item);
        }
        debug!(
            backend = items.backend_name(),
            count = mirror.by_id.len(),
            "Catalog loaded"
        );
        Ok(Self {
            items,
            mirror: RwLock::new(mirror),
        })
    }

    /// Insert or replace items by content key, writing the batch as one unit.
    ///
    /// A matching item keeps its `id` and `created_at`; every other field is
    /// replaced. Repeated keys within the batch collapse onto one record.
    pub async fn upsert_many(&self, batch: Vec<NewPricedItem>) -> Result<UpsertSummary> {
        let now = Utc::now();
        let mut mirror = self.mirror.write().await;

        let mut staged: Vec<PricedItem> = Vec::with_capacity(batch.len());
        let mut staged_by_key: HashMap<String, usize> = HashMap::new();
        let mut summary = UpsertSummary::default();

        for fields in batch {
            let key = fields.key();
            if let Some(&pos) = staged_by_key.get(&key) {
                staged[pos].replace_with(fields, now);
                summary.updated_count += 1;
                continue;
            }

            let item = match mirror.id_for_key(&key).and_then(|id| mirror.by_id.get(id)) {
                Some(existing) => {
                    let mut item = existing.clone();
                    item.replace_with(fields, now);
                    summary.updated_count += 1;
                    item
                }
                None => {
                    summary.inserted_count += 1;
                    fields.into_item(Uuid::new_v4().to_string(), now)
                }
            };
            staged_by_key.insert(key, staged.len());
            staged.push(item);
        }

        self.items.put_many(&staged).await?;
        for item in staged {
            mirror.insert(item);
        }

        info!(
            inserted = summary.inserted_count,
            updated = summary.updated_count,
            "Catalog upsert complete"
        );
        Ok(summary)
    }

    /// Parse a one-sheet price list and upsert its rows.
    pub async fn upload_price_list(
        &self,
        workbook: &Workbook,
        header_scan_rows: usize,
    ) -> Result<UploadSummary> {
        let parsed = parse_price_list(workbook, header_scan_rows)?;
        let skipped_rows = parsed.skipped_rows;
        let summary = self.upsert_many(parsed.items).await?;
        Ok(UploadSummary {
            inserted_count: summary.inserted_count,
            updated_count: summary.updated_count,
            skipped_rows,
        })
    }

    /// Manual entry of a single item. Rejects a key already in use.
    pub async fn create(&self, fields: NewPricedItem) -> Result<PricedItem> {
        if fields.name.trim().is_empty() || fields.spec.trim().is_empty() {
            return Err(Error::Validation("an item needs both a name and a spec".into()));
        }

        let mut mirror = self.mirror.write().await;
        let key = fields.key();
        if let Some(existing_id) = mirror.id_for_key(&key) {
            return Err(Error::DuplicateKey {
                key,
                existing_id: existing_id.clone(),
            });
        }

        let item = fields.into_item(Uuid::new_v4().to_string(), Utc::now());
        self.items.put(&item).await?;
        mirror.insert(item.clone());
        debug!(id = %item.id, key = %item.key, "Catalog item created");
        Ok(item)
    }

    /// Every item, ordered by name then spec.
    pub async fn get_all(&self) -> Vec<PricedItem> {
        let mirror = self.mirror.read().await;
        let mut items: Vec<PricedItem> = mirror.by_id.values().cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.spec.cmp(&b.spec)));
        items
    }

    pub async fn get_by_id(&self, id: &str) -> Option<PricedItem> {
        self.mirror.read().await.by_id.get(id).cloned()
    }

    /// Look up by content key. The argument is normalized first, so a raw
    /// `"C STUD_65형"` finds `cstud_65형`.
    pub async fn get_by_key(&self, key: &str) -> Option<PricedItem> {
        let key = normalize(key);
        let mirror = self.mirror.read().await;
        mirror
            .id_for_key(&key)
            .and_then(|id| mirror.by_id.get(id))
            .cloned()
    }

    /// Apply an inline edit. `total_price` and `key` follow the edited fields.
    ///
    /// An edit that would give the item another live item's key is rejected
    /// with [`Error::DuplicateKey`] and nothing is written.
    pub async fn update(&self, id: &str, patch: &ItemPatch) -> Result<PricedItem> {
        let mut mirror = self.mirror.write().await;
        let current = mirror
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(PricedItem::COLLECTION, id))?;

        let mut next = current;
        patch.apply(&mut next, Utc::now());
        if let Some(owner) = mirror.id_for_key(&next.key) {
            if owner != id {
                return Err(Error::DuplicateKey {
                    key: next.key,
                    existing_id: owner.clone(),
                });
            }
        }

        self.items.put(&next).await?;
        mirror.insert(next.clone());
        debug!(id, key = %next.key, "Catalog item updated");
        Ok(next)
    }

    /// Delete one item. Assemblies referencing it keep the dangling id.
    pub async fn delete(&self, id: &str) -> Result<PricedItem> {
        let mut mirror = self.mirror.write().await;
        if !mirror.by_id.contains_key(id) {
            return Err(Error::not_found(PricedItem::COLLECTION, id));
        }
        self.items.delete(id).await?;
        let removed = mirror
            .remove(id)
            .ok_or_else(|| Error::Internal(format!("catalog mirror lost item {id}")))?;
        debug!(id, key = %removed.key, "Catalog item deleted");
        Ok(removed)
    }

    pub async fn clear(&self) -> Result<()> {
        let mut mirror = self.mirror.write().await;
        self.items.clear().await?;
        *mirror = Mirror::default();
        info!("Catalog cleared");
        Ok(())
    }

    /// Snapshot id → item map for composition.
    pub async fn index(&self) -> CatalogIndex {
        self.mirror.read().await.by_id.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.mirror.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
