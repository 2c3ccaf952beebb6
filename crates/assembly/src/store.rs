//! Durable assembly store with the shared extra-column schema.
//!
//! Assemblies and the [`SchemaDescriptor`] are cached in memory behind one
//! lock. A schema migration writes the schema and every padded assembly in
//! one [`WriteBatch`], so the backend holds either the old state or the new
//! one. The cache is only updated after that write succeeds.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wallcost_core::assembly::{FixedSlot, SlotId, SlotRef, WallAssembly};
use wallcost_core::error::{Error, Result};
use wallcost_core::item::CatalogIndex;
use wallcost_core::schema::{ExtraColumn, SCHEMA_RECORD_ID, SchemaDescriptor};
use wallcost_core::store::{ASSEMBLY_NAME_INDEX, Collection, Record, RecordStore, WriteBatch};

use crate::compose;

/// Default prefix for auto-named assemblies.
pub const DEFAULT_NAME_PREFIX: &str = "WT-";

#[derive(Default)]
struct State {
    by_id: HashMap<String, WallAssembly>,
    schema: SchemaDescriptor,
}

impl State {
    fn sorted(&self) -> Vec<WallAssembly> {
        let mut all: Vec<WallAssembly> = self.by_id.values().cloned().collect();
        all.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
        all
    }

    fn get(&self, id: &str) -> Result<&WallAssembly> {
        self.by_id
            .get(id)
            .ok_or_else(|| Error::not_found(WallAssembly::COLLECTION, id))
    }

    fn name_taken(&self, name: &str) -> bool {
        self.by_id.values().any(|a| a.name == name)
    }

    fn next_auto_name(&self, prefix: &str) -> String {
        let mut n = self.by_id.len() + 1;
        loop {
            let name = format!("{prefix}{n:02}");
            if !self.name_taken(&name) {
                return name;
            }
            n += 1;
        }
    }
}

/// Store for [`WallAssembly`] records and the extra-column schema.
pub struct AssemblyStore {
    store: Arc<dyn RecordStore>,
    assemblies: Collection<WallAssembly>,
    schemas: Collection<SchemaDescriptor>,
    state: RwLock<State>,
    name_prefix: String,
}

impl AssemblyStore {
    /// Load every assembly and the schema.
    ///
    /// Assemblies with fewer extra slots than the schema (an interrupted
    /// migration) are padded and written back.
    pub async fn open(
        store: Arc<dyn RecordStore>,
        name_prefix: impl Into<String>,
    ) -> Result<Self> {
        let assemblies = Collection::<WallAssembly>::new(Arc::clone(&store));
        let schemas = Collection::<SchemaDescriptor>::new(Arc::clone(&store));

        let schema = schemas.get(SCHEMA_RECORD_ID).await?.unwrap_or_default();
        let mut loaded = assemblies.get_all().await?;

        let mut repaired = Vec::new();
        for assembly in &mut loaded {
            if assembly.extra_slots.len() < schema.len() {
                assembly.pad_extra(schema.len());
                repaired.push(assembly.clone());
            }
        }
        if !repaired.is_empty() {
            warn!(count = repaired.len(), "Padding assemblies behind the extra-column schema");
            assemblies.put_many(&repaired).await?;
        }

        debug!(
            backend = assemblies.backend_name(),
            count = loaded.len(),
            extra_columns = schema.len(),
            "Assembly store loaded"
        );

        Ok(Self {
            store,
            assemblies,
            schemas,
            state: RwLock::new(State {
                by_id: loaded.into_iter().map(|a| (a.id.clone(), a)).collect(),
                schema,
            }),
            name_prefix: name_prefix.into(),
        })
    }

    /// Create an empty assembly with the next free auto-generated name.
    pub async fn create(&self) -> Result<WallAssembly> {
        let name = self.state.read().await.next_auto_name(&self.name_prefix);
        self.create_named(&name).await
    }

    /// Create an empty assembly named `name`, appended at the end of the order.
    pub async fn create_named(&self, name: &str) -> Result<WallAssembly> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("assembly name must not be empty".into()));
        }

        let mut state = self.state.write().await;
        let assembly = WallAssembly::new(
            Uuid::new_v4().to_string(),
            name.to_string(),
            state.by_id.len(),
            state.schema.len(),
            Utc::now(),
        );
        self.assemblies.put(&assembly).await?;
        state.by_id.insert(assembly.id.clone(), assembly.clone());
        debug!(id = %assembly.id, name = %assembly.name, "Assembly created");
        Ok(assembly)
    }

    /// All assemblies in display order.
    pub async fn get_all(&self) -> Vec<WallAssembly> {
        self.state.read().await.sorted()
    }

    pub async fn get(&self, id: &str) -> Option<WallAssembly> {
        self.state.read().await.by_id.get(id).cloned()
    }

    /// Look an assembly up by exact name through the store's name index.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<WallAssembly>> {
        let mut hits = self.assemblies.find_by(ASSEMBLY_NAME_INDEX, name).await?;
        if hits.len() > 1 {
            warn!(name, count = hits.len(), "Several assemblies share a name; using the first");
        }
        hits.sort_by_key(|a| a.sort_order);
        Ok(hits.into_iter().next())
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn rename(&self, id: &str, name: &str) -> Result<WallAssembly> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("assembly name must not be empty".into()));
        }
        self.modify(id, |assembly| {
            assembly.name = name.to_string();
            Ok(())
        })
        .await
    }

    /// Assign (or clear, with `None`) one slot and recompute the aggregates.
    pub async fn assign_slot(
        &self,
        id: &str,
        slot: SlotId,
        item_id: SlotRef,
        index: &CatalogIndex,
    ) -> Result<WallAssembly> {
        self.modify(id, |assembly| {
            assembly.set_slot(slot, item_id)?;
            compose::refresh(assembly, index);
            Ok(())
        })
        .await
    }

    /// Persist a whole assembly built elsewhere (import), padded to the schema.
    pub async fn save(&self, mut assembly: WallAssembly) -> Result<WallAssembly> {
        let mut state = self.state.write().await;
        if assembly.extra_slots.len() > state.schema.len() {
            return Err(Error::Validation(format!(
                "assembly '{}' has {} extra slots but the schema has {}",
                assembly.name,
                assembly.extra_slots.len(),
                state.schema.len()
            )));
        }
        assembly.pad_extra(state.schema.len());
        assembly.updated_at = Utc::now();
        self.assemblies.put(&assembly).await?;
        state.by_id.insert(assembly.id.clone(), assembly.clone());
        Ok(assembly)
    }

    /// Set the display order. `ids` must name every assembly exactly once.
    pub async fn reorder(&self, ids: &[String]) -> Result<()> {
        let mut state = self.state.write().await;
        let mut seen = std::collections::HashSet::new();
        let valid = ids.len() == state.by_id.len()
            && ids
                .iter()
                .all(|id| state.by_id.contains_key(id) && seen.insert(id.as_str()));
        if !valid {
            return Err(Error::Validation(
                "reorder must list every assembly id exactly once".into(),
            ));
        }

        let now = Utc::now();
        let updated: Vec<WallAssembly> = ids
            .iter()
            .enumerate()
            .filter_map(|(position, id)| {
                let mut assembly = state.by_id.get(id)?.clone();
                (assembly.sort_order != position).then(|| {
                    assembly.sort_order = position;
                    assembly.updated_at = now;
                    assembly
                })
            })
            .collect();

        self.assemblies.put_many(&updated).await?;
        for assembly in updated {
            state.by_id.insert(assembly.id.clone(), assembly);
        }
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<WallAssembly> {
        let removed = self.delete_many(&[id.to_string()]).await?;
        removed
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(WallAssembly::COLLECTION, id))
    }

    /// Delete several assemblies and close the gaps in `sort_order`.
    /// Unknown ids are ignored.
    pub async fn delete_many(&self, ids: &[String]) -> Result<Vec<WallAssembly>> {
        let mut state = self.state.write().await;
        let existing: Vec<String> = ids
            .iter()
            .filter(|id| state.by_id.contains_key(id.as_str()))
            .cloned()
            .collect();
        if existing.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut shifted = Vec::new();
        let remaining = state
            .sorted()
            .into_iter()
            .filter(|a| !existing.contains(&a.id));
        for (position, mut assembly) in remaining.enumerate() {
            if assembly.sort_order != position {
                assembly.sort_order = position;
                assembly.updated_at = now;
                shifted.push(assembly);
            }
        }

        let mut batch = WriteBatch::new();
        for id in &existing {
            batch.delete::<WallAssembly>(id);
        }
        batch.put_all(&shifted)?;
        self.store.commit(batch).await?;

        let removed: Vec<WallAssembly> = existing
            .iter()
            .filter_map(|id| state.by_id.remove(id))
            .collect();
        for assembly in shifted {
            state.by_id.insert(assembly.id.clone(), assembly);
        }

        info!(count = removed.len(), "Assemblies deleted");
        Ok(removed)
    }

    /// Current extra-column schema.
    pub async fn schema(&self) -> SchemaDescriptor {
        self.state.read().await.schema.clone()
    }

    /// Append columns to the schema and pad every assembly to match.
    /// Returns the number of assemblies migrated.
    pub async fn extend_schema(&self, columns: Vec<ExtraColumn>) -> Result<usize> {
        if columns.is_empty() {
            return Ok(0);
        }
        let mut state = self.state.write().await;

        let mut schema = state.schema.clone();
        schema.columns.extend(columns);

        let now = Utc::now();
        let padded: Vec<WallAssembly> = state
            .by_id
            .values()
            .map(|a| {
                let mut a = a.clone();
                a.pad_extra(schema.len());
                a.updated_at = now;
                a
            })
            .collect();

        let mut batch = WriteBatch::new();
        batch.put(&schema)?.put_all(&padded)?;
        self.store.commit(batch).await?;

        let migrated = padded.len();
        state.schema = schema;
        for assembly in padded {
            state.by_id.insert(assembly.id.clone(), assembly);
        }
        info!(
            columns = state.schema.len(),
            assemblies = migrated,
            "Extra-column schema extended"
        );
        Ok(migrated)
    }

    /// Add one extra column and return its schema index.
    pub async fn add_extra_column(&self, label: &str, insert_after: FixedSlot) -> Result<usize> {
        let index = self.state.read().await.schema.len();
        let label = label.trim();
        let column = if label.is_empty() {
            ExtraColumn {
                insert_after,
                ..ExtraColumn::with_default_label(index)
            }
        } else {
            ExtraColumn {
                label: label.to_string(),
                insert_after,
            }
        };
        self.extend_schema(vec![column]).await?;
        Ok(index)
    }

    /// Drop an extra column from the schema and from every assembly.
    /// Later columns shift down by one index.
    pub async fn remove_extra_column(
        &self,
        index: usize,
        catalog: &CatalogIndex,
    ) -> Result<ExtraColumn> {
        let mut state = self.state.write().await;
        if index >= state.schema.len() {
            return Err(Error::Validation(format!(
                "extra column {index} does not exist (schema has {} extra columns)",
                state.schema.len()
            )));
        }

        let mut schema = state.schema.clone();
        let removed = schema.columns.remove(index);

        let now = Utc::now();
        let migrated: Vec<WallAssembly> = state
            .by_id
            .values()
            .map(|a| {
                let mut a = a.clone();
                if index < a.extra_slots.len() {
                    a.extra_slots.remove(index);
                }
                compose::refresh(&mut a, catalog);
                a.updated_at = now;
                a
            })
            .collect();

        let mut batch = WriteBatch::new();
        batch.put(&schema)?.put_all(&migrated)?;
        self.store.commit(batch).await?;

        state.schema = schema;
        for assembly in migrated {
            state.by_id.insert(assembly.id.clone(), assembly);
        }
        info!(index, label = %removed.label, "Extra column removed");
        Ok(removed)
    }

    pub async fn relabel_extra_column(&self, index: usize, label: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let mut schema = state.schema.clone();
        let column = schema.columns.get_mut(index).ok_or_else(|| {
            Error::Validation(format!("extra column {index} does not exist"))
        })?;
        let label = label.trim();
        column.label = if label.is_empty() {
            wallcost_core::schema::default_label(index)
        } else {
            label.to_string()
        };
        self.schemas.put(&schema).await?;
        state.schema = schema;
        Ok(())
    }

    /// Recompute every assembly against `index`, persisting those whose
    /// aggregates changed. Returns the number written.
    pub async fn recompute_all(&self, index: &CatalogIndex) -> Result<usize> {
        let mut state = self.state.write().await;
        let changed: Vec<WallAssembly> = state
            .by_id
            .values()
            .filter_map(|a| {
                let mut a = a.clone();
                compose::refresh(&mut a, index).then_some(a)
            })
            .collect();

        self.assemblies.put_many(&changed).await?;
        let count = changed.len();
        for assembly in changed {
            state.by_id.insert(assembly.id.clone(), assembly);
        }
        if count > 0 {
            debug!(count, "Assembly aggregates refreshed");
        }
        Ok(count)
    }

    async fn modify(
        &self,
        id: &str,
        change: impl FnOnce(&mut WallAssembly) -> Result<()>,
    ) -> Result<WallAssembly> {
        let mut state = self.state.write().await;
        let mut assembly = state.get(id)?.clone();
        change(&mut assembly)?;
        assembly.updated_at = Utc::now();
        self.assemblies.put(&assembly).await?;
        state.by_id.insert(assembly.id.clone(), assembly.clone());
        Ok(assembly)
    }
}
