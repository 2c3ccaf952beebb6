//! The workspace ties the catalog and the assembly store together.
//!
//! Every catalog mutation that can change a slot's resolution is followed by
//! a recompute of all assemblies, so persisted aggregates never go stale.
//! Outcomes are reported to a [`NotificationSink`].

use std::sync::Arc;
use wallcost_catalog::{PricedItemCatalog, UploadSummary};
use wallcost_core::assembly::{FixedSlot, SlotId, SlotRef, WallAssembly};
use wallcost_core::error::Result;
use wallcost_core::event::{Notice, NotificationSink};
use wallcost_core::item::{ItemPatch, PricedItem};
use wallcost_core::schema::ExtraColumn;
use wallcost_core::store::RecordStore;
use wallcost_core::workbook::Workbook;

use crate::compose;
use crate::store::AssemblyStore;

/// One row of the assembly table as rendered for display.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyView {
    pub assembly: WallAssembly,
    /// `(label, text)` in schema order
    pub cells: Vec<(String, String)>,
}

pub struct Workspace {
    catalog: PricedItemCatalog,
    assemblies: AssemblyStore,
    sink: Arc<dyn NotificationSink>,
}

impl Workspace {
    pub async fn open(
        store: Arc<dyn RecordStore>,
        name_prefix: &str,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        let catalog = PricedItemCatalog::open(Arc::clone(&store)).await?;
        let assemblies = AssemblyStore::open(store, name_prefix).await?;
        Ok(Self {
            catalog,
            assemblies,
            sink,
        })
    }

    pub fn catalog(&self) -> &PricedItemCatalog {
        &self.catalog
    }

    pub fn assemblies(&self) -> &AssemblyStore {
        &self.assemblies
    }

    pub fn sink(&self) -> &dyn NotificationSink {
        self.sink.as_ref()
    }

    /// Report `result` as a failure notice when it is an error.
    pub fn report<T>(&self, context: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.sink.notify(Notice::failed(context, e));
        }
        result
    }

    async fn refresh_aggregates(&self) -> Result<usize> {
        let index = self.catalog.index().await;
        self.assemblies.recompute_all(&index).await
    }

    pub async fn upload_price_list(
        &self,
        workbook: &Workbook,
        header_scan_rows: usize,
    ) -> Result<UploadSummary> {
        let result = async {
            let summary = self.catalog.upload_price_list(workbook, header_scan_rows).await?;
            self.refresh_aggregates().await?;
            Ok(summary)
        }
        .await;
        let summary = self.report("price list upload", result)?;
        self.sink.notify(Notice::CatalogUpserted {
            inserted: summary.inserted_count,
            updated: summary.updated_count,
            skipped_rows: summary.skipped_rows,
            timestamp: chrono::Utc::now(),
        });
        Ok(summary)
    }

    pub async fn update_item(&self, id: &str, patch: &ItemPatch) -> Result<PricedItem> {
        let item = self.catalog.update(id, patch).await?;
        self.refresh_aggregates().await?;
        Ok(item)
    }

    /// Delete an item. Slots referencing it keep the id and render as deleted.
    pub async fn delete_item(&self, id: &str) -> Result<PricedItem> {
        let item = self.catalog.delete(id).await?;
        self.refresh_aggregates().await?;
        Ok(item)
    }

    pub async fn clear_catalog(&self) -> Result<()> {
        self.catalog.clear().await?;
        self.refresh_aggregates().await?;
        Ok(())
    }

    pub async fn assign_slot(
        &self,
        assembly_id: &str,
        slot: SlotId,
        item_id: SlotRef,
    ) -> Result<WallAssembly> {
        let index = self.catalog.index().await;
        self.assemblies.assign_slot(assembly_id, slot, item_id, &index).await
    }

    pub async fn add_extra_column(&self, label: &str, insert_after: FixedSlot) -> Result<usize> {
        let result = self.assemblies.add_extra_column(label, insert_after).await;
        let index = self.report("add extra column", result)?;
        self.notify_schema().await;
        Ok(index)
    }

    pub async fn remove_extra_column(&self, index: usize) -> Result<ExtraColumn> {
        let catalog = self.catalog.index().await;
        let result = self.assemblies.remove_extra_column(index, &catalog).await;
        let removed = self.report("remove extra column", result)?;
        self.notify_schema().await;
        Ok(removed)
    }

    async fn notify_schema(&self) {
        self.sink.notify(Notice::SchemaMigrated {
            columns: self.assemblies.schema().await.len(),
            assemblies: self.assemblies.len().await,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Render every assembly as labelled display cells in schema order.
    pub async fn views(&self) -> Vec<AssemblyView> {
        let index = self.catalog.index().await;
        let slots = self.assemblies.schema().await.ordered_slots();
        self.assemblies
            .get_all()
            .await
            .into_iter()
            .map(|assembly| {
                let cells = slots
                    .iter()
                    .map(|s| (s.label.clone(), compose::display_text(assembly.slot(s.id), &index)))
                    .collect();
                AssemblyView { assembly, cells }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wallcost_core::assembly::Zone;
    use wallcost_core::event::EventBus;
    use wallcost_core::item::NewPricedItem;
    use wallcost_core::workbook::{Cell, Sheet};
    use wallcost_storage::InMemoryStore;

    fn structure() -> SlotId {
        SlotId::Fixed(FixedSlot::new(Zone::Structure, 1).unwrap())
    }

    fn stud() -> NewPricedItem {
        NewPricedItem {
            name: "C STUD".into(),
            spec: "65형".into(),
            thickness: 65.0,
            material_price: 9000.0,
            labor_price: 8000.0,
            ..Default::default()
        }
    }

    async fn workspace() -> (Workspace, Arc<EventBus>) {
        let bus = Arc::new(EventBus::default());
        let ws = Workspace::open(Arc::new(InMemoryStore::new()), "W-", bus.clone())
            .await
            .unwrap();
        (ws, bus)
    }

    #[tokio::test]
    async fn composition_follows_catalog_item() {
        let (ws, _) = workspace().await;
        let item = ws.catalog().create(stud()).await.unwrap();
        assert_eq!(item.key, "cstud_65형");

        let wall = ws.assemblies().create().await.unwrap();
        assert_eq!(wall.name, "W-01");
        let wall = ws
            .assign_slot(&wall.id, structure(), Some(item.id.clone()))
            .await
            .unwrap();
        assert_eq!(wall.aggregates.thickness, 65.0);
        assert_eq!(wall.aggregates.total_material_price, 9000.0);
        assert_eq!(wall.aggregates.total_labor_price, 8000.0);
        assert_eq!(wall.aggregates.total_price, 17000.0);
    }

    #[tokio::test]
    async fn deleted_item_renders_as_deleted_and_contributes_zero() {
        let (ws, _) = workspace().await;
        let stud = ws.catalog().create(stud()).await.unwrap();
        let board = ws
            .catalog()
            .create(NewPricedItem {
                name: "석고보드".into(),
                spec: "9.5T".into(),
                thickness: 9.5,
                material_price: 3000.0,
                labor_price: 2500.0,
                ..Default::default()
            })
            .await
            .unwrap();

        let wall = ws.assemblies().create().await.unwrap();
        ws.assign_slot(&wall.id, structure(), Some(stud.id.clone())).await.unwrap();
        ws.assign_slot(&wall.id, SlotId::Fixed(FixedSlot::ALL[0]), Some(board.id.clone()))
            .await
            .unwrap();

        ws.delete_item(&stud.id).await.unwrap();

        let wall = ws.assemblies().get(&wall.id).await.unwrap();
        assert_eq!(wall.slot(structure()), Some(stud.id.as_str()));
        assert_eq!(wall.aggregates.thickness, 9.5);
        assert_eq!(wall.aggregates.total_price, 5500.0);

        let view = &ws.views().await[0];
        let cell = |label: &str| {
            view.cells
                .iter()
                .find(|(l, _)| l == label)
                .map(|(_, t)| t.clone())
                .unwrap()
        };
        assert_eq!(cell("Structure"), "(deleted)");
        assert_eq!(cell("Left Finish 1"), "석고보드 9.5T");
        assert_eq!(cell("Infill"), "");
    }

    #[tokio::test]
    async fn price_change_propagates_to_assemblies() {
        let (ws, _) = workspace().await;
        let item = ws.catalog().create(stud()).await.unwrap();
        let wall = ws.assemblies().create().await.unwrap();
        ws.assign_slot(&wall.id, structure(), Some(item.id.clone())).await.unwrap();

        let patch = ItemPatch {
            labor_price: Some(1000.0),
            ..Default::default()
        };
        ws.update_item(&item.id, &patch).await.unwrap();
        let wall = ws.assemblies().get(&wall.id).await.unwrap();
        assert_eq!(wall.aggregates.total_price, 10000.0);
    }

    #[tokio::test]
    async fn upload_notifies_and_refreshes() {
        let (ws, bus) = workspace().await;
        let mut rx = bus.subscribe();

        let mut sheet = Sheet::new("prices");
        for row in [
            vec!["품명", "규격", "두께", "재료비", "노무비"],
            vec!["C STUD", "65형", "65", "9000", "8000"],
        ] {
            sheet.push_row(row.into_iter().map(Cell::text).collect());
        }
        let summary = ws
            .upload_price_list(&Workbook::new(vec![sheet]), 10)
            .await
            .unwrap();
        assert_eq!(summary.inserted_count, 1);

        let notice = rx.recv().await.unwrap();
        assert!(matches!(*notice, Notice::CatalogUpserted { inserted: 1, .. }));
    }

    #[tokio::test]
    async fn failed_upload_sends_failure_notice() {
        let (ws, bus) = workspace().await;
        let mut rx = bus.subscribe();
        let result = ws.upload_price_list(&Workbook::default(), 10).await;
        assert!(result.is_err());
        assert!(rx.recv().await.unwrap().is_failure());
    }

    #[tokio::test]
    async fn schema_changes_notify() {
        let (ws, bus) = workspace().await;
        let mut rx = bus.subscribe();
        ws.assemblies().create().await.unwrap();
        ws.add_extra_column("Insulation", FixedSlot::ALL[4]).await.unwrap();
        let notice = rx.recv().await.unwrap();
        assert!(matches!(
            *notice,
            Notice::SchemaMigrated {
                columns: 1,
                assemblies: 1,
                ..
            }
        ));
        let view = &ws.views().await[0];
        assert_eq!(view.cells.len(), 13);
        assert_eq!(view.cells[5].0, "Insulation");
    }
}
