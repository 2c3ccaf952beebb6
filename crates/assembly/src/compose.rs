//! Composition engine: derive an assembly's aggregates from its slots.
//!
//! Pure functions over a [`CatalogIndex`] built once per batch. A slot whose
//! item no longer exists contributes nothing and is reported back instead of
//! failing the computation.

use serde::Serialize;
use tracing::debug;
use wallcost_core::assembly::{Aggregates, SlotId, WallAssembly};
use wallcost_core::item::CatalogIndex;

/// Text shown for a slot whose item was deleted.
pub const DELETED_TEXT: &str = "(deleted)";

/// A slot that points at an id missing from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedSlot {
    pub slot: SlotId,
    pub item_id: String,
}

/// Output of [`recompute`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Composition {
    pub aggregates: Aggregates,
    pub unresolved: Vec<UnresolvedSlot>,
}

/// Sum thickness and prices over every non-empty, resolvable slot:
/// the twelve fixed slots in zone order, then the extra slots.
pub fn recompute(assembly: &WallAssembly, index: &CatalogIndex) -> Composition {
    let mut composition = Composition::default();
    let totals = &mut composition.aggregates;

    for (slot, item_id) in assembly.slots() {
        let Some(item_id) = item_id else { continue };
        match index.get(item_id) {
            Some(item) => {
                totals.thickness += item.thickness;
                totals.total_material_price += item.material_price;
                totals.total_labor_price += item.labor_price;
            }
            None => {
                debug!(
                    assembly = %assembly.name,
                    slot = %slot.ident(),
                    item_id,
                    "Slot references a missing item"
                );
                composition.unresolved.push(UnresolvedSlot {
                    slot,
                    item_id: item_id.to_string(),
                });
            }
        }
    }

    totals.total_price = totals.total_material_price + totals.total_labor_price;
    composition
}

/// Recompute and store the aggregates on `assembly`. Returns whether they changed.
pub fn refresh(assembly: &mut WallAssembly, index: &CatalogIndex) -> bool {
    let aggregates = recompute(assembly, index).aggregates;
    let changed = assembly.aggregates != aggregates;
    assembly.aggregates = aggregates;
    changed
}

/// Cell text for a slot: `"{name} {spec}"`, [`DELETED_TEXT`], or empty.
pub fn display_text(slot_ref: Option<&str>, index: &CatalogIndex) -> String {
    match slot_ref {
        None => String::new(),
        Some(id) => index
            .get(id)
            .map(|item| item.display_text())
            .unwrap_or_else(|| DELETED_TEXT.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wallcost_core::assembly::{FixedSlot, Zone};
    use wallcost_core::item::NewPricedItem;

    fn structure() -> SlotId {
        SlotId::Fixed(FixedSlot::new(Zone::Structure, 1).unwrap())
    }

    fn item(
        id: &str,
        name: &str,
        thickness: f64,
        material: f64,
        labor: f64,
    ) -> wallcost_core::PricedItem {
        NewPricedItem {
            name: name.into(),
            spec: "65형".into(),
            thickness,
            material_price: material,
            labor_price: labor,
            ..Default::default()
        }
        .into_item(id.into(), Utc::now())
    }

    fn wall(extra_len: usize) -> WallAssembly {
        WallAssembly::new("w".into(), "W-01".into(), 0, extra_len, Utc::now())
    }

    #[test]
    fn empty_assembly_has_zero_aggregates() {
        let composition = recompute(&wall(2), &CatalogIndex::new());
        assert_eq!(composition.aggregates, Aggregates::default());
        assert!(composition.unresolved.is_empty());
    }

    #[test]
    fn structure_slot_contributes_item_values() {
        let index: CatalogIndex = vec![item("stud", "C STUD", 65.0, 9000.0, 8000.0)]
            .into_iter()
            .collect();
        let mut w = wall(0);
        w.set_slot(structure(), Some("stud".into())).unwrap();

        let totals = recompute(&w, &index).aggregates;
        assert_eq!(totals.thickness, 65.0);
        assert_eq!(totals.total_material_price, 9000.0);
        assert_eq!(totals.total_labor_price, 8000.0);
        assert_eq!(totals.total_price, 17000.0);
    }

    #[test]
    fn extra_slots_are_summed_and_repeats_count_twice() {
        let index: CatalogIndex = vec![
            item("board", "석고보드", 9.5, 3000.0, 2500.0),
            item("wool", "Glass wool", 50.0, 4000.0, 1000.0),
        ]
        .into_iter()
        .collect();
        let mut w = wall(1);
        w.set_slot(SlotId::Fixed(FixedSlot::ALL[0]), Some("board".into())).unwrap();
        w.set_slot(SlotId::Fixed(FixedSlot::OUTERMOST), Some("board".into())).unwrap();
        w.set_slot(SlotId::extra(0), Some("wool".into())).unwrap();

        let totals = recompute(&w, &index).aggregates;
        assert_eq!(totals.thickness, 69.0);
        assert_eq!(totals.total_material_price, 10000.0);
        assert_eq!(totals.total_labor_price, 6000.0);
        assert_eq!(totals.total_price, 16000.0);
    }

    #[test]
    fn missing_item_contributes_zero_and_is_reported() {
        let index: CatalogIndex = vec![item("board", "석고보드", 9.5, 3000.0, 2500.0)]
            .into_iter()
            .collect();
        let mut w = wall(0);
        w.set_slot(structure(), Some("gone".into())).unwrap();
        w.set_slot(SlotId::Fixed(FixedSlot::ALL[0]), Some("board".into())).unwrap();

        let composition = recompute(&w, &index);
        assert_eq!(composition.aggregates.thickness, 9.5);
        assert_eq!(composition.aggregates.total_price, 5500.0);
        assert_eq!(
            composition.unresolved,
            vec![UnresolvedSlot {
                slot: structure(),
                item_id: "gone".into()
            }]
        );
    }

    #[test]
    fn refresh_reports_changes() {
        let index: CatalogIndex = vec![item("stud", "C STUD", 65.0, 9000.0, 8000.0)]
            .into_iter()
            .collect();
        let mut w = wall(0);
        assert!(!refresh(&mut w, &index));
        w.set_slot(structure(), Some("stud".into())).unwrap();
        assert!(refresh(&mut w, &index));
        assert_eq!(w.aggregates.total_price, 17000.0);
        assert!(!refresh(&mut w, &index));
    }

    #[test]
    fn display_text_variants() {
        let index: CatalogIndex = vec![item("stud", "C STUD", 65.0, 9000.0, 8000.0)]
            .into_iter()
            .collect();
        assert_eq!(display_text(Some("stud"), &index), "C STUD 65형");
        assert_eq!(display_text(Some("gone"), &index), "(deleted)");
        assert_eq!(display_text(None, &index), "");
    }
}
