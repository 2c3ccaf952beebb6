//! The store-wide extra-column schema.
//!
//! Extra slots are not a per-assembly convenience: every assembly carries one
//! extra slot per schema column, so the column list lives here once and
//! growing it is an explicit migration over all assemblies.

use serde::{Deserialize, Serialize};

use crate::assembly::{FixedSlot, SlotId};

/// Record id under which the schema is persisted.
pub const SCHEMA_RECORD_ID: &str = "extra_slots";

/// One dynamically added column, rendered after its anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraColumn {
    pub label: String,
    pub insert_after: FixedSlot,
}

impl ExtraColumn {
    /// Fallback for columns imported without label metadata.
    pub fn with_default_label(index: usize) -> Self {
        Self {
            label: default_label(index),
            insert_after: FixedSlot::OUTERMOST,
        }
    }
}

/// Label used when a column has none: `extra1`, `extra2`, ...
pub fn default_label(index: usize) -> String {
    format!("extra{}", index + 1)
}

/// The ordered extra-column list shared by every assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    #[serde(default)]
    pub columns: Vec<ExtraColumn>,
}

/// One column of the rendered layout, fixed or extra.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotDescriptor {
    pub id: SlotId,
    /// Machine identifier (`structure`, `extra_2`)
    pub ident: String,
    /// Human-readable header
    pub label: String,
}

impl SchemaDescriptor {
    pub fn new(columns: Vec<ExtraColumn>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, index: usize) -> Option<&ExtraColumn> {
        self.columns.get(index)
    }

    /// Human-readable label of any slot under this schema.
    pub fn label_of(&self, slot: SlotId) -> String {
        match slot {
            SlotId::Fixed(fixed) => fixed.label(),
            SlotId::Extra { index } => self
                .column(index)
                .map(|c| c.label.clone())
                .unwrap_or_else(|| default_label(index)),
        }
    }

    /// The render/export order: each fixed slot followed by the extra
    /// columns anchored to it, in schema order.
    pub fn ordered_slots(&self) -> Vec<SlotDescriptor> {
        let mut out = Vec::with_capacity(FixedSlot::COUNT + self.columns.len());
        for fixed in FixedSlot::ALL {
            out.push(SlotDescriptor {
                id: SlotId::Fixed(fixed),
                ident: fixed.field_name(),
                label: fixed.label(),
            });
            for (index, column) in self.columns.iter().enumerate() {
                if column.insert_after == fixed {
                    out.push(SlotDescriptor {
                        id: SlotId::extra(index),
                        ident: SlotId::extra(index).ident(),
                        label: column.label.clone(),
                    });
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::Zone;

    fn column(label: &str, zone: Zone, position: u8) -> ExtraColumn {
        ExtraColumn {
            label: label.into(),
            insert_after: FixedSlot::new(zone, position).unwrap(),
        }
    }

    #[test]
    fn empty_schema_orders_fixed_slots_only() {
        let slots = SchemaDescriptor::default().ordered_slots();
        assert_eq!(slots.len(), 12);
        assert_eq!(slots[0].ident, "leftFinish1");
        assert_eq!(slots[11].ident, "option4");
    }

    #[test]
    fn extras_follow_their_anchor_in_list_order() {
        let schema = SchemaDescriptor::new(vec![
            column("Insulation", Zone::Infill, 1),
            column("Sealant", Zone::LeftFinish, 1),
            column("Vapor barrier", Zone::Infill, 1),
        ]);
        let idents: Vec<String> = schema.ordered_slots().into_iter().map(|s| s.ident).collect();
        let infill = idents.iter().position(|i| i == "infill").unwrap();
        assert_eq!(idents[1], "extra_1");
        assert_eq!(idents[infill + 1], "extra_0");
        assert_eq!(idents[infill + 2], "extra_2");
        assert_eq!(idents.len(), 15);
    }

    #[test]
    fn label_of_falls_back_for_unknown_extra() {
        let schema = SchemaDescriptor::new(vec![column("Insulation", Zone::Infill, 1)]);
        assert_eq!(schema.label_of(SlotId::extra(0)), "Insulation");
        assert_eq!(schema.label_of(SlotId::extra(4)), "extra5");
    }
}
