//! Wall assemblies: named layer sequences of slot references into the catalog.
//!
//! An assembly has twelve fixed slots in five zones, always in this order:
//!
//! ```text
//! leftFinish1..3 | structure | infill | rightFinish1..3 | option1..4
//! ```
//!
//! followed by one extra slot per column of the store-wide
//! [`SchemaDescriptor`](crate::schema::SchemaDescriptor). Slots hold item ids
//! as weak references; nothing cascades when an item is deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An optional reference to a catalog item id.
pub type SlotRef = Option<String>;

/// The five zones of the fixed layer sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    LeftFinish,
    Structure,
    Infill,
    RightFinish,
    Options,
}

impl Zone {
    pub const ALL: [Zone; 5] = [
        Zone::LeftFinish,
        Zone::Structure,
        Zone::Infill,
        Zone::RightFinish,
        Zone::Options,
    ];

    /// Number of slots in this zone.
    pub fn capacity(self) -> u8 {
        match self {
            Zone::LeftFinish | Zone::RightFinish => 3,
            Zone::Structure | Zone::Infill => 1,
            Zone::Options => 4,
        }
    }

    /// Index of this zone's first slot in the flat fixed-slot array.
    fn offset(self) -> usize {
        match self {
            Zone::LeftFinish => 0,
            Zone::Structure => 3,
            Zone::Infill => 4,
            Zone::RightFinish => 5,
            Zone::Options => 8,
        }
    }
}

/// One of the twelve fixed slots, addressed by zone and 1-based position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixedSlot {
    zone: Zone,
    position: u8,
}

impl FixedSlot {
    pub const COUNT: usize = 12;

    /// Canonical left-to-right order.
    pub const ALL: [FixedSlot; FixedSlot::COUNT] = [
        FixedSlot::at(Zone::LeftFinish, 1),
        FixedSlot::at(Zone::LeftFinish, 2),
        FixedSlot::at(Zone::LeftFinish, 3),
        FixedSlot::at(Zone::Structure, 1),
        FixedSlot::at(Zone::Infill, 1),
        FixedSlot::at(Zone::RightFinish, 1),
        FixedSlot::at(Zone::RightFinish, 2),
        FixedSlot::at(Zone::RightFinish, 3),
        FixedSlot::at(Zone::Options, 1),
        FixedSlot::at(Zone::Options, 2),
        FixedSlot::at(Zone::Options, 3),
        FixedSlot::at(Zone::Options, 4),
    ];

    /// Anchor used for extra columns whose file metadata names no anchor.
    pub const OUTERMOST: FixedSlot = FixedSlot::at(Zone::RightFinish, 3);

    const fn at(zone: Zone, position: u8) -> Self {
        Self { zone, position }
    }

    pub fn new(zone: Zone, position: u8) -> Option<Self> {
        (1..=zone.capacity())
            .contains(&position)
            .then_some(Self { zone, position })
    }

    pub fn zone(self) -> Zone {
        self.zone
    }

    pub fn position(self) -> u8 {
        self.position
    }

    /// Position in the flat `[SlotRef; 12]` array.
    pub fn index(self) -> usize {
        self.zone.offset() + usize::from(self.position) - 1
    }

    /// Stable machine identifier used in the mapping sheet.
    pub fn field_name(self) -> String {
        match self.zone {
            Zone::LeftFinish => format!("leftFinish{}", self.position),
            Zone::Structure => "structure".to_string(),
            Zone::Infill => "infill".to_string(),
            Zone::RightFinish => format!("rightFinish{}", self.position),
            Zone::Options => format!("option{}", self.position),
        }
    }

    /// Human-readable column header.
    pub fn label(self) -> String {
        match self.zone {
            Zone::LeftFinish => format!("Left Finish {}", self.position),
            Zone::Structure => "Structure".to_string(),
            Zone::Infill => "Infill".to_string(),
            Zone::RightFinish => format!("Right Finish {}", self.position),
            Zone::Options => format!("Option {}", self.position),
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.field_name() == name)
    }
}

impl std::fmt::Display for FixedSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.field_name())
    }
}

/// Either a fixed slot or an extra slot identified by its schema index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotId {
    Fixed(FixedSlot),
    Extra { index: usize },
}

impl SlotId {
    pub fn extra(index: usize) -> Self {
        SlotId::Extra { index }
    }

    /// Parse a mapping-sheet identifier (`structure`, `option2`, `extra_0`, ...).
    pub fn parse(ident: &str) -> Option<Self> {
        if let Some(n) = ident.strip_prefix("extra_") {
            return n.parse().ok().map(SlotId::extra);
        }
        FixedSlot::from_field_name(ident).map(SlotId::Fixed)
    }

    pub fn ident(self) -> String {
        match self {
            SlotId::Fixed(slot) => slot.field_name(),
            SlotId::Extra { index } => format!("extra_{index}"),
        }
    }
}

/// Derived per-assembly totals, persisted alongside the slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregates {
    pub thickness: f64,
    pub total_material_price: f64,
    pub total_labor_price: f64,
    pub total_price: f64,
}

/// A named composite of slot references describing one wall type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallAssembly {
    pub id: String,
    pub name: String,

    /// Dense 0..N-1 display order
    pub sort_order: usize,

    /// Indexed by [`FixedSlot::index`]
    pub fixed: [SlotRef; FixedSlot::COUNT],

    /// One entry per schema column, same order as the schema
    #[serde(default)]
    pub extra_slots: Vec<SlotRef>,

    #[serde(default)]
    pub aggregates: Aggregates,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WallAssembly {
    /// An empty assembly padded to `extra_len` extra slots.
    pub fn new(
        id: String,
        name: String,
        sort_order: usize,
        extra_len: usize,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            sort_order,
            fixed: Default::default(),
            extra_slots: vec![None; extra_len],
            aggregates: Aggregates::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn slot(&self, slot: SlotId) -> Option<&str> {
        match slot {
            SlotId::Fixed(fixed) => self.fixed[fixed.index()].as_deref(),
            SlotId::Extra { index } => self.extra_slots.get(index).and_then(|r| r.as_deref()),
        }
    }

    /// Assign or clear a slot. Extra indexes must exist in the current schema.
    pub fn set_slot(&mut self, slot: SlotId, item_id: SlotRef) -> Result<()> {
        match slot {
            SlotId::Fixed(fixed) => self.fixed[fixed.index()] = item_id,
            SlotId::Extra { index } => {
                let len = self.extra_slots.len();
                let target = self.extra_slots.get_mut(index).ok_or_else(|| {
                    Error::Validation(format!(
                        "extra slot {index} does not exist (schema has {len} extra columns)"
                    ))
                })?;
                *target = item_id;
            }
        }
        Ok(())
    }

    /// Every slot in composition order: fixed slots, then extra slots.
    pub fn slots(&self) -> impl Iterator<Item = (SlotId, Option<&str>)> + '_ {
        let fixed = FixedSlot::ALL
            .into_iter()
            .map(|slot| (SlotId::Fixed(slot), self.fixed[slot.index()].as_deref()));
        let extra = self
            .extra_slots
            .iter()
            .enumerate()
            .map(|(index, r)| (SlotId::extra(index), r.as_deref()));
        fixed.chain(extra)
    }

    /// Whether any slot references `item_id`.
    pub fn references(&self, item_id: &str) -> bool {
        self.slots().any(|(_, r)| r == Some(item_id))
    }

    /// Grow `extra_slots` with empty references up to `len`. Never shrinks.
    pub fn pad_extra(&mut self, len: usize) {
        if self.extra_slots.len() < len {
            self.extra_slots.resize(len, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_slots_cover_twelve_distinct_indexes() {
        let indexes: Vec<usize> = FixedSlot::ALL.iter().map(|s| s.index()).collect();
        assert_eq!(indexes, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn field_names_round_trip() {
        for slot in FixedSlot::ALL {
            assert_eq!(FixedSlot::from_field_name(&slot.field_name()), Some(slot));
        }
        assert_eq!(FixedSlot::ALL[3].field_name(), "structure");
        assert_eq!(FixedSlot::ALL[11].label(), "Option 4");
    }

    #[test]
    fn new_rejects_out_of_range_position() {
        assert!(FixedSlot::new(Zone::Structure, 2).is_none());
        assert!(FixedSlot::new(Zone::Options, 0).is_none());
        assert_eq!(FixedSlot::new(Zone::RightFinish, 3), Some(FixedSlot::OUTERMOST));
    }

    #[test]
    fn slot_id_parse() {
        assert_eq!(SlotId::parse("extra_3"), Some(SlotId::extra(3)));
        assert_eq!(
            SlotId::parse("infill"),
            Some(SlotId::Fixed(FixedSlot::new(Zone::Infill, 1).unwrap()))
        );
        assert_eq!(SlotId::parse("extra_x"), None);
        assert_eq!(SlotId::parse("_thickness"), None);
    }

    #[test]
    fn set_slot_rejects_missing_extra() {
        let mut wall = WallAssembly::new("a".into(), "W-01".into(), 0, 1, Utc::now());
        assert!(wall.set_slot(SlotId::extra(0), Some("item".into())).is_ok());
        assert!(wall.set_slot(SlotId::extra(1), Some("item".into())).is_err());
        assert!(wall.references("item"));
    }

    #[test]
    fn pad_extra_never_shrinks() {
        let mut wall = WallAssembly::new("a".into(), "W-01".into(), 0, 2, Utc::now());
        wall.extra_slots[1] = Some("x".into());
        wall.pad_extra(1);
        assert_eq!(wall.extra_slots.len(), 2);
        wall.pad_extra(4);
        assert_eq!(wall.extra_slots, vec![None, Some("x".into()), None, None]);
    }

    #[test]
    fn assembly_serializes_with_fixed_array() {
        let mut wall = WallAssembly::new("a".into(), "W-01".into(), 0, 0, Utc::now());
        wall.fixed[FixedSlot::ALL[3].index()] = Some("stud".into());
        let json = serde_json::to_string(&wall).unwrap();
        let back: WallAssembly = serde_json::from_str(&json).unwrap();
        assert_eq!(back, wall);
    }
}
