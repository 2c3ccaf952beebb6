//! Priced line items: the catalog's record type and its content key.
//!
//! An item's identity across imports is its *content key*, built from the
//! normalized name and spec. The store-local `id` is opaque and changes
//! whenever a catalog is rebuilt, so spreadsheets never carry it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lowercase and strip every whitespace character.
pub fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// The content key of an item: `normalize(name) + "_" + normalize(spec)`.
pub fn content_key(name: &str, spec: &str) -> String {
    format!("{}_{}", normalize(name), normalize(spec))
}

/// A catalog entry for one purchasable/installable component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedItem {
    pub id: String,

    /// Content key, unique within the catalog
    pub key: String,

    #[serde(default)]
    pub location: String,
    pub name: String,
    pub spec: String,
    #[serde(default)]
    pub unit: String,

    /// Layer thickness in millimetres
    #[serde(default)]
    pub thickness: f64,
    #[serde(default)]
    pub quantity: f64,

    pub material_price: f64,
    pub labor_price: f64,

    /// Always `material_price + labor_price`
    pub total_price: f64,

    #[serde(default)]
    pub material_work_type: String,
    #[serde(default)]
    pub labor_work_type: String,

    /// First time this key entered the catalog; survives re-uploads
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PricedItem {
    /// Text shown in a slot that references this item.
    pub fn display_text(&self) -> String {
        format!("{} {}", self.name, self.spec)
    }

    /// Recompute `key` and `total_price` from the fields they derive from.
    pub fn refresh_derived(&mut self) {
        self.key = content_key(&self.name, &self.spec);
        self.total_price = self.material_price + self.labor_price;
    }

    /// Overwrite every field except `id` and `created_at` with `fields`.
    pub fn replace_with(&mut self, fields: NewPricedItem, now: DateTime<Utc>) {
        self.location = fields.location;
        self.name = fields.name;
        self.spec = fields.spec;
        self.unit = fields.unit;
        self.thickness = fields.thickness;
        self.quantity = fields.quantity;
        self.material_price = fields.material_price;
        self.labor_price = fields.labor_price;
        self.material_work_type = fields.material_work_type;
        self.labor_work_type = fields.labor_work_type;
        self.updated_at = now;
        self.refresh_derived();
    }
}

/// Field values for an item that does not have an id yet
/// (manual entry or one row of a price-list upload).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPricedItem {
    #[serde(default)]
    pub location: String,
    pub name: String,
    pub spec: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub thickness: f64,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub material_price: f64,
    #[serde(default)]
    pub labor_price: f64,
    #[serde(default)]
    pub material_work_type: String,
    #[serde(default)]
    pub labor_work_type: String,
}

impl NewPricedItem {
    pub fn key(&self) -> String {
        content_key(&self.name, &self.spec)
    }

    /// Materialize a full record with the given id and timestamps.
    pub fn into_item(self, id: String, now: DateTime<Utc>) -> PricedItem {
        let mut item = PricedItem {
            id,
            key: String::new(),
            location: self.location,
            name: self.name,
            spec: self.spec,
            unit: self.unit,
            thickness: self.thickness,
            quantity: self.quantity,
            material_price: self.material_price,
            labor_price: self.labor_price,
            total_price: 0.0,
            material_work_type: self.material_work_type,
            labor_work_type: self.labor_work_type,
            created_at: now,
            updated_at: now,
        };
        item.refresh_derived();
        item
    }
}

/// A partial update from an inline edit. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemPatch {
    pub location: Option<String>,
    pub name: Option<String>,
    pub spec: Option<String>,
    pub unit: Option<String>,
    pub thickness: Option<f64>,
    pub quantity: Option<f64>,
    pub material_price: Option<f64>,
    pub labor_price: Option<f64>,
    pub material_work_type: Option<String>,
    pub labor_work_type: Option<String>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.location.is_none()
            && self.name.is_none()
            && self.spec.is_none()
            && self.unit.is_none()
            && self.thickness.is_none()
            && self.quantity.is_none()
            && self.material_price.is_none()
            && self.labor_price.is_none()
            && self.material_work_type.is_none()
            && self.labor_work_type.is_none()
    }

    /// Apply to `item` and refresh the derived fields.
    pub fn apply(&self, item: &mut PricedItem, now: DateTime<Utc>) {
        if let Some(v) = &self.location {
            item.location = v.clone();
        }
        if let Some(v) = &self.name {
            item.name = v.clone();
        }
        if let Some(v) = &self.spec {
            item.spec = v.clone();
        }
        if let Some(v) = &self.unit {
            item.unit = v.clone();
        }
        if let Some(v) = self.thickness {
            item.thickness = v;
        }
        if let Some(v) = self.quantity {
            item.quantity = v;
        }
        if let Some(v) = self.material_price {
            item.material_price = v;
        }
        if let Some(v) = self.labor_price {
            item.labor_price = v;
        }
        if let Some(v) = &self.material_work_type {
            item.material_work_type = v.clone();
        }
        if let Some(v) = &self.labor_work_type {
            item.labor_work_type = v.clone();
        }
        item.updated_at = now;
        item.refresh_derived();
    }
}

/// An id → item map built once per batch so slot resolution is O(1).
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    by_id: HashMap<String, PricedItem>,
}

impl CatalogIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&PricedItem> {
        self.by_id.get(id)
    }

    pub fn insert(&mut self, item: PricedItem) {
        self.by_id.insert(item.id.clone(), item);
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl FromIterator<PricedItem> for CatalogIndex {
    fn from_iter<I: IntoIterator<Item = PricedItem>>(iter: I) -> Self {
        Self {
            by_id: iter.into_iter().map(|item| (item.id.clone(), item)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn key_ignores_case_and_whitespace() {
        assert_eq!(content_key("C-STUD", " 65형 "), content_key("c-stud", "65형"));
        assert_eq!(content_key("C STUD", "65형"), "cstud_65형");
    }

    #[test]
    fn key_is_deterministic() {
        let a = content_key("Gypsum Board", "9.5T x 2");
        let b = content_key("Gypsum Board", "9.5T x 2");
        assert_eq!(a, b);
        assert_eq!(a, "gypsumboard_9.5tx2");
    }

    #[test]
    fn into_item_derives_key_and_total() {
        let item = stud().into_item("id-1".into(), Utc::now());
        assert_eq!(item.key, "cstud_65형");
        assert_eq!(item.total_price, 17000.0);
        assert_eq!(item.created_at, item.updated_at);
    }

    #[test]
    fn patch_recomputes_total_and_key() {
        let mut item = stud().into_item("id-1".into(), Utc::now());
        let patch = ItemPatch {
            labor_price: Some(1000.0),
            spec: Some("75형".into()),
            ..Default::default()
        };
        patch.apply(&mut item, Utc::now());
        assert_eq!(item.total_price, 10000.0);
        assert_eq!(item.key, "cstud_75형");
    }

    #[test]
    fn replace_keeps_id_and_created_at() {
        let created = Utc::now();
        let mut item = stud().into_item("id-1".into(), created);
        let mut fields = stud();
        fields.material_price = 1.0;
        fields.labor_price = 2.0;
        let later = created + chrono::Duration::seconds(5);
        item.replace_with(fields, later);
        assert_eq!(item.id, "id-1");
        assert_eq!(item.created_at, created);
        assert_eq!(item.updated_at, later);
        assert_eq!(item.total_price, 3.0);
    }

    #[test]
    fn empty_patch_detected() {
        assert!(ItemPatch::default().is_empty());
        let patch = ItemPatch {
            unit: Some("m2".into()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn index_resolves_by_id() {
        let index: CatalogIndex = vec![stud().into_item("a".into(), Utc::now())]
            .into_iter()
            .collect();
        assert_eq!(index.len(), 1);
        assert!(index.get("a").is_some());
        assert!(index.get("b").is_none());
    }
}
