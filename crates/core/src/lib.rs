//! # wallcost Core
//!
//! Domain types, traits, and error definitions for the wallcost assembly
//! catalog. This crate has **no storage or spreadsheet dependencies**: it
//! defines the model that every other crate implements against.
//!
//! ## Layout
//!
//! - [`item`]: priced catalog items and their content key
//! - [`assembly`]: wall assemblies, fixed slots, aggregates
//! - [`schema`]: the store-wide extra-column schema
//! - [`store`]: the `RecordStore` trait backends implement
//! - [`workbook`]: the sheet/cell model the codecs read and write
//! - [`event`]: success/failure notices

pub mod assembly;
pub mod error;
pub mod event;
pub mod item;
pub mod schema;
pub mod store;
pub mod workbook;

// Re-export key types at crate root for ergonomics
pub use assembly::{Aggregates, FixedSlot, SlotId, SlotRef, WallAssembly, Zone};
pub use error::{Error, Result, StoreError};
pub use event::{EventBus, Notice, NotificationSink, TracingSink};
pub use item::{CatalogIndex, ItemPatch, NewPricedItem, PricedItem, content_key, normalize};
pub use schema::{ExtraColumn, SchemaDescriptor, SlotDescriptor};
pub use store::{Collection, Record, RecordStore, StoredRecord, WriteBatch, WriteOp};
pub use workbook::{Cell, Sheet, Workbook};
