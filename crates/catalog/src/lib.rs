//! Priced-item catalog for wallcost.
//!
//! [`PricedItemCatalog`] owns the `priced_items` collection and keeps an
//! in-memory mirror of it for id and content-key lookups. [`price_list`]
//! turns a one-sheet upload into catalog upserts.

pub mod catalog;
pub mod price_list;

pub use catalog::{PricedItemCatalog, UploadSummary, UpsertSummary};
pub use price_list::{ItemField, ParsedPriceList, parse_price_list};
