//! Wall assemblies for wallcost.
//!
//! - [`compose`] derives aggregates from slot references (pure)
//! - [`AssemblyStore`] persists assemblies and the extra-column schema
//! - [`Workspace`] keeps assemblies in step with catalog changes

pub mod compose;
pub mod store;
pub mod workspace;

pub use compose::{Composition, DELETED_TEXT, UnresolvedSlot, display_text, recompute};
pub use store::{AssemblyStore, DEFAULT_NAME_PREFIX};
pub use workspace::{AssemblyView, Workspace};
