//! Spreadsheet interchange for wallcost assemblies.
//!
//! [`codec`] maps assemblies to and from the two-sheet workbook model;
//! [`xlsx`] converts that model to and from `.xlsx` bytes.

pub mod codec;
pub mod xlsx;

pub use codec::{
    ImportDiagnostic, ImportPlan, ImportSummary, decode, encode, export_workspace, import,
    import_workspace,
};
pub use xlsx::{read_workbook, write_workbook};
