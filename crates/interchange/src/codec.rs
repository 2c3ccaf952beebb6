//! The assembly interchange workbook.
//!
//! Two sheets describe the same assemblies:
//!
//! - `assembly`: what a person reads. Slot cells show `"{name} {spec}"` and
//!   the four aggregates are numbers.
//! - `mapping`: what import reads. Row 1 holds machine identifiers, row 2
//!   holds extra-column metadata, and every data row holds content keys so
//!   the file survives a catalog rebuild with new record ids.
//!
//! Import never trusts file aggregates; they are recomputed from the slots.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use wallcost_assembly::{AssemblyStore, Workspace, compose};
use wallcost_catalog::PricedItemCatalog;
use wallcost_core::assembly::{FixedSlot, SlotId, WallAssembly};
use wallcost_core::error::{Error, Result};
use wallcost_core::event::Notice;
use wallcost_core::item::CatalogIndex;
use wallcost_core::schema::{ExtraColumn, SchemaDescriptor, default_label};
use wallcost_core::workbook::{Cell, Sheet, Workbook};

pub const ASSEMBLY_SHEET: &str = "assembly";
pub const MAPPING_SHEET: &str = "mapping";

pub const NAME_HEADER: &str = "_assemblyName";
pub const AGGREGATE_HEADERS: [&str; 4] = [
    "_thickness",
    "_totalMaterialPrice",
    "_totalLaborPrice",
    "_totalPrice",
];

const WALL_TYPE_HEADER: &str = "WallType";
const TOTAL_HEADERS: [&str; 4] = ["Thickness", "MaterialTotal", "LaborTotal", "GrandTotal"];

/// Column limit of an xlsx worksheet; no sheet can carry an extra index at
/// or above it.
pub const MAX_EXTRA_INDEX: usize = 16_384;

const LABEL_PREFIX: &str = "label:";
const ANCHOR_MARKER: &str = ",insertAfter:";

/// Row-2 metadata for an extra column.
fn extra_metadata(column: &ExtraColumn) -> String {
    format!(
        "{LABEL_PREFIX}{}{ANCHOR_MARKER}{}",
        column.label,
        column.insert_after.field_name()
    )
}

/// Parse row-2 metadata. The anchor is split at the last marker so labels
/// may contain commas.
fn parse_extra_metadata(text: &str) -> (Option<String>, Option<FixedSlot>) {
    let Some(rest) = text.strip_prefix(LABEL_PREFIX) else {
        return (None, None);
    };
    let (label, anchor) = match rest.rfind(ANCHOR_MARKER) {
        Some(at) => (
            &rest[..at],
            FixedSlot::from_field_name(rest[at + ANCHOR_MARKER.len()..].trim()),
        ),
        None => (rest, None),
    };
    let label = label.trim();
    ((!label.is_empty()).then(|| label.to_string()), anchor)
}

/// Build the two-sheet workbook for `assemblies` (written in `sort_order`).
pub fn encode(
    assemblies: &[WallAssembly],
    schema: &SchemaDescriptor,
    index: &CatalogIndex,
) -> Workbook {
    let slots = schema.ordered_slots();
    let mut ordered: Vec<&WallAssembly> = assemblies.iter().collect();
    ordered.sort_by_key(|a| a.sort_order);

    let mut display = Sheet::new(ASSEMBLY_SHEET);
    let mut header = vec![Cell::text(WALL_TYPE_HEADER)];
    header.extend(slots.iter().map(|s| Cell::text(s.label.clone())));
    header.extend(TOTAL_HEADERS.iter().map(|h| Cell::text(*h)));
    display.push_row(header);

    let mut mapping = Sheet::new(MAPPING_SHEET);
    let mut idents = vec![Cell::text(NAME_HEADER)];
    idents.extend(slots.iter().map(|s| Cell::text(s.ident.clone())));
    idents.extend(AGGREGATE_HEADERS.iter().map(|h| Cell::text(*h)));
    mapping.push_row(idents);

    let mut metadata = vec![Cell::Empty];
    metadata.extend(slots.iter().map(|s| match s.id {
        SlotId::Extra { index } => schema
            .column(index)
            .map(|c| Cell::text(extra_metadata(c)))
            .unwrap_or_default(),
        SlotId::Fixed(_) => Cell::Empty,
    }));
    mapping.push_row(metadata);

    for assembly in ordered {
        let mut row = vec![Cell::text(assembly.name.clone())];
        row.extend(
            slots
                .iter()
                .map(|s| Cell::text(compose::display_text(assembly.slot(s.id), index))),
        );
        let totals = assembly.aggregates;
        row.extend([
            Cell::Number(totals.thickness),
            Cell::Number(totals.total_material_price),
            Cell::Number(totals.total_labor_price),
            Cell::Number(totals.total_price),
        ]);
        display.push_row(row);

        let mut keys = vec![Cell::text(assembly.name.clone())];
        keys.extend(slots.iter().map(|s| {
            assembly
                .slot(s.id)
                .and_then(|id| index.get(id))
                .map(|item| Cell::text(item.key.clone()))
                .unwrap_or_default()
        }));
        mapping.push_row(keys);
    }

    Workbook::new(vec![display, mapping])
}

/// An extra column as described by the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtraColumnPlan {
    pub index: usize,
    pub label: Option<String>,
    pub insert_after: Option<FixedSlot>,
}

/// One data row of the mapping sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowPlan {
    /// 1-based sheet row, for messages
    pub sheet_row: usize,
    pub name: String,
    /// Content key per mapped slot; empty means clear the slot
    pub cells: Vec<(SlotId, String)>,
}

/// A validated mapping sheet, ready to apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportPlan {
    pub slots: Vec<SlotId>,
    pub extras: Vec<ExtraColumnPlan>,
    pub rows: Vec<RowPlan>,
}

impl ImportPlan {
    /// Number of extra columns the file needs: highest index plus one.
    pub fn extra_count(&self) -> usize {
        self.extras
            .iter()
            .map(|e| e.index.saturating_add(1))
            .max()
            .unwrap_or(0)
    }

    /// Schema column for `index`, falling back to defaults for missing metadata.
    pub fn extra_column(&self, index: usize) -> ExtraColumn {
        let plan = self.extras.iter().find(|e| e.index == index);
        ExtraColumn {
            label: plan
                .and_then(|p| p.label.clone())
                .unwrap_or_else(|| default_label(index)),
            insert_after: plan
                .and_then(|p| p.insert_after)
                .unwrap_or(FixedSlot::OUTERMOST),
        }
    }
}

/// Parse and validate the mapping sheet. Nothing is written.
pub fn decode(workbook: &Workbook) -> Result<ImportPlan> {
    let sheet = workbook
        .sheet(MAPPING_SHEET)
        .ok_or_else(|| Error::Validation(format!("workbook has no '{MAPPING_SHEET}' sheet")))?;

    let first = sheet.cell(0, 0).as_text();
    if first != NAME_HEADER {
        return Err(Error::Validation(format!(
            "mapping sheet must start with '{NAME_HEADER}', found '{first}'"
        )));
    }

    let width = sheet.rows.first().map_or(0, Vec::len);
    let mut plan = ImportPlan::default();
    let mut columns = Vec::new();
    let mut seen = HashSet::new();

    for col in 1..width {
        let header = sheet.cell(0, col).as_text();
        if header.is_empty() || header.starts_with('_') {
            continue;
        }
        let slot = SlotId::parse(&header).ok_or_else(|| {
            Error::Validation(format!("unknown mapping column '{header}' at column {}", col + 1))
        })?;
        if !seen.insert(slot) {
            return Err(Error::Validation(format!("mapping column '{header}' appears twice")));
        }
        if let SlotId::Extra { index } = slot {
            if index >= MAX_EXTRA_INDEX {
                return Err(Error::Validation(format!(
                    "mapping column '{header}' is out of range (extra indexes stop at {})",
                    MAX_EXTRA_INDEX - 1
                )));
            }
            let (label, insert_after) = parse_extra_metadata(&sheet.cell(1, col).as_text());
            plan.extras.push(ExtraColumnPlan {
                index,
                label,
                insert_after,
            });
        }
        plan.slots.push(slot);
        columns.push((col, slot));
    }

    for row in 2..sheet.row_count() {
        let name = sheet.cell(row, 0).as_text();
        if name.is_empty() {
            continue;
        }
        let cells = columns
            .iter()
            .map(|&(col, slot)| (slot, sheet.cell(row, col).as_text()))
            .collect();
        plan.rows.push(RowPlan {
            sheet_row: row + 1,
            name,
            cells,
        });
    }

    debug!(
        slots = plan.slots.len(),
        extras = plan.extra_count(),
        rows = plan.rows.len(),
        "Mapping sheet decoded"
    );
    Ok(plan)
}

/// A key in the file that matched no catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportDiagnostic {
    pub assembly_name: String,
    pub slot_label: String,
    pub key: String,
}

impl std::fmt::Display for ImportDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} / {}: no catalog item with key '{}'",
            self.assembly_name, self.slot_label, self.key
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub created_count: usize,
    pub updated_count: usize,
    pub diagnostics: Vec<ImportDiagnostic>,
}

/// Apply `plan`: migrate the schema first, then create or merge one
/// assembly per row by exact name.
pub async fn import(
    plan: &ImportPlan,
    catalog: &PricedItemCatalog,
    assemblies: &AssemblyStore,
) -> Result<ImportSummary> {
    let current = assemblies.schema().await.len();
    let needed = plan.extra_count();
    if needed > current {
        let columns = (current..needed).map(|i| plan.extra_column(i)).collect();
        let migrated = assemblies.extend_schema(columns).await?;
        info!(from = current, to = needed, migrated, "Schema extended for import");
    }

    let schema = assemblies.schema().await;
    let index = catalog.index().await;
    let mut summary = ImportSummary::default();

    for row in &plan.rows {
        let mut assembly = match assemblies.find_by_name(&row.name).await? {
            Some(existing) => {
                summary.updated_count += 1;
                existing
            }
            None => {
                summary.created_count += 1;
                assemblies.create_named(&row.name).await?
            }
        };

        for (slot, key) in &row.cells {
            let target = if key.is_empty() {
                None
            } else if let Some(item) = catalog.get_by_key(key).await {
                Some(item.id)
            } else {
                warn!(
                    assembly = %row.name,
                    slot = %slot.ident(),
                    key = %key,
                    "Unresolved key cleared"
                );
                summary.diagnostics.push(ImportDiagnostic {
                    assembly_name: row.name.clone(),
                    slot_label: schema.label_of(*slot),
                    key: key.clone(),
                });
                None
            };
            assembly.set_slot(*slot, target)?;
        }

        compose::refresh(&mut assembly, &index);
        assemblies.save(assembly).await?;
    }

    info!(
        created = summary.created_count,
        updated = summary.updated_count,
        diagnostics = summary.diagnostics.len(),
        "Import applied"
    );
    Ok(summary)
}

/// Encode every assembly of `workspace` and announce the export.
pub async fn export_workspace(workspace: &Workspace) -> Result<Workbook> {
    let assemblies = workspace.assemblies().get_all().await;
    let schema = workspace.assemblies().schema().await;
    let index = workspace.catalog().index().await;
    let workbook = encode(&assemblies, &schema, &index);
    workspace.sink().notify(Notice::AssembliesExported {
        count: assemblies.len(),
        timestamp: Utc::now(),
    });
    Ok(workbook)
}

/// Decode and apply `workbook` to `workspace`, reporting the outcome.
pub async fn import_workspace(
    workspace: &Workspace,
    workbook: &Workbook,
) -> Result<ImportSummary> {
    let result = async {
        let plan = decode(workbook)?;
        import(&plan, workspace.catalog(), workspace.assemblies()).await
    }
    .await;
    let summary = workspace.report("assembly import", result)?;
    workspace.sink().notify(Notice::AssembliesImported {
        created: summary.created_count,
        updated: summary.updated_count,
        diagnostics: summary.diagnostics.len(),
        timestamp: Utc::now(),
    });
    Ok(summary)
}
