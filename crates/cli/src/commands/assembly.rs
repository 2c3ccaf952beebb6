//! `wallcost assembly`: Wall-assembly editing.

use clap::Subcommand;
use wallcost_assembly::Workspace;
use wallcost_core::assembly::{FixedSlot, SlotId, WallAssembly};

use super::catalog::resolve_item;
use super::{CmdResult, money, open_workspace};

#[derive(Subcommand)]
pub enum AssemblyAction {
    /// Create an empty assembly (auto-named unless a name is given)
    New { name: Option<String> },

    /// List assemblies in display order with their totals
    List,

    /// Show every slot of one assembly
    Show { assembly: String },

    /// Rename an assembly
    Rename { assembly: String, name: String },

    /// Put a catalog item (id or content key) into a slot
    Assign {
        assembly: String,
        /// Slot identifier: leftFinish1..3, structure, infill,
        /// rightFinish1..3, option1..4 or extra_<n>
        slot: String,
        item: String,
    },

    /// Empty a slot
    Clear { assembly: String, slot: String },

    /// Set the display order (every assembly, by name or id)
    Reorder { assemblies: Vec<String> },

    /// Delete one or more assemblies
    Delete {
        #[arg(required = true)]
        assemblies: Vec<String>,
    },

    /// Add an extra column shared by every assembly
    AddColumn {
        label: String,
        /// Fixed slot the column is shown after
        #[arg(long, default_value = "rightFinish3")]
        after: String,
    },

    /// Remove an extra column from every assembly
    RemoveColumn { index: usize },

    /// Change the label of an extra column
    RelabelColumn { index: usize, label: String },
}

/// Find an assembly by id, falling back to its exact name.
async fn resolve_assembly(workspace: &Workspace, reference: &str) -> CmdResult<WallAssembly> {
    let store = workspace.assemblies();
    if let Some(assembly) = store.get(reference).await {
        return Ok(assembly);
    }
    store
        .find_by_name(reference)
        .await?
        .ok_or_else(|| format!("No assembly with id or name '{reference}'").into())
}

fn parse_slot(ident: &str) -> CmdResult<SlotId> {
    SlotId::parse(ident).ok_or_else(|| format!("Unknown slot '{ident}'").into())
}

fn print_totals(assembly: &WallAssembly) {
    let totals = assembly.aggregates;
    println!(
        "  {:>3}  {:<16} {:>7} mm  {:>10}  {:>10}  {:>10}",
        assembly.sort_order + 1,
        assembly.name,
        totals.thickness,
        money(totals.total_material_price),
        money(totals.total_labor_price),
        money(totals.total_price)
    );
}

pub async fn run(action: AssemblyAction) -> CmdResult {
    let (_config, workspace) = open_workspace().await?;
    let store = workspace.assemblies();

    match action {
        AssemblyAction::New { name } => {
            let assembly = match name {
                Some(name) => store.create_named(&name).await?,
                None => store.create().await?,
            };
            println!("✅ Created {} ({})", assembly.name, assembly.id);
        }

        AssemblyAction::List => {
            let all = store.get_all().await;
            if all.is_empty() {
                println!("   No assemblies yet. Run `wallcost assembly new`.");
                return Ok(());
            }
            println!(
                "  {:>3}  {:<16} {:>10}  {:>10}  {:>10}  {:>10}",
                "#", "name", "thickness", "material", "labor", "total"
            );
            for assembly in &all {
                print_totals(assembly);
            }
        }

        AssemblyAction::Show { assembly } => {
            let target = resolve_assembly(&workspace, &assembly).await?;
            let view = workspace
                .views()
                .await
                .into_iter()
                .find(|v| v.assembly.id == target.id)
                .ok_or("Assembly disappeared while rendering")?;
            println!("🧱 {}", view.assembly.name);
            for (label, text) in &view.cells {
                let text = if text.is_empty() { "-" } else { text.as_str() };
                println!("  {label:<18} {text}");
            }
            println!();
            print_totals(&view.assembly);
        }

        AssemblyAction::Rename { assembly, name } => {
            let target = resolve_assembly(&workspace, &assembly).await?;
            let renamed = store.rename(&target.id, &name).await?;
            println!("✅ Renamed {} → {}", target.name, renamed.name);
        }

        AssemblyAction::Assign {
            assembly,
            slot,
            item,
        } => {
            let target = resolve_assembly(&workspace, &assembly).await?;
            let slot = parse_slot(&slot)?;
            let item = resolve_item(&workspace, &item).await?;
            let updated = workspace
                .assign_slot(&target.id, slot, Some(item.id.clone()))
                .await?;
            println!("✅ {} / {} ← {}", updated.name, slot.ident(), item.display_text());
            print_totals(&updated);
        }

        AssemblyAction::Clear { assembly, slot } => {
            let target = resolve_assembly(&workspace, &assembly).await?;
            let slot = parse_slot(&slot)?;
            let updated = workspace.assign_slot(&target.id, slot, None).await?;
            println!("✅ Cleared {} / {}", updated.name, slot.ident());
            print_totals(&updated);
        }

        AssemblyAction::Reorder { assemblies } => {
            let mut ids = Vec::with_capacity(assemblies.len());
            for reference in &assemblies {
                ids.push(resolve_assembly(&workspace, reference).await?.id);
            }
            store.reorder(&ids).await?;
            println!("✅ Reordered {} assemblies", ids.len());
        }

        AssemblyAction::Delete { assemblies } => {
            let mut ids = Vec::with_capacity(assemblies.len());
            for reference in &assemblies {
                ids.push(resolve_assembly(&workspace, reference).await?.id);
            }
            let removed = store.delete_many(&ids).await?;
            for assembly in &removed {
                println!("🗑️  Deleted {}", assembly.name);
            }
        }

        AssemblyAction::AddColumn { label, after } => {
            let anchor = FixedSlot::from_field_name(&after)
                .ok_or_else(|| format!("Unknown fixed slot '{after}'"))?;
            let index = workspace.add_extra_column(&label, anchor).await?;
            println!("✅ Added extra_{index} after {anchor} to every assembly");
        }

        AssemblyAction::RemoveColumn { index } => {
            let removed = workspace.remove_extra_column(index).await?;
            println!("🗑️  Removed extra column '{}'", removed.label);
        }

        AssemblyAction::RelabelColumn { index, label } => {
            store.relabel_extra_column(index, &label).await?;
            println!("✅ extra_{index} is now labelled '{}'", label.trim());
        }
    }

    Ok(())
}
