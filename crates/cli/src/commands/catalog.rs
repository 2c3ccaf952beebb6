//! `wallcost catalog`: Price-list upload and item editing.

use clap::{Args, Subcommand};
use std::path::PathBuf;
use wallcost_assembly::Workspace;
use wallcost_core::item::{ItemPatch, NewPricedItem, PricedItem};
use wallcost_interchange::read_workbook;

use super::{CmdResult, money, open_workspace};

#[derive(Subcommand)]
pub enum CatalogAction {
    /// Upsert every row of a price-list workbook by content key
    Upload {
        /// Price-list .xlsx file
        path: PathBuf,
    },

    /// List items sorted by name and spec
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Add one item
    Add(ItemArgs),

    /// Edit fields of an item (by id or content key)
    Update {
        item: String,
        #[command(flatten)]
        fields: PatchArgs,
    },

    /// Delete an item (by id or content key)
    Delete { item: String },

    /// Delete every item
    Clear {
        #[arg(long)]
        confirm: bool,
    },
}

#[derive(Args)]
pub struct ItemArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    spec: String,
    #[arg(long, default_value = "")]
    location: String,
    #[arg(long, default_value = "")]
    unit: String,
    #[arg(long, default_value_t = 0.0)]
    thickness: f64,
    #[arg(long, default_value_t = 0.0)]
    quantity: f64,
    #[arg(long, default_value_t = 0.0)]
    material: f64,
    #[arg(long, default_value_t = 0.0)]
    labor: f64,
    #[arg(long, default_value = "")]
    material_work_type: String,
    #[arg(long, default_value = "")]
    labor_work_type: String,
}

impl From<ItemArgs> for NewPricedItem {
    fn from(a: ItemArgs) -> Self {
        NewPricedItem {
            location: a.location,
            name: a.name,
            spec: a.spec,
            unit: a.unit,
            thickness: a.thickness,
            quantity: a.quantity,
            material_price: a.material,
            labor_price: a.labor,
            material_work_type: a.material_work_type,
            labor_work_type: a.labor_work_type,
        }
    }
}

#[derive(Args)]
pub struct PatchArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    spec: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    unit: Option<String>,
    #[arg(long)]
    thickness: Option<f64>,
    #[arg(long)]
    quantity: Option<f64>,
    #[arg(long)]
    material: Option<f64>,
    #[arg(long)]
    labor: Option<f64>,
    #[arg(long)]
    material_work_type: Option<String>,
    #[arg(long)]
    labor_work_type: Option<String>,
}

impl From<PatchArgs> for ItemPatch {
    fn from(a: PatchArgs) -> Self {
        ItemPatch {
            location: a.location,
            name: a.name,
            spec: a.spec,
            unit: a.unit,
            thickness: a.thickness,
            quantity: a.quantity,
            material_price: a.material,
            labor_price: a.labor,
            material_work_type: a.material_work_type,
            labor_work_type: a.labor_work_type,
        }
    }
}

/// Find an item by id, falling back to its content key.
pub async fn resolve_item(workspace: &Workspace, reference: &str) -> CmdResult<PricedItem> {
    let catalog = workspace.catalog();
    if let Some(item) = catalog.get_by_id(reference).await {
        return Ok(item);
    }
    catalog
        .get_by_key(reference)
        .await
        .ok_or_else(|| format!("No catalog item with id or key '{reference}'").into())
}

fn print_item(item: &PricedItem) {
    println!(
        "  {:<24} {:<16} {:>6} mm  {:>10}  {:>10}  {:>10}  {}",
        item.name,
        item.spec,
        item.thickness,
        money(item.material_price),
        money(item.labor_price),
        money(item.total_price),
        item.key
    );
}

pub async fn run(action: CatalogAction) -> CmdResult {
    let (config, workspace) = open_workspace().await?;

    match action {
        CatalogAction::Upload { path } => {
            let bytes = std::fs::read(&path)?;
            let workbook = read_workbook(&bytes)?;
            let summary = workspace
                .upload_price_list(&workbook, config.price_list.header_scan_rows)
                .await?;
            println!("📥 Uploaded {}", path.display());
            println!("   Inserted: {}", summary.inserted_count);
            println!("   Updated:  {}", summary.updated_count);
            println!("   Skipped:  {} rows", summary.skipped_rows);
        }

        CatalogAction::List { json } => {
            let items = workspace.catalog().get_all().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if items.is_empty() {
                println!("   Catalog is empty. Run `wallcost catalog upload <file>` first.");
            } else {
                println!(
                    "  {:<24} {:<16} {:>9}  {:>10}  {:>10}  {:>10}  key",
                    "name", "spec", "thickness", "material", "labor", "total"
                );
                for item in &items {
                    print_item(item);
                }
                println!("\n  {} items", items.len());
            }
        }

        CatalogAction::Add(args) => {
            let item = workspace.catalog().create(args.into()).await?;
            println!("✅ Added {} ({})", item.display_text(), item.id);
        }

        CatalogAction::Update { item, fields } => {
            let patch = ItemPatch::from(fields);
            if patch.is_empty() {
                return Err("Nothing to update: pass at least one field flag".into());
            }
            let target = resolve_item(&workspace, &item).await?;
            let updated = workspace.update_item(&target.id, &patch).await?;
            println!("✅ Updated {}", updated.display_text());
            print_item(&updated);
        }

        CatalogAction::Delete { item } => {
            let target = resolve_item(&workspace, &item).await?;
            let removed = workspace.delete_item(&target.id).await?;
            println!("🗑️  Deleted {}", removed.display_text());
        }

        CatalogAction::Clear { confirm } => {
            if !confirm {
                println!("⚠️  This will delete ALL catalog items permanently.");
                println!("   Slots that reference them will show as (deleted).");
                println!("   Run with --confirm to proceed:");
                println!("   wallcost catalog clear --confirm");
                return Ok(());
            }
            workspace.clear_catalog().await?;
            println!("✅ Catalog cleared.");
        }
    }

    Ok(())
}
