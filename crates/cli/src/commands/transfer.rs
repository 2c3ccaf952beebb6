//! `wallcost export` / `wallcost import`: Interchange workbooks.

use std::path::Path;
use wallcost_interchange::{export_workspace, import_workspace, read_workbook, write_workbook};

use super::{CmdResult, open_workspace};

pub async fn export(path: &Path) -> CmdResult {
    let (_config, workspace) = open_workspace().await?;
    let workbook = export_workspace(&workspace).await?;
    let bytes = write_workbook(&workbook)?;
    std::fs::write(path, &bytes)?;
    println!(
        "📤 Exported {} assemblies to {}",
        workspace.assemblies().len().await,
        path.display()
    );
    Ok(())
}

pub async fn import(path: &Path) -> CmdResult {
    let (_config, workspace) = open_workspace().await?;
    let bytes = std::fs::read(path)?;
    let workbook = read_workbook(&bytes)?;
    let summary = import_workspace(&workspace, &workbook).await?;

    println!("📥 Imported {}", path.display());
    println!("   Created: {}", summary.created_count);
    println!("   Updated: {}", summary.updated_count);
    if !summary.diagnostics.is_empty() {
        println!("\n⚠️  {} unresolved keys (slots left empty):", summary.diagnostics.len());
        for diagnostic in &summary.diagnostics {
            println!("   {diagnostic}");
        }
    }
    Ok(())
}
