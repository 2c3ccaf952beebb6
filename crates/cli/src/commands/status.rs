//! `wallcost status`: Show configuration and record counts.

use wallcost_config::AppConfig;

use super::{CmdResult, open_workspace};

pub async fn run() -> CmdResult {
    let (config, workspace) = open_workspace().await?;
    let schema = workspace.assemblies().schema().await;

    println!("wallcost Status");
    println!("===============");
    println!("  Config dir:    {}", AppConfig::config_dir().display());
    println!("  Storage:       {}", config.storage.backend);
    println!("  Location:      {}", config.storage.resolved_path().display());
    println!("  Name prefix:   {}", config.assemblies.name_prefix);
    println!("  Header scan:   {} rows", config.price_list.header_scan_rows);
    println!("  Items:         {}", workspace.catalog().len().await);
    println!("  Assemblies:    {}", workspace.assemblies().len().await);
    println!("  Extra columns: {}", schema.len());
    for (index, column) in schema.columns.iter().enumerate() {
        println!("    extra_{index}: {} (after {})", column.label, column.insert_after);
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file - run `wallcost onboard` first");
    }

    Ok(())
}
