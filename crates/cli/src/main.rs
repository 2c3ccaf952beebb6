//! wallcost CLI: the main entry point.
//!
//! Commands:
//! - `onboard`  : Initialize config & data directory
//! - `status`   : Show configuration and record counts
//! - `catalog`  : Upload price lists and edit priced items
//! - `assembly` : Create and edit wall assemblies
//! - `export`   : Write assemblies to an interchange workbook
//! - `import`   : Merge assemblies from an interchange workbook

use clap::{Parser, Subcommand};

mod commands;

use commands::assembly::AssemblyAction;
use commands::catalog::CatalogAction;

#[derive(Parser)]
#[command(
    name = "wallcost",
    about = "wallcost - wall-assembly costing from a priced-item catalog",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and data directory
    Onboard,

    /// Show configuration and record counts
    Status,

    /// Manage the priced-item catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Manage wall assemblies
    Assembly {
        #[command(subcommand)]
        action: AssemblyAction,
    },

    /// Export all assemblies to an .xlsx interchange workbook
    Export {
        /// Output file
        path: std::path::PathBuf,
    },

    /// Import assemblies from an .xlsx interchange workbook
    Import {
        /// Input file
        path: std::path::PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Status => commands::status::run().await?,
        Commands::Catalog { action } => commands::catalog::run(action).await?,
        Commands::Assembly { action } => commands::assembly::run(action).await?,
        Commands::Export { path } => commands::transfer::export(&path).await?,
        Commands::Import { path } => commands::transfer::import(&path).await?,
    }

    Ok(())
}
