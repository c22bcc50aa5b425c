use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use sqlx::SqlitePool;

use pricebook_lib::config::AppConfig;
use pricebook_lib::{db, export, http, import, AppState};

#[derive(Debug, Parser)]
#[command(name = "pricebook", about = "Price list import and export service", version)]
struct Cli {
    #[command(flatten)]
    config: AppConfig,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the HTTP API (default when no command is given).
    Serve,
    /// Merge a zip archive of CSV files into the store and print the totals.
    Import {
        /// Path to the zip archive.
        archive: PathBuf,
        /// Also write a per-row JSON report into this directory.
        #[arg(long)]
        report_dir: Option<PathBuf>,
    },
    /// Write the whole store to a zip archive holding `data.csv`.
    Export {
        /// Destination archive path.
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    pricebook_lib::init_logging(cli.config.log_format);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let pool = db::open_pool(&cli.config.store)
        .await
        .context("open price store")?;

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => http::serve(AppState::new(pool.clone()), &cli.config.server)
            .await
            .context("serve http api"),
        Commands::Import {
            archive,
            report_dir,
        } => run_import(&pool, archive, report_dir).await,
        Commands::Export { out } => run_export(&pool, out).await,
    };

    pool.close().await;
    result
}

async fn run_import(
    pool: &SqlitePool,
    archive: PathBuf,
    report_dir: Option<PathBuf>,
) -> Result<()> {
    let bytes = tokio::fs::read(&archive)
        .await
        .with_context(|| format!("read archive {}", archive.display()))?;
    let outcome = import::import_archive(pool, bytes)
        .await
        .with_context(|| format!("import archive {}", archive.display()))?;

    if let Some(dir) = report_dir {
        let path = import::write_import_report(&dir, &archive, &outcome.report, &outcome.merge)?;
        eprintln!("Import report written to {}", path.display());
    }

    let totals = serde_json::to_string_pretty(&outcome.totals()).context("serialize totals")?;
    println!("{totals}");
    Ok(())
}

async fn run_export(pool: &SqlitePool, out: PathBuf) -> Result<()> {
    let bytes = export::export_to_file(pool, &out)
        .await
        .with_context(|| format!("export to {}", out.display()))?;
    let payload = json!({ "path": out, "bytes": bytes });
    println!("{}", serde_json::to_string_pretty(&payload).context("serialize export summary")?);
    Ok(())
}
