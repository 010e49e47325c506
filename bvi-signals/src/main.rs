//! bvi-signals - filing classification pipeline
//!
//! Ingests scraped label approvals, resolves filer names to canonical
//! companies and assigns each filing its lifecycle signal.

use anyhow::{anyhow, Context, Result};
use bvi_common::config::{CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig};
use bvi_common::db::init_database;
use bvi_common::CompanyId;
use bvi_signals::db::filings;
use bvi_signals::ingest::read_jsonl_file;
use bvi_signals::renormalize::renormalize;
use bvi_signals::{Pipeline, RunSummary, SignalStore};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bvi-signals")]
#[command(about = "Classify label-approval filings into lifecycle signals")]
#[command(version)]
struct Args {
    /// Root folder holding bvi.db (overrides BVI_ROOT_FOLDER and config)
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    /// Config file (default: ~/.config/bvi/bvi.toml, then /etc/bvi/bvi.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store filings from a JSON-lines file
    Ingest { file: PathBuf },
    /// Classify every stored filing without a signal
    Classify,
    /// Ingest a JSON-lines file, then classify
    Run { file: PathBuf },
    /// Clear all signals and replay the full history
    Reclassify,
    /// Rebuild company identities from scratch, then reclassify
    Renormalize,
    /// Show what a raw filer name resolves to
    Company { raw_name: String },
    /// Set a company's display name
    Rename {
        company_id: String,
        display_name: String,
    },
    /// Print signal, company and alias counts
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, config_source) = TomlConfig::load_or_default(args.config.as_deref());

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new(CompiledDefaults::LOG_LEVEL));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting bvi-signals v{}", env!("CARGO_PKG_VERSION"));
    config_source.log();

    config.matching.apply_env_overrides()?;
    info!(
        threshold = config.matching.similarity_threshold,
        scorer = ?config.matching.scorer,
        date_format = ?config.ingest.date_format,
        "Matching configuration"
    );

    let root_folder = RootFolderResolver::new("signals")
        .with_cli_arg(args.root_folder.clone())
        .with_toml(&config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let pool = init_database(&db_path).await?;

    let mut pipeline = Pipeline::open(pool, &config).await?;

    match args.command {
        Command::Ingest { file } => {
            ingest(&pipeline, &file, &config).await?;
        }
        Command::Classify => {
            let summary = pipeline.classify_pending().await?;
            print_summary(&summary)?;
        }
        Command::Run { file } => {
            ingest(&pipeline, &file, &config).await?;
            let summary = pipeline.classify_pending().await?;
            print_summary(&summary)?;
        }
        Command::Reclassify => {
            let summary = pipeline.reclassify().await?;
            print_summary(&summary)?;
        }
        Command::Renormalize => {
            let report = renormalize(&mut pipeline).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Company { raw_name } => {
            let resolution = pipeline.preview(&raw_name);
            println!("raw name:        {}", raw_name);
            println!("normalized:      {}", resolution.normalized_name);
            println!("company id:      {}", resolution.company_id);
            println!("match:           {:?}", resolution.method);
            if let Some(dba) = &resolution.dba_name {
                println!("operates as:     {}", dba);
            }
            match pipeline.store().company(&resolution.company_id) {
                Some(company) => {
                    println!("display name:    {}", company.display_name);
                    if !company.dba_names.is_empty() {
                        println!("known DBAs:      {}", company.dba_names.join("; "));
                    }
                }
                None => println!("display name:    (new company)"),
            }
        }
        Command::Rename {
            company_id,
            display_name,
        } => {
            let id: CompanyId = company_id.parse()?;
            if !filings::rename_company(pipeline.pool(), id, &display_name).await? {
                return Err(anyhow!("No company with id {}", id));
            }
            info!(company_id = %id, "Renamed company to '{}'", display_name);
        }
        Command::Stats => {
            let stats = filings::load_stats(pipeline.pool()).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

async fn ingest(pipeline: &Pipeline, file: &std::path::Path, config: &TomlConfig) -> Result<()> {
    let batch = read_jsonl_file(file, config.ingest.date_format)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    if !batch.rejected.is_empty() {
        warn!("{} malformed filings skipped", batch.rejected.len());
    }
    let stored = pipeline.ingest(&batch).await?;
    println!(
        "ingested: {} new, {} already stored, {} rejected",
        stored.inserted,
        stored.existing,
        batch.rejected.len()
    );
    Ok(())
}

fn print_summary(summary: &RunSummary) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}
