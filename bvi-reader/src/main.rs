//! bvi-reader - read-only HTTP access to classification results

use anyhow::Result;
use bvi_common::config::{CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig};
use bvi_reader::{build_router, AppState};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bvi-reader")]
#[command(about = "Read-only API over filing signals and company identities")]
#[command(version)]
struct Args {
    /// Root folder holding bvi.db (overrides BVI_ROOT_FOLDER and config)
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Config file (default: ~/.config/bvi/bvi.toml, then /etc/bvi/bvi.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address (overrides [reader] bind_address)
    #[arg(long, env = "BVI_READER_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (config, config_source) = TomlConfig::load_or_default(args.config.as_deref());

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new(CompiledDefaults::LOG_LEVEL));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting bvi-reader v{}", env!("CARGO_PKG_VERSION"));
    config_source.log();

    let root_folder = RootFolderResolver::new("reader")
        .with_cli_arg(args.root_folder)
        .with_toml(&config)
        .resolve();
    let db_path = RootFolderInitializer::new(root_folder).database_path();
    info!("Database path: {}", db_path.display());

    let pool = match bvi_reader::db::connect_readonly(&db_path).await {
        Ok(pool) => {
            info!("Connected to database (read-only)");
            pool
        }
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e);
        }
    };

    let app = build_router(AppState::new(pool));

    let bind = args.bind.unwrap_or(config.reader.bind_address);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("bvi-reader listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
