use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use gallery_catalog::config::Config;
use gallery_catalog::domain::Category;
use gallery_catalog::normalize::normalize_payload;
use gallery_catalog::server::{self, AppState};
use gallery_catalog::{logging, metrics, storage, Catalog};

#[derive(Parser)]
#[command(name = "gallery_catalog")]
#[command(about = "Gallery catalog service backed by blob storage")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file (defaults to ./config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the listing of a category as JSON
    List {
        /// One of: gallery, featured, events, normal
        #[arg(long)]
        category: Category,
    },
    /// Normalize a local JSON file and print the canonical records
    Normalize {
        #[arg(long)]
        file: PathBuf,
        /// Category assumed for records that do not declare one
        #[arg(long)]
        category: Option<Category>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let _log_guard = logging::init_logging(&config.logging.dir);

    match cli.command {
        Commands::Serve { port } => {
            let store = storage::from_config(&config.storage)?;
            let catalog = Arc::new(Catalog::with_fetch_concurrency(
                store,
                config.listing.fetch_concurrency,
            ));

            let mut state = AppState::new(catalog);
            match metrics::init() {
                Ok(handle) => state = state.with_metrics(handle),
                Err(e) => warn!("Metrics disabled: {}", e),
            }

            let port = port.unwrap_or(config.server.port);
            info!("Starting server on port {}", port);
            server::start_server(state, port, config.server.max_body_bytes).await?;
        }
        Commands::List { category } => {
            let store = storage::from_config(&config.storage)?;
            let catalog =
                Catalog::with_fetch_concurrency(store, config.listing.fetch_concurrency);
            let records = catalog.list(category).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Commands::Normalize { file, category } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let payload: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("{} is not valid JSON", file.display()))?;

            let (records, rejected) = normalize_payload(&payload, category, Utc::now());
            for (index, reason) in &rejected {
                warn!("Element {} rejected: {}", index, reason);
            }
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }

    Ok(())
}
