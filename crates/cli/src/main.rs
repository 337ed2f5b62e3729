mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use analysis_console_core::env_non_empty;
use analysis_console_llm::LlmClient;
use analysis_console_storage::StorageBackend;

#[derive(Parser)]
#[command(name = "analysis-console")]
#[command(about = "Analysis console backend with synchronized follow-up threads", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        #[arg(short, long, default_value = "38080")]
        port: u16,
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Apply the Postgres schema at DATABASE_URL
    Migrate,
    /// Print the persisted follow-up thread of an analysis
    Thread { analysis_id: String },
}

const DEFAULT_API_URL: &str = "https://api.openai.com";

pub(crate) fn get_api_key() -> Option<String> {
    env_non_empty("ANALYSIS_CONSOLE_API_KEY")
}

pub(crate) fn get_base_url() -> String {
    env_non_empty("ANALYSIS_CONSOLE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_owned())
}

pub(crate) fn get_blob_dir() -> PathBuf {
    env_non_empty("ANALYSIS_CONSOLE_BLOB_DIR").map_or_else(
        || {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("analysis-console")
                .join("blobs")
        },
        PathBuf::from,
    )
}

/// Postgres when `DATABASE_URL` is set, otherwise an in-process store.
pub(crate) async fn open_storage() -> Result<StorageBackend> {
    match env_non_empty("DATABASE_URL") {
        Some(url) => Ok(StorageBackend::new_postgres(&url).await?),
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory storage (data is not persisted)");
            Ok(StorageBackend::new_memory())
        },
    }
}

/// Generation client, or `None` when no API key is configured.
pub(crate) fn open_llm() -> Result<Option<Arc<LlmClient>>> {
    let Some(api_key) = get_api_key() else {
        tracing::warn!("ANALYSIS_CONSOLE_API_KEY not set, generation endpoints disabled");
        return Ok(None);
    };
    Ok(Some(Arc::new(LlmClient::new(api_key, get_base_url())?)))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, host } => commands::serve::run(port, host).await?,
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Thread { analysis_id } => commands::thread::run(&analysis_id).await?,
    }

    Ok(())
}
