mod coerce;
mod error;
mod importer;
mod pipeline;
mod records;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use pipeline::{DataSources, ImportOptions, ImportPipeline, PipelineSummary, ProgressIntervals};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use store::memory::MemoryStore;
use store::neo4j::Neo4jStore;
use tracing::{error, info, warn};

/// Load the movie dataset from CSV files into Neo4j.
#[derive(Debug, Parser)]
#[command(name = "movie-graph-import")]
struct Args {
    /// Directory containing persons.csv, movies.csv, acted_in.csv, directed.csv, ratings.csv
    #[arg(long, env = "IMPORT_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Acknowledge that the target database is wiped before import
    #[arg(long, env = "IMPORT_CONFIRM_RESET")]
    confirm_reset: bool,

    /// Also create Genre nodes and Actor/Director labels
    #[arg(long)]
    derive_labels: bool,

    /// Import into an in-process graph instead of Neo4j
    #[arg(long)]
    dry_run: bool,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

#[derive(Debug)]
struct Config {
    neo4j_uri: String,
    neo4j_user: String,
    neo4j_password: String,
    neo4j_database: String,
    connect_retries: u32,
}

impl Config {
    fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let connect_retries: u32 = match lookup("NEO4J_CONNECT_RETRIES") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("Invalid NEO4J_CONNECT_RETRIES: {:?}", raw))?,
            None => 4,
        };

        Ok(Config {
            neo4j_uri: get("NEO4J_URI", "bolt://localhost:7687"),
            neo4j_user: lookup("NEO4J_USERNAME")
                .or_else(|| lookup("NEO4J_USER"))
                .unwrap_or_else(|| "neo4j".to_string()),
            neo4j_password: get("NEO4J_PASSWORD", "password"),
            neo4j_database: get("NEO4J_DATABASE", "neo4j"),
            connect_retries: connect_retries.max(1),
        })
    }
}

const MAX_BACKOFF_SECS: u64 = 60;

/// Seconds to wait after failed attempt `attempt` (1-based), capped at a minute
fn backoff_secs(attempt: u32) -> u64 {
    1u64.checked_shl(attempt.saturating_sub(1))
        .map_or(MAX_BACKOFF_SECS, |secs| secs.min(MAX_BACKOFF_SECS))
}

/// Connect to Neo4j with exponential backoff retry logic
async fn connect_neo4j_with_retry(config: &Config) -> Result<Neo4jStore> {
    use tokio::time::{sleep, Duration};

    let max_retries = config.connect_retries;
    for attempt in 1..=max_retries {
        info!("🔄 Attempting to connect to Neo4j at {}... (attempt {}/{})",
              config.neo4j_uri, attempt, max_retries);

        let neo4j_config = neo4rs::ConfigBuilder::default()
            .uri(config.neo4j_uri.as_str())
            .user(config.neo4j_user.as_str())
            .password(config.neo4j_password.as_str())
            .db(config.neo4j_database.as_str())
            .build()
            .context("Invalid Neo4j configuration")?;

        match neo4rs::Graph::connect(neo4j_config).await {
            Ok(graph) => {
                info!("✅ Successfully connected to Neo4j (database: {})", config.neo4j_database);
                return Ok(Neo4jStore::new(graph));
            }
            Err(e) => {
                if attempt < max_retries {
                    let wait_time = backoff_secs(attempt);
                    warn!("⚠️  Failed to connect to Neo4j: {}. Retrying in {}s (attempt {}/{})...",
                          e, wait_time, attempt, max_retries);
                    sleep(Duration::from_secs(wait_time)).await;
                } else {
                    error!("❌ Failed to connect to Neo4j after {} attempts: {}", max_retries, e);
                    return Err(anyhow::anyhow!("Neo4j connection failed after {} retries: {}", max_retries, e));
                }
            }
        }
    }

    Err(anyhow::anyhow!("Failed to connect to Neo4j"))
}

fn write_summary(path: &Path, summary: &PipelineSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;
    fs::write(path, json).with_context(|| format!("Failed to write summary to {}", path.display()))?;
    info!("📝 Wrote run summary to {}", path.display());
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    info!("🚀 Movie graph import starting (data dir: {})", args.data_dir.display());

    let sources = DataSources::from_dir(&args.data_dir);
    let options = ImportOptions {
        confirm_reset: args.confirm_reset,
        derive_labels: args.derive_labels,
        progress: ProgressIntervals::default(),
    };

    let result = if args.dry_run {
        info!("🧪 Dry run: importing into an in-process graph");
        let store = MemoryStore::new();
        let outcome = ImportPipeline::new(&store, sources, options).run().await;
        outcome
    } else {
        let config = Config::from_env()?;
        // Dropped at the end of this block on success and failure alike
        let store = connect_neo4j_with_retry(&config).await?;
        let outcome = ImportPipeline::new(&store, sources, options).run().await;
        outcome
    };

    match result {
        Ok(summary) => {
            if let Some(path) = &args.summary_json {
                write_summary(path, &summary)?;
            }
            info!("✅ Import completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("❌ Import failed: {:?}", e);
            Err(e)
        }
    }
}
