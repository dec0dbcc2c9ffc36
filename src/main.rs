//! metagraph-indexer
//!
//! Main entry point for the indexer CLI.

use clap::{Parser, Subcommand};
use metagraph_indexer::api::{ApiServer, ReadApi};
use metagraph_indexer::app::AppContext;
use metagraph_indexer::config::IndexerConfig;
use metagraph_indexer::metagraph::SnapshotPayload;
use metagraph_indexer::{IndexerError, Result};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

/// Metagraph snapshot indexer and read API
#[derive(Parser, Debug)]
#[command(name = "metagraph-indexer")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/metagraph-indexer/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Run the sync loop and serve the read API
    Serve,

    /// Run one sync pass and exit
    Sync,

    /// Print current network statistics as JSON
    Stats,

    /// Print the latest stored snapshot of a partition
    Snapshot {
        /// Partition key (netuid)
        netuid: u16,

        /// Print only the totals, without per-neuron rows
        #[arg(long)]
        summary: bool,
    },
}

fn main() {
    if let Err(e) = metagraph_indexer::logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(IndexerConfig::default_path);

    if let Commands::Init = cli.command {
        return handle_init_command(&config_path);
    }

    let config = load_config(&config_path)?;
    let ctx = Arc::new(AppContext::from_config(config)?);
    let runtime = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Serve => runtime.block_on(serve(ctx)),
        Commands::Sync => runtime.block_on(async {
            let report = ctx.scheduler().run_pass().await?;
            println!(
                "Synced {} partition(s), {} failed",
                report.synced.len(),
                report.failed.len()
            );
            for (netuid, error) in &report.failed {
                println!("  netuid {}: {}", netuid, error);
            }
            Ok::<(), IndexerError>(())
        }),
        Commands::Stats => runtime.block_on(async {
            let stats = ReadApi::new(ctx).current_stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok::<(), IndexerError>(())
        }),
        Commands::Snapshot { netuid, summary } => {
            let snapshot = ReadApi::new(ctx).get_snapshot(netuid)?;
            if summary {
                let mut payload = SnapshotPayload::from_json(&snapshot.payload)?;
                payload.table_data.clear();
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{}", snapshot.payload);
            }
            eprintln!(
                "netuid {} version {} updated {}",
                snapshot.netuid, snapshot.version, snapshot.updated_at
            );
            Ok(())
        }
        Commands::Init => Ok(()),
    }
}

/// Start the scheduler, then serve until Ctrl-C
async fn serve(ctx: Arc<AppContext>) -> Result<()> {
    let scheduler = Arc::new(ctx.scheduler());
    let sync_task = scheduler.spawn();

    let server = ApiServer::new(ReadApi::new(ctx));
    let result = server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received SIGINT, shutting down");
        })
        .await;

    sync_task.abort();
    result
}

fn load_config(path: &Path) -> Result<IndexerConfig> {
    match IndexerConfig::load(path) {
        Ok(config) => Ok(config),
        Err(IndexerError::Config(msg)) if msg.contains("Config file not found") => {
            Err(IndexerError::Config(format!(
                "No configuration found at {}. Run 'metagraph-indexer init' first.",
                path.display()
            )))
        }
        Err(e) => Err(e),
    }
}

fn handle_init_command(config_file: &Path) -> Result<()> {
    if config_file.exists() {
        println!("Configuration already exists at {}", config_file.display());
        return Ok(());
    }

    let config = IndexerConfig::new();
    config.save(config_file)?;

    println!("✓ Created configuration at {}", config_file.display());
    println!();
    println!("Next steps:");
    println!("  1. Point upstream.endpoint at a node's JSON-RPC gateway");
    println!("  2. Start the indexer:");
    println!("     metagraph-indexer serve");

    Ok(())
}
