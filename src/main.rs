//! # Memory Harness CLI (`memh`)
//!
//! ## Usage
//!
//! ```bash
//! memh --config ./config/memh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `memh init` | Create the SQLite database and run schema migrations |
//! | `memh store "<text>"` | Store a memory note |
//! | `memh search "<query>"` | Search memories, knowledge base and history |
//! | `memh forget <id>` | Delete a memory note |
//! | `memh sync` | Reconcile the knowledge base with the index |
//! | `memh stats` | Show store statistics |
//! | `memh serve` | Start the HTTP tool server |
//!
//! ## Examples
//!
//! ```bash
//! memh store "I prefer dark mode" --category preference
//! memh search "dark mode" --limit 3
//! memh search "deploy" --json
//! memh forget 0b8e7c1e-5f0e-4c1a-9d7e-2f1f2a3b4c5d
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use memory_harness::config::{self, Config};
use memory_harness::server;
use memory_harness::service::{ForgetRequest, MemoryService, SearchRequest, StoreRequest};
use memory_harness::stats;

/// Memory Harness: persistent memory and knowledge-base retrieval for AI tools.
#[derive(Parser)]
#[command(name = "memh", version)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply when it is missing.
    #[arg(long, global = true, default_value = "./config/memh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Store a memory note.
    Store {
        text: String,

        /// One of: preference, fact, decision, entity, other.
        #[arg(long, short)]
        category: Option<String>,
    },

    /// Search memories, the knowledge base and session history.
    Search {
        query: String,

        /// Maximum number of results (defaults to `retrieval.default_limit`).
        #[arg(long, short)]
        limit: Option<i64>,

        /// Print the response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete a memory note by id.
    Forget { id: String },

    /// Reconcile the knowledge base with the index, ignoring the cooldown.
    Sync,

    /// Show store statistics.
    Stats,

    /// Start the HTTP tool server.
    Serve,
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_or_default(&cli.config)?;
    init_tracing(&cfg);

    let service = MemoryService::open(cfg).await?;

    match cli.command {
        Commands::Init => {
            println!(
                "Database initialized at {}",
                service.config().db.path.display()
            );
        }
        Commands::Store { text, category } => {
            let resp = service.store(StoreRequest { text, category }).await?;
            if resp.deduplicated {
                println!("Already stored: {}", resp.id);
            } else {
                println!("Stored: {}", resp.id);
            }
        }
        Commands::Search { query, limit, json } => {
            let resp = service.search(SearchRequest { query, limit }).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&resp)?);
            } else if resp.results.is_empty() {
                println!("No results.");
            } else {
                for (i, hit) in resp.results.iter().enumerate() {
                    println!("{}. [{:.2}] {}", i + 1, hit.score, hit.category.as_str());
                    println!("    {}", hit.text.replace('\n', " ").trim());
                    println!("    id: {}", hit.id);
                    println!();
                }
            }
        }
        Commands::Forget { id } => {
            let resp = service.forget(ForgetRequest { id: id.clone() }).await?;
            if resp.deleted {
                println!("Forgot: {}", id);
            } else {
                println!("Not found: {}", id);
            }
        }
        Commands::Sync => {
            let report = service.sync().await?;
            println!("sync knowledge");
            println!("  scanned: {}", report.scanned);
            println!("  updated: {}", report.updated);
            println!("  unchanged: {}", report.unchanged);
            println!("  removed: {}", report.removed);
            if report.failed > 0 || report.skipped > 0 {
                println!("  failed: {}", report.failed);
                println!("  skipped: {}", report.skipped);
            }
            println!("  chunks written: {}", report.chunks_inserted);
            println!("  chunks deleted: {}", report.chunks_deleted);
            println!("ok");
        }
        Commands::Stats => {
            stats::run_stats(&service).await?;
        }
        Commands::Serve => {
            server::run_server(Arc::new(service)).await?;
        }
    }

    Ok(())
}
