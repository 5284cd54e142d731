//! # stardex CLI
//!
//! Commands for building the local knowledge base over your starred GitHub
//! repositories and retrieving context from it.
//!
//! ```bash
//! stardex --config ./config/stardex.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `stardex build` | Sync the starred snapshot, fetch READMEs, embed, index |
//! | `stardex ask "<query>"` | Retrieve the top-k supporting chunks for a question |
//! | `stardex get-readme <owner/repo>` | Print a cached README |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use stardex::config;
use stardex::embedder;
use stardex::github::{GithubConnector, StarSource};
use stardex::pipeline;

/// stardex — a local, searchable knowledge base over your starred GitHub
/// repositories.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/stardex.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "stardex",
    about = "stardex — a local, searchable knowledge base over your starred GitHub repositories",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/stardex.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or refresh the local knowledge base.
    ///
    /// Reconciles the starred-repository snapshot against GitHub, fetches
    /// missing READMEs on a bounded worker pool, chunks and embeds new
    /// text (cache-checked), and populates the vector index. Idempotent:
    /// re-running against unchanged remote state does no new work.
    Build,

    /// Retrieve supporting context for a question.
    ///
    /// Embeds the query with the configured model and prints the top-k
    /// most similar indexed chunks with their repositories and scores.
    Ask {
        /// The question to retrieve context for.
        query: String,

        /// Override the number of results from config.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Print the cached README of a starred repository.
    GetReadme {
        /// Repository as `owner/repo`.
        repo: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stardex=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Build => {
            let source: Arc<dyn StarSource> = Arc::new(GithubConnector::new(&cfg)?);
            let provider = embedder::create_provider(cfg.provider_kind()?, &cfg.embedder)?;
            let report = pipeline::run_build(&cfg, source, provider).await?;

            println!("build");
            println!("  snapshot rows: {}", report.snapshot_rows);
            println!(
                "  snapshot refetched: {}",
                if report.snapshot_refetched { "yes" } else { "no" }
            );
            println!("  readmes fetched: {}", report.readmes.fetched);
            println!("  readmes cached already: {}", report.readmes.skipped);
            println!("  repositories indexed: {}", report.repos_indexed);
            println!("  chunks indexed: {}", report.chunks_indexed);
            if report.readmes.warnings() > 0 || report.empty_readmes > 0 {
                println!(
                    "  warnings: {} (no readme: {}, fetch failed: {}, empty readme: {})",
                    report.readmes.warnings() + report.empty_readmes,
                    report.readmes.not_found,
                    report.readmes.failed,
                    report.empty_readmes
                );
            }
            println!("ok");
        }
        Commands::Ask { query, top_k } => {
            let provider = embedder::create_provider(cfg.provider_kind()?, &cfg.embedder)?;
            let k = top_k.unwrap_or(cfg.retrieval.top_k);
            let hits = pipeline::run_ask(&cfg, provider, &query, k).await?;

            if hits.is_empty() {
                println!("No results.");
                return Ok(());
            }

            for (i, hit) in hits.iter().enumerate() {
                println!(
                    "{}. {} (score {:.3})",
                    i + 1,
                    hit.repo.full_name,
                    hit.score
                );
                if !hit.repo.topics.is_empty() {
                    println!("   topics: {}", hit.repo.topics.join(", "));
                }
                println!("   {}", hit.text.replace('\n', " "));
            }
        }
        Commands::GetReadme { repo } => {
            let text = pipeline::cached_readme(&cfg, &repo).await?;
            println!("{}", text);
        }
    }

    Ok(())
}
