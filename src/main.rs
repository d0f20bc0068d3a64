//! # Hebei Guide CLI (`guide`)
//!
//! ## Usage
//!
//! ```bash
//! guide --config ./config/guide.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `guide build` | Parse the knowledge file and persist the vector index |
//! | `guide search "<query>"` | Show filtered retrieval hits |
//! | `guide ask "<query>"` | Answer one question |
//! | `guide chat` | Interactive session with conversation memory |
//! | `guide stats` | Summarize the persisted index |
//! | `guide serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! # Build an index without any model download
//! RAG_EMBEDDING_PROVIDER=hashing guide build
//!
//! # Ask with evidence and style enhancement
//! guide ask "唐山2日游" --evidence --enhance
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use hebei_guide::error::RagError;
use hebei_guide::progress::ProgressMode;
use hebei_guide::{answer, chat, config, index, logging, retrieve, server, stats};

/// Hebei Guide: a knowledge-grounded travel assistant.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/guide.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "guide",
    about = "Hebei Guide: a knowledge-grounded travel itinerary assistant",
    version,
    long_about = "Hebei Guide parses a tagged tourism knowledge file into a local vector index \
    and answers travel questions with a chat-completion model grounded in the retrieved entries."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/guide.toml` when that file exists; built-in
    /// defaults and environment variables apply otherwise.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the vector index from the knowledge file.
    ///
    /// Every entry is embedded once. The previous index in the output
    /// directory is replaced.
    Build {
        /// Knowledge file (overrides `[knowledge].path`).
        #[arg(long)]
        knowledge: Option<PathBuf>,

        /// Output directory (overrides `[index].dir`).
        #[arg(long)]
        out: Option<PathBuf>,

        /// Progress on stderr: `off`, `human`, or `json`.
        /// Defaults to `human` when stderr is a terminal.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Show the filtered retrieval hits for a query.
    Search {
        query: String,

        /// Number of results (defaults to `[retrieval].top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Answer one question.
    Ask {
        query: String,

        /// Rephrase the answer with the enhancement model.
        #[arg(long)]
        enhance: bool,

        /// Print the evidence list after the answer.
        #[arg(long)]
        evidence: bool,
    },

    /// Start an interactive session. Type 拜拜 / 退出 / 结束 to leave.
    Chat {
        /// Session id (a fresh UUID by default).
        #[arg(long)]
        user: Option<String>,

        #[arg(long)]
        enhance: bool,

        #[arg(long)]
        evidence: bool,
    },

    /// Summarize the persisted index.
    Stats,

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Chat { .. } => "warn",
        _ => "info",
    };
    logging::init(default_level);

    let cfg = config::load_config(cli.config.as_deref())?;

    let result: Result<(), RagError> = match cli.command {
        Commands::Build {
            knowledge,
            out,
            progress,
        } => {
            let mode = match progress.as_deref() {
                None => ProgressMode::default_for_tty(),
                Some(s) => ProgressMode::parse(s).ok_or_else(|| {
                    anyhow::anyhow!("Invalid --progress '{}'. Use off, human, or json.", s)
                })?,
            };
            index::run_build(&cfg, knowledge, out, mode).await
        }
        Commands::Search { query, top_k } => retrieve::run_search(&cfg, &query, top_k).await,
        Commands::Ask {
            query,
            enhance,
            evidence,
        } => answer::run_ask(&cfg, &query, enhance, evidence).await,
        Commands::Chat {
            user,
            enhance,
            evidence,
        } => chat::run_chat(&cfg, user, enhance, evidence).await,
        Commands::Stats => stats::run_stats(&cfg).await,
        Commands::Serve => server::run_server(&cfg).await,
    };

    if let Err(err) = result {
        tracing::error!(error = %err, "command failed");
        eprintln!("{}", err.user_message());
        std::process::exit(1);
    }

    Ok(())
}
