//! # Document QA CLI (`dqa`)
//!
//! The `dqa` binary is the primary interface for the pipeline. It provides
//! commands for database initialization, document ingestion, question
//! answering, history, DOCX export, and starting the HTTP API server.
//!
//! ## Usage
//!
//! ```bash
//! dqa --config ./docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dqa init` | Write a starter config (if missing) and run schema migrations |
//! | `dqa add <files>...` | Ingest PDF, DOCX, or plain-text files |
//! | `dqa ls` | List ingested documents |
//! | `dqa rm <id>` | Remove a document and its chunks |
//! | `dqa ask "<question>"` | Answer a question over the ingested corpus |
//! | `dqa history` | Show recently answered questions |
//! | `dqa export --ids 1,2` | Export selected answers as DOCX |
//! | `dqa serve` | Start the HTTP API server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize config and database
//! dqa init
//!
//! # Ingest a product manual
//! dqa add manual.pdf
//!
//! # Ask with machine-readable output
//! dqa ask "what is the battery capacity?" --json
//!
//! # Restrict a question to specific documents
//! dqa ask "how wide is the stand?" --doc 1 --doc 3
//!
//! # Export the first two answers
//! dqa export --ids 1,2 --out answers.docx
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docqa::{answer, config, export, ingest, migrate, server};

/// Document QA CLI — ingest documents and answer questions over them.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. `dqa init` writes a commented starter file.
#[derive(Parser)]
#[command(
    name = "dqa",
    about = "Document QA — ingest documents and answer questions over them",
    version,
    long_about = "docqa ingests PDF, DOCX, and plain-text documents, chunks them into \
    overlapping passages, and answers questions by retrieving the best-matching chunks \
    and running an extractive reader over each candidate. Answers are recorded with \
    their sources and can be exported as a DOCX report."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./docqa.toml`. Storage, chunking, retrieval, provider,
    /// and server settings are read from this file.
    #[arg(long, global = true, default_value = "./docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the config file and database schema.
    ///
    /// Writes a commented starter config if none exists, then creates the
    /// SQLite database and all required tables (documents, chunks,
    /// qa_history). This command is idempotent — running it multiple
    /// times is safe.
    Init,

    /// Ingest one or more documents.
    ///
    /// Extracts text (PDF, DOCX, or plain text by extension), cleans and
    /// chunks it, and stores the document with its chunks. The original
    /// file is copied into the upload directory.
    Add {
        /// Files to ingest.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List ingested documents.
    Ls,

    /// Remove a document.
    ///
    /// Deletes the document row, its chunks, and the stored copy of the
    /// original file.
    Rm {
        /// Document id (as shown by `dqa ls`).
        id: i64,
    },

    /// Answer a question over the ingested corpus.
    ///
    /// Retrieves the best-matching chunks, runs the configured reader
    /// over each candidate, and prints the fused answer with its
    /// sources. Every answer is recorded in history.
    Ask {
        /// The question to answer.
        question: String,

        /// Number of source chunks to cite (defaults to `[retrieval].top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Restrict retrieval to a document id. Repeatable.
        #[arg(long = "doc", value_name = "ID")]
        document_ids: Vec<i64>,

        /// Print the full response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show recently answered questions, newest first.
    History {
        /// Maximum number of records to show.
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Export selected history records to a DOCX file.
    Export {
        /// History record ids, comma separated (e.g. `1,2,5`).
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<i64>,

        /// Document title.
        #[arg(long)]
        title: Option<String>,

        /// Output path.
        #[arg(long, default_value = "./qa_export.docx")]
        out: PathBuf,
    },

    /// Start the HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// ingestion, ask, history, and export endpoints.
    Serve {
        /// Bind address, overriding `[server].bind` (e.g. `0.0.0.0:8000`).
        #[arg(long)]
        addr: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // `init` must work before a config file exists.
    if matches!(cli.command, Commands::Init) {
        if !cli.config.exists() {
            config::write_starter_config(&cli.config)?;
            println!("Wrote starter config to {}", cli.config.display());
        }
        let cfg = config::load_config(&cli.config)?;
        migrate::run_migrations(&cfg).await?;
        println!("Database initialized successfully.");
        return Ok(());
    }

    let mut cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => unreachable!(),
        Commands::Add { files } => {
            ingest::run_add(&cfg, &files).await?;
        }
        Commands::Ls => {
            ingest::run_ls(&cfg).await?;
        }
        Commands::Rm { id } => {
            ingest::run_rm(&cfg, id).await?;
        }
        Commands::Ask {
            question,
            top_k,
            document_ids,
            json,
        } => {
            answer::run_ask(&cfg, &question, top_k, &document_ids, json).await?;
        }
        Commands::History { limit } => {
            answer::run_history(&cfg, limit).await?;
        }
        Commands::Export { ids, title, out } => {
            export::run_export(&cfg, &ids, title, &out).await?;
        }
        Commands::Serve { addr } => {
            if let Some(addr) = addr {
                cfg.server.bind = addr;
            }
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
