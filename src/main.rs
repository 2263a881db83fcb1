//! # EEFF Analyst CLI (`eeff`)
//!
//! The `eeff` binary drives the retrieval-augmented financial-statement
//! analyst: it builds knowledge-base snapshots from PDFs, answers one-shot
//! questions, and serves the web UI.
//!
//! ## Usage
//!
//! ```bash
//! eeff --config ./config/eeff.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `eeff serve` | Initialize the registry and start the HTTP server |
//! | `eeff build <pdf>` | Build (or load) a knowledge base from a PDF |
//! | `eeff ask "<question>"` | Answer a question from the reference base |
//!
//! ## Examples
//!
//! ```bash
//! # Build the reference snapshot up front
//! eeff build data/SURA_COL_2024.pdf
//!
//! # Force a rebuild after the document changes
//! eeff build data/SURA_COL_2024.pdf --force
//!
//! # One-shot question against the reference base
//! eeff ask "¿Qué se considera como efectivo y equivalentes de efectivo?"
//!
//! # Compare a preset against the reference
//! eeff ask "¿Cómo difieren las políticas de ingresos?" --preset argos
//!
//! # Compare an ad-hoc PDF against the reference
//! eeff ask "¿Cómo difieren las provisiones?" --pdf data/NUTRESA_COL_2024.pdf
//!
//! # Start the web UI
//! eeff serve
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use eeff_analyst::compare;
use eeff_analyst::config::load_config;
use eeff_analyst::kb::KnowledgeBase;
use eeff_analyst::registry::Registry;
use eeff_analyst::server;

/// EEFF Analyst — retrieval-augmented question answering over
/// financial-statement PDFs.
#[derive(Parser)]
#[command(
    name = "eeff",
    about = "EEFF Analyst — retrieval-augmented Q&A and comparison over financial-statement PDFs",
    version,
    long_about = "EEFF Analyst turns financial-statement PDFs into persisted, searchable \
    knowledge bases (normalized text, token-bounded chunks, embeddings) and answers \
    questions by retrieving the most relevant passages and forwarding them to a \
    language model, optionally comparing a document against the Grupo Sura reference."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/eeff.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the knowledge-base registry and start the HTTP server.
    ///
    /// Presets with persisted snapshots load without touching the embedding
    /// provider, so repeated starts are cheap.
    Serve,

    /// Build a knowledge base from a PDF, or load its snapshot if one exists.
    ///
    /// Prints the resulting chunk count. Use `--force` to re-extract and
    /// re-embed even when a snapshot is present.
    Build {
        /// Source PDF.
        path: PathBuf,
        /// Rebuild even if a persisted snapshot exists.
        #[arg(long)]
        force: bool,
    },

    /// Answer a question. Compares against a preset or an ad-hoc PDF when
    /// given; otherwise answers from the Grupo Sura reference base alone.
    Ask {
        /// The question, in natural language.
        question: String,
        /// Preset key to compare against (see the config's `[[presets]]`).
        #[arg(long, conflicts_with = "pdf")]
        preset: Option<String>,
        /// Ad-hoc PDF to compare against.
        #[arg(long)]
        pdf: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            let config = Arc::new(config);
            let registry = Arc::new(Registry::initialize(&config).await);
            server::run_server(config, registry).await
        }

        Commands::Build { path, force } => {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("source path has no usable file name")?
                .to_string();

            let mut kb = KnowledgeBase::new(&name, &config.storage.data_dir);
            kb.build(&config, &path, force).await?;

            println!(
                "Base '{}' lista: {} fragmentos ({})",
                kb.name(),
                kb.chunk_count(),
                kb.snapshot_path().display()
            );
            Ok(())
        }

        Commands::Ask {
            question,
            preset,
            pdf,
        } => {
            let registry = Registry::initialize(&config).await;

            let answer = if let Some(path) = pdf {
                let name = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .context("source path has no usable file name")?
                    .to_string();
                let mut kb = KnowledgeBase::new(&name, &config.storage.data_dir);
                kb.build(&config, &path, false).await?;
                compare::answer_with_comparison(&config, &registry, &question, &kb).await?
            } else if let Some(key) = preset {
                let base = registry
                    .get(&key)
                    .with_context(|| format!("Preset desconocido o no disponible: {}", key))?;
                let base = base.read().await;
                compare::answer_with_comparison(&config, &registry, &question, &base).await?
            } else {
                compare::answer_from_reference(&config, &registry, &question).await?
            };

            println!("{}", answer);
            Ok(())
        }
    }
}
