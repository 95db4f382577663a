//! # Corpus Chat CLI (`cqa`)
//!
//! The `cqa` binary drives the retrieval and grounding engine: ingesting a
//! corpus into a persisted vector index, inspecting retrieval results, and
//! holding grounded conversations over the index.
//!
//! ## Usage
//!
//! ```bash
//! cqa --config ./config/cqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cqa ingest` | Scan the corpus directory, chunk, embed, and persist the index |
//! | `cqa ingest-urls <url>...` | Ingest web pages instead of the filesystem corpus |
//! | `cqa search "<query>"` | Show the diversified evidence set for a query |
//! | `cqa ask "<question>"` | Run one grounded conversation turn |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use corpus_chat::chat::HttpChatGateway;
use corpus_chat::config::{self, Config};
use corpus_chat::embedding::{EmbeddingGateway, HttpEmbeddingGateway};
use corpus_chat::index::VectorIndex;
use corpus_chat::ingest::{self, IngestSummary};
use corpus_chat::query;
use corpus_chat::session::ConversationSession;

/// Corpus Chat — grounded question answering over a local document corpus.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/cqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "cqa",
    about = "Corpus Chat — grounded question answering over a local document corpus",
    version,
    long_about = "Corpus Chat ingests a document corpus into a persisted vector index and \
    answers questions grounded only in retrieved passages, citing sources by bracket number. \
    Embeddings and chat completions are delegated to external OpenAI-compatible endpoints."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Build the vector index from the corpus directory.
    ///
    /// Scans `[corpus].root` for matching files, chunks and embeds them,
    /// and persists the index under `[index].dir`, replacing any previous
    /// artifact. Unreadable files are skipped and reported.
    Ingest,

    /// Build the vector index from a list of URLs.
    ///
    /// Fetches each URL, reduces HTML pages to their visible text, and
    /// runs the same chunk/embed/persist pipeline as `ingest`. Failed
    /// fetches are skipped and reported.
    IngestUrls {
        /// URLs to fetch and index.
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Show the diversified evidence set for a query.
    ///
    /// Embeds the query, scans the index, applies MMR, and prints the
    /// selected chunks with scores and source previews. No model call.
    Search {
        /// The query string.
        query: String,
    },

    /// Ask a grounded question.
    ///
    /// Runs a single conversation turn: retrieves evidence, asks the chat
    /// model, prints the answer, and prints a Sources section when the
    /// answer cites its evidence.
    Ask {
        /// The question.
        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest => {
            let gateway = HttpEmbeddingGateway::new(&cfg.embedding)?;
            let (_, summary) = ingest::ingest_corpus(&cfg, &gateway).await?;
            print_summary(&summary);
        }
        Commands::IngestUrls { urls } => {
            let gateway = HttpEmbeddingGateway::new(&cfg.embedding)?;
            let (_, summary) = ingest::ingest_urls(&cfg, &gateway, urls).await?;
            print_summary(&summary);
        }
        Commands::Search { query } => {
            run_search(&cfg, &query).await?;
        }
        Commands::Ask { question } => {
            run_ask(&cfg, &question).await?;
        }
    }

    Ok(())
}

fn print_summary(summary: &IngestSummary) {
    println!(
        "Indexed {} chunks from {} documents.",
        summary.chunks, summary.documents
    );
    if !summary.failures.is_empty() {
        println!("Skipped {} sources:", summary.failures.len());
        for f in &summary.failures {
            println!("  {} ({})", f.source_uri, f.error);
        }
    }
}

async fn run_search(cfg: &Config, query_text: &str) -> Result<()> {
    if query_text.trim().is_empty() {
        anyhow::bail!("query must not be empty");
    }
    let (index, embedder) = open_retrieval(cfg).await?;

    let evidence = query::retrieve(&index, &embedder, &cfg.retrieval, query_text).await?;
    for r in &evidence {
        let preview: String = r.chunk.text.chars().take(cfg.retrieval.preview_max_chars).collect();
        println!(
            "[{}] {:.4} {} — {}",
            r.rank,
            r.score,
            r.source_uri,
            preview.replace('\n', " ")
        );
    }
    Ok(())
}

async fn run_ask(cfg: &Config, question: &str) -> Result<()> {
    if question.trim().is_empty() {
        anyhow::bail!("question must not be empty");
    }
    let (index, embedder, chat) = open_engine(cfg).await?;
    let mut session = ConversationSession::new(cfg.chat.system_prompt.clone());

    let out =
        query::run_turn(&mut session, &index, &embedder, &chat, &cfg.retrieval, question).await?;
    println!("{}", out.answer);
    if let Some(sources) = out.sources {
        println!("\nSources:\n{}", sources);
    }
    Ok(())
}

/// Load the persisted index alongside the embedding gateway, refusing a
/// dimensionality mismatch up front.
async fn open_retrieval(cfg: &Config) -> Result<(Arc<VectorIndex>, HttpEmbeddingGateway)> {
    let embedder = HttpEmbeddingGateway::new(&cfg.embedding)?;
    let index = VectorIndex::load(&cfg.index.dir).await?;
    if index.dims() != embedder.dims() {
        anyhow::bail!(
            "persisted index has {} dims but embedding.dims is {}; re-run `cqa ingest`",
            index.dims(),
            embedder.dims()
        );
    }
    Ok((Arc::new(index), embedder))
}

async fn open_engine(
    cfg: &Config,
) -> Result<(Arc<VectorIndex>, HttpEmbeddingGateway, HttpChatGateway)> {
    let (index, embedder) = open_retrieval(cfg).await?;
    let chat = HttpChatGateway::new(&cfg.chat)?;
    Ok((index, embedder, chat))
}
