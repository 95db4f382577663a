//! Error taxonomy for the retrieval and grounding engine.
//!
//! Plumbing code (file I/O, SQL, CLI dispatch) uses `anyhow` like the rest
//! of the crate; operations whose failure kind the caller must branch on
//! return [`EngineError`] so recovery policy stays at the call site:
//! a single failed document load is skipped, a failed embedding batch
//! aborts ingestion, a failed model call degrades the turn.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Invalid configuration, rejected before any work starts.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// No documents survived loading; ingestion aborts and nothing is persisted.
    #[error("no documents available for indexing")]
    EmptyCorpus,

    /// The embedding service could not be reached or returned garbage.
    /// Fatal during ingestion.
    #[error("embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Query-time face of an embedding failure: the turn produces no answer.
    #[error("retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// The chat model could not be reached or rejected the request.
    #[error("chat model unavailable: {0}")]
    ModelUnavailable(String),

    /// The chat model call exceeded the configured deadline.
    #[error("chat model timed out: {0}")]
    ModelTimeout(String),
}
