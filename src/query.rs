//! Query pipeline: one grounded conversation turn.
//!
//! A turn embeds the question, scans the index, diversifies the candidate
//! pool with MMR, assembles the numbered context, and asks the chat model.
//! Failure handling is deliberately asymmetric: if retrieval fails the
//! turn is voided and the history untouched, but if the model fails the
//! turn still completes with a bracketed error answer so the conversation
//! stays coherent.

use tracing::{debug, warn};

use crate::chat::ChatModelGateway;
use crate::citation;
use crate::config::RetrievalConfig;
use crate::context;
use crate::embedding::EmbeddingGateway;
use crate::error::EngineError;
use crate::index::VectorIndex;
use crate::mmr;
use crate::models::RetrievalResult;
use crate::session::ConversationSession;

/// The outcome of one turn: the answer text and, when the answer cites
/// evidence, the user-facing sources listing.
#[derive(Debug)]
pub struct GroundedAnswer {
    pub answer: String,
    pub sources: Option<String>,
}

/// Retrieve the diversified evidence set for a question without running a
/// conversation turn.
///
/// # Errors
///
/// `RetrievalUnavailable` when the question cannot be embedded.
pub async fn retrieve(
    index: &VectorIndex,
    embedder: &dyn EmbeddingGateway,
    retrieval: &RetrievalConfig,
    question: &str,
) -> Result<RetrievalResult, EngineError> {
    let query_vector = embedder.embed_query(question).await.map_err(|e| {
        EngineError::RetrievalUnavailable(format!("query embedding failed: {}", e))
    })?;

    let hits = index.query(&query_vector, retrieval.fetch_k);
    let pool = index.retrieve(&hits);
    let vectors: Vec<Vec<f32>> = hits
        .iter()
        .map(|h| index.entry(h.ordinal).vector.clone())
        .collect();

    let selected = mmr::diversify(pool, &vectors, retrieval.top_k, retrieval.lambda);
    debug!(
        pool = hits.len(),
        selected = selected.len(),
        "retrieval complete"
    );
    Ok(selected)
}

/// Run one full conversation turn against the index.
///
/// On success the session gains a user turn and an assistant turn, and its
/// evidence set is replaced. On retrieval failure nothing is appended and
/// the error propagates.
pub async fn run_turn(
    session: &mut ConversationSession,
    index: &VectorIndex,
    embedder: &dyn EmbeddingGateway,
    chat: &dyn ChatModelGateway,
    retrieval: &RetrievalConfig,
    question: &str,
) -> Result<GroundedAnswer, EngineError> {
    let evidence = retrieve(index, embedder, retrieval, question).await?;

    let context_block = context::build_context(&evidence);
    session.append_user_turn(context::user_prompt(question, &context_block));

    let answer = match chat.complete(session.messages()).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "model call failed; completing turn with error answer");
            format!("[Error calling model: {}]", e)
        }
    };

    let sources = if citation::should_disclose_sources(&answer, &evidence) {
        Some(context::summarize_sources(
            &evidence,
            retrieval.preview_max_chars,
        ))
    } else {
        None
    };

    session.append_assistant_turn(answer.clone(), evidence);

    Ok(GroundedAnswer { answer, sources })
}
