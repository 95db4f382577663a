//! Core data models used throughout corpus-chat.
//!
//! These types represent the documents, chunks, and retrieval results that
//! flow through the ingestion and query pipelines.

use serde::{Deserialize, Serialize};

/// A raw document produced by a loader, before chunking.
///
/// Immutable once loaded; owned by the ingestion pipeline for its lifetime.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    /// Where the text came from: a file path or a URL.
    pub source_uri: String,
    pub raw_text: String,
}

/// A bounded passage of a document's text — the unit that gets embedded
/// and retrieved.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub text: String,
    /// Byte offset of `text` within the parent document.
    pub start_offset: usize,
    /// Byte length of `text`.
    pub length: usize,
}

/// The unit stored in the vector index: one chunk, its source URI, and its
/// embedding vector. Immutable after build.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub source_uri: String,
    pub vector: Vec<f32>,
}

/// One retrieved chunk with its similarity score and 1-based rank.
#[derive(Debug, Clone)]
pub struct Retrieved {
    pub chunk: Chunk,
    pub source_uri: String,
    pub score: f32,
    pub rank: usize,
}

/// The ordered evidence set produced by one query.
pub type RetrievalResult = Vec<Retrieved>;

/// Message role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single conversation message, serialized in the OpenAI-compatible
/// `{role, content}` wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A document or URL that failed to load and was excluded from the corpus.
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub source_uri: String,
    pub error: String,
}
