//! # Corpus Chat
//!
//! A retrieval and grounding engine for corpus-grounded conversational
//! question answering.
//!
//! Documents are chunked, embedded through an external gateway, and stored
//! in a persisted flat vector index. A query turn retrieves the nearest
//! chunks by cosine similarity, diversifies them with Maximal Marginal
//! Relevance, assembles a numbered context block, and asks an external
//! chat model for an answer grounded only in that context. Sources are
//! disclosed to the user only when the answer actually cites them.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌───────────────┐
//! │  Loaders  │──▶│   Pipeline    │──▶│  VectorIndex  │
//! │ files/URLs│   │ chunk + embed │   │ flat, SQLite  │
//! └───────────┘   └──────────────┘   └──────┬────────┘
//!                                           │
//!                     ┌─────────────────────┤
//!                     ▼                     ▼
//!               ┌──────────┐         ┌────────────┐
//!               │  search  │         │  ask (MMR, │
//!               │  (k-NN)  │         │  citation) │
//!               └──────────┘         └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`loader`] | Filesystem and URL document loading |
//! | [`chunk`] | Recursive boundary text chunking |
//! | [`embedding`] | Embedding gateway abstraction |
//! | [`index`] | Persisted flat vector index |
//! | [`mmr`] | Maximal Marginal Relevance selection |
//! | [`context`] | Context block and prompt assembly |
//! | [`citation`] | Citation detection gate |
//! | [`session`] | Conversation session state |
//! | [`chat`] | Chat model gateway abstraction |
//! | [`ingest`] | Ingestion pipeline |
//! | [`query`] | Query turn pipeline |

pub mod chat;
pub mod chunk;
pub mod citation;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod index;
pub mod ingest;
pub mod loader;
pub mod mmr;
pub mod models;
pub mod query;
pub mod session;
