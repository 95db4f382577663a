//! Ingestion pipeline: documents in, persisted vector index out.
//!
//! Loading is skip-on-error, but everything downstream is strict: an
//! embedding failure aborts the whole build rather than persisting a
//! partial index, and a corpus that yields no chunks is refused.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::chunk;
use crate::config::Config;
use crate::embedding::EmbeddingGateway;
use crate::error::EngineError;
use crate::index::VectorIndex;
use crate::loader::{self, LoadReport};
use crate::models::{Chunk, Document, IndexEntry, LoadFailure};

/// What one ingestion run produced.
#[derive(Debug)]
pub struct IngestSummary {
    pub documents: usize,
    pub chunks: usize,
    pub failures: Vec<LoadFailure>,
}

/// Ingest the corpus directory configured under `[corpus]`.
pub async fn ingest_corpus(
    config: &Config,
    gateway: &dyn EmbeddingGateway,
) -> Result<(Arc<VectorIndex>, IngestSummary)> {
    let paths = loader::scan_corpus(&config.corpus)?;
    let report = loader::load_files(paths, config.ingest.workers).await;
    build_from_report(config, gateway, report).await
}

/// Ingest a list of URLs instead of the filesystem corpus.
pub async fn ingest_urls(
    config: &Config,
    gateway: &dyn EmbeddingGateway,
    urls: Vec<String>,
) -> Result<(Arc<VectorIndex>, IngestSummary)> {
    let report = loader::load_urls(urls, config.ingest.workers).await;
    build_from_report(config, gateway, report).await
}

async fn build_from_report(
    config: &Config,
    gateway: &dyn EmbeddingGateway,
    report: LoadReport,
) -> Result<(Arc<VectorIndex>, IngestSummary)> {
    let LoadReport {
        documents,
        failures,
    } = report;

    let documents_loaded = documents.len();
    let index = build_index(config, gateway, &documents).await?;
    index.persist(&config.index.dir).await?;

    info!(
        documents = documents_loaded,
        chunks = index.len(),
        skipped = failures.len(),
        "ingestion complete"
    );

    let summary = IngestSummary {
        documents: documents_loaded,
        chunks: index.len(),
        failures,
    };
    Ok((Arc::new(index), summary))
}

/// Chunk and embed documents, then build the in-memory index.
///
/// # Errors
///
/// `EmptyCorpus` when no document yields a chunk; `EmbeddingUnavailable`
/// when any embedding batch fails after retries.
pub async fn build_index(
    config: &Config,
    gateway: &dyn EmbeddingGateway,
    documents: &[Document],
) -> Result<VectorIndex, EngineError> {
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut sources: Vec<String> = Vec::new();

    for doc in documents {
        let doc_chunks = chunk::split(
            &doc.id,
            &doc.raw_text,
            config.chunking.chunk_size,
            config.chunking.overlap,
        )?;
        for c in doc_chunks {
            sources.push(doc.source_uri.clone());
            chunks.push(c);
        }
    }

    if chunks.is_empty() {
        return Err(EngineError::EmptyCorpus);
    }

    let mut entries: Vec<IndexEntry> = Vec::with_capacity(chunks.len());
    let batch_size = config.embedding.batch_size;

    for batch_start in (0..chunks.len()).step_by(batch_size) {
        let batch_end = (batch_start + batch_size).min(chunks.len());
        let texts: Vec<String> = chunks[batch_start..batch_end]
            .iter()
            .map(|c| c.text.clone())
            .collect();

        let vectors = gateway.embed_batch(&texts).await?;

        for (offset, vector) in vectors.into_iter().enumerate() {
            let i = batch_start + offset;
            entries.push(IndexEntry {
                chunk: chunks[i].clone(),
                source_uri: sources[i].clone(),
                vector,
            });
        }
    }

    VectorIndex::build(entries, gateway.normalized())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Deterministic embedding stub: hashes nothing, just spreads texts
    /// across axes by arrival order.
    struct StubEmbedder {
        dims: usize,
        fail: bool,
        calls: std::sync::atomic::AtomicUsize,
    }

    impl StubEmbedder {
        fn new(dims: usize) -> Self {
            Self {
                dims,
                fail: false,
                calls: std::sync::atomic::AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingGateway for StubEmbedder {
        fn dims(&self) -> usize {
            self.dims
        }

        fn normalized(&self) -> bool {
            true
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
            if self.fail {
                return Err(EngineError::EmbeddingUnavailable("stub down".to_string()));
            }
            let call = self
                .calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(texts
                .iter()
                .enumerate()
                .map(|(i, _)| {
                    let mut v = vec![0.0; self.dims];
                    v[(call * 97 + i) % self.dims] = 1.0;
                    v
                })
                .collect())
        }
    }

    fn test_config(dims: usize, batch_size: usize) -> Config {
        let toml = format!(
            r#"
            [corpus]
            root = "./data"

            [index]
            dir = "./idx"

            [chunking]
            chunk_size = 64
            overlap = 8

            [embedding]
            endpoint = "http://localhost:11434"
            model = "stub"
            dims = {dims}
            batch_size = {batch_size}

            [chat]
            endpoint = "http://localhost:11434"
            model = "stub"
            "#
        );
        toml::from_str(&toml).unwrap()
    }

    fn doc(id: &str, text: &str) -> Document {
        Document {
            id: id.to_string(),
            source_uri: format!("{}.txt", id),
            raw_text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_corpus_refused() {
        let config = test_config(4, 8);
        let gateway = StubEmbedder::new(4);
        let err = build_index(&config, &gateway, &[]).await.unwrap_err();
        assert!(matches!(err, EngineError::EmptyCorpus));

        // Documents with only whitespace also yield no chunks.
        let docs = vec![doc("d1", "   \n\n  ")];
        let err = build_index(&config, &gateway, &docs).await.unwrap_err();
        assert!(matches!(err, EngineError::EmptyCorpus));
    }

    #[tokio::test]
    async fn test_embedding_failure_aborts_build() {
        let config = test_config(4, 8);
        let mut gateway = StubEmbedder::new(4);
        gateway.fail = true;
        let docs = vec![doc("d1", "some real content here")];
        let err = build_index(&config, &gateway, &docs).await.unwrap_err();
        assert!(matches!(err, EngineError::EmbeddingUnavailable(_)));
    }

    #[tokio::test]
    async fn test_build_preserves_document_order_and_sources() {
        let config = test_config(8, 2);
        let gateway = StubEmbedder::new(8);
        let docs = vec![
            doc("d1", "First document body."),
            doc("d2", "Second document body."),
        ];
        let index = build_index(&config, &gateway, &docs).await.unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.entry(0).source_uri, "d1.txt");
        assert_eq!(index.entry(0).chunk.document_id, "d1");
        assert_eq!(index.entry(1).source_uri, "d2.txt");
    }

    #[tokio::test]
    async fn test_batching_covers_all_chunks() {
        let config = test_config(16, 3);
        let gateway = StubEmbedder::new(16);
        // Long enough to split into several chunks per document.
        let body = (0..40)
            .map(|i| format!("Sentence number {} in the body.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let docs = vec![doc("d1", &body), doc("d2", &body)];
        let index = build_index(&config, &gateway, &docs).await.unwrap();
        assert!(index.len() > 4);
        for entry in index.entries() {
            assert_eq!(entry.vector.len(), 16);
        }
    }
}
