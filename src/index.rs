//! Persisted flat vector index with exact nearest-neighbor query.
//!
//! The index is built once per corpus, persisted to a directory, and then
//! shared read-only (behind an `Arc`) across all sessions. A query is an
//! exhaustive cosine scan — exact and deterministic at corpus scale —
//! with score ties broken by ascending insertion order. Rebuilding
//! means building a fresh index and swapping the `Arc`; nothing here is
//! interior-mutable.
//!
//! # Persistence layout
//!
//! One SQLite file (`index.sqlite`) under the index directory holds two
//! logically separate stores keyed by chunk id:
//! - `vectors` — insertion ordinal plus the embedding as a little-endian
//!   f32 BLOB, recovered bit-for-bit on load.
//! - `chunk_meta` — chunk text, source URI, and byte offsets.
//!
//! An `index_meta` key/value table records dimensionality and whether the
//! stored vectors are L2-normalized.

use anyhow::{bail, Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use crate::embedding::{cosine_similarity, dot};
use crate::error::EngineError;
use crate::models::{Chunk, IndexEntry, RetrievalResult, Retrieved};

const INDEX_FILE: &str = "index.sqlite";

/// A scored index entry returned by [`VectorIndex::query`], identified by
/// its insertion ordinal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub ordinal: usize,
    pub score: f32,
}

/// Immutable flat vector index over chunk embeddings.
#[derive(Debug)]
pub struct VectorIndex {
    dims: usize,
    normalized: bool,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Build an index from embedded entries.
    ///
    /// # Errors
    ///
    /// `EmptyCorpus` when `entries` is empty; `Config` when entries mix
    /// vector dimensionalities.
    pub fn build(entries: Vec<IndexEntry>, normalized: bool) -> Result<Self, EngineError> {
        let dims = match entries.first() {
            Some(first) => first.vector.len(),
            None => return Err(EngineError::EmptyCorpus),
        };
        if dims == 0 {
            return Err(EngineError::Config(
                "index entries must carry non-empty vectors".to_string(),
            ));
        }
        for entry in &entries {
            if entry.vector.len() != dims {
                return Err(EngineError::Config(format!(
                    "mixed vector dimensionality: {} vs {} (chunk {})",
                    entry.vector.len(),
                    dims,
                    entry.chunk.id
                )));
            }
        }
        Ok(Self {
            dims,
            normalized,
            entries,
        })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn entry(&self, ordinal: usize) -> &IndexEntry {
        &self.entries[ordinal]
    }

    /// Exact k-nearest-neighbor scan by cosine similarity.
    ///
    /// When the stored vectors (and the query) are normalized, cosine
    /// reduces to a dot product; otherwise cosine is computed explicitly.
    /// Results are sorted by descending score, ties broken by ascending
    /// insertion order, truncated to `fetch_k`.
    pub fn query(&self, vector: &[f32], fetch_k: usize) -> Vec<Hit> {
        if vector.len() != self.dims || fetch_k == 0 {
            return Vec::new();
        }

        let mut hits: Vec<Hit> = self
            .entries
            .iter()
            .enumerate()
            .map(|(ordinal, entry)| {
                let score = if self.normalized {
                    dot(vector, &entry.vector)
                } else {
                    cosine_similarity(vector, &entry.vector)
                };
                Hit { ordinal, score }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.ordinal.cmp(&b.ordinal))
        });
        hits.truncate(fetch_k);
        hits
    }

    /// Materialize hits into a [`RetrievalResult`] with 1-based ranks.
    pub fn retrieve(&self, hits: &[Hit]) -> RetrievalResult {
        hits.iter()
            .enumerate()
            .map(|(i, hit)| {
                let entry = &self.entries[hit.ordinal];
                Retrieved {
                    chunk: entry.chunk.clone(),
                    source_uri: entry.source_uri.clone(),
                    score: hit.score,
                    rank: i + 1,
                }
            })
            .collect()
    }

    /// Persist the index under `dir`, replacing any previous artifact.
    pub async fn persist(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create index directory: {}", dir.display()))?;

        let pool = connect(&dir.join(INDEX_FILE), true).await?;
        create_tables(&pool).await?;

        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM vectors").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM chunk_meta")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM index_meta")
            .execute(&mut *tx)
            .await?;

        for (ordinal, entry) in self.entries.iter().enumerate() {
            sqlx::query("INSERT INTO vectors (ordinal, chunk_id, embedding) VALUES (?, ?, ?)")
                .bind(ordinal as i64)
                .bind(&entry.chunk.id)
                .bind(vec_to_blob(&entry.vector))
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                "INSERT INTO chunk_meta (chunk_id, document_id, source_uri, text, start_offset, length) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&entry.chunk.id)
            .bind(&entry.chunk.document_id)
            .bind(&entry.source_uri)
            .bind(&entry.chunk.text)
            .bind(entry.chunk.start_offset as i64)
            .bind(entry.chunk.length as i64)
            .execute(&mut *tx)
            .await?;
        }

        for (key, value) in [
            ("dims", self.dims.to_string()),
            ("normalized", self.normalized.to_string()),
            ("entries", self.entries.len().to_string()),
        ] {
            sqlx::query("INSERT INTO index_meta (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        pool.close().await;
        Ok(())
    }

    /// Load a previously persisted index from `dir`.
    ///
    /// Verifies exact 1:1 correspondence between the vector store and the
    /// metadata store before returning.
    pub async fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(INDEX_FILE);
        if !path.exists() {
            bail!("index artifact not found: {}", path.display());
        }
        let pool = connect(&path, false).await?;

        let dims: usize = read_meta(&pool, "dims").await?.parse()?;
        let normalized: bool = read_meta(&pool, "normalized").await?.parse()?;
        let expected: usize = read_meta(&pool, "entries").await?.parse()?;

        let rows = sqlx::query(
            "SELECT v.ordinal, v.chunk_id, v.embedding, \
                    m.document_id, m.source_uri, m.text, m.start_offset, m.length \
             FROM vectors v \
             JOIN chunk_meta m ON m.chunk_id = v.chunk_id \
             ORDER BY v.ordinal ASC",
        )
        .fetch_all(&pool)
        .await?;

        if rows.len() != expected {
            bail!(
                "index artifact is inconsistent: {} entries recorded, {} recoverable",
                expected,
                rows.len()
            );
        }

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let blob: Vec<u8> = row.try_get("embedding")?;
            let vector = blob_to_vec(&blob);
            if vector.len() != dims {
                let chunk_id: String = row.try_get("chunk_id")?;
                bail!(
                    "stored vector for chunk {} has {} dims, index expects {}",
                    chunk_id,
                    vector.len(),
                    dims
                );
            }
            let start_offset: i64 = row.try_get("start_offset")?;
            let length: i64 = row.try_get("length")?;
            entries.push(IndexEntry {
                chunk: Chunk {
                    id: row.try_get("chunk_id")?,
                    document_id: row.try_get("document_id")?,
                    text: row.try_get("text")?,
                    start_offset: start_offset as usize,
                    length: length as usize,
                },
                source_uri: row.try_get("source_uri")?,
                vector,
            });
        }

        pool.close().await;

        VectorIndex::build(entries, normalized).map_err(Into::into)
    }
}

async fn connect(path: &Path, create: bool) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .create_if_missing(create)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

async fn create_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vectors (
            ordinal INTEGER PRIMARY KEY,
            chunk_id TEXT NOT NULL UNIQUE,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunk_meta (
            chunk_id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            source_uri TEXT NOT NULL,
            text TEXT NOT NULL,
            start_offset INTEGER NOT NULL,
            length INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn read_meta(pool: &SqlitePool, key: &str) -> Result<String> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM index_meta WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    value.ok_or_else(|| anyhow::anyhow!("index artifact missing metadata key '{}'", key))
}

/// Encode a float vector as little-endian f32 bytes.
fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 bytes back into a float vector.
fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk: Chunk {
                id: id.to_string(),
                document_id: "doc1".to_string(),
                text: format!("text for {}", id),
                start_offset: 0,
                length: 0,
            },
            source_uri: "test://doc1".to_string(),
            vector,
        }
    }

    #[test]
    fn test_build_rejects_empty() {
        assert!(matches!(
            VectorIndex::build(Vec::new(), true),
            Err(EngineError::EmptyCorpus)
        ));
    }

    #[test]
    fn test_build_rejects_mixed_dims() {
        let entries = vec![entry("c1", vec![1.0, 0.0]), entry("c2", vec![1.0, 0.0, 0.0])];
        assert!(matches!(
            VectorIndex::build(entries, true),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_query_orders_by_score() {
        let entries = vec![
            entry("c1", vec![0.0, 1.0]),
            entry("c2", vec![1.0, 0.0]),
            entry("c3", vec![0.7071, 0.7071]),
        ];
        let index = VectorIndex::build(entries, true).unwrap();
        let hits = index.query(&[1.0, 0.0], 3);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].ordinal, 1);
        assert_eq!(hits[1].ordinal, 2);
        assert_eq!(hits[2].ordinal, 0);
    }

    #[test]
    fn test_query_ties_break_by_insertion_order() {
        let entries = vec![
            entry("c1", vec![1.0, 0.0]),
            entry("c2", vec![1.0, 0.0]),
            entry("c3", vec![1.0, 0.0]),
        ];
        let index = VectorIndex::build(entries, true).unwrap();
        let hits = index.query(&[1.0, 0.0], 3);
        assert_eq!(
            hits.iter().map(|h| h.ordinal).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_query_truncates_to_fetch_k() {
        let entries = vec![
            entry("c1", vec![1.0, 0.0]),
            entry("c2", vec![0.9, 0.1]),
            entry("c3", vec![0.8, 0.2]),
        ];
        let index = VectorIndex::build(entries, false).unwrap();
        assert_eq!(index.query(&[1.0, 0.0], 2).len(), 2);
        assert_eq!(index.query(&[1.0, 0.0], 10).len(), 3);
        assert!(index.query(&[1.0, 0.0], 0).is_empty());
    }

    #[test]
    fn test_query_rejects_wrong_dims() {
        let index = VectorIndex::build(vec![entry("c1", vec![1.0, 0.0])], true).unwrap();
        assert!(index.query(&[1.0, 0.0, 0.0], 5).is_empty());
    }

    #[test]
    fn test_unnormalized_index_uses_explicit_cosine() {
        // Same direction, very different magnitude: cosine must treat them
        // as equally similar to the query.
        let entries = vec![entry("c1", vec![10.0, 0.0]), entry("c2", vec![0.1, 0.0])];
        let index = VectorIndex::build(entries, false).unwrap();
        let hits = index.query(&[1.0, 0.0], 2);
        assert!((hits[0].score - hits[1].score).abs() < 1e-6);
        // Equal scores fall back to insertion order.
        assert_eq!(hits[0].ordinal, 0);
    }

    #[test]
    fn test_query_determinism() {
        let entries = vec![
            entry("c1", vec![0.9, 0.1]),
            entry("c2", vec![0.5, 0.5]),
            entry("c3", vec![0.1, 0.9]),
        ];
        let index = VectorIndex::build(entries, false).unwrap();
        let a = index.query(&[0.8, 0.2], 3);
        let b = index.query(&[0.8, 0.2], 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_retrieve_assigns_one_based_ranks() {
        let entries = vec![entry("c1", vec![1.0, 0.0]), entry("c2", vec![0.0, 1.0])];
        let index = VectorIndex::build(entries, true).unwrap();
        let hits = index.query(&[1.0, 0.0], 2);
        let retrieved = index.retrieve(&hits);
        assert_eq!(retrieved[0].rank, 1);
        assert_eq!(retrieved[0].chunk.id, "c1");
        assert_eq!(retrieved[1].rank, 2);
    }

    #[test]
    fn test_blob_codec_roundtrip_is_lossless() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001, f32::MIN_POSITIVE];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }
}
