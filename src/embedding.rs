//! Embedding gateway abstraction and HTTP implementation.
//!
//! The engine never computes embeddings itself; it talks to an external
//! OpenAI-compatible `/v1/embeddings` endpoint (Ollama, LM Studio, OpenAI)
//! through the [`EmbeddingGateway`] trait. Transport or model failures
//! surface as [`EngineError::EmbeddingUnavailable`]; the caller decides
//! whether that aborts an ingestion batch or voids a query turn.
//!
//! Also home to the vector utilities shared by the index and the MMR
//! selector: [`cosine_similarity`], [`dot`], and [`l2_normalize`].
//!
//! # Retry Strategy
//!
//! The HTTP gateway retries transient failures with exponential backoff:
//! - HTTP 429 and 5xx → retry
//! - other 4xx → fail immediately
//! - network errors → retry
//! - backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::EngineError;

/// Maps text to fixed-dimension vectors. `dims` is fixed for the lifetime
/// of one index; mixing dimensionalities within an index is invalid.
#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    /// Embedding vector dimensionality.
    fn dims(&self) -> usize;

    /// Whether returned vectors are L2-normalized.
    fn normalized(&self) -> bool;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EngineError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(EngineError::EmbeddingUnavailable(format!(
                "expected 1 vector, got {}",
                vectors.len()
            )));
        }
        Ok(vectors.remove(0))
    }
}

/// Gateway to an OpenAI-compatible embeddings endpoint.
pub struct HttpEmbeddingGateway {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dims: usize,
    normalize: bool,
    max_retries: u32,
}

impl HttpEmbeddingGateway {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::EmbeddingUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dims: config.dims,
            normalize: config.normalize,
            max_retries: config.max_retries,
        })
    }

    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
        let url = format!("{}/v1/embeddings", self.endpoint);
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self.client.post(&url).json(&body).send().await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await.map_err(|e| {
                            EngineError::EmbeddingUnavailable(format!("invalid response: {}", e))
                        })?;
                        return parse_embeddings_response(&json, texts.len(), self.dims);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(format!("HTTP {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(EngineError::EmbeddingUnavailable(format!(
                        "HTTP {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(e.to_string());
                    continue;
                }
            }
        }

        Err(EngineError::EmbeddingUnavailable(
            last_err.unwrap_or_else(|| "embedding failed after retries".to_string()),
        ))
    }
}

#[async_trait]
impl EmbeddingGateway for HttpEmbeddingGateway {
    fn dims(&self) -> usize {
        self.dims
    }

    fn normalized(&self) -> bool {
        self.normalize
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut vectors = self.request_embeddings(texts).await?;
        if self.normalize {
            for v in &mut vectors {
                l2_normalize(v);
            }
        }
        Ok(vectors)
    }
}

/// Extract `data[].embedding` arrays from an embeddings API response,
/// checking count and dimensionality against what the index expects.
fn parse_embeddings_response(
    json: &serde_json::Value,
    expected_count: usize,
    expected_dims: usize,
) -> Result<Vec<Vec<f32>>, EngineError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| EngineError::EmbeddingUnavailable("missing data array".to_string()))?;

    if data.len() != expected_count {
        return Err(EngineError::EmbeddingUnavailable(format!(
            "expected {} embeddings, got {}",
            expected_count,
            data.len()
        )));
    }

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| EngineError::EmbeddingUnavailable("missing embedding".to_string()))?;

        let vec: Vec<f32> = embedding
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();

        if vec.len() != expected_dims {
            return Err(EngineError::EmbeddingUnavailable(format!(
                "dimension mismatch: expected {}, got {}",
                expected_dims,
                vec.len()
            )));
        }

        embeddings.push(vec);
    }

    Ok(embeddings)
}

/// Dot product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors, vectors of
/// different lengths, or a zero-magnitude operand.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Scale a vector to unit L2 norm in place. Zero vectors are left as-is.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
