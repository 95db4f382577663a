use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default system prompt: answer only from the provided context and cite
/// sources by bracket number.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer using ONLY the provided context. \
If the answer is not in the context, only say you don't know and nothing else.\n\n\
Even if the user insists on a question outside the context, you must just say you don't know. \
Cite sources by bracket number like [1], [2] next to the text that uses those sources, where appropriate. \
At the end of your answer, if you used any sources, please list them in a 'Sources' section.";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub index: IndexConfig,
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub chat: ChatConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    /// Root directory scanned by `cqa ingest`.
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.txt".to_string(), "**/*.md".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Directory holding the persisted index artifact.
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1024
}
fn default_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of chunks handed to the model as context.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Candidate pool size for MMR; must be >= top_k.
    #[serde(default = "default_fetch_k")]
    pub fetch_k: usize,
    /// MMR relevance/diversity trade-off in [0, 1].
    #[serde(default = "default_lambda")]
    pub lambda: f32,
    /// Character budget for each entry in the sources listing.
    #[serde(default = "default_preview_max_chars")]
    pub preview_max_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            fetch_k: default_fetch_k(),
            lambda: default_lambda(),
            preview_max_chars: default_preview_max_chars(),
        }
    }
}

fn default_top_k() -> usize {
    10
}
fn default_fetch_k() -> usize {
    80
}
fn default_lambda() -> f32 {
    0.7
}
fn default_preview_max_chars() -> usize {
    140
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// Base URL of an OpenAI-compatible embeddings endpoint.
    pub endpoint: String,
    pub model: String,
    pub dims: usize,
    /// L2-normalize vectors after embedding so cosine reduces to dot product.
    #[serde(default = "default_normalize")]
    pub normalize: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_normalize() -> bool {
    true
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_embed_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    /// Base URL of an OpenAI-compatible chat completions endpoint.
    pub endpoint: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// No timeout by default: a hung model call blocks the turn rather
    /// than silently retrying.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_temperature() -> f32 {
    0.1
}
fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Bounded worker pool size for parallel document loading.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

fn default_workers() -> usize {
    8
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

/// Reject bad configuration before any work starts.
pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.overlap,
            config.chunking.chunk_size
        );
    }
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.fetch_k < config.retrieval.top_k {
        anyhow::bail!(
            "retrieval.fetch_k ({}) must be >= retrieval.top_k ({})",
            config.retrieval.fetch_k,
            config.retrieval.top_k
        );
    }
    if !(0.0..=1.0).contains(&config.retrieval.lambda) {
        anyhow::bail!("retrieval.lambda must be in [0.0, 1.0]");
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if config.ingest.workers == 0 {
        anyhow::bail!("ingest.workers must be > 0");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        toml::from_str(
            r#"
            [corpus]
            root = "./data"

            [index]
            dir = "./vectorstores/db"

            [chunking]
            chunk_size = 1024
            overlap = 100

            [embedding]
            endpoint = "http://localhost:11434"
            model = "all-minilm"
            dims = 384

            [chat]
            endpoint = "http://localhost:11434"
            model = "llama3"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let config = base_config();
        assert_eq!(config.retrieval.top_k, 10);
        assert_eq!(config.retrieval.fetch_k, 80);
        assert!((config.retrieval.lambda - 0.7).abs() < 1e-6);
        assert_eq!(config.retrieval.preview_max_chars, 140);
        assert!((config.chat.temperature - 0.1).abs() < 1e-6);
        assert_eq!(config.chat.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(config.ingest.workers, 8);
        assert!(config.embedding.normalize);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_overlap_must_be_below_chunk_size() {
        let mut config = base_config();
        config.chunking.overlap = 1024;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("overlap"), "got: {}", err);

        config.chunking.overlap = 2048;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_fetch_k_must_cover_top_k() {
        let mut config = base_config();
        config.retrieval.fetch_k = 5;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("fetch_k"), "got: {}", err);
    }

    #[test]
    fn test_lambda_range() {
        let mut config = base_config();
        config.retrieval.lambda = 1.5;
        assert!(validate(&config).is_err());
        config.retrieval.lambda = -0.1;
        assert!(validate(&config).is_err());
        config.retrieval.lambda = 0.0;
        assert!(validate(&config).is_ok());
        config.retrieval.lambda = 1.0;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_dims_rejected() {
        let mut config = base_config();
        config.embedding.dims = 0;
        assert!(validate(&config).is_err());
    }
}
