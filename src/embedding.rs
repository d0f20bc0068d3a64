//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **`LocalProvider`**: a multilingual sentence-embedding model run in-process via
//!   fastembed. The model is loaded once, from local files only.
//! - **[`OllamaProvider`]**: calls a local Ollama instance's `/api/embed` endpoint.
//! - **[`HashingProvider`]**: character n-gram feature hashing; needs no model artifact.
//!
//! Documents and queries must go through the same provider: an index built
//! with one provider cannot be searched with vectors from another, which is
//! why the index records [`EmbeddingProvider::model_name`] and
//! [`EmbeddingProvider::dims`].
//!
//! Also provides vector utilities:
//! - [`cosine_similarity`]: similarity between two embedding vectors
//! - [`vec_to_blob`] / [`blob_to_vec`]: little-endian `f32` byte encoding used by the index file
//!
//! # Retry Strategy
//!
//! The Ollama provider uses exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::RagError;

/// Default local model: `sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2`.
pub const DEFAULT_LOCAL_MODEL: &str = "paraphrase-multilingual-minilm-l12-v2";

/// Default dimensionality of [`HashingProvider`] vectors.
pub const DEFAULT_HASHING_DIMS: usize = 512;

/// Trait for embedding providers.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"paraphrase-multilingual-minilm-l12-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, one vector per text, in input order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_documents(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }
}

// ============ Local Provider (fastembed) ============

/// In-process sentence-embedding model.
///
/// With `embedding.model_dir` set, the ONNX model and tokenizer files are read
/// from that directory and nothing touches the network. Otherwise the named
/// model is resolved from `embedding.cache_dir`, which must be provisioned
/// ahead of serving.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalProvider {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: Arc<std::sync::Mutex<fastembed::TextEmbedding>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model_name, dims) = resolve_local_model(config);

        let model = match &config.model_dir {
            Some(dir) => load_user_defined_model(dir)?,
            None => {
                let fastembed_model = config_to_fastembed_model(&model_name)?;
                let cache = resolve_cache_dir(config);
                require_cached_model(&model_name, &cache)?;
                let options = fastembed::InitOptions::new(fastembed_model)
                    .with_show_download_progress(false)
                    .with_cache_dir(cache);
                fastembed::TextEmbedding::try_new(options).map_err(|e| {
                    anyhow::anyhow!("Failed to initialize local embedding model: {}", e)
                })?
            }
        };

        tracing::info!(model = %model_name, dims, "local embedding model loaded");

        Ok(Self {
            model_name,
            dims,
            batch_size: config.batch_size,
            model: Arc::new(std::sync::Mutex::new(model)),
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| anyhow::anyhow!("Local embedding model lock poisoned"))?;
            model
                .embed(texts, Some(batch_size))
                .map_err(|e| anyhow::anyhow!("Local embedding failed: {}", e))
        })
        .await?
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn load_user_defined_model(dir: &std::path::Path) -> Result<fastembed::TextEmbedding> {
    use anyhow::Context;

    let read = |name: &str| -> Result<Vec<u8>> {
        let path = dir.join(name);
        std::fs::read(&path).with_context(|| format!("Missing model file: {}", path.display()))
    };

    let tokenizer_files = fastembed::TokenizerFiles {
        tokenizer_file: read("tokenizer.json")?,
        config_file: read("config.json")?,
        special_tokens_map_file: read("special_tokens_map.json")?,
        tokenizer_config_file: read("tokenizer_config.json")?,
    };
    let model = fastembed::UserDefinedEmbeddingModel::new(read("model.onnx")?, tokenizer_files)
        .with_pooling(fastembed::Pooling::Mean);

    fastembed::TextEmbedding::try_new_from_user_defined(
        model,
        fastembed::InitOptionsUserDefined::new(),
    )
    .map_err(|e| anyhow::anyhow!("Failed to load embedding model from {}: {}", dir.display(), e))
}

/// Model cache used when `embedding.model_dir` is unset: `embedding.cache_dir`,
/// then `FASTEMBED_CACHE_DIR`, then fastembed's `.fastembed_cache`.
#[cfg_attr(not(feature = "local-embeddings-fastembed"), allow(dead_code))]
fn resolve_cache_dir(config: &EmbeddingConfig) -> PathBuf {
    config
        .cache_dir
        .clone()
        .or_else(|| std::env::var_os("FASTEMBED_CACHE_DIR").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(".fastembed_cache"))
}

/// Hugging Face repository each supported model is cached under.
#[cfg_attr(not(feature = "local-embeddings-fastembed"), allow(dead_code))]
fn model_repo(name: &str) -> Option<&'static str> {
    match name {
        "paraphrase-multilingual-minilm-l12-v2" => Some("Xenova/paraphrase-multilingual-MiniLM-L12-v2"),
        "paraphrase-multilingual-mpnet-base-v2" => Some("Xenova/paraphrase-multilingual-mpnet-base-v2"),
        "bge-small-zh-v1.5" => Some("Xenova/bge-small-zh-v1.5"),
        "multilingual-e5-small" => Some("intfloat/multilingual-e5-small"),
        "multilingual-e5-base" => Some("intfloat/multilingual-e5-base"),
        "multilingual-e5-large" => Some("Qdrant/multilingual-e5-large-onnx"),
        _ => None,
    }
}

/// Snapshot directory of `name` inside a Hugging Face style cache.
#[cfg_attr(not(feature = "local-embeddings-fastembed"), allow(dead_code))]
fn cached_snapshots(name: &str, cache: &Path) -> Option<PathBuf> {
    let repo = model_repo(name)?;
    Some(
        cache
            .join(format!("models--{}", repo.replace('/', "--")))
            .join("snapshots"),
    )
}

/// Fails with [`RagError::ConfigMissing`] unless the model is already in
/// `cache`. fastembed would otherwise download it.
#[cfg_attr(not(feature = "local-embeddings-fastembed"), allow(dead_code))]
fn require_cached_model(name: &str, cache: &Path) -> Result<()> {
    let snapshots = cached_snapshots(name, cache).unwrap_or_else(|| cache.to_path_buf());
    let populated = std::fs::read_dir(&snapshots)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false);
    if !populated {
        return Err(RagError::ConfigMissing {
            what: "embedding model",
            path: snapshots,
        }
        .into());
    }
    Ok(())
}

#[cfg_attr(not(feature = "local-embeddings-fastembed"), allow(dead_code))]
fn resolve_local_model(config: &EmbeddingConfig) -> (String, usize) {
    let model_name = config
        .model
        .clone()
        .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());

    let dims = config.dims.unwrap_or(match model_name.as_str() {
        "paraphrase-multilingual-minilm-l12-v2" => 384,
        "paraphrase-multilingual-mpnet-base-v2" => 768,
        "bge-small-zh-v1.5" => 512,
        "multilingual-e5-small" => 384,
        "multilingual-e5-base" => 768,
        "multilingual-e5-large" => 1024,
        _ => 384,
    });

    (model_name, dims)
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "paraphrase-multilingual-minilm-l12-v2" => {
            Ok(fastembed::EmbeddingModel::ParaphraseMLMiniLML12V2)
        }
        "paraphrase-multilingual-mpnet-base-v2" => {
            Ok(fastembed::EmbeddingModel::ParaphraseMLMpnetBaseV2)
        }
        "bge-small-zh-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallZHV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             paraphrase-multilingual-minilm-l12-v2, paraphrase-multilingual-mpnet-base-v2, \
             bge-small-zh-v1.5, multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
            other
        ),
    }
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured Ollama URL (default: `http://localhost:11434`).
pub struct OllamaProvider {
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            url,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
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

            let resp = self
                .client
                .post(format!("{}/api/embed", self.url))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_ollama_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        tracing::warn!(%status, attempt, "ollama embedding request failed, retrying");
                        last_err = Some(anyhow::anyhow!(
                            "Ollama API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Ollama API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow::anyhow!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url,
                        e
                    ));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Ollama embedding failed after retries")))
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing embeddings array"))?;

    let mut result = Vec::with_capacity(embeddings.len());

    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: embedding is not an array"))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }

    Ok(result)
}

// ============ Hashing Provider ============

/// Lexical embedding by feature hashing of character unigrams and bigrams.
///
/// Whitespace is ignored, so it works for CJK text without a tokenizer.
/// Vectors are L2-normalized. Deterministic across runs and platforms.
pub struct HashingProvider {
    model_name: String,
    dims: usize,
}

impl HashingProvider {
    pub fn new(dims: usize) -> Self {
        let dims = dims.max(1);
        Self {
            model_name: format!("hashing-ngram-{}", dims),
            dims,
        }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
        let mut v = vec![0.0f32; self.dims];
        let mut buf = [0u8; 8];

        for (i, c) in chars.iter().enumerate() {
            let unigram = c.encode_utf8(&mut buf).as_bytes().to_vec();
            v[bucket(&unigram, self.dims)] += 1.0;

            if let Some(next) = chars.get(i + 1) {
                let mut bigram = unigram;
                bigram.extend_from_slice(next.encode_utf8(&mut buf).as_bytes());
                v[bucket(&bigram, self.dims)] += 1.0;
            }
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

/// FNV-1a bucket for a byte string.
fn bucket(bytes: &[u8], dims: usize) -> usize {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    (hash % dims as u64) as usize
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Create the appropriate [`EmbeddingProvider`] based on configuration.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"local"` | `LocalProvider` (requires the `local-embeddings-fastembed` feature) |
/// | `"ollama"` | [`OllamaProvider`] |
/// | `"hashing"` | [`HashingProvider`] |
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalProvider::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings-fastembed"),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        "hashing" => Ok(Arc::new(HashingProvider::new(
            config.dims.unwrap_or(DEFAULT_HASHING_DIMS),
        ))),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Encode a float vector as little-endian `f32` bytes (`vec.len() × 4` bytes).
///
/// ```rust
/// use hebei_guide::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode bytes produced by [`vec_to_blob`]. Trailing partial values are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors of
/// different lengths, or a zero vector.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
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
