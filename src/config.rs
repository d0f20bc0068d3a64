//! TOML configuration with environment overrides.
//!
//! Every section is optional. Values are resolved in three layers:
//! built-in defaults, then the TOML file, then environment variables
//! (a `.env` file in the working directory is loaded by the binary first).
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `RAG_KNOWLEDGE_FILE` | `knowledge.path` |
//! | `RAG_INDEX_DIR` | `index.dir` |
//! | `RAG_EMBEDDING_PROVIDER` | `embedding.provider` |
//! | `RAG_EMBEDDING_MODEL` | `embedding.model` |
//! | `RAG_EMBEDDING_MODEL_DIR` | `embedding.model_dir` |
//! | `RAG_BIND` | `server.bind` |
//! | `GENERATION_API_KEY` / `GENERATION_BASE_URL` / `GENERATION_MODEL` | `[generation]` |
//! | `ENHANCER_API_KEY` / `ENHANCER_BASE_URL` / `ENHANCER_MODEL` / `ENHANCER_ENABLED` | `[enhancement]` |

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::retrieve::MAX_TOP_K;

/// Config file consulted when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "./config/guide.toml";

pub const DEFAULT_GENERATION_MODEL: &str = "deepseek-chat";
pub const DEFAULT_ENHANCEMENT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: CompletionConfig,
    #[serde(default)]
    pub enhancement: EnhancementConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeConfig {
    #[serde(default = "default_knowledge_path")]
    pub path: PathBuf,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            path: default_knowledge_path(),
        }
    }
}

fn default_knowledge_path() -> PathBuf {
    PathBuf::from("data/hebei_knowledge.txt")
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
        }
    }
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("index_hebei")
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Directory holding `model.onnx` and tokenizer files; loaded without any network access.
    #[serde(default)]
    pub model_dir: Option<PathBuf>,
    /// Pre-provisioned fastembed cache for named models.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Ollama endpoint.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            model_dir: None,
            cache_dir: None,
            dims: None,
            batch_size: default_batch_size(),
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Candidates fetched per accepted result, leaving room for the exclusion filter.
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,
    /// Conversation turns folded into the retrieval query.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
    #[serde(default = "default_exclude_title_prefixes")]
    pub exclude_title_prefixes: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            overfetch_factor: default_overfetch_factor(),
            history_turns: default_history_turns(),
            exclude_title_prefixes: default_exclude_title_prefixes(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_overfetch_factor() -> usize {
    3
}
fn default_history_turns() -> usize {
    3
}
fn default_exclude_title_prefixes() -> Vec<String> {
    vec!["城市".to_string()]
}

/// One chat-completion endpoint.
#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_completion_retries")]
    pub max_retries: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_completion_timeout_secs(),
            max_retries: default_completion_retries(),
        }
    }
}

fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    900
}
fn default_completion_timeout_secs() -> u64 {
    60
}
fn default_completion_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EnhancementConfig {
    /// Unset means "available when both `api_key` and `base_url` are configured".
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(flatten)]
    pub endpoint: CompletionConfig,
}

impl EnhancementConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or_else(|| {
            has_value(&self.endpoint.api_key) && has_value(&self.endpoint.base_url)
        })
    }
}

fn has_value(v: &Option<String>) -> bool {
    v.as_deref().is_some_and(|s| !s.trim().is_empty())
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
        }
    }
}

fn default_max_turns() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnswerConfig {
    /// Queries equal to one of these get category guidance instead of retrieval.
    #[serde(default = "default_vague_phrases")]
    pub vague_phrases: Vec<String>,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            vague_phrases: default_vague_phrases(),
        }
    }
}

fn default_vague_phrases() -> Vec<String> {
    ["河北旅游", "河北好玩吗", "推荐什么", "怎么玩", "有啥好玩的"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

impl Config {
    /// Apply environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("RAG_KNOWLEDGE_FILE") {
            self.knowledge.path = PathBuf::from(v);
        }
        if let Some(v) = get("RAG_INDEX_DIR") {
            self.index.dir = PathBuf::from(v);
        }
        if let Some(v) = get("RAG_EMBEDDING_PROVIDER") {
            self.embedding.provider = v;
        }
        if let Some(v) = get("RAG_EMBEDDING_MODEL") {
            self.embedding.model = Some(v);
        }
        if let Some(v) = get("RAG_EMBEDDING_MODEL_DIR") {
            self.embedding.model_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("RAG_BIND") {
            self.server.bind = v;
        }

        if let Some(v) = get("GENERATION_API_KEY") {
            self.generation.api_key = Some(v);
        }
        if let Some(v) = get("GENERATION_BASE_URL") {
            self.generation.base_url = Some(v);
        }
        if let Some(v) = get("GENERATION_MODEL") {
            self.generation.model = Some(v);
        }

        if let Some(v) = get("ENHANCER_API_KEY") {
            self.enhancement.endpoint.api_key = Some(v);
        }
        if let Some(v) = get("ENHANCER_BASE_URL") {
            self.enhancement.endpoint.base_url = Some(v);
        }
        if let Some(v) = get("ENHANCER_MODEL") {
            self.enhancement.endpoint.model = Some(v);
        }
        if let Some(v) = get("ENHANCER_ENABLED") {
            self.enhancement.enabled = Some(matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            ));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.retrieval.top_k == 0 || self.retrieval.top_k > MAX_TOP_K {
            anyhow::bail!("retrieval.top_k must be between 1 and {}", MAX_TOP_K);
        }
        if self.retrieval.overfetch_factor == 0 {
            anyhow::bail!("retrieval.overfetch_factor must be >= 1");
        }
        if self.retrieval.history_turns == 0 {
            anyhow::bail!("retrieval.history_turns must be >= 1");
        }
        if self.memory.max_turns == 0 {
            anyhow::bail!("memory.max_turns must be >= 1");
        }
        if self.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be >= 1");
        }

        for (section, endpoint) in [
            ("generation", &self.generation),
            ("enhancement", &self.enhancement.endpoint),
        ] {
            if !(0.0..=2.0).contains(&endpoint.temperature) {
                anyhow::bail!("{}.temperature must be in [0.0, 2.0]", section);
            }
            if endpoint.max_tokens == 0 {
                anyhow::bail!("{}.max_tokens must be >= 1", section);
            }
        }

        match self.embedding.provider.as_str() {
            "local" | "ollama" | "hashing" => {}
            other => anyhow::bail!(
                "Unknown embedding provider: '{}'. Must be local, ollama, or hashing.",
                other
            ),
        }

        if self.embedding.provider == "ollama" && self.embedding.model.is_none() {
            anyhow::bail!("embedding.model must be specified when provider is 'ollama'");
        }

        Ok(())
    }
}

/// Load configuration from `path` (or [`DEFAULT_CONFIG_PATH`] when it exists),
/// then apply process environment overrides and validate.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = read_config_file(path)?;
    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

fn read_config_file(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if !default.exists() {
                return Ok(Config::default());
            }
            default
        }
    };

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&content).with_context(|| "Failed to parse config file")
}
