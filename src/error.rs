//! Error taxonomy for the assistant.
//!
//! Plumbing code (file I/O, JSON, configuration) returns [`anyhow::Result`]
//! with context attached. The pipeline boundaries that a caller has to tell
//! apart use the typed errors below.
//!
//! | Condition | Representation |
//! |-----------|----------------|
//! | Knowledge file or index directory absent | [`RagError::ConfigMissing`] |
//! | Zero parsed entries at build time | [`RagError::EmptyCorpus`] |
//! | Index built with a different embedding model | [`RagError::IncompatibleIndex`] |
//! | Primary model call failed | [`RagError::Generation`] |
//! | No index hits | `Retrieval::NoKnowledge` (not an error) |
//! | Enhancement call failed | `EnhancementOutcome::Failed` (never propagated) |

use std::path::PathBuf;

use thiserror::Error;

/// Shown when the assistant could not produce an answer at all.
pub const GENERATION_FAILED_MESSAGE: &str =
    "😥 抱歉，行程生成服务暂时不可用，请稍后再试～";

/// Shown for startup and internal failures that the user cannot act on.
pub const UNAVAILABLE_MESSAGE: &str = "😥 抱歉，知识库服务暂时不可用，请稍后再试～";

#[derive(Debug, Error)]
pub enum RagError {
    #[error("{what} not found: {}", path.display())]
    ConfigMissing { what: &'static str, path: PathBuf },

    #[error("knowledge file {} is empty or has no parsable entries", path.display())]
    EmptyCorpus { path: PathBuf },

    #[error(
        "index at {} was built with {index_model} ({index_dims} dims) but the embedder is {embedder_model} ({embedder_dims} dims)",
        dir.display()
    )]
    IncompatibleIndex {
        dir: PathBuf,
        index_model: String,
        index_dims: usize,
        embedder_model: String,
        embedder_dims: usize,
    },

    #[error("generation failed: {0}")]
    Generation(#[source] CompletionError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// End-user text for this failure. Never includes the error chain.
    pub fn user_message(&self) -> &'static str {
        match self {
            RagError::Generation(_) => GENERATION_FAILED_MESSAGE,
            _ => UNAVAILABLE_MESSAGE,
        }
    }
}

/// Failure of a call to a chat-completion endpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompletionError {
    #[error("{provider}: no API key configured")]
    MissingApiKey { provider: String },

    #[error("{provider}: request timed out after {secs}s")]
    Timeout { provider: String, secs: u64 },

    #[error("{provider}: network error: {message}")]
    Network { provider: String, message: String },

    #[error("{provider}: HTTP {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider}: malformed response: {message}")]
    Malformed { provider: String, message: String },
}

impl CompletionError {
    /// Rate limits, server errors, timeouts and connection failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            CompletionError::Timeout { .. } | CompletionError::Network { .. } => true,
            CompletionError::Status { status, .. } => *status == 429 || *status >= 500,
            CompletionError::MissingApiKey { .. } | CompletionError::Malformed { .. } => false,
        }
    }
}
