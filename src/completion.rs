//! Chat-completion providers.
//!
//! Both the grounded generator and the optional style enhancer are instances
//! of one [`CompletionProvider`] capability, configured independently. Tests
//! substitute fakes for either without touching the answer pipeline.
//!
//! The only shipped implementation speaks the OpenAI-compatible
//! `POST {base_url}/chat/completions` protocol with a single user message.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::CompletionConfig;
use crate::error::CompletionError;

/// Base URL used for generation when none is configured.
pub const DEFAULT_GENERATION_BASE_URL: &str = "https://api.deepseek.com";

const CHAT_PATH: &str = "/chat/completions";

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Role of this endpoint in logs and errors, e.g. `"generation"`.
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

pub struct OpenAiCompatibleProvider {
    name: String,
    model: String,
    base_url: String,
    api_key: Option<String>,
    timeout_secs: u64,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    /// Build from one endpoint section.
    ///
    /// A missing API key is not an error here; calls fail with
    /// [`CompletionError::MissingApiKey`] so a server can still start and
    /// answer the canned branches.
    pub fn from_config(
        name: &str,
        config: &CompletionConfig,
        default_model: &str,
        default_base_url: &str,
    ) -> anyhow::Result<Self> {
        let non_blank = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            name: name.to_string(),
            model: non_blank(&config.model).unwrap_or_else(|| default_model.to_string()),
            base_url: non_blank(&config.base_url)
                .unwrap_or_else(|| default_base_url.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: non_blank(&config.api_key),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send_once(&self, api_key: &str, body: &Value) -> Result<String, CompletionError> {
        let url = format!("{}{}", self.base_url, CHAT_PATH);

        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                provider: self.name.clone(),
                status: status.as_u16(),
                body: truncate(&text, 500),
            });
        }

        let json: Value = resp.json().await.map_err(|e| CompletionError::Malformed {
            provider: self.name.clone(),
            message: e.to_string(),
        })?;

        parse_chat_response(&self.name, &json)
    }

    fn transport_error(&self, e: reqwest::Error) -> CompletionError {
        if e.is_timeout() {
            CompletionError::Timeout {
                provider: self.name.clone(),
                secs: self.timeout_secs,
            }
        } else {
            CompletionError::Network {
                provider: self.name.clone(),
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CompletionError::MissingApiKey {
                provider: self.name.clone(),
            })?;

        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let mut attempt = 0;
        loop {
            match self.send_once(api_key, &body).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(provider = %self.name, attempt, error = %e, "completion failed, retrying");
                    let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Text of `choices[0].message.content`, trimmed. Empty text is malformed.
pub fn parse_chat_response(provider: &str, json: &Value) -> Result<String, CompletionError> {
    let malformed = |message: &str| CompletionError::Malformed {
        provider: provider.to_string(),
        message: message.to_string(),
    };

    let choice = json["choices"]
        .get(0)
        .ok_or_else(|| malformed("no choices in response"))?;
    let content = choice["message"]["content"]
        .as_str()
        .ok_or_else(|| malformed("choice has no message content"))?
        .trim();

    if content.is_empty() {
        return Err(malformed("empty completion"));
    }
    Ok(content.to_string())
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}
