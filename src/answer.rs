//! Answer synthesis: the per-query state machine.
//!
//! ```text
//! query ─┬─ blank ─────────────────────────────▶ EmptyQuery
//!        ├─ vague phrase (exact match) ─────────▶ VagueQuery
//!        └─ retrieve ─┬─ no candidates ─────────▶ NoKnowledge
//!                     └─ generate ─ [enhance] ─▶ Answered  (memory updated)
//! ```
//!
//! Only the `Answered` branch touches conversation memory. A generation
//! failure is returned as [`RagError::Generation`]; an enhancement failure is
//! never returned and falls back to the generated text.

use std::sync::Arc;

use serde::Serialize;

use crate::completion::{
    CompletionProvider, CompletionRequest, OpenAiCompatibleProvider, DEFAULT_GENERATION_BASE_URL,
};
use crate::config::{CompletionConfig, Config, DEFAULT_ENHANCEMENT_MODEL, DEFAULT_GENERATION_MODEL};
use crate::embedding;
use crate::error::{CompletionError, RagError};
use crate::index::VectorIndex;
use crate::itinerary::{requested_days, QueryIntent};
use crate::memory::{render_history, InMemorySessionStore, SessionStore};
use crate::models::{ConversationTurn, Evidence};
use crate::prompt::{
    enhancement_prompt, itinerary_prompt, lookup_prompt, EMPTY_QUERY_MESSAGE,
    NO_KNOWLEDGE_MESSAGE, VAGUE_QUERY_MESSAGE,
};
use crate::retrieve::{Retrieval, Retriever};

/// Base URL used for enhancement when it is enabled without one.
pub const DEFAULT_ENHANCEMENT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    Answered,
    NoKnowledge,
    VagueQuery,
    EmptyQuery,
}

/// Result of one enhancement call.
#[derive(Debug, Clone, PartialEq)]
pub enum EnhancementOutcome {
    Enhanced(String),
    Failed(CompletionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementStatus {
    NotRequested,
    /// Requested, but no enhancer is configured.
    Unavailable,
    Applied,
    /// The enhancer failed; the generated text was kept.
    FellBack,
}

/// Apply the fallback policy: failed enhancement keeps `original`.
pub fn resolve_enhancement(original: String, outcome: EnhancementOutcome) -> (String, EnhancementStatus) {
    match outcome {
        EnhancementOutcome::Enhanced(text) => (text, EnhancementStatus::Applied),
        EnhancementOutcome::Failed(err) => {
            tracing::warn!(error = %err, "enhancement failed, keeping generated answer");
            (original, EnhancementStatus::FellBack)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub kind: AnswerKind,
    pub text: String,
    /// Empty unless requested, and always empty for the canned branches.
    pub evidence: Vec<Evidence>,
    pub enhancement: EnhancementStatus,
    /// Set on the `Answered` branch only.
    pub intent: Option<QueryIntent>,
}

impl Answer {
    fn canned(kind: AnswerKind, text: &str) -> Self {
        Self {
            kind,
            text: text.to_string(),
            evidence: Vec::new(),
            enhancement: EnhancementStatus::NotRequested,
            intent: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnswerOptions {
    pub enhance: bool,
    pub want_evidence: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&CompletionConfig> for Sampling {
    fn from(c: &CompletionConfig) -> Self {
        Self {
            temperature: c.temperature,
            max_tokens: c.max_tokens,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub top_k: usize,
    pub history_turns: usize,
    pub vague_phrases: Vec<String>,
    pub generation: Sampling,
    pub enhancement: Sampling,
}

impl AssistantSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            history_turns: config.retrieval.history_turns,
            vague_phrases: config.answer.vague_phrases.clone(),
            generation: Sampling::from(&config.generation),
            enhancement: Sampling::from(&config.enhancement.endpoint),
        }
    }
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct Assistant {
    retriever: Retriever,
    sessions: Arc<dyn SessionStore>,
    generator: Arc<dyn CompletionProvider>,
    enhancer: Option<Arc<dyn CompletionProvider>>,
    settings: AssistantSettings,
}

impl Assistant {
    pub fn new(
        retriever: Retriever,
        sessions: Arc<dyn SessionStore>,
        generator: Arc<dyn CompletionProvider>,
        enhancer: Option<Arc<dyn CompletionProvider>>,
        settings: AssistantSettings,
    ) -> Self {
        Self {
            retriever,
            sessions,
            generator,
            enhancer,
            settings,
        }
    }

    /// Load the index and wire both completion endpoints from configuration.
    pub fn from_config(config: &Config) -> Result<Self, RagError> {
        let embedder = embedding::create_provider(&config.embedding)?;
        let index = Arc::new(VectorIndex::load(&config.index.dir, embedder)?);
        let retriever = Retriever::from_config(index, &config.retrieval);

        let generator: Arc<dyn CompletionProvider> = Arc::new(OpenAiCompatibleProvider::from_config(
            "generation",
            &config.generation,
            DEFAULT_GENERATION_MODEL,
            DEFAULT_GENERATION_BASE_URL,
        )?);

        let enhancer: Option<Arc<dyn CompletionProvider>> = if config.enhancement.is_enabled() {
            Some(Arc::new(OpenAiCompatibleProvider::from_config(
                "enhancement",
                &config.enhancement.endpoint,
                DEFAULT_ENHANCEMENT_MODEL,
                DEFAULT_ENHANCEMENT_BASE_URL,
            )?))
        } else {
            None
        };

        tracing::info!(
            generation_model = generator.model(),
            enhancement = enhancer.is_some(),
            "assistant ready"
        );

        Ok(Self::new(
            retriever,
            Arc::new(InMemorySessionStore::new(config.memory.max_turns)),
            generator,
            enhancer,
            AssistantSettings::from_config(config),
        ))
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn enhancement_available(&self) -> bool {
        self.enhancer.is_some()
    }

    pub fn is_vague(&self, query: &str) -> bool {
        self.settings.vague_phrases.iter().any(|p| p == query)
    }

    pub async fn answer(
        &self,
        query: &str,
        user_id: &str,
        opts: AnswerOptions,
    ) -> Result<Answer, RagError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Answer::canned(AnswerKind::EmptyQuery, EMPTY_QUERY_MESSAGE));
        }
        if self.is_vague(query) {
            return Ok(Answer::canned(AnswerKind::VagueQuery, VAGUE_QUERY_MESSAGE));
        }

        let history = render_history(&self.sessions.history(user_id, self.settings.history_turns));
        let retrieval = self
            .retriever
            .retrieve(query, &history, self.settings.top_k)
            .await?;

        let (context, evidence) = match &retrieval {
            Retrieval::NoKnowledge => {
                return Ok(Answer::canned(AnswerKind::NoKnowledge, NO_KNOWLEDGE_MESSAGE));
            }
            Retrieval::Found { context, .. } => (context.as_str(), retrieval.evidence()),
        };

        let intent = QueryIntent::classify(query);
        let prompt = match intent {
            QueryIntent::Itinerary => itinerary_prompt(context, &history, query, requested_days(query)),
            QueryIntent::Lookup => lookup_prompt(context, &history, query),
        };

        let generated = self
            .generator
            .complete(&CompletionRequest {
                prompt,
                temperature: self.settings.generation.temperature,
                max_tokens: self.settings.generation.max_tokens,
            })
            .await
            .map_err(RagError::Generation)?;

        let (text, enhancement) = if !opts.enhance {
            (generated, EnhancementStatus::NotRequested)
        } else {
            match &self.enhancer {
                Some(enhancer) => {
                    let outcome = self.enhance(enhancer.as_ref(), &generated, query).await;
                    resolve_enhancement(generated, outcome)
                }
                None => (generated, EnhancementStatus::Unavailable),
            }
        };

        self.sessions
            .append(user_id, ConversationTurn::new(query, text.clone()));

        Ok(Answer {
            kind: AnswerKind::Answered,
            text,
            evidence: if opts.want_evidence { evidence } else { Vec::new() },
            enhancement,
            intent: Some(intent),
        })
    }

    /// One best-effort rephrasing call.
    pub async fn enhance(
        &self,
        enhancer: &dyn CompletionProvider,
        answer: &str,
        query: &str,
    ) -> EnhancementOutcome {
        let request = CompletionRequest {
            prompt: enhancement_prompt(answer, query),
            temperature: self.settings.enhancement.temperature,
            max_tokens: self.settings.enhancement.max_tokens,
        };
        match enhancer.complete(&request).await {
            Ok(text) => EnhancementOutcome::Enhanced(text),
            Err(err) => EnhancementOutcome::Failed(err),
        }
    }

    /// Forget a user's conversation. Returns whether a session existed.
    pub fn end_session(&self, user_id: &str) -> bool {
        self.sessions.clear(user_id)
    }
}

/// Run `guide ask`: answer a single question and print it.
pub async fn run_ask(
    config: &Config,
    query: &str,
    enhance: bool,
    show_evidence: bool,
) -> Result<(), RagError> {
    let assistant = Assistant::from_config(config)?;
    let user_id = uuid::Uuid::new_v4().to_string();
    let opts = AnswerOptions {
        enhance,
        want_evidence: show_evidence,
    };

    let answer = assistant.answer(query, &user_id, opts).await?;
    println!("{}", answer.text);

    if show_evidence && !answer.evidence.is_empty() {
        println!();
        for (i, ev) in answer.evidence.iter().enumerate() {
            println!("{}", ev.display_line(i + 1));
        }
    }
    if enhance && answer.enhancement == EnhancementStatus::FellBack {
        eprintln!("note: enhancement failed, showing the unenhanced answer");
    }

    Ok(())
}
