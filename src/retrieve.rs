//! Retrieval filter: over-fetch, exclude, truncate, assemble context.
//!
//! The query embedded for search is the user's text followed by a rendering
//! of recent turns, so conversation recency biases the vector without a
//! memory-aware index.

use std::sync::Arc;

use crate::config::{Config, RetrievalConfig};
use crate::embedding;
use crate::error::RagError;
use crate::index::{SearchIndex, VectorIndex};
use crate::memory::NO_HISTORY;
use crate::models::{Document, Evidence};

/// Context text returned when the index has no candidates at all.
pub const NO_KNOWLEDGE: &str = "无相关信息";

/// Largest result count a caller may ask for.
pub const MAX_TOP_K: usize = 100;

/// Predicate for candidates that never make it into the final top-K.
pub trait ExclusionRule: Send + Sync {
    fn excludes(&self, doc: &Document) -> bool;
}

/// Excludes documents whose title starts with any configured prefix.
///
/// The default prefix `城市` removes generic city overviews, which rarely
/// carry prices, hours or routes.
#[derive(Debug, Clone, Default)]
pub struct TitlePrefixRule {
    prefixes: Vec<String>,
}

impl TitlePrefixRule {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self {
            prefixes: prefixes.into_iter().filter(|p| !p.is_empty()).collect(),
        }
    }
}

impl ExclusionRule for TitlePrefixRule {
    fn excludes(&self, doc: &Document) -> bool {
        self.prefixes
            .iter()
            .any(|p| doc.metadata.title.starts_with(p.as_str()))
    }
}

/// Outcome of one retrieval.
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    Found {
        /// Accepted `page_content`s joined by blank lines.
        context: String,
        documents: Vec<Document>,
    },
    /// The index returned no candidates.
    NoKnowledge,
}

impl Retrieval {
    /// Context text; [`NO_KNOWLEDGE`] for the empty case.
    pub fn context(&self) -> &str {
        match self {
            Retrieval::Found { context, .. } => context,
            Retrieval::NoKnowledge => NO_KNOWLEDGE,
        }
    }

    pub fn evidence(&self) -> Vec<Evidence> {
        match self {
            Retrieval::Found { documents, .. } => documents.iter().map(Evidence::from).collect(),
            Retrieval::NoKnowledge => Vec::new(),
        }
    }
}

/// `"{query}\n（历史对话：{history}）"`, with `无` standing in for no history.
pub fn enhanced_query(query: &str, history_text: &str) -> String {
    let history = if history_text.trim().is_empty() {
        NO_HISTORY
    } else {
        history_text
    };
    format!("{}\n（历史对话：{}）", query, history)
}

/// Accept candidates in rank order until `top_k` pass `rule`.
///
/// If every candidate is excluded, the first `top_k` raw candidates are
/// returned instead, so a non-empty candidate list never yields nothing.
pub fn select_candidates(
    candidates: Vec<Document>,
    rule: &dyn ExclusionRule,
    top_k: usize,
) -> Vec<Document> {
    let mut accepted = Vec::with_capacity(top_k.min(candidates.len()));
    for doc in &candidates {
        if accepted.len() >= top_k {
            break;
        }
        if !rule.excludes(doc) {
            accepted.push(doc.clone());
        }
    }

    if accepted.is_empty() {
        return candidates.into_iter().take(top_k).collect();
    }
    accepted
}

pub struct Retriever {
    index: Arc<dyn SearchIndex>,
    rule: Box<dyn ExclusionRule>,
    overfetch_factor: usize,
}

impl Retriever {
    pub fn new(
        index: Arc<dyn SearchIndex>,
        rule: Box<dyn ExclusionRule>,
        overfetch_factor: usize,
    ) -> Self {
        Self {
            index,
            rule,
            overfetch_factor: overfetch_factor.max(1),
        }
    }

    pub fn from_config(index: Arc<dyn SearchIndex>, config: &RetrievalConfig) -> Self {
        Self::new(
            index,
            Box::new(TitlePrefixRule::new(config.exclude_title_prefixes.clone())),
            config.overfetch_factor,
        )
    }

    pub async fn retrieve(
        &self,
        query: &str,
        history_text: &str,
        top_k: usize,
    ) -> anyhow::Result<Retrieval> {
        let search_query = enhanced_query(query, history_text);
        let candidates = self
            .index
            .similarity_search(&search_query, top_k.saturating_mul(self.overfetch_factor))
            .await?;

        if candidates.is_empty() {
            tracing::info!(query, "no candidates in index");
            return Ok(Retrieval::NoKnowledge);
        }

        let raw = candidates.len();
        let documents = select_candidates(candidates, self.rule.as_ref(), top_k);
        for (i, doc) in documents.iter().enumerate() {
            tracing::info!(rank = i + 1, title = %doc.metadata.title, "[命中{}]", i + 1);
        }
        tracing::debug!(raw, accepted = documents.len(), "retrieval filtered");

        let context = documents
            .iter()
            .map(|d| d.page_content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(Retrieval::Found { context, documents })
    }
}

/// Run `guide search`: show the filtered hits for a query without generating.
pub async fn run_search(config: &Config, query: &str, top_k: Option<usize>) -> Result<(), RagError> {
    let embedder = embedding::create_provider(&config.embedding)?;
    let index = Arc::new(VectorIndex::load(&config.index.dir, embedder)?);
    let retriever = Retriever::from_config(index, &config.retrieval);
    let top_k = top_k.unwrap_or(config.retrieval.top_k);
    if top_k == 0 || top_k > MAX_TOP_K {
        return Err(anyhow::anyhow!("--top-k must be between 1 and {}", MAX_TOP_K).into());
    }

    let retrieval = retriever.retrieve(query, "", top_k).await?;
    let evidence = retrieval.evidence();

    if evidence.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, ev) in evidence.iter().enumerate() {
        println!("{}", ev.display_line(i + 1));
        println!("    id: {}  name: {}", ev.id, ev.name);
    }

    Ok(())
}
