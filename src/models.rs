//! Core data models.
//!
//! These types flow through the build pipeline (entry → document → index)
//! and the serving pipeline (document → evidence, turns → memory).

use serde::{Deserialize, Serialize};

/// The four tagged fields of one knowledge record.
///
/// Missing fields are empty strings, never errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeEntry {
    pub entry_type: String,
    pub city: String,
    pub name: String,
    pub content: String,
}

/// Normalized, indexed representation of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Canonical `【类型】…【城市】…【名称】…【内容】…` rendering.
    pub page_content: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(rename = "type")]
    pub entry_type: String,
    pub city: String,
    pub name: String,
    pub title: String,
    /// Zero-based rank of the entry in the parsed knowledge file.
    pub id: usize,
}

/// Metadata of a retrieved document, shown to justify an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub title: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub city: String,
    pub name: String,
    pub id: usize,
}

impl From<&Document> for Evidence {
    fn from(doc: &Document) -> Self {
        let meta = &doc.metadata;
        let title = if !meta.title.is_empty() {
            meta.title.clone()
        } else if !meta.name.is_empty() {
            meta.name.clone()
        } else {
            "未命名".to_string()
        };
        Self {
            title,
            entry_type: meta.entry_type.clone(),
            city: meta.city.clone(),
            name: meta.name.clone(),
            id: meta.id,
        }
    }
}

impl Evidence {
    /// One display line: `[命中1] 景点-清东陵 ｜ 景点 ｜ 唐山`.
    pub fn display_line(&self, rank: usize) -> String {
        format!(
            "[命中{}] {} ｜ {} ｜ {}",
            rank, self.title, self.entry_type, self.city
        )
    }
}

/// One question/answer exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub query: String,
    pub answer: String,
}

impl ConversationTurn {
    pub fn new(query: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            answer: answer.into(),
        }
    }
}
