//! Entry → [`Document`] normalization.
//!
//! The recognized fields are declared once in [`Field::ALL`]; extraction and
//! canonical rendering both walk that list, so adding a field touches only
//! this module.

use crate::models::{Document, DocumentMetadata, KnowledgeEntry};

/// A tagged field of a knowledge record, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Type,
    City,
    Name,
    Content,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Type, Field::City, Field::Name, Field::Content];

    pub fn tag(self) -> &'static str {
        match self {
            Field::Type => "类型",
            Field::City => "城市",
            Field::Name => "名称",
            Field::Content => "内容",
        }
    }

    /// The bracketed marker as it appears in the source, e.g. `【类型】`.
    pub fn marker(self) -> String {
        format!("【{}】", self.tag())
    }
}

/// Value of the first `【field】value` occurrence with a non-empty remainder
/// of line, trimmed. Missing fields are empty strings.
pub fn extract_field(block: &str, field: Field) -> String {
    let marker = field.marker();
    for (pos, _) in block.match_indices(marker.as_str()) {
        let rest = &block[pos + marker.len()..];
        let line = rest.split('\n').next().unwrap_or("");
        if !line.is_empty() {
            return line.trim().to_string();
        }
    }
    String::new()
}

impl KnowledgeEntry {
    pub fn from_block(block: &str) -> Self {
        let mut entry = KnowledgeEntry::default();
        for field in Field::ALL {
            *entry.field_mut(field) = extract_field(block, field);
        }
        entry
    }

    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Type => &self.entry_type,
            Field::City => &self.city,
            Field::Name => &self.name,
            Field::Content => &self.content,
        }
    }

    fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Type => &mut self.entry_type,
            Field::City => &mut self.city,
            Field::Name => &mut self.name,
            Field::Content => &mut self.content,
        }
    }

    /// Fields re-serialized one per line in canonical order.
    pub fn page_content(&self) -> String {
        Field::ALL
            .iter()
            .map(|f| format!("{}{}", f.marker(), self.field(*f)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// `"{type}-{name}"` without a dangling separator when either side is empty.
    pub fn title(&self) -> String {
        format!("{}-{}", self.entry_type, self.name)
            .trim_matches('-')
            .to_string()
    }
}

/// Build the document for the entry at rank `id` of the parsed sequence.
pub fn build_document(block: &str, id: usize) -> Document {
    let entry = KnowledgeEntry::from_block(block);
    Document {
        page_content: entry.page_content(),
        metadata: DocumentMetadata {
            title: entry.title(),
            entry_type: entry.entry_type,
            city: entry.city,
            name: entry.name,
            id,
        },
    }
}

/// Build documents for a whole parsed sequence; ids are `0..entries.len()`.
pub fn build_documents(entries: &[String]) -> Vec<Document> {
    entries
        .iter()
        .enumerate()
        .map(|(i, block)| build_document(block, i))
        .collect()
}
