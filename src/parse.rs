//! Knowledge file splitter.
//!
//! The knowledge file groups records with `---` separators. A group may hold
//! several records back to back, each starting with the `【类型】` tag:
//!
//! ```text
//! 【类型】景点
//! 【城市】唐山
//! 【名称】清东陵
//! 【内容】门票 120 元……
//! ---
//! 【类型】美食
//! 【城市】保定
//! ...
//! ```
//!
//! Output order is input order, so the same text always yields the same
//! sequence and an entry's rank is a stable id within one build.

use std::path::Path;

use anyhow::Context;

use crate::document::Field;
use crate::error::RagError;

/// Token separating record groups.
pub const GROUP_SEPARATOR: &str = "---";

/// Read `path` and split it into raw entry blocks.
///
/// A missing file is [`RagError::ConfigMissing`]; a file that is empty after
/// trimming yields an empty sequence.
pub fn load_entries(path: &Path) -> Result<Vec<String>, RagError> {
    if !path.exists() {
        return Err(RagError::ConfigMissing {
            what: "knowledge file",
            path: path.to_path_buf(),
        });
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read knowledge file: {}", path.display()))?;

    Ok(split_entries(&raw))
}

/// Split raw knowledge text into entry blocks.
///
/// Blocks that do not start with the type tag (leading prose, stray
/// fragments) are dropped.
pub fn split_entries(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    let marker = Field::Type.marker();
    let mut entries = Vec::new();

    for group in raw.split(GROUP_SEPARATOR) {
        let group = group.trim();
        if group.is_empty() {
            continue;
        }

        for block in split_at_marker(group, &marker) {
            let block = block.trim();
            if !block.is_empty() && block.starts_with(marker.as_str()) {
                entries.push(block.to_string());
            }
        }
    }

    entries
}

/// Cut `text` immediately before every occurrence of `marker`.
fn split_at_marker<'a>(text: &'a str, marker: &str) -> Vec<&'a str> {
    let mut cuts: Vec<usize> = text.match_indices(marker).map(|(i, _)| i).collect();
    if cuts.first() != Some(&0) {
        cuts.insert(0, 0);
    }
    cuts.push(text.len());

    cuts.windows(2).map(|w| &text[w[0]..w[1]]).collect()
}
