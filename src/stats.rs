//! Index statistics (`guide stats`).
//!
//! Summarizes a persisted index without loading an embedding model: size,
//! model, build age, whether the knowledge file changed since the build,
//! and entry counts per type and per city.

use std::collections::BTreeMap;

use crate::config::Config;
use crate::error::RagError;
use crate::index::{inspect, SourceInfo, INDEX_FILE};
use crate::models::DocumentMetadata;

/// Entry counts for one grouping key, largest first, ties by name.
pub fn count_by<F>(metadata: &[DocumentMetadata], key: F) -> Vec<(String, usize)>
where
    F: Fn(&DocumentMetadata) -> &str,
{
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for m in metadata {
        let k = key(m);
        let k = if k.is_empty() { "(none)" } else { k };
        *counts.entry(k.to_string()).or_default() += 1;
    }
    let mut rows: Vec<(String, usize)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows
}

pub async fn run_stats(config: &Config) -> Result<(), RagError> {
    let dir = &config.index.dir;
    let (manifest, metadata) = inspect(dir)?;

    let index_size = std::fs::metadata(dir.join(INDEX_FILE))
        .map(|m| m.len())
        .unwrap_or(0);

    let source_state = if manifest.source.sha256.is_empty() {
        "not recorded"
    } else {
        match SourceInfo::from_file(&manifest.source.path) {
            Ok(current) if current.sha256 == manifest.source.sha256 => "unchanged since build",
            Ok(_) => "changed since build (rebuild to pick up edits)",
            Err(_) => "missing",
        }
    };

    println!("Hebei Guide — Index Stats");
    println!("=========================");
    println!();
    println!("  Index:       {}", dir.display());
    println!("  Size:        {}", format_bytes(index_size));
    println!("  Model:       {} ({} dims)", manifest.model, manifest.dims);
    println!("  Entries:     {}", manifest.entries);
    println!(
        "  Built:       {}",
        format_ts_relative(manifest.built_at.timestamp())
    );
    println!("  Source:      {}", manifest.source.path.display());
    if !manifest.source.sha256.is_empty() {
        println!("  SHA-256:     {}", manifest.source.sha256);
    }
    println!("  Status:      {}", source_state);

    for (label, rows) in [
        ("By type:", count_by(&metadata, |m| m.entry_type.as_str())),
        ("By city:", count_by(&metadata, |m| m.city.as_str())),
    ] {
        if rows.is_empty() {
            continue;
        }
        println!();
        println!("  {}", label);
        println!("  {:<24} {:>8}", "NAME", "ENTRIES");
        println!("  {}", "-".repeat(33));
        for (name, count) in rows {
            println!("  {:<24} {:>8}", name, count);
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
