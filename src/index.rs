//! Persisted vector index over knowledge documents.
//!
//! Built once offline (`guide build`), loaded read-only by the serving
//! process. The directory holds a single `index.json`:
//!
//! ```json
//! {
//!   "manifest": { "format_version": 1, "model": "...", "dims": 384, "entries": 42, ... },
//!   "records": [ { "document": { "page_content": "...", "metadata": { ... } },
//!                  "vector": "<base64 little-endian f32>" } ]
//! }
//! ```
//!
//! # Trust boundary
//!
//! Loading checks that the file decodes and that its model name and
//! dimensionality match the serving embedder. It performs no authenticity or
//! integrity verification: whoever can write the index directory controls what
//! the assistant retrieves. Treat the directory like the knowledge file itself.
//!
//! Search is an exact cosine scan, nearest first. Equal scores keep insertion
//! order, so results are stable for a fixed index.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::document::build_documents;
use crate::embedding::{self, blob_to_vec, cosine_similarity, vec_to_blob, EmbeddingProvider};
use crate::error::RagError;
use crate::models::{Document, DocumentMetadata};
use crate::parse::load_entries;
use crate::progress::{BuildProgressEvent, BuildProgressReporter, ProgressMode};

pub const INDEX_FILE: &str = "index.json";
pub const FORMAT_VERSION: u32 = 1;

/// Nearest-neighbor search over indexed documents.
///
/// Implementations must be safe for concurrent reads.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// The `k` nearest documents to `query`, nearest first.
    async fn similarity_search(&self, query: &str, k: usize) -> anyhow::Result<Vec<Document>>;
}

/// Where the indexed documents came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub path: PathBuf,
    /// Hex SHA-256 of the knowledge file bytes; empty for in-memory corpora.
    pub sha256: String,
}

impl SourceInfo {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read knowledge file: {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            sha256: hex::encode(Sha256::digest(&bytes)),
        })
    }

    pub fn inline(label: &str) -> Self {
        Self {
            path: PathBuf::from(label),
            sha256: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub model: String,
    pub dims: usize,
    pub entries: usize,
    pub built_at: DateTime<Utc>,
    pub source: SourceInfo,
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    manifest: IndexManifest,
    records: Vec<StoredRecord>,
}

#[derive(Serialize, Deserialize)]
struct StoredRecord {
    document: Document,
    vector: String,
}

pub struct VectorIndex {
    manifest: IndexManifest,
    documents: Vec<Document>,
    vectors: Vec<Vec<f32>>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl VectorIndex {
    /// Embed every document once, in batches of `batch_size`.
    ///
    /// Fails with [`RagError::EmptyCorpus`] when `documents` is empty.
    pub async fn build(
        documents: Vec<Document>,
        source: SourceInfo,
        embedder: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
        progress: &dyn BuildProgressReporter,
    ) -> Result<Self, RagError> {
        if documents.is_empty() {
            return Err(RagError::EmptyCorpus { path: source.path });
        }

        let dims = embedder.dims();
        let total = documents.len();
        let mut vectors = Vec::with_capacity(total);

        for batch in documents.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|d| d.page_content.clone()).collect();
            let batch_vectors = embedder.embed_documents(&texts).await?;

            if batch_vectors.len() != batch.len() {
                return Err(anyhow::anyhow!(
                    "embedder returned {} vectors for {} documents",
                    batch_vectors.len(),
                    batch.len()
                )
                .into());
            }
            if let Some(bad) = batch_vectors.iter().find(|v| v.len() != dims) {
                return Err(anyhow::anyhow!(
                    "embedder {} returned a {}-dim vector, expected {}",
                    embedder.model_name(),
                    bad.len(),
                    dims
                )
                .into());
            }

            vectors.extend(batch_vectors);
            progress.report(BuildProgressEvent::Embedding {
                n: vectors.len() as u64,
                total: total as u64,
            });
        }

        let manifest = IndexManifest {
            format_version: FORMAT_VERSION,
            model: embedder.model_name().to_string(),
            dims,
            entries: total,
            built_at: Utc::now(),
            source,
        };

        Ok(Self {
            manifest,
            documents,
            vectors,
            embedder,
        })
    }

    /// Write `index.json` into `dir`, creating the directory if needed.
    pub fn save(&self, dir: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create index directory: {}", dir.display()))?;

        let engine = base64::engine::general_purpose::STANDARD;
        let file = IndexFile {
            manifest: self.manifest.clone(),
            records: self
                .documents
                .iter()
                .zip(&self.vectors)
                .map(|(document, vector)| StoredRecord {
                    document: document.clone(),
                    vector: engine.encode(vec_to_blob(vector)),
                })
                .collect(),
        };

        let tmp = dir.join(format!("{}.tmp", INDEX_FILE));
        std::fs::write(&tmp, serde_json::to_vec(&file)?)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, dir.join(INDEX_FILE))
            .with_context(|| format!("Failed to finalize index in {}", dir.display()))?;

        Ok(())
    }

    /// Load an index for serving with a compatible `embedder`.
    pub fn load(dir: &Path, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self, RagError> {
        let file = read_index_file(dir)?;
        let manifest = file.manifest;

        if manifest.model != embedder.model_name() || manifest.dims != embedder.dims() {
            return Err(RagError::IncompatibleIndex {
                dir: dir.to_path_buf(),
                index_model: manifest.model,
                index_dims: manifest.dims,
                embedder_model: embedder.model_name().to_string(),
                embedder_dims: embedder.dims(),
            });
        }

        let engine = base64::engine::general_purpose::STANDARD;
        let mut documents = Vec::with_capacity(file.records.len());
        let mut vectors = Vec::with_capacity(file.records.len());

        for record in file.records {
            let bytes = engine.decode(record.vector.as_bytes()).with_context(|| {
                format!("Undecodable vector for entry {}", record.document.metadata.id)
            })?;
            let vector = blob_to_vec(&bytes);
            if vector.len() != manifest.dims {
                return Err(anyhow::anyhow!(
                    "entry {} has a {}-dim vector, index declares {}",
                    record.document.metadata.id,
                    vector.len(),
                    manifest.dims
                )
                .into());
            }
            documents.push(record.document);
            vectors.push(vector);
        }

        tracing::info!(
            dir = %dir.display(),
            entries = documents.len(),
            model = %manifest.model,
            "vector index loaded"
        );

        Ok(Self {
            manifest,
            documents,
            vectors,
            embedder,
        })
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Positions and scores of the `k` nearest vectors to `query_vec`.
    pub fn search_vector(&self, query_vec: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(query_vec, v)))
            .collect();
        // stable: equal scores keep insertion order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

#[async_trait]
impl SearchIndex for VectorIndex {
    async fn similarity_search(&self, query: &str, k: usize) -> anyhow::Result<Vec<Document>> {
        if k == 0 || self.documents.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed_query(query).await?;
        Ok(self
            .search_vector(&query_vec, k)
            .into_iter()
            .map(|(i, _)| self.documents[i].clone())
            .collect())
    }
}

fn read_index_file(dir: &Path) -> Result<IndexFile, RagError> {
    if !dir.is_dir() {
        return Err(RagError::ConfigMissing {
            what: "index directory",
            path: dir.to_path_buf(),
        });
    }
    let path = dir.join(INDEX_FILE);
    if !path.is_file() {
        return Err(RagError::ConfigMissing {
            what: "index file",
            path,
        });
    }

    let bytes =
        std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file: IndexFile = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    if file.manifest.format_version != FORMAT_VERSION {
        return Err(anyhow::anyhow!(
            "unsupported index format version {} (expected {})",
            file.manifest.format_version,
            FORMAT_VERSION
        )
        .into());
    }

    Ok(file)
}

/// Manifest and document metadata of a persisted index, without an embedder.
pub fn inspect(dir: &Path) -> Result<(IndexManifest, Vec<DocumentMetadata>), RagError> {
    let file = read_index_file(dir)?;
    let metadata = file
        .records
        .into_iter()
        .map(|r| r.document.metadata)
        .collect();
    Ok((file.manifest, metadata))
}

/// Run `guide build`: parse the knowledge file, embed it, and persist the index.
pub async fn run_build(
    config: &Config,
    knowledge: Option<PathBuf>,
    out: Option<PathBuf>,
    progress: ProgressMode,
) -> Result<(), RagError> {
    let knowledge = knowledge.unwrap_or_else(|| config.knowledge.path.clone());
    let out = out.unwrap_or_else(|| config.index.dir.clone());
    let reporter = progress.reporter();

    let entries = load_entries(&knowledge)?;
    let documents = build_documents(&entries);
    if documents.is_empty() {
        return Err(RagError::EmptyCorpus { path: knowledge });
    }
    reporter.report(BuildProgressEvent::Parsed {
        entries: documents.len() as u64,
    });

    let source = SourceInfo::from_file(&knowledge)?;
    let embedder = embedding::create_provider(&config.embedding)?;

    tracing::info!(
        entries = documents.len(),
        model = embedder.model_name(),
        "building vector index"
    );

    let index = VectorIndex::build(
        documents,
        source,
        embedder,
        config.embedding.batch_size,
        reporter.as_ref(),
    )
    .await?;
    index.save(&out)?;

    let manifest = index.manifest();
    println!("build");
    println!("  entries: {}", manifest.entries);
    println!("  model: {} ({} dims)", manifest.model, manifest.dims);
    println!("  saved: {}", out.display());
    println!("ok");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::build_documents;
    use crate::embedding::HashingProvider;
    use crate::parse::split_entries;
    use crate::progress::NoProgress;

    const KB: &str = "【类型】景点\n【城市】唐山\n【名称】清东陵\n【内容】门票 120 元\n---\n\
        【类型】美食\n【城市】保定\n【名称】驴肉火烧\n【内容】老字号\n---\n\
        【类型】城市\n【城市】承德\n【名称】承德概况\n【内容】避暑胜地\n";

    fn docs() -> Vec<Document> {
        build_documents(&split_entries(KB))
    }

    fn hashing() -> Arc<dyn EmbeddingProvider> {
        Arc::new(HashingProvider::new(128))
    }

    async fn built() -> VectorIndex {
        VectorIndex::build(docs(), SourceInfo::inline("kb"), hashing(), 2, &NoProgress)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn build_rejects_empty_corpus() {
        let err = VectorIndex::build(Vec::new(), SourceInfo::inline("kb"), hashing(), 8, &NoProgress)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RagError::EmptyCorpus { .. }));
    }

    #[tokio::test]
    async fn every_document_has_one_vector() {
        let index = built().await;
        assert_eq!(index.len(), 3);
        assert_eq!(index.vectors.len(), 3);
        assert!(index.vectors.iter().all(|v| v.len() == 128));
        assert_eq!(index.manifest().entries, 3);
    }

    #[tokio::test]
    async fn save_then_load_preserves_search() {
        let tmp = tempfile::tempdir().unwrap();
        let index = built().await;
        index.save(tmp.path()).unwrap();

        let loaded = VectorIndex::load(tmp.path(), hashing()).unwrap();
        assert_eq!(loaded.documents(), index.documents());

        let before = index.similarity_search("清东陵门票", 2).await.unwrap();
        let after = loaded.similarity_search("清东陵门票", 2).await.unwrap();
        assert_eq!(before, after);
        assert_eq!(after[0].metadata.name, "清东陵");
    }

    #[test]
    fn load_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let err = VectorIndex::load(&tmp.path().join("absent"), hashing())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            RagError::ConfigMissing {
                what: "index directory",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn load_rejects_other_embedder() {
        let tmp = tempfile::tempdir().unwrap();
        built().await.save(tmp.path()).unwrap();
        let other: Arc<dyn EmbeddingProvider> = Arc::new(HashingProvider::new(64));
        let err = VectorIndex::load(tmp.path(), other).err().unwrap();
        assert!(matches!(err, RagError::IncompatibleIndex { .. }));
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let index = built().await;
        // zero query vector scores every document 0.0
        let hits = index.search_vector(&vec![0.0; 128], 3);
        let order: Vec<usize> = hits.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn inspect_reads_metadata_only() {
        let tmp = tempfile::tempdir().unwrap();
        built().await.save(tmp.path()).unwrap();
        let (manifest, metadata) = inspect(tmp.path()).unwrap();
        assert_eq!(manifest.model, "hashing-ngram-128");
        let ids: Vec<usize> = metadata.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }
}
