//! Shared fixtures: a small knowledge base and fake collaborators.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hebei_guide::answer::{Assistant, AssistantSettings};
use hebei_guide::completion::{CompletionProvider, CompletionRequest};
use hebei_guide::document::build_documents;
use hebei_guide::embedding::{EmbeddingProvider, HashingProvider};
use hebei_guide::error::CompletionError;
use hebei_guide::index::{SearchIndex, SourceInfo, VectorIndex};
use hebei_guide::memory::{InMemorySessionStore, SessionStore};
use hebei_guide::models::Document;
use hebei_guide::parse::split_entries;
use hebei_guide::progress::NoProgress;
use hebei_guide::retrieve::{Retriever, TitlePrefixRule};

pub const KNOWLEDGE: &str = "\
【类型】城市
【城市】唐山
【名称】唐山概况
【内容】冀东工业城市，南湖公园与清东陵是主要游览点
---
【类型】景点
【城市】唐山
【名称】清东陵
【内容】门票 120 元，开放时间 8:30-17:00，唐山站有直达大巴
---
【类型】景点
【城市】承德
【名称】避暑山庄
【内容】旺季门票 130 元，建议游览一天，承德南站打车约 30 分钟
---
【类型】美食
【城市】保定
【名称】驴肉火烧
【内容】保定老字号店铺集中在裕华路一带，人均 20 元
【类型】交通
【城市】秦皇岛
【名称】山海关
【内容】北京南站高铁约 2 小时到山海关站，出站可乘公交前往老龙头
---
【类型】景点
【城市】石家庄
【名称】正定古城
【内容】隆兴寺门票 50 元，古城墙免费，周一部分场馆闭馆
";

pub fn documents() -> Vec<Document> {
    build_documents(&split_entries(KNOWLEDGE))
}

pub async fn hashing_index() -> Arc<VectorIndex> {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashingProvider::new(512));
    let index = VectorIndex::build(
        documents(),
        SourceInfo::inline("fixture"),
        embedder,
        4,
        &NoProgress,
    )
    .await
    .unwrap();
    Arc::new(index)
}

// ─── Indexes ────────────────────────────────────────────────────────

/// Wraps an index and records every query it receives.
pub struct RecordingIndex {
    inner: Arc<dyn SearchIndex>,
    queries: Mutex<Vec<String>>,
}

impl RecordingIndex {
    pub fn new(inner: Arc<dyn SearchIndex>) -> Self {
        Self {
            inner,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchIndex for RecordingIndex {
    async fn similarity_search(&self, query: &str, k: usize) -> anyhow::Result<Vec<Document>> {
        self.queries.lock().unwrap().push(query.to_string());
        self.inner.similarity_search(query, k).await
    }
}

/// Returns a fixed candidate list regardless of the query.
pub struct StaticIndex(pub Vec<Document>);

#[async_trait]
impl SearchIndex for StaticIndex {
    async fn similarity_search(&self, _query: &str, k: usize) -> anyhow::Result<Vec<Document>> {
        Ok(self.0.iter().take(k).cloned().collect())
    }
}

// ─── Completion providers ───────────────────────────────────────────

/// Answers with the `【内容】` lines found in the prompt, like a model that
/// only restates its context.
#[derive(Default)]
pub struct ContextEcho {
    prompts: Mutex<Vec<String>>,
}

impl ContextEcho {
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ContextEcho {
    fn name(&self) -> &str {
        "generation"
    }
    fn model(&self) -> &str {
        "context-echo"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let facts: Vec<&str> = request
            .prompt
            .lines()
            .filter_map(|l| l.strip_prefix("【内容】"))
            .collect();
        Ok(format!("根据资料：{}", facts.join("；")))
    }
}

/// Replies with a fixed result and counts calls.
pub struct Scripted {
    reply: Result<String, CompletionError>,
    calls: AtomicUsize,
}

impl Scripted {
    pub fn ok(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(err: CompletionError) -> Self {
        Self {
            reply: Err(err),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}

pub fn quota_exceeded() -> CompletionError {
    CompletionError::Status {
        provider: "enhancement".into(),
        status: 429,
        body: "quota exceeded".into(),
    }
}

// ─── Assembly ───────────────────────────────────────────────────────

pub struct Harness {
    pub assistant: Assistant,
    pub index: Arc<RecordingIndex>,
    pub sessions: Arc<InMemorySessionStore>,
}

pub fn harness(
    index: Arc<dyn SearchIndex>,
    generator: Arc<dyn CompletionProvider>,
    enhancer: Option<Arc<dyn CompletionProvider>>,
) -> Harness {
    let recording = Arc::new(RecordingIndex::new(index));
    let sessions = Arc::new(InMemorySessionStore::new(3));

    let search: Arc<dyn SearchIndex> = recording.clone();
    let store: Arc<dyn SessionStore> = sessions.clone();
    let retriever = Retriever::new(
        search,
        Box::new(TitlePrefixRule::new(vec!["城市".to_string()])),
        3,
    );

    Harness {
        assistant: Assistant::new(
            retriever,
            store,
            generator,
            enhancer,
            AssistantSettings::default(),
        ),
        index: recording,
        sessions,
    }
}
