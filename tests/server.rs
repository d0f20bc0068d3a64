//! HTTP surface and the OpenAI-compatible client, each against an
//! in-process axum server.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use common::{harness, hashing_index, quota_exceeded, ContextEcho, Scripted};
use hebei_guide::completion::{CompletionProvider, CompletionRequest, OpenAiCompatibleProvider};
use hebei_guide::config::CompletionConfig;
use hebei_guide::error::{CompletionError, GENERATION_FAILED_MESSAGE};
use hebei_guide::prompt::EMPTY_QUERY_MESSAGE;
use hebei_guide::server::build_router;
use serde_json::{json, Value};

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{}", addr)
}

async fn guide_server(generator: Arc<dyn CompletionProvider>) -> String {
    let h = harness(hashing_index().await, generator, None);
    spawn(build_router(Arc::new(h.assistant), 5)).await
}

// ─── Guide API ──────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_version() {
    let base = guide_server(Arc::new(ContextEcho::default())).await;
    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn empty_query_is_a_canned_reply_with_fresh_session() {
    let base = guide_server(Arc::new(ContextEcho::default())).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/answer", base))
        .json(&json!({ "query": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "empty_query");
    assert_eq!(body["text"], EMPTY_QUERY_MESSAGE);
    assert_eq!(body["evidence"], json!([]));
    let user_id = body["user_id"].as_str().unwrap();
    assert!(uuid::Uuid::parse_str(user_id).is_ok());
}

#[tokio::test]
async fn answer_returns_evidence_and_session_can_be_ended() {
    let base = guide_server(Arc::new(ContextEcho::default())).await;
    let client = reqwest::Client::new();

    let body: Value = client
        .post(format!("{}/answer", base))
        .json(&json!({ "query": "清东陵门票", "user_id": "visitor-1", "evidence": true }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["kind"], "answered");
    assert_eq!(body["user_id"], "visitor-1");
    assert_eq!(body["intent"], "lookup");
    assert_eq!(body["enhancement"], "not_requested");
    assert!(body["text"].as_str().unwrap().contains("120"));
    let titles: Vec<&str> = body["evidence"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["title"].as_str().unwrap())
        .collect();
    assert!(titles.contains(&"景点-清东陵"));
    assert_eq!(body["evidence"][0]["type"], "景点");

    let cleared: Value = client
        .delete(format!("{}/sessions/visitor-1", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cleared["cleared"], true);

    let again: Value = client
        .delete(format!("{}/sessions/visitor-1", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(again["cleared"], false);
}

#[tokio::test]
async fn itinerary_answer_is_split_into_days() {
    let base = guide_server(Arc::new(Scripted::ok(
        "Day 1：唐山\n清东陵\nDay 2：承德\n避暑山庄\n以上行程可直接使用。",
    )))
    .await;

    let body: Value = reqwest::Client::new()
        .post(format!("{}/answer", base))
        .json(&json!({ "query": "唐山承德2日游" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let days = body["days"].as_array().unwrap();
    assert_eq!(days.len(), 2);
    assert_eq!(days[0]["title"], "Day 1：");
    assert_eq!(days[1]["body"], "承德\n避暑山庄\n以上行程可直接使用。");
}

#[tokio::test]
async fn generation_failure_maps_to_bad_gateway() {
    let base = guide_server(Arc::new(Scripted::failing(quota_exceeded()))).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/answer", base))
        .json(&json!({ "query": "清东陵门票" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "generation_failed");
    assert_eq!(body["error"]["message"], GENERATION_FAILED_MESSAGE);
}

#[tokio::test]
async fn search_validates_and_filters() {
    let base = guide_server(Arc::new(ContextEcho::default())).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/search", base))
        .json(&json!({ "query": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    for top_k in [0u64, 1 << 40] {
        let resp = client
            .post(format!("{}/search", base))
            .json(&json!({ "query": "唐山", "top_k": top_k }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    }
    let health = client.get(format!("{}/health", base)).send().await.unwrap();
    assert_eq!(health.status(), 200);

    let body: Value = client
        .post(format!("{}/search", base))
        .json(&json!({ "query": "唐山", "top_k": 2 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert!(results
        .iter()
        .all(|r| !r["title"].as_str().unwrap().starts_with("城市")));
}

// ─── OpenAI-compatible client ───────────────────────────────────────

#[derive(Clone)]
struct MockLlm {
    calls: Arc<AtomicUsize>,
    status: StatusCode,
}

async fn mock_chat(
    State(mock): State<MockLlm>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    mock.calls.fetch_add(1, Ordering::SeqCst);

    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer test-key") {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "bad key" })));
    }
    if mock.status != StatusCode::OK {
        return (mock.status, Json(json!({ "error": "unavailable" })));
    }

    let prompt = body["messages"][0]["content"].as_str().unwrap_or_default();
    let reply = format!(
        "model={} temperature={} max_tokens={} echo={}",
        body["model"], body["temperature"], body["max_tokens"], prompt
    );
    (
        StatusCode::OK,
        Json(json!({ "choices": [{ "message": { "role": "assistant", "content": reply } }] })),
    )
}

async fn mock_llm(status: StatusCode) -> (String, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/v1/chat/completions", post(mock_chat))
        .with_state(MockLlm {
            calls: calls.clone(),
            status,
        });
    (format!("{}/v1", spawn(app).await), calls)
}

fn provider(base_url: &str, api_key: &str, max_retries: u32) -> OpenAiCompatibleProvider {
    let config = CompletionConfig {
        base_url: Some(base_url.to_string()),
        api_key: Some(api_key.to_string()),
        model: Some("mock-model".to_string()),
        max_retries,
        timeout_secs: 5,
        ..CompletionConfig::default()
    };
    OpenAiCompatibleProvider::from_config("generation", &config, "unused", "unused").unwrap()
}

fn request(prompt: &str) -> CompletionRequest {
    CompletionRequest {
        prompt: prompt.to_string(),
        temperature: 0.2,
        max_tokens: 900,
    }
}

#[tokio::test]
async fn client_sends_openai_chat_request() {
    let (base, calls) = mock_llm(StatusCode::OK).await;
    let text = provider(&base, "test-key", 0)
        .complete(&request("清东陵门票"))
        .await
        .unwrap();

    assert!(text.contains("model=\"mock-model\""));
    assert!(text.contains("max_tokens=900"));
    assert!(text.ends_with("echo=清东陵门票"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn client_does_not_retry_auth_failures() {
    let (base, calls) = mock_llm(StatusCode::OK).await;
    let err = provider(&base, "wrong-key", 3)
        .complete(&request("hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, CompletionError::Status { status: 401, .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn client_retries_server_errors() {
    let (base, calls) = mock_llm(StatusCode::SERVICE_UNAVAILABLE).await;
    let err = provider(&base, "test-key", 1)
        .complete(&request("hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, CompletionError::Status { status: 503, .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn client_reports_unreachable_endpoint_as_network_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let err = provider(&format!("http://127.0.0.1:{}/v1", port), "test-key", 0)
        .complete(&request("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, CompletionError::Network { .. }));
}
