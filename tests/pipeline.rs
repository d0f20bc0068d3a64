//! End-to-end answer pipeline over a real hashing-embedded index with fake
//! completion providers.

mod common;

use std::sync::Arc;

use common::{documents, harness, hashing_index, quota_exceeded, ContextEcho, Scripted, StaticIndex};
use hebei_guide::answer::{AnswerKind, AnswerOptions, EnhancementStatus};
use hebei_guide::error::{RagError, GENERATION_FAILED_MESSAGE};
use hebei_guide::itinerary::QueryIntent;
use hebei_guide::memory::{SessionStore, NO_HISTORY};
use hebei_guide::models::Document;
use hebei_guide::prompt::{
    EMPTY_QUERY_MESSAGE, NO_KNOWLEDGE_MESSAGE, VAGUE_QUERY_MESSAGE,
};

const WITH_EVIDENCE: AnswerOptions = AnswerOptions {
    enhance: false,
    want_evidence: true,
};

#[tokio::test]
async fn ticket_lookup_is_grounded_and_not_day_structured() {
    let generator = Arc::new(ContextEcho::default());
    let h = harness(hashing_index().await, generator.clone(), None);

    let answer = h
        .assistant
        .answer("清东陵门票", "u1", WITH_EVIDENCE)
        .await
        .unwrap();

    assert_eq!(answer.kind, AnswerKind::Answered);
    assert_eq!(answer.intent, Some(QueryIntent::Lookup));
    assert!(answer.text.contains("120"), "answer: {}", answer.text);
    assert!(!answer.text.contains("Day"));
    assert!(answer.evidence.iter().any(|e| e.title == "景点-清东陵"));
    assert!(answer.evidence.len() <= 5);
    // city overviews are filtered out of the evidence
    assert!(answer.evidence.iter().all(|e| !e.title.starts_with("城市")));

    let prompt = &generator.prompts()[0];
    assert!(prompt.contains("【内容】门票 120 元"));
    assert!(prompt.contains("不要写成按天划分的行程"));
}

#[tokio::test]
async fn itinerary_request_uses_day_prompt() {
    let generator = Arc::new(ContextEcho::default());
    let h = harness(hashing_index().await, generator.clone(), None);

    let answer = h
        .assistant
        .answer("唐山2日游", "u1", AnswerOptions::default())
        .await
        .unwrap();

    assert_eq!(answer.intent, Some(QueryIntent::Itinerary));
    assert!(answer.evidence.is_empty(), "evidence only when requested");
    assert!(generator.prompts()[0].contains("Day 1 到 Day 2"));
}

#[tokio::test]
async fn empty_query_short_circuits() {
    let generator = Arc::new(Scripted::ok("unused"));
    let h = harness(hashing_index().await, generator.clone(), None);

    for query in ["", "   \n\t"] {
        let answer = h.assistant.answer(query, "u1", WITH_EVIDENCE).await.unwrap();
        assert_eq!(answer.kind, AnswerKind::EmptyQuery);
        assert_eq!(answer.text, EMPTY_QUERY_MESSAGE);
        assert!(answer.evidence.is_empty());
    }

    assert_eq!(h.index.calls(), 0);
    assert_eq!(generator.calls(), 0);
    assert_eq!(h.sessions.get_history("u1", 3), NO_HISTORY);
}

#[tokio::test]
async fn vague_phrase_never_touches_the_index() {
    let h = harness(hashing_index().await, Arc::new(Scripted::ok("unused")), None);

    let answer = h.assistant.answer("河北旅游", "u1", WITH_EVIDENCE).await.unwrap();
    assert_eq!(answer.kind, AnswerKind::VagueQuery);
    assert_eq!(answer.text, VAGUE_QUERY_MESSAGE);
    assert!(answer.evidence.is_empty());
    assert_eq!(h.index.calls(), 0);
}

#[tokio::test]
async fn near_miss_vague_phrase_falls_through_to_retrieval() {
    let h = harness(hashing_index().await, Arc::new(Scripted::ok("好的")), None);

    let answer = h
        .assistant
        .answer("河北旅游推荐吗", "u1", AnswerOptions::default())
        .await
        .unwrap();
    assert_eq!(answer.kind, AnswerKind::Answered);
    assert_eq!(h.index.calls(), 1);
}

#[tokio::test]
async fn empty_index_is_no_knowledge_and_memory_is_untouched() {
    let generator = Arc::new(Scripted::ok("unused"));
    let h = harness(Arc::new(StaticIndex(Vec::new())), generator.clone(), None);

    let answer = h.assistant.answer("清东陵门票", "u1", WITH_EVIDENCE).await.unwrap();
    assert_eq!(answer.kind, AnswerKind::NoKnowledge);
    assert_eq!(answer.text, NO_KNOWLEDGE_MESSAGE);
    assert!(answer.evidence.is_empty());
    assert_eq!(generator.calls(), 0);
    assert!(h.sessions.history("u1", 3).is_empty());
}

#[tokio::test]
async fn enhancement_failure_keeps_generated_answer() {
    let enhancer = Arc::new(Scripted::failing(quota_exceeded()));
    let h = harness(
        hashing_index().await,
        Arc::new(Scripted::ok("清东陵门票 120 元。")),
        Some(enhancer.clone()),
    );

    let opts = AnswerOptions {
        enhance: true,
        want_evidence: false,
    };
    let answer = h.assistant.answer("清东陵门票", "u1", opts).await.unwrap();

    assert_eq!(answer.kind, AnswerKind::Answered);
    assert_eq!(answer.text, "清东陵门票 120 元。");
    assert_eq!(answer.enhancement, EnhancementStatus::FellBack);
    assert_eq!(enhancer.calls(), 1);
    assert_eq!(h.sessions.history("u1", 3)[0].answer, "清东陵门票 120 元。");
}

#[tokio::test]
async fn enhancement_success_replaces_and_is_remembered() {
    let h = harness(
        hashing_index().await,
        Arc::new(Scripted::ok("门票 120 元")),
        Some(Arc::new(Scripted::ok("## 门票\n- 120 元"))),
    );
    let opts = AnswerOptions {
        enhance: true,
        want_evidence: false,
    };
    let answer = h.assistant.answer("清东陵门票", "u1", opts).await.unwrap();
    assert_eq!(answer.text, "## 门票\n- 120 元");
    assert_eq!(answer.enhancement, EnhancementStatus::Applied);
    assert_eq!(h.sessions.history("u1", 3)[0].answer, "## 门票\n- 120 元");
}

#[tokio::test]
async fn enhancement_without_enhancer_is_unavailable() {
    let h = harness(hashing_index().await, Arc::new(Scripted::ok("门票 120 元")), None);
    let opts = AnswerOptions {
        enhance: true,
        want_evidence: false,
    };
    let answer = h.assistant.answer("清东陵门票", "u1", opts).await.unwrap();
    assert_eq!(answer.text, "门票 120 元");
    assert_eq!(answer.enhancement, EnhancementStatus::Unavailable);
}

#[tokio::test]
async fn generation_failure_is_a_distinct_error() {
    let h = harness(
        hashing_index().await,
        Arc::new(Scripted::failing(quota_exceeded())),
        None,
    );

    let err = h
        .assistant
        .answer("清东陵门票", "u1", AnswerOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Generation(_)));
    assert_eq!(err.user_message(), GENERATION_FAILED_MESSAGE);
    assert!(h.sessions.history("u1", 3).is_empty());
}

#[tokio::test]
async fn memory_keeps_three_latest_turns_and_feeds_retrieval() {
    let h = harness(hashing_index().await, Arc::new(ContextEcho::default()), None);

    let queries = ["清东陵门票", "避暑山庄门票", "驴肉火烧哪家正宗", "山海关怎么去", "正定古城门票"];
    for q in queries {
        h.assistant.answer(q, "u1", AnswerOptions::default()).await.unwrap();
    }

    let turns = h.sessions.history("u1", 10);
    let kept: Vec<&str> = turns.iter().map(|t| t.query.as_str()).collect();
    assert_eq!(kept, vec!["驴肉火烧哪家正宗", "山海关怎么去", "正定古城门票"]);

    let searched = h.index.queries();
    assert_eq!(searched[0], "清东陵门票\n（历史对话：无）");
    assert!(searched[1].starts_with("避暑山庄门票\n（历史对话：用户：清东陵门票\n智能体："));

    // other users are unaffected, and ending a session forgets it
    assert!(h.sessions.history("u2", 3).is_empty());
    assert!(h.assistant.end_session("u1"));
    assert!(h.sessions.history("u1", 3).is_empty());
}

#[tokio::test]
async fn all_candidates_excluded_falls_back_to_raw_top_k() {
    let cities: Vec<Document> = documents()
        .into_iter()
        .map(|mut d| {
            d.metadata.title = format!("城市-{}", d.metadata.name);
            d
        })
        .collect();
    let h = harness(
        Arc::new(StaticIndex(cities.clone())),
        Arc::new(Scripted::ok("ok")),
        None,
    );

    let answer = h.assistant.answer("河北怎么玩最好", "u1", WITH_EVIDENCE).await.unwrap();
    let ids: Vec<usize> = answer.evidence.iter().map(|e| e.id).collect();
    let expected: Vec<usize> = cities.iter().take(5).map(|d| d.metadata.id).collect();
    assert_eq!(ids, expected);
}
