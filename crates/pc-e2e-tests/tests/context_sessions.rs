//! E2E tests for multi-turn context and session handling: anaphora,
//! pending clarifications, eviction, concurrency and cancellation.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use helpers::TestHarness;
use pc_nlu::inference::MockLlmEngine;
use pc_nlu::NluConfig;
use pc_protocol::{EntitySource, ResolutionSource};

/// "its" in a follow-up resolves to the VM from the previous turn.
#[tokio::test]
async fn e2e_anaphora_uses_previous_turn() {
    let h = TestHarness::deterministic();

    let first = h.say("s1", "status of vm 100").await;
    assert_eq!(first.intent(), Some("vm_status"));

    let second = h.say("s1", "increase its memory to 4GB").await;
    assert_eq!(second.intent(), Some("vm_resize"));
    assert_eq!(second.slot("vm_id"), Some(&json!(100)));
    assert_eq!(second.slot("memory_mb"), Some(&json!(4096)));
}

/// The most recent mention wins.
#[tokio::test]
async fn e2e_anaphora_prefers_latest_mention() {
    let h = TestHarness::deterministic();
    h.say("s1", "status of vm 100").await;
    h.say("s1", "status of vm 101").await;

    let result = h.say("s1", "restart it").await;
    assert_eq!(result.intent(), Some("vm_restart"));
    assert_eq!(result.slot("vm_id"), Some(&json!(101)));
}

/// Inferred entities are recorded as such in the session history.
#[tokio::test]
async fn e2e_inferred_entities_are_marked() {
    let h = TestHarness::deterministic();
    h.say("s1", "status of vm 100").await;
    h.say("s1", "restart it").await;

    let session = h.resolver.store().session("s1").await;
    let ctx = session.lock().await;
    let last = ctx.last_turn().unwrap();
    let bound = last
        .candidate
        .as_ref()
        .and_then(|c| c.bound(pc_protocol::EntityKind::VmId))
        .unwrap();
    assert_eq!(bound.source, EntitySource::InferredFromContext);
    assert!(bound.span.is_none());
}

/// A clarification answer completes the pending intent.
#[tokio::test]
async fn e2e_clarification_answer_resumes_intent() {
    let h = TestHarness::deterministic();

    let question = h.say("s1", "resize it to 8GB RAM").await;
    assert!(question.intent().is_none());
    assert!(question.clarification_needed().unwrap().contains("which VM"));

    let answer = h.say("s1", "vm 120").await;
    assert_eq!(answer.intent(), Some("vm_resize"));
    assert_eq!(answer.slot("vm_id"), Some(&json!(120)));
    assert_eq!(answer.slot("memory_mb"), Some(&json!(8192)));
}

/// After `context_buffer_size` newer turns the oldest entity is gone.
#[tokio::test]
async fn e2e_context_eviction_after_buffer_fills() {
    let h = TestHarness::with_config(NluConfig {
        context_buffer_size: 10,
        ..NluConfig::default()
    });

    h.say("kept", "status of vm 100").await;
    for _ in 0..9 {
        h.say("kept", "list vms").await;
    }
    let still_there = h.say("kept", "restart it").await;
    assert_eq!(still_there.slot("vm_id"), Some(&json!(100)));

    h.say("evicted", "status of vm 100").await;
    for _ in 0..10 {
        h.say("evicted", "list vms").await;
    }
    assert_eq!(h.turns("evicted").await, 10);
    let gone = h.say("evicted", "restart it").await;
    assert!(gone.intent().is_none());
    assert!(gone.clarification_needed().unwrap().contains("which VM"));
}

/// Sessions resolved concurrently never see each other's context.
#[tokio::test]
async fn e2e_concurrent_sessions_isolated() {
    let h = TestHarness::deterministic();

    let mut tasks = Vec::new();
    for i in 0..16u32 {
        let resolver = Arc::clone(&h.resolver);
        tasks.push(tokio::spawn(async move {
            let session = format!("user-{i}");
            resolver
                .resolve(&format!("status of vm {}", 100 + i), &session)
                .await;
            let result = resolver.resolve("restart it", &session).await;
            (i, result)
        }));
    }

    for task in tasks {
        let (i, result) = task.await.unwrap();
        assert_eq!(result.intent(), Some("vm_restart"));
        assert_eq!(result.slot("vm_id"), Some(&json!(100 + i)));
    }
    assert_eq!(h.resolver.store().len().await, 16);
}

/// A second turn of the same session waits for the first one, even while
/// the first is waiting on the LLM.
#[tokio::test]
async fn e2e_same_session_turns_are_serialized() {
    let engine = MockLlmEngine::hit("vm_status", 0.9).with_delay(Duration::from_millis(200));
    let (h, engine) = TestHarness::with_mock_llm(
        engine,
        NluConfig {
            llm_confidence_threshold: 0.4,
            ..NluConfig::default()
        },
    );

    let first = {
        let resolver = Arc::clone(&h.resolver);
        tokio::spawn(async move { resolver.resolve("vm 100", "s1").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = {
        let resolver = Arc::clone(&h.resolver);
        tokio::spawn(async move { resolver.resolve("restart it", "s1").await })
    };

    let first = first.await.unwrap();
    let second = second.await.unwrap();

    assert_eq!(first.intent(), Some("vm_status"));
    assert_eq!(first.source(), ResolutionSource::LlmAssisted);
    assert_eq!(second.intent(), Some("vm_restart"));
    assert_eq!(second.slot("vm_id"), Some(&json!(100)));
    assert_eq!(engine.calls(), 1);
}

/// Closing a session cancels its in-flight escalation; the late answer is
/// never applied and the session id starts fresh afterwards.
#[tokio::test]
async fn e2e_session_close_cancels_escalation() {
    let engine = MockLlmEngine::hit("vm_status", 0.9).with_delay(Duration::from_secs(5));
    let (h, _) = TestHarness::with_mock_llm(
        engine,
        NluConfig {
            llm_timeout_ms: 10_000,
            ..NluConfig::default()
        },
    );
    h.say("s1", "status of vm 100").await;

    let in_flight = {
        let resolver = Arc::clone(&h.resolver);
        tokio::spawn(async move { resolver.resolve("restart it", "s1").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.resolver.close_session("s1").await);

    let result = tokio::time::timeout(Duration::from_secs(2), in_flight)
        .await
        .expect("cancelled turn should finish promptly")
        .unwrap();
    assert_eq!(result.source(), ResolutionSource::LlmFallback);

    assert_eq!(h.turns("s1").await, 0);
    assert!(!h.resolver.close_session("never-opened").await);
}

/// Idle sessions are evicted once their TTL passes.
#[tokio::test]
async fn e2e_idle_sessions_evicted() {
    let h = TestHarness::with_config(NluConfig {
        session_ttl_secs: 0,
        ..NluConfig::default()
    });
    h.say("a", "status of vm 100").await;
    h.say("b", "status of vm 101").await;

    assert_eq!(h.resolver.evict_expired().await, 2);
    assert!(h.resolver.store().is_empty().await);
}
