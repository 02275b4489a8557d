//! Shared test harness for E2E integration tests.
//!
//! Wraps a `Resolver` behind an `Arc` so tests can drive several sessions
//! concurrently, and mounts canned LLM responses on a wiremock server.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pc_nlu::inference::{LlmEngine, MockLlmEngine};
use pc_nlu::{NluConfig, Resolver};
use pc_protocol::ResolutionResult;

pub const LLM_PATH: &str = "/v1/resolve";

/// End-to-end test harness around one shared resolver.
pub struct TestHarness {
    pub resolver: Arc<Resolver>,
}

impl TestHarness {
    /// Deterministic pipeline with default thresholds.
    pub fn deterministic() -> Self {
        Self::with_config(NluConfig::default())
    }

    pub fn with_config(config: NluConfig) -> Self {
        Self {
            resolver: Arc::new(Resolver::new(config).unwrap()),
        }
    }

    /// LLM escalation through the real HTTP engine, pointed at `server`.
    pub fn with_llm_server(server: &MockServer, timeout_ms: u64) -> Self {
        let mut config = NluConfig {
            llm_enabled: true,
            llm_timeout_ms: timeout_ms,
            ..NluConfig::default()
        };
        config.llm.endpoint = format!("{}{LLM_PATH}", server.uri());
        Self::with_config(config)
    }

    /// LLM escalation through a mock engine. Returns the engine so tests
    /// can count calls.
    pub fn with_mock_llm(engine: MockLlmEngine, config: NluConfig) -> (Self, Arc<MockLlmEngine>) {
        let engine = Arc::new(engine);
        let config = NluConfig {
            llm_enabled: true,
            ..config
        };
        let resolver = Resolver::new(config)
            .unwrap()
            .with_engine(Arc::clone(&engine) as Arc<dyn LlmEngine>);
        (
            Self {
                resolver: Arc::new(resolver),
            },
            engine,
        )
    }

    /// Resolve one utterance in `session`.
    pub async fn say(&self, session: &str, text: &str) -> ResolutionResult {
        self.resolver.resolve(text, session).await
    }

    /// Number of turns recorded for `session`.
    pub async fn turns(&self, session: &str) -> usize {
        let session = self.resolver.store().session(session).await;
        session.lock().await.len()
    }
}

/// Serve `body` as the LLM response for every request.
pub async fn mount_llm_json(server: &MockServer, body: Value) {
    Mock::given(method("POST"))
        .and(path(LLM_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Serve an arbitrary status and raw body.
pub async fn mount_llm_raw(server: &MockServer, status: u16, body: &str) {
    Mock::given(method("POST"))
        .and(path(LLM_PATH))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

/// Answer only after `delay`.
pub async fn mount_llm_slow(server: &MockServer, delay: Duration) {
    Mock::given(method("POST"))
        .and(path(LLM_PATH))
        .respond_with(ResponseTemplate::new(200).set_delay(delay))
        .mount(server)
        .await;
}
