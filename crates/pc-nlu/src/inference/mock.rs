//! Mock LLM engine for tests and offline development.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{LlmEngine, LlmEntity, LlmRequest, LlmResponse};
use crate::error::LlmError;
use pc_protocol::EntityKind;

/// Engine that answers every request with a fixed outcome, optionally
/// after a delay. Counts calls.
pub struct MockLlmEngine {
    outcome: Result<LlmResponse, LlmError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockLlmEngine {
    /// Always proposes `intent` with `confidence` and no entities.
    pub fn hit(intent: &str, confidence: f64) -> Self {
        Self::respond(LlmResponse {
            intent: intent.to_string(),
            entities: Vec::new(),
            confidence,
        })
    }

    pub fn respond(response: LlmResponse) -> Self {
        Self {
            outcome: Ok(response),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fails with `error`.
    pub fn failing(error: LlmError) -> Self {
        Self {
            outcome: Err(error),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Add an entity to the canned response.
    pub fn with_entity(mut self, kind: EntityKind, value: Value) -> Self {
        if let Ok(response) = &mut self.outcome {
            response.entities.push(LlmEntity { kind, value });
        }
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmEngine for MockLlmEngine {
    async fn infer(&self, _request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()
    }

    fn name(&self) -> &str {
        "mock"
    }
}
