//! LLM escalation — second opinion for low-confidence or ambiguous turns.
//!
//! The orchestrator sends the raw utterance together with the intent
//! vocabulary and entity schema, and expects
//! `{intent, entities: [{kind, value}], confidence}` back. Engines report
//! failures as `LlmError`; the orchestrator always recovers locally.

pub mod http;
pub mod mock;

use async_trait::async_trait;
use pc_protocol::EntityKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LlmError;
use crate::intents::{IntentRegistry, VocabularyEntry};

pub use http::HttpLlmEngine;
pub use mock::MockLlmEngine;

/// Trait for external engines that resolve an utterance to an intent.
#[async_trait]
pub trait LlmEngine: Send + Sync {
    async fn infer(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Engine name (for logging).
    fn name(&self) -> &str;
}

// ── Request ─────────────────────────────────────────────────────

/// One entity kind as described to the LLM.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySchemaEntry {
    pub kind: EntityKind,
    pub description: String,
}

/// Escalation request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmRequest {
    pub utterance: String,
    pub intent_vocabulary: Vec<VocabularyEntry>,
    pub entity_schema: Vec<EntitySchemaEntry>,
}

impl LlmRequest {
    pub fn new(utterance: impl Into<String>, registry: &IntentRegistry) -> Self {
        Self {
            utterance: utterance.into(),
            intent_vocabulary: registry.vocabulary(),
            entity_schema: entity_schema(),
        }
    }
}

/// Every entity kind with its description.
pub fn entity_schema() -> Vec<EntitySchemaEntry> {
    EntityKind::ALL
        .iter()
        .map(|kind| EntitySchemaEntry {
            kind: *kind,
            description: kind.describe().to_string(),
        })
        .collect()
}

// ── Response ────────────────────────────────────────────────────

/// One entity proposed by the LLM. Unknown kinds fail deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmEntity {
    pub kind: EntityKind,
    pub value: Value,
}

/// Expected response shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub intent: String,
    pub entities: Vec<LlmEntity>,
    pub confidence: f64,
}

impl LlmResponse {
    /// Shape checks that serde cannot express.
    pub fn validate(&self) -> Result<(), LlmError> {
        if self.intent.trim().is_empty() {
            return Err(LlmError::Malformed("empty intent".into()));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(LlmError::Malformed(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        Ok(())
    }
}

/// Extract JSON from LLM output that may be wrapped in markdown code
/// fences.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }

    trimmed
}

/// Parse and validate a raw response body.
pub fn parse_response(body: &str) -> Result<LlmResponse, LlmError> {
    let json = extract_json(body);
    let response: LlmResponse = serde_json::from_str(json)
        .map_err(|e| LlmError::Malformed(format!("{e}: {}", truncate(body, 200))))?;
    response.validate()?;
    Ok(response)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
