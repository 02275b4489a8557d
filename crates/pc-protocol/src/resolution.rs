use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::intent::IntentCandidate;

/// Which path produced the final result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// Local pattern/lexicon pipeline only.
    Deterministic,
    /// The LLM's candidate won (or agreed with) arbitration.
    LlmAssisted,
    /// Escalation failed; the local candidate was used instead.
    LlmFallback,
    /// No actionable intent; a clarification prompt is attached.
    Unresolved,
}

/// Pipeline state for one utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Preprocessed,
    EntitiesExtracted,
    IntentScored,
    ContextResolved,
    LlmEscalated,
    Finalized,
    ClarificationRequired,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Preprocessed => "preprocessed",
            Self::EntitiesExtracted => "entities_extracted",
            Self::IntentScored => "intent_scored",
            Self::ContextResolved => "context_resolved",
            Self::LlmEscalated => "llm_escalated",
            Self::Finalized => "finalized",
            Self::ClarificationRequired => "clarification_required",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::ClarificationRequired)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final output of one resolution pass.
///
/// Either fully bound (`intent` set, `clarification_needed` empty) or
/// unresolved (`intent` empty, prompt set). The two constructors are the
/// only way to build one, so a partially bound actionable result cannot
/// exist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionResult {
    intent: Option<String>,
    slots: BTreeMap<String, Value>,
    confidence: f64,
    source: ResolutionSource,
    clarification_needed: Option<String>,
    stage: Stage,
    escalated: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    alternatives: Vec<String>,
}

impl ResolutionResult {
    /// Build an actionable result from a fully bound candidate.
    ///
    /// Returns `None` if any required slot is unbound.
    pub fn bound(
        candidate: &IntentCandidate,
        source: ResolutionSource,
        escalated: bool,
    ) -> Option<Self> {
        if !candidate.is_fully_bound() || source == ResolutionSource::Unresolved {
            return None;
        }
        let mut slots = BTreeMap::new();
        for entity in candidate.entities() {
            for (name, value) in entity.slot_values() {
                slots.entry(name.to_string()).or_insert(value);
            }
        }
        Some(Self {
            intent: Some(candidate.name.clone()),
            slots,
            confidence: candidate.confidence,
            source,
            clarification_needed: None,
            stage: Stage::Finalized,
            escalated,
            alternatives: Vec::new(),
        })
    }

    /// Build a clarification request.
    pub fn clarify(
        prompt: impl Into<String>,
        confidence: f64,
        alternatives: Vec<String>,
        escalated: bool,
    ) -> Self {
        Self {
            intent: None,
            slots: BTreeMap::new(),
            confidence: confidence.clamp(0.0, 1.0),
            source: ResolutionSource::Unresolved,
            clarification_needed: Some(prompt.into()),
            stage: Stage::ClarificationRequired,
            escalated,
            alternatives,
        }
    }

    pub fn intent(&self) -> Option<&str> {
        self.intent.as_deref()
    }

    /// Canonical executor parameters (`vm_id`, `memory_mb`, ...).
    pub fn slots(&self) -> &BTreeMap<String, Value> {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Option<&Value> {
        self.slots.get(name)
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn source(&self) -> ResolutionSource {
        self.source
    }

    pub fn clarification_needed(&self) -> Option<&str> {
        self.clarification_needed.as_deref()
    }

    /// Terminal stage: `Finalized` or `ClarificationRequired`.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Whether the LLM path was taken for this utterance.
    pub fn escalated(&self) -> bool {
        self.escalated
    }

    /// Candidate intent names offered when the request was ambiguous.
    pub fn alternatives(&self) -> &[String] {
        &self.alternatives
    }

    pub fn is_actionable(&self) -> bool {
        self.intent.is_some()
    }
}
