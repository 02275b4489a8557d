use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::resolution::{ResolutionResult, ResolutionSource};
use crate::utterance::Utterance;

/// Envelope handed to the external command executor.
///
/// Only built from an actionable `ResolutionResult`; the executor never
/// sees a clarification request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Unique command ID (UUIDv7 for time-sortability).
    pub id: Uuid,
    /// Conversation the command came from.
    pub session_id: String,
    /// Who typed it.
    pub initiated_by: String,
    /// Original natural-language input from the operator.
    pub natural_language: String,
    /// Registered intent name the executor dispatches on.
    pub intent: String,
    /// Canonical parameters (`vm_id`, `memory_mb`, ...).
    pub params: BTreeMap<String, Value>,
    /// Resolution confidence (0.0 - 1.0).
    pub confidence: f64,
    /// Which resolution path produced the intent.
    pub source: ResolutionSource,
    /// When the envelope was created.
    pub created_at: DateTime<Utc>,
}

impl CommandEnvelope {
    /// Wrap a bound resolution. Returns `None` for clarification results.
    pub fn from_resolution(
        session_id: impl Into<String>,
        utterance: &Utterance,
        result: &ResolutionResult,
    ) -> Option<Self> {
        let intent = result.intent()?.to_string();
        Some(Self {
            id: Uuid::now_v7(),
            session_id: session_id.into(),
            initiated_by: utterance.user_id.clone(),
            natural_language: utterance.text.clone(),
            intent,
            params: result.slots().clone(),
            confidence: result.confidence(),
            source: result.source(),
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, EntityKind, EntityValue};
    use crate::intent::IntentCandidate;
    use serde_json::json;

    #[test]
    fn envelope_from_bound_result() {
        let mut c = IntentCandidate::new("vm_start", 0.92, vec![EntityKind::VmId], vec![]);
        c.bind(Entity::explicit(EntityKind::VmId, EntityValue::Id(104), None));
        let result = ResolutionResult::bound(&c, ResolutionSource::Deterministic, false).unwrap();
        let utterance = Utterance::new("start vm 104", "admin@pve");

        let env = CommandEnvelope::from_resolution("s-1", &utterance, &result).unwrap();
        assert_eq!(env.intent, "vm_start");
        assert_eq!(env.params["vm_id"], json!(104));
        assert_eq!(env.initiated_by, "admin@pve");
        assert_eq!(env.session_id, "s-1");
    }

    #[test]
    fn clarification_yields_no_envelope() {
        let result = ResolutionResult::clarify("Which VM?", 0.3, vec![], false);
        let utterance = Utterance::new("start it", "admin@pve");
        assert!(CommandEnvelope::from_resolution("s-1", &utterance, &result).is_none());
    }

    #[test]
    fn envelope_roundtrip() {
        let c = IntentCandidate::new("vm_list", 0.8, vec![], vec![]);
        let result = ResolutionResult::bound(&c, ResolutionSource::LlmAssisted, true).unwrap();
        let utterance = Utterance::new("what's running", "ops");
        let env = CommandEnvelope::from_resolution("s-2", &utterance, &result).unwrap();

        let json = serde_json::to_string(&env).unwrap();
        let back: CommandEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.intent, "vm_list");
        assert_eq!(back.source, ResolutionSource::LlmAssisted);
        assert!(back.params.is_empty());
    }
}
