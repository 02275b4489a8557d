//! Resolution orchestrator — drives one utterance through the pipeline.
//!
//! ```text
//! received → preprocessed → entities_extracted → intent_scored
//!          → context_resolved → [llm_escalated] → finalized | clarification_required
//! ```
//!
//! Turns of one session are serialized on the session's context lock, so a
//! turn always sees every earlier turn of its conversation. Different
//! sessions never block each other. `resolve` never fails: every failure
//! path ends in a clarification result.

pub mod arbitration;

use std::sync::Arc;

use pc_protocol::{
    Entity, EntityKind, EntityValue, IntentCandidate, ResolutionResult, Span, Stage, Utterance,
};

use crate::config::NluConfig;
use crate::context::{ContextStore, ConversationContext, Session, Turn, has_anaphora};
use crate::entities::EntityExtractor;
use crate::error::{LlmError, NluResult};
use crate::inference::{HttpLlmEngine, LlmEngine, LlmRequest, LlmResponse};
use crate::intents::{IntentIdentifier, IntentRegistry, Ranking, bind_entities};
use crate::preprocess::preprocess;

pub use arbitration::{ArbitrationPolicy, LocalOutcome, Verdict};

const EMPTY_PROMPT: &str = "Please enter a command.";
const UNRESOLVED_PROMPT: &str =
    "Sorry, I didn't understand that. Try something like \"status of vm 100\".";

/// Stateful resolver shared by every session.
pub struct Resolver {
    config: NluConfig,
    extractor: EntityExtractor,
    identifier: IntentIdentifier,
    store: ContextStore,
    engine: Option<Arc<dyn LlmEngine>>,
    policy: ArbitrationPolicy,
}

impl Resolver {
    /// Resolver over the built-in intent catalog. Builds the HTTP LLM
    /// engine when `llm_enabled` is set.
    pub fn new(config: NluConfig) -> NluResult<Self> {
        Self::with_registry(config, IntentRegistry::with_defaults())
    }

    /// Resolver over a custom registry. `config.disabled_intents` must name
    /// registered intents.
    pub fn with_registry(config: NluConfig, mut registry: IntentRegistry) -> NluResult<Self> {
        config.validate()?;
        for name in &config.disabled_intents {
            registry.disable(name)?;
        }

        let engine: Option<Arc<dyn LlmEngine>> = if config.llm_enabled {
            let engine = HttpLlmEngine::new(&config.llm, config.llm_timeout_ms)?;
            tracing::info!(endpoint = %engine.endpoint(), "LLM escalation enabled");
            Some(Arc::new(engine))
        } else {
            tracing::info!("LLM escalation disabled, deterministic pipeline only");
            None
        };

        let policy = ArbitrationPolicy {
            ambiguity_threshold: config.ambiguity_threshold,
            floor: config.intent_floor,
            llm_weight: config.llm_weight,
        };
        let identifier =
            IntentIdentifier::new(registry, config.intent_floor, config.ambiguity_threshold);
        let store = ContextStore::new(config.context_buffer_size, config.session_ttl());

        tracing::info!(
            intents = identifier.registry().len(),
            context_buffer_size = config.context_buffer_size,
            "resolver ready"
        );

        Ok(Self {
            config,
            extractor: EntityExtractor::with_defaults(),
            identifier,
            store,
            engine,
            policy,
        })
    }

    /// Replace the LLM engine. Escalation still requires `llm_enabled`.
    pub fn with_engine(mut self, engine: Arc<dyn LlmEngine>) -> Self {
        tracing::debug!(engine = engine.name(), "LLM engine installed");
        self.engine = Some(engine);
        self
    }

    pub fn config(&self) -> &NluConfig {
        &self.config
    }

    pub fn registry(&self) -> &IntentRegistry {
        self.identifier.registry()
    }

    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    /// Close a session and cancel its in-flight escalation.
    pub async fn close_session(&self, session_id: &str) -> bool {
        self.store.close(session_id).await
    }

    /// Drop idle sessions. Returns how many were evicted.
    pub async fn evict_expired(&self) -> usize {
        self.store.evict_expired().await
    }

    /// Resolve one utterance within `session_id`'s conversation.
    pub async fn resolve(&self, utterance: &str, session_id: &str) -> ResolutionResult {
        let (session, mut ctx) = self.store.checkout(session_id).await;
        let received = Utterance::new(utterance, session_id);
        stage(session_id, Stage::Received);

        let input = preprocess(utterance);
        stage(session_id, Stage::Preprocessed);
        if input.is_empty() {
            let result = ResolutionResult::clarify(EMPTY_PROMPT, 0.0, Vec::new(), false);
            stage(session_id, result.stage());
            return result;
        }

        let entities = self.extractor.extract(&input);
        tracing::debug!(session_id, entities = entities.len(), "entities extracted");
        stage(session_id, Stage::EntitiesExtracted);

        let ranking = self.identifier.identify(&input, &entities);
        stage(session_id, Stage::IntentScored);

        if has_anaphora(&input) {
            tracing::debug!(session_id, "utterance refers to an earlier turn");
        }
        let local = self.local_outcome(&ctx, &ranking, &entities);
        stage(session_id, Stage::ContextResolved);

        let escalated = self.should_escalate(&local);
        let verdict = if escalated {
            stage(session_id, Stage::LlmEscalated);
            match self.escalate(&session, utterance).await {
                Ok(response) => match self.llm_candidate(&response, utterance, &entities) {
                    Ok(candidate) => self.policy.arbitrate(local, candidate),
                    Err(e) => self.recover(session_id, &e, local),
                },
                Err(e) => self.recover(session_id, &e, local),
            }
        } else {
            self.policy.local_only(local)
        };

        let (result, turn) = self.finalize(verdict, &ctx, received, entities, escalated);
        stage(session_id, result.stage());

        // The guard excludes other turns of this session; a close is the
        // only thing that can have happened since checkout.
        if session.is_closed() {
            tracing::debug!(session_id, "session closed during turn, not recorded");
        } else {
            ctx.push(turn);
        }

        tracing::info!(
            session_id,
            intent = result.intent().unwrap_or("-"),
            confidence = result.confidence(),
            source = ?result.source(),
            escalated,
            "utterance resolved"
        );
        result
    }

    // ── Stages ──────────────────────────────────────────────────

    fn local_outcome(
        &self,
        ctx: &ConversationContext,
        ranking: &Ranking,
        entities: &[Entity],
    ) -> LocalOutcome {
        if let Some(top) = ranking.decisive() {
            return LocalOutcome::Decided(top.clone());
        }
        // A bare answer to the previous clarification ("vm 100") scores
        // weakly on its own, so the pending intent takes precedence.
        if let Some(resumed) = ctx.resume_pending(entities) {
            return LocalOutcome::Decided(resumed);
        }
        if ranking.ambiguous {
            let contenders = ranking
                .contenders(self.identifier.ambiguity_threshold())
                .into_iter()
                .cloned()
                .collect();
            return LocalOutcome::Ambiguous(contenders);
        }
        LocalOutcome::Unresolved
    }

    fn should_escalate(&self, local: &LocalOutcome) -> bool {
        if !self.config.llm_enabled || self.engine.is_none() {
            return false;
        }
        match local {
            LocalOutcome::Decided(c) => c.confidence < self.config.llm_confidence_threshold,
            LocalOutcome::Ambiguous(_) | LocalOutcome::Unresolved => true,
        }
    }

    /// Ask the LLM, bounded by the configured timeout and the session's
    /// cancellation token. The call runs on its own task so that both
    /// bounds can abort it.
    async fn escalate(&self, session: &Session, utterance: &str) -> Result<LlmResponse, LlmError> {
        let Some(engine) = self.engine.clone() else {
            return Err(LlmError::Unavailable("no LLM engine configured".into()));
        };
        let request = LlmRequest::new(utterance, self.identifier.registry());
        tracing::debug!(session_id = %session.id(), engine = engine.name(), "escalating to LLM");

        let mut task = tokio::spawn(async move { engine.infer(&request).await });
        tokio::select! {
            joined = &mut task => joined
                .unwrap_or_else(|e| Err(LlmError::Unavailable(format!("LLM task failed: {e}")))),
            _ = tokio::time::sleep(self.config.llm_timeout()) => {
                task.abort();
                Err(LlmError::Timeout(self.config.llm_timeout_ms))
            }
            _ = session.cancellation().cancelled() => {
                task.abort();
                Err(LlmError::Cancelled)
            }
        }
    }

    /// Turn a validated LLM response into a bound candidate. Entities
    /// extracted from this utterance are bound first; the LLM's only fill
    /// the remaining slots. Unknown intents and unconvertible entity values
    /// are malformed.
    fn llm_candidate(
        &self,
        response: &LlmResponse,
        raw: &str,
        extracted: &[Entity],
    ) -> Result<IntentCandidate, LlmError> {
        let mut proposed_entities = Vec::with_capacity(response.entities.len());
        for proposed in &response.entities {
            let value = EntityValue::from_json(proposed.kind, &proposed.value).ok_or_else(|| {
                LlmError::Malformed(format!(
                    "{} value does not fit: {}",
                    proposed.kind, proposed.value
                ))
            })?;
            let span = locate(raw, &value);
            proposed_entities.push(Entity::explicit(proposed.kind, value, span));
        }
        let mut candidate = self
            .identifier
            .candidate_for(&response.intent, response.confidence, extracted)
            .ok_or_else(|| LlmError::Malformed(format!("unknown intent: {}", response.intent)))?;
        bind_entities(&mut candidate, &proposed_entities);
        Ok(candidate)
    }

    fn recover(&self, session_id: &str, error: &LlmError, local: LocalOutcome) -> Verdict {
        tracing::warn!(
            session_id,
            error = %error,
            kind = error.kind(),
            "LLM escalation failed, using local result"
        );
        self.policy.fallback(local)
    }

    /// Complete the chosen candidate from context and build the result
    /// together with the turn to record.
    fn finalize(
        &self,
        verdict: Verdict,
        ctx: &ConversationContext,
        utterance: Utterance,
        mut entities: Vec<Entity>,
        escalated: bool,
    ) -> (ResolutionResult, Turn) {
        match verdict {
            Verdict::Accept {
                mut candidate,
                source,
            } => {
                ctx.fill(&mut candidate);
                for bound in candidate.entities() {
                    if !entities.contains(bound) {
                        entities.push(bound.clone());
                    }
                }
                match ResolutionResult::bound(&candidate, source, escalated) {
                    Some(result) => (result, Turn::new(utterance, Some(candidate), entities, false)),
                    None => {
                        let prompt = self.missing_slots_prompt(&candidate);
                        let result =
                            ResolutionResult::clarify(prompt, candidate.confidence, Vec::new(), escalated);
                        (result, Turn::new(utterance, Some(candidate), entities, true))
                    }
                }
            }
            Verdict::Ambiguous(candidates) => {
                let prompt = self.ambiguity_prompt(&candidates);
                let confidence = candidates.first().map_or(0.0, |c| c.confidence);
                let alternatives = candidates.into_iter().map(|c| c.name).collect();
                let result = ResolutionResult::clarify(prompt, confidence, alternatives, escalated);
                (result, Turn::new(utterance, None, entities, false))
            }
            Verdict::Unresolved => {
                let result = ResolutionResult::clarify(UNRESOLVED_PROMPT, 0.0, Vec::new(), escalated);
                (result, Turn::new(utterance, None, entities, false))
            }
        }
    }

    // ── Prompts ─────────────────────────────────────────────────

    fn describe_intent<'a>(&'a self, name: &'a str) -> &'a str {
        self.identifier
            .registry()
            .get(name)
            .map_or(name, |t| t.description.as_str())
    }

    fn missing_slots_prompt(&self, candidate: &IntentCandidate) -> String {
        let needed: Vec<&str> = candidate
            .missing_slots()
            .into_iter()
            .map(slot_question)
            .collect();
        format!(
            "To {}, I need to know {}.",
            self.describe_intent(&candidate.name),
            join_with(&needed, "and")
        )
    }

    fn ambiguity_prompt(&self, candidates: &[IntentCandidate]) -> String {
        let options: Vec<&str> = candidates
            .iter()
            .map(|c| self.describe_intent(&c.name))
            .collect();
        format!("Did you mean to {}?", join_with(&options, "or"))
    }
}

fn stage(session_id: &str, stage: Stage) {
    tracing::debug!(session_id, stage = stage.as_str(), "stage reached");
}

/// Phrase asking for one missing slot.
fn slot_question(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::VmId => "which VM (e.g. vm 100)",
        EntityKind::ContainerId => "which container (e.g. ct 101)",
        EntityKind::ResourceSpec => "the resources (e.g. 4GB RAM, 2 CPUs)",
        EntityKind::Ip => "the IP address (e.g. 192.168.1.50/24)",
        EntityKind::Path => "the path (e.g. /mnt/media)",
        EntityKind::Duration => "how often (e.g. every night)",
        EntityKind::Hostname => "the domain (e.g. cloud.example.com)",
        EntityKind::ServiceName => "which service (e.g. nextcloud)",
        EntityKind::FreeText => "the name",
    }
}

/// "a", "a or b", "a, b or c".
fn join_with(items: &[&str], conjunction: &str) -> String {
    match items {
        [] => String::new(),
        [only] => (*only).to_string(),
        [init @ .., last] => format!("{} {conjunction} {last}", init.join(", ")),
    }
}

/// Find an LLM-proposed value verbatim in the raw utterance (ASCII case
/// insensitive, whole tokens only). Values the user did not type have no
/// span.
fn locate(raw: &str, value: &EntityValue) -> Option<Span> {
    if matches!(value, EntityValue::Resources(_) | EntityValue::Duration { .. }) {
        return None;
    }
    let needle = value.to_string().to_ascii_lowercase();
    if needle.is_empty() {
        return None;
    }
    let haystack = raw.to_ascii_lowercase();
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    haystack.match_indices(needle.as_str()).find_map(|(start, _)| {
        let end = start + needle.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        (!before.is_some_and(is_word) && !after.is_some_and(is_word))
            .then(|| Span::new(start, end))
    })
}
