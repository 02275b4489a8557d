//! Intent identification — template registry and candidate scoring.
//!
//! Each registered `IntentTemplate` carries weighted trigger phrases and the
//! entity kinds it needs. Scoring for one template:
//!
//! - `lexical = min(1, Σ matched trigger weights / LEXICAL_SATURATION)`,
//!   where a phrase matches once if its lemmas occur consecutively;
//! - `coverage = present required kinds / required kinds` (1.0 when none);
//! - `confidence = 0` without lexical evidence, otherwise
//!   `LEXICAL_SHARE · lexical + (1 − LEXICAL_SHARE) · coverage`.
//!
//! Candidates under the floor are dropped. When the top two are closer than
//! the ambiguity threshold the ranking is ambiguous and nothing is picked.

pub mod catalog;

use std::collections::HashSet;

use pc_protocol::{Entity, EntityKind, EntityValue, IntentCandidate, TokenTag};
use serde::Serialize;

use crate::error::{NluError, NluResult};
use crate::preprocess::{Preprocessed, preprocess};

/// Summed trigger weight at which lexical evidence saturates.
pub const LEXICAL_SATURATION: f64 = 1.5;
/// Share of the final confidence carried by lexical evidence.
pub const LEXICAL_SHARE: f64 = 0.7;

// ── Templates ───────────────────────────────────────────────────

/// A weighted trigger phrase, stored as lemmas.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub lemmas: Vec<String>,
    pub weight: f64,
}

impl Trigger {
    /// Normalize `phrase` through the preprocessor so templates can be
    /// written with ordinary inflected words ("powered off", "VMs").
    pub fn new(phrase: &str, weight: f64) -> Self {
        Self {
            lemmas: content_sequence(&preprocess(phrase))
                .into_iter()
                .map(str::to_string)
                .collect(),
            weight,
        }
    }

    fn matches(&self, lemmas: &[&str]) -> bool {
        let n = self.lemmas.len();
        n > 0
            && lemmas
                .windows(n)
                .any(|w| w.iter().zip(&self.lemmas).all(|(a, b)| *a == b.as_str()))
    }
}

/// A registered administrative action.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentTemplate {
    pub name: String,
    /// Short verb phrase ("restart a VM"), used in clarification prompts
    /// and the LLM vocabulary.
    pub description: String,
    pub triggers: Vec<Trigger>,
    pub required: Vec<EntityKind>,
    pub optional: Vec<EntityKind>,
}

impl IntentTemplate {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            triggers: Vec::new(),
            required: Vec::new(),
            optional: Vec::new(),
        }
    }

    pub fn trigger(mut self, phrase: &str, weight: f64) -> Self {
        self.triggers.push(Trigger::new(phrase, weight));
        self
    }

    pub fn requires(mut self, kind: EntityKind) -> Self {
        self.required.push(kind);
        self
    }

    pub fn accepts(mut self, kind: EntityKind) -> Self {
        self.optional.push(kind);
        self
    }

    fn lexical_score(&self, lemmas: &[&str]) -> f64 {
        let sum: f64 = self
            .triggers
            .iter()
            .filter(|t| t.matches(lemmas))
            .map(|t| t.weight)
            .sum();
        (sum / LEXICAL_SATURATION).min(1.0)
    }

    fn coverage(&self, entities: &[Entity]) -> f64 {
        if self.required.is_empty() {
            return 1.0;
        }
        let present = self
            .required
            .iter()
            .filter(|k| entities.iter().any(|e| e.kind == **k))
            .count();
        present as f64 / self.required.len() as f64
    }

    /// Confidence of this template for the given utterance.
    pub fn score(&self, lemmas: &[&str], entities: &[Entity]) -> f64 {
        let lexical = self.lexical_score(lemmas);
        if lexical <= 0.0 {
            return 0.0;
        }
        LEXICAL_SHARE * lexical + (1.0 - LEXICAL_SHARE) * self.coverage(entities)
    }

    /// An unbound candidate for this template.
    pub fn candidate(&self, confidence: f64) -> IntentCandidate {
        IntentCandidate::new(
            self.name.clone(),
            confidence,
            self.required.clone(),
            self.optional.clone(),
        )
    }
}

/// Lemmas of every non-punctuation token, in order.
fn content_sequence(input: &Preprocessed) -> Vec<&str> {
    input
        .tokens
        .iter()
        .filter(|t| t.tag != TokenTag::Punct)
        .map(|t| t.lemma.as_str())
        .collect()
}

// ── Registry ────────────────────────────────────────────────────

/// One entry of the intent vocabulary sent to the LLM.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VocabularyEntry {
    pub name: String,
    pub description: String,
    pub required_slots: Vec<EntityKind>,
    pub optional_slots: Vec<EntityKind>,
}

/// Ordered set of intent templates. Registry order breaks scoring ties.
#[derive(Debug, Clone, Default)]
pub struct IntentRegistry {
    templates: Vec<IntentTemplate>,
    disabled: HashSet<String>,
}

impl IntentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in catalog.
    pub fn with_defaults() -> Self {
        Self {
            templates: catalog::all_intents(),
            disabled: HashSet::new(),
        }
    }

    pub fn register(&mut self, template: IntentTemplate) -> NluResult<()> {
        if self.templates.iter().any(|t| t.name == template.name) {
            return Err(NluError::DuplicateIntent(template.name));
        }
        self.templates.push(template);
        Ok(())
    }

    /// Switch a registered intent off. Unknown names are a contract
    /// violation.
    pub fn disable(&mut self, name: &str) -> NluResult<()> {
        if !self.templates.iter().any(|t| t.name == name) {
            return Err(NluError::UnknownIntent(name.to_string()));
        }
        self.disabled.insert(name.to_string());
        Ok(())
    }

    /// Enabled templates in registry order.
    pub fn enabled(&self) -> impl Iterator<Item = &IntentTemplate> {
        self.templates
            .iter()
            .filter(|t| !self.disabled.contains(&t.name))
    }

    /// Look up an enabled template.
    pub fn get(&self, name: &str) -> Option<&IntentTemplate> {
        self.enabled().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.enabled().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.enabled().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn vocabulary(&self) -> Vec<VocabularyEntry> {
        self.enabled()
            .map(|t| VocabularyEntry {
                name: t.name.clone(),
                description: t.description.clone(),
                required_slots: t.required.clone(),
                optional_slots: t.optional.clone(),
            })
            .collect()
    }
}

// ── Identification ──────────────────────────────────────────────

/// Candidates above the floor, best first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ranking {
    pub candidates: Vec<IntentCandidate>,
    pub ambiguous: bool,
}

impl Ranking {
    pub fn top(&self) -> Option<&IntentCandidate> {
        self.candidates.first()
    }

    pub fn is_unresolved(&self) -> bool {
        self.candidates.is_empty()
    }

    /// The candidate to act on: the top one, unless the ranking is
    /// ambiguous.
    pub fn decisive(&self) -> Option<&IntentCandidate> {
        if self.ambiguous { None } else { self.top() }
    }

    /// Every candidate within `threshold` of the top one.
    pub fn contenders(&self, threshold: f64) -> Vec<&IntentCandidate> {
        let Some(top) = self.top() else {
            return Vec::new();
        };
        self.candidates
            .iter()
            .take_while(|c| top.confidence - c.confidence < threshold)
            .collect()
    }
}

/// Scores utterances against the registry and binds entities to slots.
#[derive(Debug, Clone)]
pub struct IntentIdentifier {
    registry: IntentRegistry,
    floor: f64,
    ambiguity_threshold: f64,
}

impl IntentIdentifier {
    pub fn new(registry: IntentRegistry, floor: f64, ambiguity_threshold: f64) -> Self {
        Self {
            registry,
            floor,
            ambiguity_threshold,
        }
    }

    pub fn registry(&self) -> &IntentRegistry {
        &self.registry
    }

    pub fn ambiguity_threshold(&self) -> f64 {
        self.ambiguity_threshold
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    /// Rank every enabled intent for this utterance.
    pub fn identify(&self, input: &Preprocessed, entities: &[Entity]) -> Ranking {
        let lemmas = content_sequence(input);
        let mut candidates: Vec<IntentCandidate> = self
            .registry
            .enabled()
            .filter_map(|t| {
                let confidence = t.score(&lemmas, entities);
                (confidence >= self.floor && confidence > 0.0).then(|| {
                    let mut candidate = t.candidate(confidence);
                    bind_entities(&mut candidate, entities);
                    candidate
                })
            })
            .collect();

        // Stable sort keeps registry order among equal scores.
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let ambiguous = is_ambiguous(&candidates, self.ambiguity_threshold);
        if let Some(top) = candidates.first() {
            tracing::debug!(
                intent = %top.name,
                confidence = top.confidence,
                candidates = candidates.len(),
                ambiguous,
                "intents scored"
            );
        }
        Ranking {
            candidates,
            ambiguous,
        }
    }

    /// Build a bound candidate for a named intent, as proposed by the LLM.
    /// Returns `None` for unknown or disabled intents.
    pub fn candidate_for(
        &self,
        name: &str,
        confidence: f64,
        entities: &[Entity],
    ) -> Option<IntentCandidate> {
        let template = self.registry.get(name)?;
        let mut candidate = template.candidate(confidence);
        bind_entities(&mut candidate, entities);
        Some(candidate)
    }
}

/// Whether the top two candidates are too close to call.
pub fn is_ambiguous(candidates: &[IntentCandidate], threshold: f64) -> bool {
    match candidates {
        [first, second, ..] => first.confidence - second.confidence < threshold,
        _ => false,
    }
}

/// Bind the first entity of each accepted kind. Resource specs are merged
/// field-wise, so "2GB RAM for vm 100 and 10GB disk" binds one spec.
pub fn bind_entities(candidate: &mut IntentCandidate, entities: &[Entity]) {
    for entity in entities {
        if !candidate.accepts(entity.kind) {
            continue;
        }
        if candidate.bind(entity.clone()) {
            continue;
        }
        if let EntityValue::Resources(extra) = &entity.value
            && let Some(existing) = candidate.bound_entities.get_mut(entity.kind.as_str())
            && let EntityValue::Resources(spec) = &existing.value
        {
            let merged = spec.merge(*extra);
            existing.value = EntityValue::Resources(merged);
            existing.span = match (existing.span, entity.span) {
                (Some(a), Some(b)) => Some(a.cover(&b)),
                (a, b) => a.or(b),
            };
        }
    }
}
