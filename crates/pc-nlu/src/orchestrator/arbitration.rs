//! Arbitration between the local ranking and an LLM proposal.
//!
//! The LLM proposal is one more candidate. Its confidence is scaled by
//! `llm_weight` and compared with the local outcome under the same
//! ambiguity rule the identifier uses:
//!
//! - same intent as the local pick → merged, local entities first;
//! - one of several tied local contenders → that contender wins the tie;
//! - different intent within the threshold → still ambiguous;
//! - otherwise the higher confidence wins.

use pc_protocol::{IntentCandidate, ResolutionSource};

/// What the local pipeline concluded for a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalOutcome {
    /// A single candidate to act on.
    Decided(IntentCandidate),
    /// Several candidates too close to call, best first.
    Ambiguous(Vec<IntentCandidate>),
    Unresolved,
}

impl LocalOutcome {
    pub fn top_confidence(&self) -> f64 {
        match self {
            Self::Decided(c) => c.confidence,
            Self::Ambiguous(cs) => cs.first().map_or(0.0, |c| c.confidence),
            Self::Unresolved => 0.0,
        }
    }
}

/// Final decision for a turn, before slot completeness is checked.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accept {
        candidate: IntentCandidate,
        source: ResolutionSource,
    },
    Ambiguous(Vec<IntentCandidate>),
    Unresolved,
}

/// Thresholds used when comparing candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArbitrationPolicy {
    pub ambiguity_threshold: f64,
    pub floor: f64,
    pub llm_weight: f64,
}

impl ArbitrationPolicy {
    /// No LLM was consulted.
    pub fn local_only(&self, local: LocalOutcome) -> Verdict {
        self.from_local(local, ResolutionSource::Deterministic)
    }

    /// The LLM was consulted but failed.
    pub fn fallback(&self, local: LocalOutcome) -> Verdict {
        self.from_local(local, ResolutionSource::LlmFallback)
    }

    fn from_local(&self, local: LocalOutcome, source: ResolutionSource) -> Verdict {
        match local {
            LocalOutcome::Decided(candidate) => Verdict::Accept { candidate, source },
            LocalOutcome::Ambiguous(candidates) => Verdict::Ambiguous(candidates),
            LocalOutcome::Unresolved => Verdict::Unresolved,
        }
    }

    /// Weigh an LLM proposal against the local outcome.
    pub fn arbitrate(&self, local: LocalOutcome, mut llm: IntentCandidate) -> Verdict {
        llm.confidence = (llm.confidence * self.llm_weight).clamp(0.0, 1.0);

        if llm.confidence < self.floor {
            tracing::debug!(
                intent = %llm.name,
                confidence = llm.confidence,
                "LLM proposal below floor, ignored"
            );
            return self.local_only(local);
        }

        match local {
            LocalOutcome::Decided(local) if local.name == llm.name => Verdict::Accept {
                candidate: merge(local, &llm),
                source: ResolutionSource::LlmAssisted,
            },
            LocalOutcome::Decided(local) => {
                if (llm.confidence - local.confidence).abs() < self.ambiguity_threshold {
                    let mut tied = vec![local, llm];
                    tied.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
                    Verdict::Ambiguous(tied)
                } else if llm.confidence > local.confidence {
                    Verdict::Accept {
                        candidate: llm,
                        source: ResolutionSource::LlmAssisted,
                    }
                } else {
                    Verdict::Accept {
                        candidate: local,
                        source: ResolutionSource::Deterministic,
                    }
                }
            }
            LocalOutcome::Ambiguous(mut contenders) => {
                if let Some(pos) = contenders.iter().position(|c| c.name == llm.name) {
                    let chosen = contenders.swap_remove(pos);
                    return Verdict::Accept {
                        candidate: merge(chosen, &llm),
                        source: ResolutionSource::LlmAssisted,
                    };
                }
                let top = contenders.first().map_or(0.0, |c| c.confidence);
                if llm.confidence - top >= self.ambiguity_threshold {
                    Verdict::Accept {
                        candidate: llm,
                        source: ResolutionSource::LlmAssisted,
                    }
                } else {
                    contenders.push(llm);
                    contenders.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
                    Verdict::Ambiguous(contenders)
                }
            }
            LocalOutcome::Unresolved => Verdict::Accept {
                candidate: llm,
                source: ResolutionSource::LlmAssisted,
            },
        }
    }
}

/// Keep the local bindings (they carry verbatim spans) and let the LLM fill
/// the rest.
fn merge(mut local: IntentCandidate, llm: &IntentCandidate) -> IntentCandidate {
    for entity in llm.entities() {
        local.bind(entity.clone());
    }
    local.confidence = local.confidence.max(llm.confidence);
    local
}
