//! Error types for the resolution pipeline.
//!
//! Linguistic ambiguity is never an error — it surfaces as a clarification
//! prompt on the `ResolutionResult`. `NluError` covers contract violations
//! (bad configuration, unknown intent names) and is only returned while
//! building a resolver. `LlmError` covers escalation failures, which the
//! orchestrator always recovers from locally.

use thiserror::Error;

/// Setup-time contract violations.
#[derive(Debug, Error)]
pub enum NluError {
    #[error("unknown intent: {0}")]
    UnknownIntent(String),

    #[error("intent registered twice: {0}")]
    DuplicateIntent(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Convenience alias for setup-time results.
pub type NluResult<T> = Result<T, NluError>;

/// Failures of the optional LLM escalation path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    #[error("LLM service unavailable: {0}")]
    Unavailable(String),

    #[error("LLM request timed out after {0}ms")]
    Timeout(u64),

    #[error("malformed LLM response: {0}")]
    Malformed(String),

    #[error("LLM request cancelled")]
    Cancelled,
}

impl LlmError {
    /// Stable label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Timeout(_) => "timeout",
            Self::Malformed(_) => "malformed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<std::io::Error> for NluError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<toml::de::Error> for NluError {
    fn from(e: toml::de::Error) -> Self {
        Self::InvalidConfig(e.to_string())
    }
}
