//! Resolver configuration, loadable from TOML or environment.
//!
//! Every field has a default, and the defaults give a fully working
//! deterministic pipeline (`llm_enabled = false`).

use std::time::Duration;

use serde::Deserialize;

use crate::error::{NluError, NluResult};

/// Top-level configuration for the resolution pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct NluConfig {
    /// Escalate low-confidence or ambiguous turns to the LLM service.
    #[serde(default)]
    pub llm_enabled: bool,
    /// Local top confidence below this triggers escalation.
    #[serde(default = "default_llm_confidence_threshold")]
    pub llm_confidence_threshold: f64,
    /// Top two candidates closer than this are ambiguous.
    #[serde(default = "default_ambiguity_threshold")]
    pub ambiguity_threshold: f64,
    /// Turns remembered per conversation.
    #[serde(default = "default_context_buffer_size")]
    pub context_buffer_size: usize,
    /// Upper bound on one LLM round trip.
    #[serde(default = "default_llm_timeout_ms")]
    pub llm_timeout_ms: u64,
    /// Candidates scoring below this are discarded.
    #[serde(default = "default_intent_floor")]
    pub intent_floor: f64,
    /// Multiplier applied to LLM confidence during arbitration.
    #[serde(default = "default_llm_weight")]
    pub llm_weight: f64,
    /// Idle sessions older than this are evicted.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Registered intents to switch off. Unknown names are rejected when
    /// the resolver is built.
    #[serde(default)]
    pub disabled_intents: Vec<String>,
    /// LLM endpoint settings.
    #[serde(default)]
    pub llm: LlmConfig,
}

/// HTTP endpoint of the external LLM inference service.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Full URL accepting `{utterance, intent_vocabulary, entity_schema}`.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Optional bearer token.
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_llm_confidence_threshold() -> f64 {
    0.6
}
fn default_ambiguity_threshold() -> f64 {
    0.05
}
fn default_context_buffer_size() -> usize {
    10
}
fn default_llm_timeout_ms() -> u64 {
    3000
}
fn default_intent_floor() -> f64 {
    0.15
}
fn default_llm_weight() -> f64 {
    1.0
}
fn default_session_ttl_secs() -> u64 {
    1800
}
fn default_endpoint() -> String {
    "http://localhost:8088/v1/resolve".into()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
        }
    }
}

impl Default for NluConfig {
    fn default() -> Self {
        Self {
            llm_enabled: false,
            llm_confidence_threshold: default_llm_confidence_threshold(),
            ambiguity_threshold: default_ambiguity_threshold(),
            context_buffer_size: default_context_buffer_size(),
            llm_timeout_ms: default_llm_timeout_ms(),
            intent_floor: default_intent_floor(),
            llm_weight: default_llm_weight(),
            session_ttl_secs: default_session_ttl_secs(),
            disabled_intents: Vec::new(),
            llm: LlmConfig::default(),
        }
    }
}

impl NluConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: &str) -> NluResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PC_*` environment overrides on top of `self`.
    pub fn with_env_overrides(self) -> NluResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup (env in production,
    /// a map in tests).
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> NluResult<Self> {
        if let Some(v) = lookup("PC_LLM_ENABLED") {
            self.llm_enabled = v.eq_ignore_ascii_case("true") || v == "1";
        }
        if let Some(v) = lookup("PC_LLM_ENDPOINT") {
            self.llm.endpoint = v;
        }
        if let Some(v) = lookup("PC_LLM_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = lookup("PC_LLM_TIMEOUT_MS") {
            self.llm_timeout_ms = parse_override("PC_LLM_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("PC_LLM_CONFIDENCE_THRESHOLD") {
            self.llm_confidence_threshold = parse_override("PC_LLM_CONFIDENCE_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("PC_AMBIGUITY_THRESHOLD") {
            self.ambiguity_threshold = parse_override("PC_AMBIGUITY_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("PC_CONTEXT_BUFFER_SIZE") {
            self.context_buffer_size = parse_override("PC_CONTEXT_BUFFER_SIZE", &v)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject values that would break pipeline invariants.
    pub fn validate(&self) -> NluResult<()> {
        for (name, value) in [
            ("llm_confidence_threshold", self.llm_confidence_threshold),
            ("ambiguity_threshold", self.ambiguity_threshold),
            ("intent_floor", self.intent_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(NluError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if !(self.llm_weight.is_finite() && self.llm_weight > 0.0) {
            return Err(NluError::InvalidConfig(format!(
                "llm_weight must be positive, got {}",
                self.llm_weight
            )));
        }
        if self.context_buffer_size == 0 {
            return Err(NluError::InvalidConfig(
                "context_buffer_size must be at least 1".into(),
            ));
        }
        if self.llm_timeout_ms == 0 {
            return Err(NluError::InvalidConfig(
                "llm_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_millis(self.llm_timeout_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> NluResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| NluError::InvalidConfig(format!("{key}: cannot parse {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config() {
        let config = NluConfig::default();
        assert!(!config.llm_enabled);
        assert_eq!(config.context_buffer_size, 10);
        assert_eq!(config.llm_timeout_ms, 3000);
        assert!((config.ambiguity_threshold - 0.05).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let config: NluConfig = toml::from_str("").unwrap();
        assert!(!config.llm_enabled);
        assert_eq!(config.llm.endpoint, "http://localhost:8088/v1/resolve");
        assert!(config.disabled_intents.is_empty());
    }

    #[test]
    fn deserialize_full_config() {
        let toml = r#"
llm_enabled = true
llm_confidence_threshold = 0.7
ambiguity_threshold = 0.1
context_buffer_size = 5
llm_timeout_ms = 1500
disabled_intents = ["vm_delete"]

[llm]
endpoint = "http://192.168.1.50:9000/resolve"
api_key = "secret"
"#;
        let config: NluConfig = toml::from_str(toml).unwrap();
        assert!(config.llm_enabled);
        assert_eq!(config.context_buffer_size, 5);
        assert_eq!(config.llm_timeout(), Duration::from_millis(1500));
        assert_eq!(config.disabled_intents, vec!["vm_delete".to_string()]);
        assert_eq!(config.llm.endpoint, "http://192.168.1.50:9000/resolve");
        assert_eq!(config.llm.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("PC_LLM_ENABLED", "1"),
            ("PC_LLM_TIMEOUT_MS", "250"),
            ("PC_CONTEXT_BUFFER_SIZE", "3"),
        ]
        .into_iter()
        .collect();
        let config = NluConfig::default()
            .with_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert!(config.llm_enabled);
        assert_eq!(config.llm_timeout_ms, 250);
        assert_eq!(config.context_buffer_size, 3);
    }

    #[test]
    fn bad_override_is_rejected() {
        let result = NluConfig::default().with_overrides(|k| {
            (k == "PC_AMBIGUITY_THRESHOLD").then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(NluError::InvalidConfig(_))));
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let config = NluConfig {
            llm_confidence_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = NluConfig {
            context_buffer_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = NluConfig {
            llm_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
