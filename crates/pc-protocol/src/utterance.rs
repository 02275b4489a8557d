use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::Span;

/// One raw natural-language input from an operator.
///
/// Immutable once received; the unit of work for one pipeline pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    /// Raw text exactly as typed.
    pub text: String,
    /// When the utterance was received.
    pub received_at: DateTime<Utc>,
    /// Who sent it (operator / session owner).
    pub user_id: String,
}

impl Utterance {
    pub fn new(text: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            received_at: Utc::now(),
            user_id: user_id.into(),
        }
    }
}

/// Coarse, part-of-speech-like token class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenTag {
    /// Alphabetic word (may contain inner `-`, `_` or `'`).
    Word,
    /// Integer or decimal number.
    Number,
    /// Punctuation only.
    Punct,
    /// Anything mixed: `4gb`, `192.168.1.1`, `/var/lib/vz`, `web.example.com`.
    Symbol,
}

/// A single token produced by the preprocessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Surface form, verbatim from the raw utterance.
    pub surface: String,
    /// Case-folded, lemmatized form. Equal to the lowercased surface for
    /// non-word tokens.
    pub lemma: String,
    /// Byte span into the raw utterance.
    pub span: Span,
    pub tag: TokenTag,
    /// Flagged (not removed) stop word.
    pub stop: bool,
}

impl Token {
    /// Whether the token carries meaning for lexical scoring.
    pub fn is_content(&self) -> bool {
        !self.stop && self.tag != TokenTag::Punct
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utterance_roundtrip() {
        let u = Utterance::new("status of vm 100", "admin@pve");
        let json = serde_json::to_string(&u).unwrap();
        let back: Utterance = serde_json::from_str(&json).unwrap();
        assert_eq!(back, u);
    }

    #[test]
    fn token_tag_serialization() {
        assert_eq!(
            serde_json::to_string(&TokenTag::Symbol).unwrap(),
            r#""symbol""#
        );
    }

    #[test]
    fn punct_and_stop_tokens_are_not_content() {
        let punct = Token {
            surface: ",".into(),
            lemma: ",".into(),
            span: Span::new(3, 4),
            tag: TokenTag::Punct,
            stop: false,
        };
        let stop = Token {
            surface: "the".into(),
            lemma: "the".into(),
            span: Span::new(0, 3),
            tag: TokenTag::Word,
            stop: true,
        };
        assert!(!punct.is_content());
        assert!(!stop.is_content());
    }
}
