//! free_text — quoted labels and `named` / `called` names.
//!
//! Lowest-priority fallback. A quoted span includes its quotes, so a
//! quoted label always outranks any entity inside it.

use std::sync::LazyLock;

use pc_protocol::{EntityKind, EntityValue, Span};
use regex::Regex;

use super::{Match, Recognizer, span_of};
use crate::preprocess::Preprocessed;

static DOUBLE_QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)"|“([^”]+)”|‘([^’]+)’"#).unwrap());

/// Single quotes only count when they open after a boundary and close
/// before one, so apostrophes ("it's") never start a label.
static SINGLE_QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[\s(=:])('([^'\n]+)')(?:$|[\s).,;:!?])").unwrap());

static NAMED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:named|called)\s+([a-z0-9](?:[\w\-.]*\w)?)").unwrap());

pub struct FreeTextRecognizer;

impl Recognizer for FreeTextRecognizer {
    fn kind(&self) -> EntityKind {
        EntityKind::FreeText
    }

    fn recognize(&self, input: &Preprocessed) -> Vec<Match> {
        let raw = &input.raw;
        let mut out = Vec::new();

        for caps in DOUBLE_QUOTED_RE.captures_iter(raw) {
            let Some(whole) = caps.get(0) else { continue };
            let inner = caps.iter().skip(1).flatten().next();
            if let Some(text) = inner.map(|m| m.as_str().trim()).filter(|t| !t.is_empty()) {
                out.push(Match::new(span_of(whole), EntityValue::Name(text.to_string())));
            }
        }

        for caps in SINGLE_QUOTED_RE.captures_iter(raw) {
            let (Some(quoted), Some(inner)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let text = inner.as_str().trim();
            if !text.is_empty() {
                out.push(Match::new(span_of(quoted), EntityValue::Name(text.to_string())));
            }
        }

        for caps in NAMED_RE.captures_iter(raw) {
            let Some(name) = caps.get(1) else { continue };
            let span = Span::new(name.start(), name.end());
            if out.iter().any(|m| m.span.overlaps(&span)) {
                continue;
            }
            out.push(Match::new(span, EntityValue::Name(name.as_str().to_string())));
        }
        out
    }
}
