//! container_id — LXC ids (`ct 101`, `lxc 102`) and named containers
//! (`container grafana`).

use std::sync::LazyLock;

use pc_protocol::{EntityKind, EntityValue};
use regex::Regex;

use super::vm_id::guest_ids;
use super::{Match, Recognizer, span_of};
use crate::preprocess::Preprocessed;

static CT_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:ct|lxc|container)\s*(?:id\s*)?[-#:]?\s*(\d{1,10})\b").unwrap()
});

static CT_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcontainer\s+(?:named\s+|called\s+)?([a-z][a-z0-9_\-]*[a-z0-9])\b").unwrap()
});

/// Words that follow "container" without naming one.
const NOT_A_NAME: &[&str] = &[
    "with", "for", "on", "to", "and", "that", "it", "its", "the", "a", "an", "from", "into",
    "using", "running", "named", "called", "list", "status", "memory", "ram", "disk", "cpu",
    "cpus", "cores", "id", "in", "of", "at", "as", "is", "now", "please", "template", "image",
    "mount", "start", "stop", "restart", "delete", "create",
];

pub struct ContainerIdRecognizer;

impl Recognizer for ContainerIdRecognizer {
    fn kind(&self) -> EntityKind {
        EntityKind::ContainerId
    }

    fn recognize(&self, input: &Preprocessed) -> Vec<Match> {
        let raw = &input.raw;
        let mut out = guest_ids(&CT_ID_RE, raw);
        for caps in CT_NAME_RE.captures_iter(raw) {
            let Some(name) = caps.get(1) else { continue };
            let lower = name.as_str().to_lowercase();
            if NOT_A_NAME.contains(&lower.as_str()) {
                continue;
            }
            out.push(Match::new(span_of(name), EntityValue::Name(lower)));
        }
        out
    }
}
