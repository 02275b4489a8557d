//! Entity extraction — typed slot recognition over the raw utterance.
//!
//! Each entity kind has an independent `Recognizer`. The extractor runs
//! them in registration (priority) order and arbitrates overlapping
//! proposals: the longest span wins, ties go to the recognizer registered
//! first. Surviving entities never overlap and are returned in text order.

pub mod container_id;
pub mod duration;
pub mod free_text;
pub mod hostname;
pub mod ip;
pub mod path;
pub mod resource_spec;
pub mod service_name;
pub mod vm_id;

use pc_protocol::{Entity, EntityKind, EntityValue, Span};

use crate::preprocess::Preprocessed;

/// A recognizer's proposal before overlap arbitration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub span: Span,
    pub value: EntityValue,
}

impl Match {
    pub fn new(span: Span, value: EntityValue) -> Self {
        Self { span, value }
    }
}

/// Trait for single-kind recognizers (regex, dictionary, unit parser).
pub trait Recognizer: Send + Sync {
    /// Entity kind this recognizer produces.
    fn kind(&self) -> EntityKind;

    /// Every plausible match in the input. Matches may overlap each other;
    /// the extractor arbitrates.
    fn recognize(&self, input: &Preprocessed) -> Vec<Match>;
}

/// All built-in recognizers in priority order.
pub fn all_recognizers() -> Vec<Box<dyn Recognizer>> {
    vec![
        Box::new(ip::IpRecognizer),
        Box::new(vm_id::VmIdRecognizer),
        Box::new(container_id::ContainerIdRecognizer),
        Box::new(resource_spec::ResourceSpecRecognizer),
        Box::new(duration::DurationRecognizer),
        Box::new(path::PathRecognizer),
        Box::new(hostname::HostnameRecognizer),
        Box::new(service_name::ServiceNameRecognizer),
        Box::new(free_text::FreeTextRecognizer),
    ]
}

/// Runs recognizers and resolves span conflicts.
pub struct EntityExtractor {
    recognizers: Vec<Box<dyn Recognizer>>,
}

impl EntityExtractor {
    /// Build from recognizers listed in priority order.
    pub fn new(recognizers: Vec<Box<dyn Recognizer>>) -> Self {
        Self { recognizers }
    }

    pub fn with_defaults() -> Self {
        Self::new(all_recognizers())
    }

    /// Recognizer kinds in priority order.
    pub fn kinds(&self) -> Vec<EntityKind> {
        self.recognizers.iter().map(|r| r.kind()).collect()
    }

    /// Extract non-overlapping entities in text order.
    pub fn extract(&self, input: &Preprocessed) -> Vec<Entity> {
        if input.is_empty() {
            return Vec::new();
        }

        // (priority, kind, match)
        let mut proposals: Vec<(usize, EntityKind, Match)> = self
            .recognizers
            .iter()
            .enumerate()
            .flat_map(|(priority, r)| {
                let kind = r.kind();
                r.recognize(input)
                    .into_iter()
                    .filter(|m| !m.span.is_empty())
                    .map(move |m| (priority, kind, m))
            })
            .collect();

        proposals.sort_by(|a, b| {
            b.2.span
                .len()
                .cmp(&a.2.span.len())
                .then(a.0.cmp(&b.0))
                .then(a.2.span.start.cmp(&b.2.span.start))
        });

        let mut claimed: Vec<Entity> = Vec::new();
        for (_, kind, m) in proposals {
            let conflict = claimed
                .iter()
                .find(|e| e.span.is_some_and(|s| s.overlaps(&m.span)));
            if let Some(winner) = conflict {
                tracing::trace!(
                    dropped = %kind,
                    kept = %winner.kind,
                    start = m.span.start,
                    end = m.span.end,
                    "overlapping entity proposal discarded"
                );
                continue;
            }
            claimed.push(Entity::explicit(kind, m.value, Some(m.span)));
        }

        claimed.sort_by_key(|e| e.span.map(|s| s.start));
        claimed
    }
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Span of a regex match or capture group.
pub(crate) fn span_of(m: regex::Match<'_>) -> Span {
    Span::new(m.start(), m.end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::preprocess;
    use pc_protocol::ResourceSpec;

    fn extract(text: &str) -> Vec<Entity> {
        EntityExtractor::with_defaults().extract(&preprocess(text))
    }

    /// Fixed-output recognizer for arbitration tests.
    struct Fixed(EntityKind, Vec<(usize, usize)>);

    impl Recognizer for Fixed {
        fn kind(&self) -> EntityKind {
            self.0
        }

        fn recognize(&self, _input: &Preprocessed) -> Vec<Match> {
            self.1
                .iter()
                .map(|(s, e)| Match::new(Span::new(*s, *e), EntityValue::Name("x".into())))
                .collect()
        }
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(extract("").is_empty());
    }

    #[test]
    fn longest_match_wins() {
        let extractor = EntityExtractor::new(vec![
            Box::new(Fixed(EntityKind::VmId, vec![(0, 3)])),
            Box::new(Fixed(EntityKind::FreeText, vec![(0, 8)])),
        ]);
        let out = extractor.extract(&preprocess("abc defg"));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, EntityKind::FreeText);
    }

    #[test]
    fn ties_go_to_registration_order() {
        let extractor = EntityExtractor::new(vec![
            Box::new(Fixed(EntityKind::Hostname, vec![(0, 4)])),
            Box::new(Fixed(EntityKind::ServiceName, vec![(0, 4)])),
        ]);
        let out = extractor.extract(&preprocess("abcd"));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, EntityKind::Hostname);
    }

    #[test]
    fn output_is_in_text_order_and_disjoint() {
        let out = extract("set ip of vm 100 to 192.168.1.50/24 and mount /mnt/data");
        let kinds: Vec<_> = out.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EntityKind::VmId, EntityKind::Ip, EntityKind::Path]);
        for pair in out.windows(2) {
            let (a, b) = (pair[0].span.unwrap(), pair[1].span.unwrap());
            assert!(a.end <= b.start);
        }
    }

    #[test]
    fn cidr_beats_path_fragment() {
        let out = extract("allow 10.0.0.0/24");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, EntityKind::Ip);
    }

    #[test]
    fn hostname_beats_embedded_service_name() {
        let out = extract("point nextcloud.example.com at ct 105");
        let kinds: Vec<_> = out.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EntityKind::Hostname, EntityKind::ContainerId]);
    }

    #[test]
    fn quoted_text_swallows_inner_entities() {
        let out = extract(r#"create a vm named "vm 100 clone""#);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, EntityKind::FreeText);
        assert_eq!(out[0].value, EntityValue::Name("vm 100 clone".into()));
    }

    #[test]
    fn full_resource_phrase() {
        let out = extract("create a vm with 2GB RAM, 2 CPUs and 20GB disk");
        let specs: Vec<_> = out
            .iter()
            .filter(|e| e.kind == EntityKind::ResourceSpec)
            .collect();
        assert_eq!(specs.len(), 1);
        assert_eq!(
            specs[0].value,
            EntityValue::Resources(ResourceSpec {
                memory_mb: Some(2048),
                cpu_cores: Some(2),
                disk_gb: Some(20),
            })
        );
    }
}
