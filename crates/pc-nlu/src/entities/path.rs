//! path — absolute Unix paths (`/mnt/data`, `/var/lib/vz/dump/`).

use std::sync::LazyLock;

use pc_protocol::{EntityKind, EntityValue, Span};
use regex::Regex;

use super::{Match, Recognizer};
use crate::preprocess::Preprocessed;

/// A path starts the input or follows whitespace, an opening bracket,
/// a quote or `=`; that guard keeps CIDR suffixes (`/24`) and URL
/// fragments out.
static PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:^|[\s("'=])(/(?:[\w.\-~]+/?)+)"#).unwrap());

pub struct PathRecognizer;

impl Recognizer for PathRecognizer {
    fn kind(&self) -> EntityKind {
        EntityKind::Path
    }

    fn recognize(&self, input: &Preprocessed) -> Vec<Match> {
        PATH_RE
            .captures_iter(&input.raw)
            .filter_map(|caps| {
                let m = caps.get(1)?;
                // Sentence punctuation is not part of the path.
                let text = m.as_str().trim_end_matches(['.', ',']);
                if !text.chars().any(char::is_alphabetic) {
                    return None;
                }
                let span = Span::new(m.start(), m.start() + text.len());
                Some(Match::new(span, EntityValue::Path(text.to_string())))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::preprocess;

    fn paths(text: &str) -> Vec<&str> {
        PathRecognizer
            .recognize(&preprocess(text))
            .into_iter()
            .map(|m| m.span.slice(text).unwrap())
            .collect()
    }

    #[test]
    fn absolute_paths() {
        assert_eq!(paths("mount /mnt/data into ct 101"), vec!["/mnt/data"]);
        assert_eq!(paths("/var/lib/vz/dump/ is full"), vec!["/var/lib/vz/dump/"]);
        assert_eq!(paths("path=/srv/media"), vec!["/srv/media"]);
    }

    #[test]
    fn trailing_punctuation_trimmed() {
        assert_eq!(paths("back up /etc/pve."), vec!["/etc/pve"]);
    }

    #[test]
    fn cidr_suffix_and_urls_ignored() {
        assert!(paths("allow 10.0.0.0/24").is_empty());
        assert!(paths("open https://cloud.example.com/login").is_empty());
        assert!(paths("ratio 1 / 2").is_empty());
    }
}
