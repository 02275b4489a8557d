//! hostname — fully qualified domain names with an alphabetic TLD.

use std::sync::LazyLock;

use pc_protocol::{EntityKind, EntityValue};
use regex::Regex;

use super::{Match, Recognizer, span_of};
use crate::preprocess::Preprocessed;

static FQDN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:[a-z0-9](?:[a-z0-9\-]{0,61}[a-z0-9])?\.)+([a-z]{2,24})\b").unwrap()
});

/// File extensions that look like TLDs.
const FILE_EXTENSIONS: &[&str] = &[
    "yaml", "yml", "json", "toml", "conf", "cfg", "ini", "env", "tar", "gz", "tgz", "zst", "xz",
    "bz2", "zip", "iso", "img", "qcow2", "vma", "raw", "log", "txt", "md", "sh", "py", "rs",
    "js", "pem", "key", "crt", "csr", "sql", "bak", "db", "service", "timer", "socket",
];

pub struct HostnameRecognizer;

impl Recognizer for HostnameRecognizer {
    fn kind(&self) -> EntityKind {
        EntityKind::Hostname
    }

    fn recognize(&self, input: &Preprocessed) -> Vec<Match> {
        FQDN_RE
            .captures_iter(&input.raw)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let tld = caps.get(1)?.as_str().to_lowercase();
                if FILE_EXTENSIONS.contains(&tld.as_str()) {
                    return None;
                }
                Some(Match::new(
                    span_of(whole),
                    EntityValue::Name(whole.as_str().to_lowercase()),
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::preprocess;

    fn hosts(text: &str) -> Vec<String> {
        HostnameRecognizer
            .recognize(&preprocess(text))
            .into_iter()
            .map(|m| m.value.to_string())
            .collect()
    }

    #[test]
    fn domains() {
        assert_eq!(
            hosts("point Cloud.Example.com at ct 105"),
            vec!["cloud.example.com"]
        );
        assert_eq!(hosts("configure example.org"), vec!["example.org"]);
        assert_eq!(
            hosts("tunnel to jellyfin.home.lab-1.net"),
            vec!["jellyfin.home.lab-1.net"]
        );
    }

    #[test]
    fn ips_and_files_are_not_hosts() {
        assert!(hosts("ping 192.168.1.1").is_empty());
        assert!(hosts("apply docker-compose.yaml").is_empty());
        assert!(hosts("restore backup.tar.gz").is_empty());
    }

    #[test]
    fn single_label_is_not_a_host() {
        assert!(hosts("deploy nextcloud").is_empty());
    }
}
