//! service_name — dictionary of deployable self-hosted services.
//!
//! Aliases map to one canonical name (`pi-hole` → `pihole`,
//! `home assistant` → `home-assistant`). Multi-word aliases tolerate any
//! run of whitespace.

use std::sync::LazyLock;

use pc_protocol::{EntityKind, EntityValue};
use regex::Regex;

use super::{Match, Recognizer, span_of};
use crate::preprocess::Preprocessed;

/// (alias, canonical name)
const SERVICES: &[(&str, &str)] = &[
    ("nextcloud", "nextcloud"),
    ("jellyfin", "jellyfin"),
    ("plex", "plex"),
    ("emby", "emby"),
    ("home assistant", "home-assistant"),
    ("home-assistant", "home-assistant"),
    ("homeassistant", "home-assistant"),
    ("hass", "home-assistant"),
    ("pihole", "pihole"),
    ("pi-hole", "pihole"),
    ("pi hole", "pihole"),
    ("adguard home", "adguard-home"),
    ("adguard", "adguard-home"),
    ("grafana", "grafana"),
    ("prometheus", "prometheus"),
    ("influxdb", "influxdb"),
    ("portainer", "portainer"),
    ("nginx proxy manager", "nginx-proxy-manager"),
    ("nginx", "nginx"),
    ("traefik", "traefik"),
    ("caddy", "caddy"),
    ("wireguard", "wireguard"),
    ("vaultwarden", "vaultwarden"),
    ("bitwarden", "vaultwarden"),
    ("gitea", "gitea"),
    ("forgejo", "forgejo"),
    ("gitlab", "gitlab"),
    ("uptime kuma", "uptime-kuma"),
    ("uptime-kuma", "uptime-kuma"),
    ("syncthing", "syncthing"),
    ("paperless-ngx", "paperless-ngx"),
    ("paperless", "paperless-ngx"),
    ("immich", "immich"),
    ("photoprism", "photoprism"),
    ("sonarr", "sonarr"),
    ("radarr", "radarr"),
    ("prowlarr", "prowlarr"),
    ("qbittorrent", "qbittorrent"),
    ("transmission", "transmission"),
    ("mariadb", "mariadb"),
    ("mysql", "mysql"),
    ("postgresql", "postgresql"),
    ("postgres", "postgresql"),
    ("redis", "redis"),
    ("mongodb", "mongodb"),
    ("minio", "minio"),
    ("wordpress", "wordpress"),
    ("ghost", "ghost"),
    ("bookstack", "bookstack"),
    ("heimdall", "heimdall"),
    ("mealie", "mealie"),
    ("n8n", "n8n"),
];

static SERVICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let mut aliases: Vec<&str> = SERVICES.iter().map(|(alias, _)| *alias).collect();
    // Longest first so "nginx proxy manager" beats "nginx".
    aliases.sort_by_key(|a| std::cmp::Reverse(a.len()));
    let alternation = aliases
        .iter()
        .map(|a| regex::escape(a).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).unwrap()
});

/// Canonical name for a matched alias (case and spacing insensitive).
pub fn canonical(alias: &str) -> Option<&'static str> {
    let normalized = alias
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    SERVICES
        .iter()
        .find(|(a, _)| *a == normalized)
        .map(|(_, canonical)| *canonical)
}

pub struct ServiceNameRecognizer;

impl Recognizer for ServiceNameRecognizer {
    fn kind(&self) -> EntityKind {
        EntityKind::ServiceName
    }

    fn recognize(&self, input: &Preprocessed) -> Vec<Match> {
        SERVICE_RE
            .find_iter(&input.raw)
            .filter_map(|m| {
                let name = canonical(m.as_str())?;
                Some(Match::new(span_of(m), EntityValue::Name(name.to_string())))
            })
            .collect()
    }
}
