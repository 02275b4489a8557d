//! ip — IPv4 addresses with an optional CIDR prefix.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::LazyLock;

use pc_protocol::{EntityKind, EntityValue, Span};
use regex::Regex;

use super::{Match, Recognizer, span_of};
use crate::preprocess::Preprocessed;

static IPV4_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b((?:\d{1,3}\.){3}\d{1,3})(?:/(\d{1,2}))?\b").unwrap()
});

pub struct IpRecognizer;

impl Recognizer for IpRecognizer {
    fn kind(&self) -> EntityKind {
        EntityKind::Ip
    }

    fn recognize(&self, input: &Preprocessed) -> Vec<Match> {
        IPV4_RE
            .captures_iter(&input.raw)
            .filter_map(|caps| {
                let addr_match = caps.get(1)?;
                let addr: Ipv4Addr = addr_match.as_str().parse().ok()?;
                let prefix = caps
                    .get(2)
                    .and_then(|p| p.as_str().parse::<u8>().ok())
                    .filter(|p| *p <= 32);
                // An out-of-range prefix is not part of the address.
                let span = match (prefix, caps.get(0)) {
                    (Some(_), Some(whole)) => span_of(whole),
                    _ => Span::new(addr_match.start(), addr_match.end()),
                };
                Some(Match::new(
                    span,
                    EntityValue::Ip {
                        addr: IpAddr::V4(addr),
                        prefix,
                    },
                ))
            })
            .collect()
    }
}
