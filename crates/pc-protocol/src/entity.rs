use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Valid Proxmox guest ids (VMIDs), shared by VMs and containers.
pub const MIN_GUEST_ID: u64 = 100;
pub const MAX_GUEST_ID: u64 = 999_999_999;

// ── Span ────────────────────────────────────────────────────────

/// Half-open byte range `[start, end)` into the raw utterance.
///
/// `&raw[span.start..span.end]` is the verbatim matched text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {start} after end {end}");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Smallest span covering both.
    pub fn cover(&self, other: &Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// Slice the raw utterance. Returns `None` for out-of-range spans.
    pub fn slice<'a>(&self, raw: &'a str) -> Option<&'a str> {
        raw.get(self.start..self.end)
    }
}

// ── Entity Kind ─────────────────────────────────────────────────

/// Every slot type the extractor can produce.
///
/// Declaration order is the default recognizer priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Ip,
    VmId,
    ContainerId,
    ResourceSpec,
    Duration,
    Path,
    Hostname,
    ServiceName,
    FreeText,
}

impl EntityKind {
    pub const ALL: [EntityKind; 9] = [
        Self::Ip,
        Self::VmId,
        Self::ContainerId,
        Self::ResourceSpec,
        Self::Duration,
        Self::Path,
        Self::Hostname,
        Self::ServiceName,
        Self::FreeText,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::VmId => "vm_id",
            Self::ContainerId => "container_id",
            Self::ResourceSpec => "resource_spec",
            Self::Duration => "duration",
            Self::Path => "path",
            Self::Hostname => "hostname",
            Self::ServiceName => "service_name",
            Self::FreeText => "free_text",
        }
    }

    /// Short human description, used in clarification prompts and the
    /// entity schema sent to the LLM.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Ip => "an IPv4 address, optionally with a /prefix (e.g. 192.168.1.50/24)",
            Self::VmId => "a numeric VM id (e.g. 100)",
            Self::ContainerId => "a container id or name (e.g. 101)",
            Self::ResourceSpec => {
                "resources as {memory_mb, cpu_cores, disk_gb} (e.g. 2GB RAM, 2 CPUs, 20GB disk)"
            }
            Self::Duration => "a duration or interval in seconds (e.g. every day = 86400)",
            Self::Path => "an absolute file path (e.g. /var/lib/vz/dump)",
            Self::Hostname => "a fully qualified domain name (e.g. cloud.example.com)",
            Self::ServiceName => "a service name (e.g. nextcloud)",
            Self::FreeText => "a free-form label (e.g. a quoted name)",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown entity kind name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown entity kind: {0}")]
pub struct UnknownEntityKind(pub String);

impl FromStr for EntityKind {
    type Err = UnknownEntityKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownEntityKind(s.to_string()))
    }
}

// ── Entity Source ───────────────────────────────────────────────

/// Where an entity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitySource {
    /// Found in the current utterance (locally or by the LLM).
    Explicit,
    /// Carried over from an earlier turn of the same conversation.
    InferredFromContext,
}

// ── Resource Spec ───────────────────────────────────────────────

/// Structured compute resources. Missing fields are filled later by the
/// command executor's defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_cores: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_gb: Option<u64>,
}

impl ResourceSpec {
    pub fn is_empty(&self) -> bool {
        self.memory_mb.is_none() && self.cpu_cores.is_none() && self.disk_gb.is_none()
    }

    /// Field-wise merge; fields already set on `self` win.
    pub fn merge(self, other: ResourceSpec) -> ResourceSpec {
        ResourceSpec {
            memory_mb: self.memory_mb.or(other.memory_mb),
            cpu_cores: self.cpu_cores.or(other.cpu_cores),
            disk_gb: self.disk_gb.or(other.disk_gb),
        }
    }
}

// ── Entity Value ────────────────────────────────────────────────

/// Typed entity payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EntityValue {
    Id(u32),
    Name(String),
    Resources(ResourceSpec),
    Ip { addr: IpAddr, prefix: Option<u8> },
    Path(String),
    Duration { seconds: u64 },
}

impl fmt::Display for EntityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) | Self::Path(name) => f.write_str(name),
            Self::Ip { addr, prefix: Some(p) } => write!(f, "{addr}/{p}"),
            Self::Ip { addr, prefix: None } => write!(f, "{addr}"),
            Self::Duration { seconds } => write!(f, "{seconds}s"),
            Self::Resources(spec) => {
                let mut parts = Vec::new();
                if let Some(mb) = spec.memory_mb {
                    parts.push(format!("{mb}MB RAM"));
                }
                if let Some(cores) = spec.cpu_cores {
                    parts.push(format!("{cores} CPU"));
                }
                if let Some(gb) = spec.disk_gb {
                    parts.push(format!("{gb}GB disk"));
                }
                f.write_str(&parts.join(", "))
            }
        }
    }
}

impl EntityValue {
    /// Convert a loosely typed JSON value (as returned by the LLM) into a
    /// typed value for `kind`. Returns `None` when the shape does not fit.
    pub fn from_json(kind: EntityKind, value: &Value) -> Option<EntityValue> {
        match kind {
            EntityKind::VmId => parse_id(value).map(EntityValue::Id),
            EntityKind::ContainerId => match non_empty_str(value) {
                Some(s) if !s.bytes().all(|b| b.is_ascii_digit()) => {
                    Some(EntityValue::Name(s.to_lowercase()))
                }
                _ => parse_id(value).map(EntityValue::Id),
            },
            EntityKind::ResourceSpec => {
                let spec = ResourceSpec {
                    memory_mb: value.get("memory_mb").and_then(Value::as_u64),
                    cpu_cores: value
                        .get("cpu_cores")
                        .and_then(Value::as_u64)
                        .and_then(|n| u32::try_from(n).ok()),
                    disk_gb: value.get("disk_gb").and_then(Value::as_u64),
                };
                (!spec.is_empty()).then_some(EntityValue::Resources(spec))
            }
            EntityKind::Ip => {
                let s = non_empty_str(value)?;
                let (addr, prefix) = match s.split_once('/') {
                    Some((addr, prefix)) => (addr, Some(prefix.parse::<u8>().ok()?)),
                    None => (s, None),
                };
                let addr: IpAddr = addr.parse().ok()?;
                let max = if addr.is_ipv4() { 32 } else { 128 };
                if prefix.is_some_and(|p| p > max) {
                    return None;
                }
                Some(EntityValue::Ip { addr, prefix })
            }
            EntityKind::Path => non_empty_str(value)
                .filter(|s| s.starts_with('/'))
                .map(|s| EntityValue::Path(s.to_string())),
            EntityKind::Duration => value
                .as_u64()
                .or_else(|| value.get("seconds").and_then(Value::as_u64))
                .filter(|s| *s > 0)
                .map(|seconds| EntityValue::Duration { seconds }),
            EntityKind::Hostname | EntityKind::ServiceName => {
                non_empty_str(value).map(|s| EntityValue::Name(s.to_lowercase()))
            }
            EntityKind::FreeText => non_empty_str(value).map(|s| EntityValue::Name(s.to_string())),
        }
    }
}

/// A guest id in `MIN_GUEST_ID..=MAX_GUEST_ID`, as a number or numeric
/// string.
fn parse_id(value: &Value) -> Option<u32> {
    let id = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    if !(MIN_GUEST_ID..=MAX_GUEST_ID).contains(&id) {
        return None;
    }
    u32::try_from(id).ok()
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

// ── Entity ──────────────────────────────────────────────────────

/// A typed, span-located value extracted from an utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub value: EntityValue,
    /// Location in the raw utterance. `None` for LLM-proposed entities that
    /// could not be located, and for context carry-overs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    pub source: EntitySource,
}

impl Entity {
    /// An entity found in the current utterance.
    pub fn explicit(kind: EntityKind, value: EntityValue, span: Option<Span>) -> Self {
        Self {
            kind,
            value,
            span,
            source: EntitySource::Explicit,
        }
    }

    /// A fresh copy of an earlier turn's entity, marked as inferred.
    pub fn inferred_from(previous: &Entity) -> Self {
        Self {
            kind: previous.kind,
            value: previous.value.clone(),
            span: None,
            source: EntitySource::InferredFromContext,
        }
    }

    /// Canonical executor parameters carried by this entity.
    ///
    /// A resource spec expands into its present fields; every other kind
    /// yields exactly one parameter.
    pub fn slot_values(&self) -> Vec<(&'static str, Value)> {
        match (&self.kind, &self.value) {
            (_, EntityValue::Resources(spec)) => {
                let mut out = Vec::new();
                if let Some(mb) = spec.memory_mb {
                    out.push(("memory_mb", json!(mb)));
                }
                if let Some(cores) = spec.cpu_cores {
                    out.push(("cpu_cores", json!(cores)));
                }
                if let Some(gb) = spec.disk_gb {
                    out.push(("disk_gb", json!(gb)));
                }
                out
            }
            (EntityKind::Duration, EntityValue::Duration { seconds }) => {
                vec![("duration_secs", json!(seconds))]
            }
            (EntityKind::FreeText, value) => vec![("name", json!(value.to_string()))],
            (kind, EntityValue::Id(id)) => vec![(kind.as_str(), json!(id))],
            (kind, value) => vec![(kind.as_str(), json!(value.to_string()))],
        }
    }
}
