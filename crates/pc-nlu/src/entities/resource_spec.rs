//! resource_spec — memory / CPU / disk quantities decomposed into a
//! structured `ResourceSpec`.
//!
//! Components are recognized in either order ("2GB RAM", "memory to 4GB",
//! "2 CPUs", "cores 4", "20GB disk"). Components separated only by
//! connectors (`,` `and` `with` `plus` `&`) merge into one entity; scattered
//! components produce separate entities that the intent binder merges.
//!
//! Units normalize to MB for memory and GB for disk.

use std::sync::LazyLock;

use pc_protocol::{EntityKind, EntityValue, ResourceSpec, Span};
use regex::Regex;

use super::{Match, Recognizer, span_of};
use crate::preprocess::Preprocessed;

const QTY: &str = r"(\d+(?:\.\d+)?)\s*(tib|tb|t|gib|gb|g|mib|mb|m)?";

static MEM_AFTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b{QTY}\s*(?:of\s+)?(?:ram|memory|mem)\b")).unwrap()
});

static MEM_BEFORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:ram|memory|mem)\s*(?:to|of|=|:|at)?\s*{QTY}\b"
    ))
    .unwrap()
});

static CPU_AFTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+)\s*(?:x\s*)?(?:v?cpus?|v?cores?|processors?|threads?|sockets?)\b")
        .unwrap()
});

static CPU_BEFORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:v?cpus?|cores?)\s*(?:count\s*)?(?:to|of|=|:)?\s*(\d+)\b").unwrap()
});

static DISK_AFTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b{QTY}\s*(?:of\s+)?(?:disk|storage|drive|ssd|hdd|hard\s+drive|rootfs|root\s+disk)\b"
    ))
    .unwrap()
});

static DISK_BEFORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:disk|storage|rootfs)\s*(?:size\s*)?(?:to|of|=|:)?\s*{QTY}\b"
    ))
    .unwrap()
});

/// Text allowed between two components of the same spec.
static CONNECTOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[\s,;&+]*(?:(?:and|with|plus)[\s,;&+]*)?$").unwrap()
});

/// Upper sanity bound on requested cores.
const MAX_CORES: u64 = 512;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Memory,
    Cpu,
    Disk,
}

#[derive(Debug, Clone, Copy)]
struct Component {
    span: Span,
    field: Field,
    amount: u64,
}

pub struct ResourceSpecRecognizer;

impl Recognizer for ResourceSpecRecognizer {
    fn kind(&self) -> EntityKind {
        EntityKind::ResourceSpec
    }

    fn recognize(&self, input: &Preprocessed) -> Vec<Match> {
        let raw = &input.raw;
        let components = select_components(collect_components(raw));
        group(raw, components)
    }
}

fn collect_components(raw: &str) -> Vec<Component> {
    let mut out = Vec::new();
    let sized: [(&Regex, Field); 4] = [
        (&*MEM_AFTER_RE, Field::Memory),
        (&*MEM_BEFORE_RE, Field::Memory),
        (&*DISK_AFTER_RE, Field::Disk),
        (&*DISK_BEFORE_RE, Field::Disk),
    ];
    for (re, field) in sized {
        for caps in re.captures_iter(raw) {
            let (Some(whole), Some(qty)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let Ok(value) = qty.as_str().parse::<f64>() else {
                continue;
            };
            let unit = caps.get(2).map(|u| u.as_str().to_lowercase());
            let amount = match field {
                Field::Memory => memory_mb(value, unit.as_deref()),
                _ => disk_gb(value, unit.as_deref()),
            };
            if amount > 0 {
                out.push(Component {
                    span: span_of(whole),
                    field,
                    amount,
                });
            }
        }
    }
    for re in [&*CPU_AFTER_RE, &*CPU_BEFORE_RE] {
        for caps in re.captures_iter(raw) {
            let (Some(whole), Some(qty)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let Ok(cores) = qty.as_str().parse::<u64>() else {
                continue;
            };
            if (1..=MAX_CORES).contains(&cores) {
                out.push(Component {
                    span: span_of(whole),
                    field: Field::Cpu,
                    amount: cores,
                });
            }
        }
    }
    out
}

/// Leftmost-first, longest-at-same-start, non-overlapping selection.
fn select_components(mut all: Vec<Component>) -> Vec<Component> {
    all.sort_by(|a, b| {
        a.span
            .start
            .cmp(&b.span.start)
            .then(b.span.len().cmp(&a.span.len()))
    });
    let mut picked: Vec<Component> = Vec::new();
    for c in all {
        if picked.iter().all(|p| !p.span.overlaps(&c.span)) {
            picked.push(c);
        }
    }
    picked
}

/// Merge runs of connector-separated components into one spec each.
fn group(raw: &str, components: Vec<Component>) -> Vec<Match> {
    let mut out = Vec::new();
    let mut current: Option<(Span, ResourceSpec)> = None;

    for c in components {
        if let Some((span, spec)) = current.as_mut() {
            let gap = raw.get(span.end..c.span.start).unwrap_or("x");
            if CONNECTOR_RE.is_match(gap) && !has_field(spec, c.field) {
                *span = span.cover(&c.span);
                set_field(spec, c);
                continue;
            }
        }
        if let Some((span, spec)) = current.take() {
            out.push(Match::new(span, EntityValue::Resources(spec)));
        }
        let mut spec = ResourceSpec::default();
        set_field(&mut spec, c);
        current = Some((c.span, spec));
    }
    if let Some((span, spec)) = current {
        out.push(Match::new(span, EntityValue::Resources(spec)));
    }
    out
}

fn has_field(spec: &ResourceSpec, field: Field) -> bool {
    match field {
        Field::Memory => spec.memory_mb.is_some(),
        Field::Cpu => spec.cpu_cores.is_some(),
        Field::Disk => spec.disk_gb.is_some(),
    }
}

fn set_field(spec: &mut ResourceSpec, c: Component) {
    match c.field {
        Field::Memory => spec.memory_mb = Some(c.amount),
        Field::Cpu => spec.cpu_cores = u32::try_from(c.amount).ok(),
        Field::Disk => spec.disk_gb = Some(c.amount),
    }
}

/// Normalize a memory quantity to MB. Without a unit, small numbers are
/// read as GB ("4 RAM") and large ones as MB ("2048 memory").
pub fn memory_mb(value: f64, unit: Option<&str>) -> u64 {
    let mb = match unit {
        Some("t" | "tb" | "tib") => value * 1024.0 * 1024.0,
        Some("g" | "gb" | "gib") => value * 1024.0,
        Some("m" | "mb" | "mib") => value,
        _ if value <= 512.0 => value * 1024.0,
        _ => value,
    };
    mb.round() as u64
}

/// Normalize a disk quantity to GB (rounded up, so 512MB becomes 1GB).
pub fn disk_gb(value: f64, unit: Option<&str>) -> u64 {
    let gb = match unit {
        Some("t" | "tb" | "tib") => value * 1024.0,
        Some("m" | "mb" | "mib") => value / 1024.0,
        _ => value,
    };
    gb.ceil() as u64
}
