//! vm_id — numeric guest ids introduced by a VM keyword.
//!
//! Proxmox VMIDs live in 100..=999_999_999. The span covers the digits
//! only, so `raw[span]` is exactly the id as typed.

use std::sync::LazyLock;

use pc_protocol::{EntityKind, EntityValue, MAX_GUEST_ID, MIN_GUEST_ID};
use regex::Regex;

use super::{Match, Recognizer, span_of};
use crate::preprocess::Preprocessed;

static VM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:vm|vmid|virtual\s+machine|machine|guest|qemu|kvm)\s*(?:id\s*)?[-#:]?\s*(\d{1,10})\b",
    )
    .unwrap()
});

pub struct VmIdRecognizer;

impl Recognizer for VmIdRecognizer {
    fn kind(&self) -> EntityKind {
        EntityKind::VmId
    }

    fn recognize(&self, input: &Preprocessed) -> Vec<Match> {
        guest_ids(&VM_RE, &input.raw)
    }
}

/// Shared by the VM and container recognizers: capture group 1 must be a
/// guest id in the valid range.
pub(crate) fn guest_ids(re: &Regex, raw: &str) -> Vec<Match> {
    re.captures_iter(raw)
        .filter_map(|caps| {
            let digits = caps.get(1)?;
            let id: u64 = digits.as_str().parse().ok()?;
            if !(MIN_GUEST_ID..=MAX_GUEST_ID).contains(&id) {
                tracing::trace!(id, "guest id outside valid range");
                return None;
            }
            let id = u32::try_from(id).ok()?;
            Some(Match::new(span_of(digits), EntityValue::Id(id)))
        })
        .collect()
}
