//! duration — intervals and schedules, normalized to seconds.
//!
//! Recognized forms: `6 hours`, `every 30 minutes`, compact `30s` / `5m` /
//! `2h` / `1d` / `1w`, `every day` / `every night`, and the adverbs
//! `hourly`, `daily`, `nightly`, `weekly`, `monthly`. A month is 30 days.

use std::sync::LazyLock;

use pc_protocol::{EntityKind, EntityValue};
use regex::Regex;

use super::{Match, Recognizer, span_of};
use crate::preprocess::Preprocessed;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;
const MONTH: u64 = 30 * DAY;

static COUNT_UNIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:every|each)\s+)?(\d+)\s*(seconds?|secs?|minutes?|mins?|hours?|hrs?|days?|weeks?|wks?|months?)\b",
    )
    .unwrap()
});

static COMPACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:(?:every|each)\s+)?(\d+)([smhdw])\b").unwrap());

static EVERY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:every|each)\s+(?:single\s+)?(second|minute|hour|day|night|morning|evening|weekday|week|month)\b",
    )
    .unwrap()
});

static ADVERB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(hourly|daily|nightly|weekly|monthly)\b").unwrap());

pub struct DurationRecognizer;

impl Recognizer for DurationRecognizer {
    fn kind(&self) -> EntityKind {
        EntityKind::Duration
    }

    fn recognize(&self, input: &Preprocessed) -> Vec<Match> {
        let raw = &input.raw;
        let mut out = Vec::new();

        for re in [&*COUNT_UNIT_RE, &*COMPACT_RE] {
            for caps in re.captures_iter(raw) {
                let (Some(whole), Some(count), Some(unit)) = (caps.get(0), caps.get(1), caps.get(2))
                else {
                    continue;
                };
                let Ok(count) = count.as_str().parse::<u64>() else {
                    continue;
                };
                let seconds = unit_seconds(unit.as_str()).and_then(|s| s.checked_mul(count));
                if let Some(seconds) = seconds.filter(|s| *s > 0) {
                    out.push(Match::new(span_of(whole), EntityValue::Duration { seconds }));
                }
            }
        }

        for re in [&*EVERY_RE, &*ADVERB_RE] {
            for caps in re.captures_iter(raw) {
                let (Some(whole), Some(unit)) = (caps.get(0), caps.get(1)) else {
                    continue;
                };
                if let Some(seconds) = unit_seconds(unit.as_str()) {
                    out.push(Match::new(span_of(whole), EntityValue::Duration { seconds }));
                }
            }
        }
        out
    }
}

/// Seconds in one `unit`; `None` for unrecognized units.
fn unit_seconds(unit: &str) -> Option<u64> {
    let unit = unit.to_lowercase();
    let seconds = match unit.as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => MINUTE,
        "h" | "hr" | "hrs" | "hour" | "hours" | "hourly" => HOUR,
        "d" | "day" | "days" | "daily" | "night" | "nightly" | "morning" | "evening"
        | "weekday" => DAY,
        "w" | "wk" | "wks" | "week" | "weeks" | "weekly" => WEEK,
        "month" | "months" | "monthly" => MONTH,
        _ => return None,
    };
    Some(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::preprocess;

    fn durations(text: &str) -> Vec<(u64, &str)> {
        DurationRecognizer
            .recognize(&preprocess(text))
            .into_iter()
            .map(|m| match m.value {
                EntityValue::Duration { seconds } => (seconds, m.span.slice(text).unwrap()),
                other => panic!("unexpected value {other:?}"),
            })
            .collect()
    }

    #[test]
    fn count_and_unit() {
        assert_eq!(
            durations("back up vm 100 every 6 hours"),
            vec![(6 * HOUR, "every 6 hours")]
        );
        assert_eq!(durations("keep it for 7 days"), vec![(7 * DAY, "7 days")]);
        assert_eq!(durations("wait 90 secs"), vec![(90, "90 secs")]);
    }

    #[test]
    fn compact_forms() {
        assert_eq!(durations("timeout 30s"), vec![(30, "30s")]);
        assert_eq!(durations("every 2h"), vec![(2 * HOUR, "every 2h")]);
        assert_eq!(durations("retain 1w"), vec![(WEEK, "1w")]);
    }

    #[test]
    fn schedule_words() {
        assert_eq!(durations("backup vm 100 nightly"), vec![(DAY, "nightly")]);
        assert_eq!(durations("every week"), vec![(WEEK, "every week")]);
        assert_eq!(durations("Every Month"), vec![(MONTH, "Every Month")]);
        assert_eq!(durations("hourly snapshots"), vec![(HOUR, "hourly")]);
    }

    #[test]
    fn unrelated_numbers_ignored() {
        assert!(durations("start vm 100").is_empty());
        assert!(durations("disk 64G").is_empty());
    }
}
