//! Event time resolution: turns the plan's proposed start and duration into an
//! absolute UTC window. Never fails; a missing or garbled start time falls back
//! to one minute from now.

use crate::plan::GeneratedPlan;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};

/// Lead time used when the plan carries no usable start time.
pub const FALLBACK_LEAD_MINUTES: i64 = 1;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Start/end instants of the event to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedWindow {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Resolves the plan's window relative to the current time.
pub fn resolve(plan: &GeneratedPlan) -> ResolvedWindow {
    resolve_at(plan, Utc::now())
}

/// Resolves the plan's window relative to `now`.
pub fn resolve_at(plan: &GeneratedPlan, now: DateTime<Utc>) -> ResolvedWindow {
    let parsed = plan.start_time_iso.as_deref().and_then(parse_start_time);
    let start_time = match parsed {
        Some(start) => start,
        None => {
            if let Some(raw) = plan.start_time_iso.as_deref() {
                tracing::warn!(
                    target: "present::schedule",
                    start_time_iso = raw,
                    "Unparsable start time from plan; scheduling one minute from now"
                );
            }
            now + TimeDelta::minutes(FALLBACK_LEAD_MINUTES)
        }
    };

    let end_time = TimeDelta::try_minutes(plan.duration_minutes)
        .and_then(|d| start_time.checked_add_signed(d))
        .unwrap_or(start_time);

    ResolvedWindow {
        start_time,
        end_time,
    }
}

/// Parses an ISO-8601 timestamp. A trailing `Z` is rewritten to `+00:00`;
/// offset-less timestamps are taken as UTC, never local time.
pub fn parse_start_time(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = match trimmed.strip_suffix(['Z', 'z']) {
        Some(head) => format!("{head}+00:00"),
        None => trimmed.to_string(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M%:z") {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&normalized, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn plan(start: Option<&str>, minutes: i64) -> GeneratedPlan {
        GeneratedPlan {
            title: "t".into(),
            description: "d".into(),
            duration_minutes: minutes,
            start_time_iso: start.map(str::to_string),
            recurrence_rrule: None,
        }
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn zulu_timestamp_resolves_to_utc_window() {
        let window = resolve(&plan(Some("2025-01-01T10:00:00Z"), 30));
        assert_eq!(window.start_time, utc(2025, 1, 1, 10, 0));
        assert_eq!(window.end_time, utc(2025, 1, 1, 10, 30));
    }

    #[test]
    fn explicit_offset_is_converted_to_utc() {
        let window = resolve(&plan(Some("2025-03-10T09:15:00+02:00"), 45));
        assert_eq!(window.start_time, utc(2025, 3, 10, 7, 15));
        assert_eq!(window.end_time, utc(2025, 3, 10, 8, 0));
    }

    #[test]
    fn offsetless_timestamp_is_taken_as_utc() {
        let window = resolve(&plan(Some("2025-06-01T18:00:00"), 60));
        assert_eq!(window.start_time, utc(2025, 6, 1, 18, 0));
        assert_eq!(window.end_time, utc(2025, 6, 1, 19, 0));

        assert_eq!(
            parse_start_time("2025-06-01 08:30"),
            Some(utc(2025, 6, 1, 8, 30))
        );
        assert_eq!(parse_start_time("2025-06-01"), Some(utc(2025, 6, 1, 0, 0)));
    }

    #[test]
    fn malformed_timestamp_falls_back_to_now_plus_one_minute() {
        let before = Utc::now();
        let window = resolve(&plan(Some("tomorrow at 10ish"), 30));
        let after = Utc::now();
        assert!(window.start_time >= before + TimeDelta::minutes(1));
        assert!(window.start_time <= after + TimeDelta::minutes(1));
        assert_eq!(window.end_time - window.start_time, TimeDelta::minutes(30));
    }

    #[test]
    fn absent_timestamp_falls_back_identically() {
        let now = utc(2025, 2, 2, 12, 0);
        let window = resolve_at(&plan(None, 60), now);
        assert_eq!(window.start_time, utc(2025, 2, 2, 12, 1));
        assert_eq!(window.end_time, utc(2025, 2, 2, 13, 1));

        let garbled = resolve_at(&plan(Some("2025-13-45T99:00:00Z"), 60), now);
        assert_eq!(garbled, window);
    }

    #[test]
    fn non_positive_durations_are_passed_through() {
        let now = utc(2025, 2, 2, 12, 0);
        let zero = resolve_at(&plan(Some("2025-02-03T08:00:00Z"), 0), now);
        assert_eq!(zero.start_time, zero.end_time);
        let negative = resolve_at(&plan(Some("2025-02-03T08:00:00Z"), -15), now);
        assert_eq!(negative.end_time, utc(2025, 2, 3, 7, 45));
    }

    #[test]
    fn overflowing_duration_does_not_panic() {
        let window = resolve_at(&plan(Some("2025-02-03T08:00:00Z"), i64::MAX), Utc::now());
        assert_eq!(window.end_time, window.start_time);
    }
}
