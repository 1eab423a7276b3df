// ⏰ Timestamp Resolver - every source and event carries its own clock string
//
// Sources and events arrive with ISO-8601 text ("2026-02-12T08:30:00Z",
// "2026-02-12T03:30:00-05:00"). Everything that ranks or orders by time goes
// through `parse`, which normalizes to UTC. There is no fallback instant:
// a malformed timestamp fails the merge or apply that needed it.

use crate::error::{Error, Result};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// ISO-8601 shapes accepted after RFC 3339 fails, tried in order against the
/// text with a trailing `Z` rewritten to `+0000`.
const ISO_FALLBACKS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z", // extended, offset without colon
    "%Y-%m-%dT%H:%M%z",       // minute precision
    "%Y-%m-%dT%H:%M%:z",
    "%Y%m%dT%H%M%S%.f%z",     // basic
    "%Y%m%dT%H%M%z",
];

/// Parse an ISO-8601 timestamp with a `Z` suffix or numeric offset into UTC
pub fn parse(text: &str) -> Result<DateTime<Utc>> {
    parse_for(text, "timestamp")
}

/// Same as [`parse`], naming the field being parsed in the error
pub fn parse_for(text: &str, context: &str) -> Result<DateTime<Utc>> {
    let trimmed = text.trim();

    let rfc_err = match DateTime::parse_from_rfc3339(trimmed) {
        Ok(dt) => return Ok(dt.with_timezone(&Utc)),
        Err(e) => e,
    };

    let normalized = match trimmed.strip_suffix(['Z', 'z']) {
        Some(head) => format!("{}+0000", head),
        None => trimmed.to_string(),
    };
    ISO_FALLBACKS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&normalized, fmt).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::Timestamp {
            value: text.to_string(),
            context: context.to_string(),
            source: rfc_err,
        })
}

/// Instant from calendar literals known to be valid (demo data, fallback
/// baseline). Every in-range date and time is exactly one UTC instant, so the
/// epoch arm is unreachable for the literals passed here.
pub(crate) fn fixed_utc(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(year, month, day, hour, min, sec).single() {
        Some(instant) => instant,
        None => DateTime::UNIX_EPOCH,
    }
}

/// Canonical text form: RFC 3339, `Z` suffix, fractional seconds only when present
pub fn format(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Serde adapter so records and events always read through [`parse`]
/// and always write the canonical form.
pub mod serde_utc {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(instant: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format(instant))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        super::parse(&text).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_z_suffix() {
        let ts = parse("2026-02-12T08:30:00Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 2, 12, 8, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_offset_normalizes_to_utc() {
        let with_offset = parse("2026-02-12T03:30:00-05:00").unwrap();
        let zulu = parse("2026-02-12T08:30:00Z").unwrap();
        assert_eq!(with_offset, zulu);
    }

    #[test]
    fn test_parse_minute_precision() {
        let ts = parse("2026-02-13T12:00Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 2, 13, 12, 0, 0).unwrap());
        assert_eq!(parse("2026-02-13T07:00-05:00").unwrap(), ts);
    }

    #[test]
    fn test_parse_offset_without_colon() {
        assert_eq!(
            parse("2026-02-12T08:30:00+0000").unwrap(),
            parse("2026-02-12T08:30:00Z").unwrap()
        );
        assert_eq!(
            parse("2026-02-12T03:30:00.250-0500").unwrap(),
            parse("2026-02-12T08:30:00.250Z").unwrap()
        );
    }

    #[test]
    fn test_parse_basic_format() {
        let ts = parse("20260212T083000Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 2, 12, 8, 30, 0).unwrap());
        assert_eq!(parse("20260212T033000-0500").unwrap(), ts);
    }

    #[test]
    fn test_fixed_utc() {
        assert_eq!(format(&fixed_utc(2026, 2, 12, 8, 30, 0)), "2026-02-12T08:30:00Z");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let err = parse_for("yesterday", "updated_at").unwrap_err();
        match err {
            Error::Timestamp { value, context, .. } => {
                assert_eq!(value, "yesterday");
                assert_eq!(context, "updated_at");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_rejects_missing_offset() {
        assert!(parse("2026-02-12T08:30:00").is_err());
    }

    #[test]
    fn test_format_round_trips_canonical_form() {
        let ts = parse("2026-02-12T03:30:00-05:00").unwrap();
        assert_eq!(format(&ts), "2026-02-12T08:30:00Z");
    }

    #[test]
    fn test_ordering_across_offsets() {
        let earlier = parse("2026-02-12T09:00:00+02:00").unwrap(); // 07:00Z
        let later = parse("2026-02-12T08:00:00Z").unwrap();
        assert!(earlier < later);
    }
}
