//! ISO-8601 formatting and parsing helpers (spec §4.1). "ISO datetime" is RFC 3339 with
//! millisecond precision throughout this library.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// Formats Unix epoch milliseconds as an RFC 3339 datetime string with millisecond precision,
/// e.g. `2023-11-14T22:13:20.000Z`.
pub fn iso8601_from_millis(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .unwrap_or_else(|| Utc.timestamp_millis_opt(0).single().expect("epoch is valid"))
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an RFC 3339 / ISO-8601 datetime string into Unix epoch milliseconds.
pub fn parse_iso8601(input: &str) -> Result<i64, String> {
    DateTime::parse_from_rfc3339(input)
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
        .map_err(|e| format!("invalid ISO-8601 datetime {input:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_and_reparses_round_trip() {
        let ms = 1_700_000_000_123;
        let formatted = iso8601_from_millis(ms);
        assert_eq!(parse_iso8601(&formatted).unwrap(), ms);
    }

    #[test]
    fn rejects_garbage_input() {
        assert!(parse_iso8601("not a date").is_err());
    }
}
