//! Shared utility functions

use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, TimeZone, Utc};

/// Parse a datetime string (RFC3339 format) or return current time
///
/// This helper is used throughout the database layer to handle datetime parsing
/// with a fallback to the current time if parsing fails.
pub fn parse_datetime_or_now(s: &str) -> DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Format a timestamp for storage.
///
/// Fixed-width (microseconds, `Z` suffix) so stored values compare correctly
/// as plain strings in range filters.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Half-open UTC range `[start, end)` covering a single calendar day
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN));
    (start, start + chrono::Duration::days(1))
}

/// Half-open UTC range `[start, end)` covering a calendar month.
///
/// Returns `None` for an out-of-range month or year.
pub fn month_bounds(year: i32, month: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((day_bounds(first).0, day_bounds(next).0))
}

/// Escape `\`, `%` and `_` for a `LIKE ... ESCAPE '\'` pattern
pub(crate) fn escape_like(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_or_now() {
        let valid_time = "2024-01-01T12:00:00Z";
        let parsed = parse_datetime_or_now(valid_time);
        assert_eq!(parsed.to_rfc3339(), "2024-01-01T12:00:00+00:00");

        // Invalid time should return current time (just check it doesn't panic)
        let invalid_time = "invalid";
        let now_before = Utc::now();
        let parsed = parse_datetime_or_now(invalid_time);
        let now_after = Utc::now();
        assert!(parsed >= now_before && parsed <= now_after);
    }

    #[test]
    fn test_format_timestamp_is_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let fractional = whole + chrono::Duration::milliseconds(250);

        assert_eq!(format_timestamp(whole), "2024-05-01T08:00:00.000000Z");
        assert_eq!(format_timestamp(fractional), "2024-05-01T08:00:00.250000Z");
        assert!(format_timestamp(whole) < format_timestamp(fractional));
        assert_eq!(parse_datetime_or_now(&format_timestamp(fractional)), fractional);
    }

    #[test]
    fn test_month_bounds() {
        let (start, end) = month_bounds(2024, 12).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());

        let (start, end) = month_bounds(2024, 2).unwrap();
        assert_eq!(end - start, chrono::Duration::days(29));

        assert!(month_bounds(2024, 13).is_none());
        assert!(month_bounds(2024, 0).is_none());
    }

    #[test]
    fn test_day_bounds() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let (start, end) = day_bounds(date);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 16, 0, 0, 0).unwrap());
    }

    #[test]
    fn escape_like_quotes_wildcards() {
        assert_eq!(escape_like("Budi"), "Budi");
        assert_eq!(escape_like("100%_x\\"), "100\\%\\_x\\\\");
    }
}
