use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

// ── TimezoneHandler ───────────────────────────────────────────────────────────

/// Parses timestamps that may lack an offset and renders dates for display.
///
/// Naive timestamps (no offset) are interpreted in the handler's timezone;
/// every result is normalised to UTC.
#[derive(Debug, Clone, Copy)]
pub struct TimezoneHandler {
    tz: Tz,
}

impl Default for TimezoneHandler {
    fn default() -> Self {
        Self { tz: Tz::UTC }
    }
}

impl TimezoneHandler {
    /// Create a handler for the given IANA timezone name.
    ///
    /// Unknown names fall back to UTC with a warning.
    pub fn new(tz_name: &str) -> Self {
        let tz = tz_name.parse::<Tz>().unwrap_or_else(|_| {
            warn!(
                "TimezoneHandler: unrecognised timezone \"{}\", falling back to UTC",
                tz_name
            );
            Tz::UTC
        });
        Self { tz }
    }

    /// The configured timezone.
    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Validate that `tz_name` is a recognised IANA timezone identifier.
    pub fn validate_timezone(tz_name: &str) -> bool {
        tz_name.parse::<Tz>().is_ok()
    }

    /// Parse a timestamp string into UTC.
    ///
    /// Accepts RFC 3339 (with `Z` or an offset), RFC 2822, a bare
    /// `YYYY-MM-DD` (UTC midnight, as ISO date-only forms are defined), and
    /// the naive forms `YYYY-MM-DDTHH:MM:SS[.f]` and `YYYY-MM-DD HH:MM:SS[.f]`,
    /// which are read in the handler's timezone. Returns `None` for empty or
    /// unrecognised input.
    pub fn parse_timestamp(&self, s: &str) -> Option<DateTime<Utc>> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
            return Some(dt.with_timezone(&Utc));
        }

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
        }

        const FMTS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
        ];
        let naive = FMTS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())?;

        // DST gaps have no local instant; ambiguous times take the earlier one.
        self.tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Render the calendar date of `dt` in this timezone, e.g. `Sat Mar 30 2024`.
    pub fn format_date(&self, dt: DateTime<Utc>) -> String {
        dt.with_timezone(&self.tz).format("%a %b %d %Y").to_string()
    }

    /// Render `dt` as `YYYY-MM-DD HH:MM` in this timezone.
    pub fn format_datetime(&self, dt: DateTime<Utc>) -> String {
        dt.with_timezone(&self.tz).format("%Y-%m-%d %H:%M").to_string()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_validate_timezone() {
        assert!(TimezoneHandler::validate_timezone("Asia/Kolkata"));
        assert!(TimezoneHandler::validate_timezone("UTC"));
        assert!(!TimezoneHandler::validate_timezone("Mars/Olympus"));
        assert!(!TimezoneHandler::validate_timezone(""));
    }

    #[test]
    fn test_new_invalid_timezone_falls_back_to_utc() {
        assert_eq!(TimezoneHandler::new("Invalid/Zone").tz(), Tz::UTC);
        assert_eq!(TimezoneHandler::new("Asia/Kolkata").tz(), Tz::Asia__Kolkata);
    }

    #[test]
    fn test_parse_timestamp_z_suffix() {
        let dt = TimezoneHandler::default()
            .parse_timestamp("2024-01-15T10:30:00Z")
            .unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_millis_z_suffix() {
        // mongoexport writes milliseconds.
        let dt = TimezoneHandler::default()
            .parse_timestamp("2024-03-31T00:00:00.000Z")
            .unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_with_offset() {
        let dt = TimezoneHandler::default()
            .parse_timestamp("2024-01-15T12:00:00+02:00")
            .unwrap();
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn test_parse_timestamp_date_only_is_utc_midnight() {
        let expected = Utc.with_ymd_and_hms(2024, 2, 15, 0, 0, 0).unwrap();
        let utc = TimezoneHandler::default().parse_timestamp("2024-02-15").unwrap();
        assert_eq!(utc, expected);

        // The display zone does not shift a bare date.
        let ist = TimezoneHandler::new("Asia/Kolkata")
            .parse_timestamp("2024-02-15")
            .unwrap();
        assert_eq!(ist, expected);
    }

    #[test]
    fn test_parse_timestamp_naive_datetime_uses_handler_zone() {
        // Midnight in Kolkata (UTC+05:30) is 18:30 the previous day in UTC.
        let ist = TimezoneHandler::new("Asia/Kolkata")
            .parse_timestamp("2024-02-15T00:00:00")
            .unwrap();
        assert_eq!(ist, Utc.with_ymd_and_hms(2024, 2, 14, 18, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_naive_space_separated() {
        let dt = TimezoneHandler::default()
            .parse_timestamp("2024-02-15 08:15:00")
            .unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 2, 15, 8, 15, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        let h = TimezoneHandler::default();
        assert!(h.parse_timestamp("").is_none());
        assert!(h.parse_timestamp("   ").is_none());
        assert!(h.parse_timestamp("next tuesday").is_none());
        assert!(h.parse_timestamp("2024-02-30").is_none());
    }

    #[test]
    fn test_format_date_in_zone() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 30, 20, 0, 0).unwrap();
        assert_eq!(TimezoneHandler::default().format_date(dt), "Sat Mar 30 2024");
        // 20:00 UTC is already Sunday in Kolkata.
        assert_eq!(
            TimezoneHandler::new("Asia/Kolkata").format_date(dt),
            "Sun Mar 31 2024"
        );
    }

    #[test]
    fn test_format_datetime() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 0).unwrap();
        assert_eq!(TimezoneHandler::default().format_datetime(dt), "2024-01-02 03:04");
    }

    #[test]
    fn test_get_system_timezone_returns_nonempty_string() {
        assert!(!get_system_timezone().is_empty());
    }
}
