//! Date range for filtering events.

use chrono::{DateTime, NaiveDate, Utc};

/// Date range for filtering events.
/// None values mean unbounded in that direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        DateRange {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Unbounded in both directions ("list everything").
    pub fn all() -> Self {
        DateRange::default()
    }

    pub fn is_all(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Parse optional query bounds (`start`/`end`) into a range.
    pub fn from_args(from: Option<&str>, to: Option<&str>) -> Result<Self, String> {
        Ok(DateRange {
            from: from.map(parse_instant).transpose()?,
            to: to.map(parse_instant).transpose()?,
        })
    }

    /// Whether an event spanning `[start, end]` overlaps this range.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        let before_to = self.to.is_none_or(|to| start < to);
        let after_from = self.from.is_none_or(|from| end >= from);
        before_to && after_from
    }

    /// Get `from` in CalDAV time-range format, using a very old date if unbounded.
    pub fn from_caldav(&self) -> String {
        format_caldav(self.from.unwrap_or(DateTime::UNIX_EPOCH))
    }

    /// Get `to` in CalDAV time-range format, using a far future date if unbounded.
    pub fn to_caldav(&self) -> String {
        match self.to {
            Some(to) => format_caldav(to),
            None => "21000101T000000Z".to_string(),
        }
    }
}

/// Parse an RFC 3339 instant, or YYYY-MM-DD as start of day in UTC.
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("Invalid date '{}'. Expected RFC 3339 or YYYY-MM-DD", s))
}

/// `YYYYMMDDTHHMMSSZ`
pub fn format_caldav(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_rfc3339_and_dates() {
        let dt = parse_instant("2025-06-01T09:30:00Z").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap());

        let offset = parse_instant("2025-06-01T11:30:00+02:00").unwrap();
        assert_eq!(offset, dt);

        let day = parse_instant("2025-06-01").unwrap();
        assert_eq!(day, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());

        assert!(parse_instant("next tuesday").is_err());
    }

    #[test]
    fn from_args_keeps_missing_bounds_open() {
        let range = DateRange::from_args(Some("2025-06-01"), None).unwrap();
        assert!(range.from.is_some());
        assert!(range.to.is_none());
        assert!(DateRange::from_args(None, Some("nope")).is_err());
    }

    #[test]
    fn overlap_rules() {
        let range = DateRange::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap(),
        );
        let at = |h| Utc.with_ymd_and_hms(2025, 6, 1, h, 0, 0).unwrap();

        assert!(range.overlaps(at(10), at(11)));
        // Ends exactly at `from`
        assert!(range.overlaps(at(0) - chrono::Duration::hours(1), at(0)));
        // Starts exactly at `to`
        assert!(!range.overlaps(range.to.unwrap(), range.to.unwrap() + chrono::Duration::hours(1)));
        assert!(DateRange::all().overlaps(at(3), at(4)));
    }

    #[test]
    fn caldav_format() {
        let range = DateRange::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 31, 12, 30, 5).unwrap(),
        );
        assert_eq!(range.from_caldav(), "20250101T000000Z");
        assert_eq!(range.to_caldav(), "20250131T123005Z");
        assert_eq!(DateRange::all().from_caldav(), "19700101T000000Z");
    }
}
