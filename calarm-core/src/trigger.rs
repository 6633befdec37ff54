//! Alarm TRIGGER values resolved against an event's start.

use chrono::{DateTime, Duration, Utc};

use crate::duration::parse_duration;

/// A parsed TRIGGER value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Fires at this instant regardless of the event start
    Absolute(DateTime<Utc>),
    /// Signed offset from the event start, in milliseconds
    Relative(i64),
}

impl Trigger {
    /// Parse a trigger literal. Absolute timestamps are tried before durations.
    pub fn parse(value: &str) -> Option<Self> {
        if let Some(at) = parse_absolute_utc(value) {
            return Some(Trigger::Absolute(at));
        }
        parse_duration(value).map(Trigger::Relative)
    }

    pub fn fire_instant(&self, event_start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            Trigger::Absolute(at) => Some(at),
            Trigger::Relative(ms) => event_start.checked_add_signed(Duration::milliseconds(ms)),
        }
    }
}

/// Resolve a trigger literal to a fire instant, or `None` if it does not parse.
pub fn resolve_trigger(trigger: &str, event_start: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Trigger::parse(trigger)?.fire_instant(event_start)
}

/// Strict `YYYY-MM-DDTHH:MM:SS[.fff]Z`.
fn parse_absolute_utc(s: &str) -> Option<DateTime<Utc>> {
    let bytes = s.as_bytes();
    if bytes.len() < 20 || bytes[bytes.len() - 1] != b'Z' {
        return None;
    }

    const SHAPE: &[u8; 19] = b"dddd-dd-ddTdd:dd:dd";
    let shape_ok = SHAPE.iter().zip(bytes).all(|(&expected, &actual)| match expected {
        b'd' => actual.is_ascii_digit(),
        other => actual == other,
    });
    if !shape_ok {
        return None;
    }

    // Optional fraction between the seconds and the trailing Z
    let fraction = &bytes[19..bytes.len() - 1];
    match fraction {
        [] => {}
        [b'.', digits @ ..] if !digits.is_empty() && digits.iter().all(u8::is_ascii_digit) => {}
        _ => return None,
    }

    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn relative_trigger_offsets_start() {
        let s = start();
        assert_eq!(resolve_trigger("-PT10M", s), Some(s - Duration::milliseconds(600_000)));
        assert_eq!(resolve_trigger("PT30S", s), Some(s + Duration::seconds(30)));
    }

    #[test]
    fn absolute_trigger_ignores_start() {
        let literal = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        for s in [start(), Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 59).unwrap()] {
            assert_eq!(resolve_trigger("2025-01-01T00:00:00Z", s), Some(literal));
        }
    }

    #[test]
    fn absolute_with_fraction() {
        let at = resolve_trigger("2025-01-01T00:00:00.250Z", start()).unwrap();
        assert_eq!(at.timestamp_millis(), 1_735_689_600_250);
    }

    #[test]
    fn rejects_non_strict_timestamps() {
        for bad in [
            "2025-01-01T00:00:00",
            "2025-01-01T00:00:00+00:00",
            "2025-01-01 00:00:00Z",
            "2025-01-01t00:00:00Z",
            "2025-01-01T00:00:00.Z",
            "20250101T000000Z",
            "2025-13-01T00:00:00Z",
        ] {
            assert_eq!(resolve_trigger(bad, start()), None, "{bad:?} should be invalid");
        }
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(resolve_trigger("banana", start()), None);
        assert_eq!(Trigger::parse(""), None);
    }
}
