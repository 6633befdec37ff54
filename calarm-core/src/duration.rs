//! iCalendar duration literals (RFC 5545 `dur-value`) as signed milliseconds.
//!
//! Accepted shape, case-insensitive:
//! `[-]P[nW][nD][T[nH][nM][nS]]`, fields in that fixed order.
//! Unlike strict ISO 8601, weeks may be combined with other units (`P1W2D`).

const MS_PER_MINUTE: i64 = 60_000;
const MS_PER_SECOND: i64 = 1_000;

/// Parse a duration literal into signed milliseconds.
///
/// Returns `None` for anything that does not match the grammar; callers treat
/// that as "no usable trigger".
pub fn parse_duration(literal: &str) -> Option<i64> {
    let upper = literal.to_ascii_uppercase();

    let (sign, rest) = match upper.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, upper.as_str()),
    };

    let body = rest.strip_prefix('P')?;
    let (date_part, time_part) = match body.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (body, None),
    };

    let [weeks, days] = parse_fields(date_part, ['W', 'D'])?;
    let [hours, minutes, seconds] = match time_part {
        Some(time) => parse_fields(time, ['H', 'M', 'S'])?,
        None => [0; 3],
    };

    let total_minutes = weeks
        .checked_mul(7)?
        .checked_add(days)?
        .checked_mul(24)?
        .checked_add(hours)?
        .checked_mul(60)?
        .checked_add(minutes)?;

    let ms = total_minutes
        .checked_mul(MS_PER_MINUTE)?
        .checked_add(seconds.checked_mul(MS_PER_SECOND)?)?;

    Some(sign * ms)
}

/// Scan `<digits><unit>` pairs whose units appear in `units` order, each at most once.
fn parse_fields<const N: usize>(mut s: &str, units: [char; N]) -> Option<[i64; N]> {
    let mut values = [0i64; N];
    let mut next = 0;

    while !s.is_empty() {
        let digits = s.find(|c: char| !c.is_ascii_digit())?;
        if digits == 0 {
            return None;
        }
        let value: i64 = s[..digits].parse().ok()?;
        let unit = s[digits..].chars().next()?;

        let slot = next + units.get(next..)?.iter().position(|&u| u == unit)?;
        values[slot] = value;
        next = slot + 1;

        s = &s[digits + unit.len_utf8()..];
    }

    Some(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_unit_arithmetic() {
        assert_eq!(parse_duration("P1W"), Some(604_800_000));
        assert_eq!(parse_duration("-PT10M"), Some(-600_000));
        assert_eq!(parse_duration("PT30S"), Some(30_000));
        assert_eq!(parse_duration("P1DT2H"), Some(93_600_000));
    }

    #[test]
    fn weeks_combine_with_days() {
        assert_eq!(parse_duration("P1W2D"), Some(9 * 86_400_000));
    }

    #[test]
    fn all_fields() {
        // ((((1*7 + 1)*24 + 1)*60 + 1)*60000) + 1000
        assert_eq!(parse_duration("P1W1DT1H1M1S"), Some(((8 * 24 + 1) * 60 + 1) * 60_000 + 1_000));
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(parse_duration("-pt15m"), Some(-900_000));
        assert_eq!(parse_duration("p2d"), Some(2 * 86_400_000));
    }

    #[test]
    fn bare_designators_are_zero() {
        assert_eq!(parse_duration("P"), Some(0));
        assert_eq!(parse_duration("PT"), Some(0));
        assert_eq!(parse_duration("-PT0M"), Some(0));
    }

    #[test]
    fn rejects_malformed() {
        for bad in [
            "", "banana", "10M", "-", "PT10", "P10", "PTM", "PT10M5", "PT5S10M", "P1D1W", "PT1H1H",
            "P1H", "PT1D", "P1DT2HX", "--PT1M", "P T1M", "PT-1M", "P1.5D", "+PT1H", "+P1D",
        ] {
            assert_eq!(parse_duration(bad), None, "{bad:?} should be invalid");
        }
    }

    #[test]
    fn rejects_overflow() {
        assert_eq!(parse_duration("P99999999999999999999W"), None);
        assert_eq!(parse_duration("P9223372036854775807W"), None);
    }
}
