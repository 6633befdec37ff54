//! ICS parsing using the icalendar crate's parser.
//!
//! Every date-time is normalized to UTC here, once, so the alarm core never
//! sees TZID or DATE values.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{Component, Property, read_calendar, unfold},
};
use tracing::debug;

use crate::duration::parse_duration;
use crate::error::{CalarmError, CalarmResult};
use crate::event::{Alarm, AlarmAction, Event};

/// Parse every VEVENT in an ICS document.
///
/// VEVENTs without a UID or a usable DTSTART are skipped.
pub fn parse_calendar(content: &str) -> CalarmResult<Vec<Event>> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).map_err(CalarmError::IcsParse)?;

    Ok(calendar
        .components
        .iter()
        .filter(|c| c.name == "VEVENT")
        .filter_map(|vevent| {
            let event = vevent_to_event(vevent);
            if event.is_none() {
                debug!("skipping VEVENT without UID or DTSTART");
            }
            event
        })
        .collect())
}

/// Parse the first VEVENT of an ICS document.
pub fn parse_event(content: &str) -> Option<Event> {
    parse_calendar(content).ok()?.into_iter().next()
}

fn vevent_to_event(vevent: &Component) -> Option<Event> {
    let uid = vevent.find_prop("UID")?.val.to_string();
    let summary = vevent
        .find_prop("SUMMARY")
        .map(|p| p.val.to_string())
        .unwrap_or_else(|| "(No title)".to_string());

    let start_prop = DatePerhapsTime::try_from(vevent.find_prop("DTSTART")?).ok()?;
    let all_day = matches!(start_prop, DatePerhapsTime::Date(_));
    let start = to_utc(start_prop);

    let end = vevent
        .find_prop("DTEND")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .map(to_utc)
        .or_else(|| {
            let ms = parse_duration(vevent.find_prop("DURATION")?.val.as_ref())?;
            start.checked_add_signed(Duration::milliseconds(ms))
        })
        .unwrap_or_else(|| if all_day { start + Duration::days(1) } else { start });

    let description = vevent.find_prop("DESCRIPTION").map(|p| p.val.to_string());
    let location = vevent.find_prop("LOCATION").map(|p| p.val.to_string());

    let alarms = vevent
        .components
        .iter()
        .filter(|c| c.name == "VALARM")
        .filter_map(|valarm| parse_alarm(valarm, end))
        .collect();

    Some(Event {
        uid,
        summary,
        start,
        end,
        description,
        location,
        etag: None,
        alarms,
    })
}

fn parse_alarm(valarm: &Component, event_end: DateTime<Utc>) -> Option<Alarm> {
    let trigger = normalize_trigger(valarm.find_prop("TRIGGER")?, event_end);
    let action = valarm
        .find_prop("ACTION")
        .and_then(|p| AlarmAction::from_ics_str(p.val.as_ref()))
        .unwrap_or(AlarmAction::Display);

    let attendees = valarm
        .properties
        .iter()
        .filter(|p| p.name == "ATTENDEE")
        .map(|p| {
            let val = p.val.as_ref();
            val.strip_prefix("mailto:").unwrap_or(val).to_string()
        })
        .collect();

    Some(Alarm {
        action,
        trigger,
        description: valarm.find_prop("DESCRIPTION").map(|p| p.val.to_string()),
        summary: valarm.find_prop("SUMMARY").map(|p| p.val.to_string()),
        attendees,
    })
}

/// TRIGGER text in the core's literal form.
///
/// Absolute `20250101T000000Z` becomes `2025-01-01T00:00:00Z`. Durations
/// pass through unchanged, except `RELATED=END` ones, which are anchored to
/// the event end and emitted as absolute instants.
fn normalize_trigger(prop: &Property, event_end: DateTime<Utc>) -> String {
    let val = prop.val.as_ref().trim();

    if has_param(prop, "VALUE", "DATE-TIME") || looks_like_basic_utc(val) {
        if let Ok(naive) = NaiveDateTime::parse_from_str(val, "%Y%m%dT%H%M%SZ") {
            return format_literal(naive.and_utc());
        }
    }

    if has_param(prop, "RELATED", "END") {
        let at = parse_duration(val)
            .and_then(|ms| event_end.checked_add_signed(Duration::milliseconds(ms)));
        match at {
            Some(at) => return format_literal(at),
            None => debug!(trigger = val, "unresolvable end-related trigger"),
        }
    }
    val.to_string()
}

fn has_param(prop: &Property, key: &str, value: &str) -> bool {
    prop.params.iter().any(|p| {
        p.key.as_str().eq_ignore_ascii_case(key)
            && p.val.as_ref().is_some_and(|v| v.as_str().eq_ignore_ascii_case(value))
    })
}

fn format_literal(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn looks_like_basic_utc(val: &str) -> bool {
    val.len() == 16 && val.as_bytes()[8] == b'T' && val.ends_with('Z')
}

/// Convert icalendar's DatePerhapsTime to a UTC instant.
///
/// DATE is UTC midnight, floating times are read as UTC, and a TZID that
/// does not name an IANA zone falls back to UTC.
fn to_utc(dpt: DatePerhapsTime) -> DateTime<Utc> {
    match dpt {
        DatePerhapsTime::Date(d) => d.and_time(chrono::NaiveTime::MIN).and_utc(),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            CalendarDateTime::Utc(dt) => dt,
            CalendarDateTime::Floating(naive) => naive.and_utc(),
            CalendarDateTime::WithTimezone { date_time, tzid } => zoned_to_utc(date_time, &tzid),
        },
    }
}

fn zoned_to_utc(date_time: NaiveDateTime, tzid: &str) -> DateTime<Utc> {
    match tzid.parse::<chrono_tz::Tz>() {
        Ok(tz) => tz
            .from_local_datetime(&date_time)
            .earliest()
            // Inside a DST gap: shift past it
            .or_else(|| tz.from_local_datetime(&(date_time + Duration::hours(1))).earliest())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| date_time.and_utc()),
        Err(_) => {
            debug!(tzid, "unknown TZID, treating as UTC");
            date_time.and_utc()
        }
    }
}
