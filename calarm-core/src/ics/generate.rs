//! ICS generation for events sent to a CalDAV server.

use chrono::{Duration, Utc};
use icalendar::{Calendar, Component, EventLike, Property, ValueType};

use crate::date_range::format_caldav;
use crate::error::{CalarmError, CalarmResult};
use crate::event::{Alarm, AlarmAction, Event};
use crate::trigger::Trigger;

/// Generate a VCALENDAR with a single VEVENT.
///
/// Fails with `IcsParse` if an alarm's trigger is not a valid literal.
pub fn generate_ics(event: &Event) -> CalarmResult<String> {
    let mut cal = Calendar::new();

    let mut ics_event = icalendar::Event::new();
    ics_event.uid(&event.uid);
    ics_event.summary(&event.summary);
    ics_event.add_property("DTSTAMP", format_caldav(Utc::now()));
    ics_event.add_property("DTSTART", format_caldav(event.start));
    ics_event.add_property("DTEND", format_caldav(event.end));

    if let Some(ref desc) = event.description {
        ics_event.description(desc);
    }
    if let Some(ref loc) = event.location {
        ics_event.location(loc);
    }

    for alarm in &event.alarms {
        ics_event.alarm(to_valarm(alarm, &event.summary)?);
    }

    cal.push(ics_event.done());
    let cal = cal.done();

    Ok(strip_ics_bloat(&cal.to_string()))
}

fn to_valarm(alarm: &Alarm, event_summary: &str) -> CalarmResult<icalendar::Alarm> {
    let trigger = Trigger::parse(&alarm.trigger)
        .ok_or_else(|| CalarmError::IcsParse(format!("invalid alarm trigger '{}'", alarm.trigger)))?;

    // Placeholder trigger, replaced below with the exact literal
    let placeholder = icalendar::Trigger::before_start(Duration::zero());
    let description = alarm.description.as_deref().unwrap_or(event_summary);

    let mut valarm = match alarm.action {
        AlarmAction::Display => icalendar::Alarm::display(description, placeholder),
        AlarmAction::Audio => icalendar::Alarm::audio(placeholder),
        AlarmAction::Email => {
            let mut valarm = icalendar::Alarm::display(description, placeholder);
            valarm.add_property("ACTION", AlarmAction::Email.as_ics_str());
            if let Some(ref summary) = alarm.summary {
                valarm.add_property("SUMMARY", summary);
            }
            for attendee in &alarm.attendees {
                valarm.append_multi_property(Property::new("ATTENDEE", format!("mailto:{attendee}")));
            }
            valarm
        }
    };

    let trigger_prop = match trigger {
        Trigger::Absolute(at) => {
            let mut prop = Property::new("TRIGGER", format_caldav(at));
            prop.append_parameter(ValueType::DateTime);
            prop
        }
        Trigger::Relative(_) => Property::new("TRIGGER", alarm.trigger.trim().to_ascii_uppercase()),
    };
    valarm.append_property(trigger_prop);

    Ok(valarm.done())
}

/// Clean up ICS output from the icalendar crate
/// - Replace PRODID
/// - Remove CALSCALE:GREGORIAN (it's the default)
/// - Remove DTSTAMP and UID inside VALARM sections (not required by RFC 5545)
fn strip_ics_bloat(ics: &str) -> String {
    let mut result = String::with_capacity(ics.len());
    let mut in_valarm = false;

    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            result.push_str("PRODID:-//calarm//EN\r\n");
            continue;
        }
        if line == "CALSCALE:GREGORIAN" {
            continue;
        }

        if line == "BEGIN:VALARM" {
            in_valarm = true;
        } else if line == "END:VALARM" {
            in_valarm = false;
        }

        if in_valarm && (line.starts_with("DTSTAMP:") || line.starts_with("UID:")) {
            continue;
        }

        result.push_str(line);
        result.push_str("\r\n");
    }

    result
}
