//! Provider-neutral event and alarm types.
//!
//! The CalDAV adapter normalizes VEVENT/VALARM data into these records once,
//! at the boundary. Everything downstream works exclusively with them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::trigger::resolve_trigger;

/// A calendar event (read-only input to the alarm core)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique within a calendar
    pub uid: String,
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Entity tag of the stored resource, when the store reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// VALARM components in declared order
    #[serde(default)]
    pub alarms: Vec<Alarm>,
}

impl Event {
    /// The first alarm (in declared order) whose trigger resolves, with its fire instant.
    pub fn first_resolvable_alarm(&self) -> Option<(&Alarm, DateTime<Utc>)> {
        self.alarms
            .iter()
            .find_map(|alarm| resolve_trigger(&alarm.trigger, self.start).map(|at| (alarm, at)))
    }
}

/// A reminder attached to an event (VALARM)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub action: AlarmAction,
    /// Absolute UTC timestamp or signed duration relative to the event start
    pub trigger: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// EMAIL alarms only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// EMAIL alarms only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<String>,
}

impl Alarm {
    pub fn display(trigger: impl Into<String>) -> Self {
        Alarm {
            action: AlarmAction::Display,
            trigger: trigger.into(),
            description: None,
            summary: None,
            attendees: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlarmAction {
    Display,
    Audio,
    Email,
}

impl AlarmAction {
    pub fn as_ics_str(self) -> &'static str {
        match self {
            AlarmAction::Display => "DISPLAY",
            AlarmAction::Audio => "AUDIO",
            AlarmAction::Email => "EMAIL",
        }
    }

    pub fn from_ics_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DISPLAY" => Some(AlarmAction::Display),
            "AUDIO" => Some(AlarmAction::Audio),
            "EMAIL" => Some(AlarmAction::Email),
            _ => None,
        }
    }
}

/// Request body for creating an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Generated by the store when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default)]
    pub alarms: Vec<Alarm>,
}

impl NewEvent {
    /// Materialize the event a store would create under `uid`.
    pub fn into_event(self, uid: String) -> Event {
        Event {
            uid,
            summary: self.summary,
            start: self.start,
            end: self.end,
            description: self.description,
            location: self.location,
            etag: None,
            alarms: self.alarms,
        }
    }
}

/// An alarm resolved to a concrete fire instant. Derived per call, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAlarm {
    pub source_event_uid: String,
    pub fire_instant: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn deserializes_rest_shape() {
        let json = r#"{
            "uid": "e1",
            "summary": "Standup",
            "start": "2025-06-01T10:00:00Z",
            "end": "2025-06-01T10:30:00Z",
            "alarms": [{"action": "DISPLAY", "trigger": "-PT15M"}]
        }"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.uid, "e1");
        assert_eq!(event.start, Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap());
        assert_eq!(event.alarms[0].action, AlarmAction::Display);
        assert!(event.alarms[0].attendees.is_empty());
    }

    #[test]
    fn alarms_default_to_empty() {
        let json = r#"{"uid":"x","summary":"s","start":"2025-06-01T10:00:00Z","end":"2025-06-01T11:00:00Z"}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert!(event.alarms.is_empty());
        assert!(event.first_resolvable_alarm().is_none());
    }

    #[test]
    fn first_resolvable_alarm_skips_garbage() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let event = Event {
            uid: "e1".into(),
            summary: "s".into(),
            start,
            end: start,
            description: None,
            location: None,
            etag: None,
            alarms: vec![Alarm::display("banana"), Alarm::display("-PT5M")],
        };
        let (alarm, at) = event.first_resolvable_alarm().unwrap();
        assert_eq!(alarm.trigger, "-PT5M");
        assert_eq!(at, start - chrono::Duration::minutes(5));
    }

    #[test]
    fn action_serializes_uppercase() {
        let json = serde_json::to_string(&AlarmAction::Email).unwrap();
        assert_eq!(json, "\"EMAIL\"");
        assert_eq!(AlarmAction::from_ics_str("audio"), Some(AlarmAction::Audio));
        assert_eq!(AlarmAction::from_ics_str("PROCEDURE"), None);
    }
}
