//! The due-alarm state machine.
//!
//! Pure and synchronous: every transition takes `now` explicitly. The async
//! driver in `driver.rs` owns one instance and feeds it ticks and commands.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::constants::{SNOOZE_EVENT_MINUTES, SNOOZE_TRIGGER};
use crate::error::{CalarmError, CalarmResult};
use crate::event::{Alarm, Event, NewEvent};

/// Event uids whose alarm has been presented during this process lifetime.
///
/// Grows monotonically; nothing is ever removed.
#[derive(Debug, Default, Clone)]
pub struct FiredSet(HashSet<String>);

impl FiredSet {
    pub fn contains(&self, uid: &str) -> bool {
        self.0.contains(uid)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    fn insert(&mut self, uid: &str) -> bool {
        self.0.insert(uid.to_string())
    }
}

/// An alarm that has become due, with its owning event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DueAlarm {
    pub event: Event,
    pub alarm: Alarm,
    pub fire_instant: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", content = "alarm", rename_all = "snake_case")]
pub enum MonitorState {
    #[default]
    Idle,
    Presenting(DueAlarm),
}

#[derive(Debug, Default)]
pub struct AlarmMonitor {
    candidates: Vec<Event>,
    fired: FiredSet,
    state: MonitorState,
    snooze_in_flight: bool,
}

impl AlarmMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn active(&self) -> Option<&DueAlarm> {
        match &self.state {
            MonitorState::Presenting(due) => Some(due),
            MonitorState::Idle => None,
        }
    }

    pub fn fired(&self) -> &FiredSet {
        &self.fired
    }

    pub fn candidates(&self) -> &[Event] {
        &self.candidates
    }

    pub fn snooze_in_flight(&self) -> bool {
        self.snooze_in_flight
    }

    /// Replace the candidate list with a fresh fetch.
    ///
    /// Keeps upcoming events that carry at least one alarm, ordered by start.
    /// Does not touch the presenting state or the fired set.
    pub fn replace_candidates(&mut self, events: Vec<Event>, now: DateTime<Utc>) {
        let mut upcoming: Vec<Event> = events
            .into_iter()
            .filter(|e| !e.alarms.is_empty() && e.start > now)
            .collect();
        upcoming.sort_by_key(|e| e.start);
        self.candidates = upcoming;
    }

    /// Candidates whose alarm is due at `now` and has not fired yet, in list order.
    pub fn due_candidates(&self, now: DateTime<Utc>) -> impl Iterator<Item = DueAlarm> + '_ {
        self.candidates
            .iter()
            .filter(|event| !self.fired.contains(&event.uid))
            .filter_map(move |event| {
                let (alarm, fire_instant) = event.first_resolvable_alarm()?;
                (fire_instant <= now).then(|| DueAlarm {
                    event: event.clone(),
                    alarm: alarm.clone(),
                    fire_instant,
                })
            })
    }

    /// Promote the first due candidate if nothing is being presented.
    ///
    /// Returns the newly presented alarm; the caller performs the notification.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<DueAlarm> {
        if matches!(self.state, MonitorState::Presenting(_)) {
            return None;
        }

        let due = self.due_candidates(now).next()?;
        self.fired.insert(&due.event.uid);
        self.state = MonitorState::Presenting(due.clone());
        Some(due)
    }

    pub fn dismiss(&mut self) -> CalarmResult<DueAlarm> {
        if self.snooze_in_flight {
            return Err(CalarmError::SnoozeInFlight);
        }
        match std::mem::take(&mut self.state) {
            MonitorState::Presenting(due) => Ok(due),
            MonitorState::Idle => Err(CalarmError::NotPresenting),
        }
    }

    /// Start a snooze: returns the event to create. The alarm stays presented
    /// until [`complete_snooze`](Self::complete_snooze) or
    /// [`abort_snooze`](Self::abort_snooze).
    pub fn begin_snooze(&mut self, minutes: u32, now: DateTime<Utc>) -> CalarmResult<NewEvent> {
        if self.snooze_in_flight {
            return Err(CalarmError::SnoozeInFlight);
        }
        let due = self.active().ok_or(CalarmError::NotPresenting)?;
        let request = snooze_event(&due.event, minutes, now);
        self.snooze_in_flight = true;
        Ok(request)
    }

    /// The snooze event was created: back to idle.
    pub fn complete_snooze(&mut self) -> CalarmResult<DueAlarm> {
        if !self.snooze_in_flight {
            return Err(CalarmError::NotPresenting);
        }
        self.snooze_in_flight = false;
        match std::mem::take(&mut self.state) {
            MonitorState::Presenting(due) => Ok(due),
            MonitorState::Idle => Err(CalarmError::NotPresenting),
        }
    }

    /// The snooze event could not be created: keep presenting the same alarm.
    pub fn abort_snooze(&mut self) {
        self.snooze_in_flight = false;
    }
}

/// The reminder event a snooze creates.
///
/// Starts 30 minutes after `now + minutes`, lasts 30 minutes and carries one
/// DISPLAY alarm at its start.
pub fn snooze_event(original: &Event, minutes: u32, now: DateTime<Utc>) -> NewEvent {
    let alarm_at = now + Duration::minutes(i64::from(minutes));
    let start = alarm_at + Duration::minutes(SNOOZE_EVENT_MINUTES);

    NewEvent {
        summary: format!("⏰ {} (Snoozed)", original.summary),
        start,
        end: start + Duration::minutes(SNOOZE_EVENT_MINUTES),
        description: None,
        location: None,
        uid: None,
        alarms: vec![Alarm::display(SNOOZE_TRIGGER)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AlarmAction;
    use crate::trigger::resolve_trigger;
    use chrono::TimeZone;

    fn utc(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, h, m, s).unwrap()
    }

    fn event(uid: &str, start: DateTime<Utc>, trigger: &str) -> Event {
        Event {
            uid: uid.to_string(),
            summary: format!("Meeting {uid}"),
            start,
            end: start + Duration::minutes(30),
            description: None,
            location: None,
            etag: None,
            alarms: vec![Alarm::display(trigger)],
        }
    }

    fn monitor_with(events: Vec<Event>, now: DateTime<Utc>) -> AlarmMonitor {
        let mut monitor = AlarmMonitor::new();
        monitor.replace_candidates(events, now);
        monitor
    }

    #[test]
    fn tick_presents_due_alarm_once() {
        let mut monitor = monitor_with(vec![event("e1", utc(10, 0, 0), "-PT15M")], utc(9, 0, 0));

        assert!(monitor.tick(utc(9, 44, 59)).is_none());
        assert_eq!(monitor.state(), &MonitorState::Idle);

        let due = monitor.tick(utc(9, 45, 0)).expect("alarm should be due");
        assert_eq!(due.event.uid, "e1");
        assert_eq!(due.fire_instant, utc(9, 45, 0));
        assert!(monitor.fired().contains("e1"));

        // Second tick leaves the same alarm presented
        assert!(monitor.tick(utc(9, 45, 5)).is_none());
        assert_eq!(monitor.active().map(|d| d.event.uid.as_str()), Some("e1"));
    }

    #[test]
    fn dismissed_alarm_never_fires_again() {
        let mut monitor = monitor_with(vec![event("e1", utc(10, 0, 0), "-PT15M")], utc(9, 0, 0));
        monitor.tick(utc(9, 45, 0)).unwrap();
        monitor.dismiss().unwrap();

        for secs in (5..60).step_by(5) {
            assert!(monitor.tick(utc(9, 45, secs)).is_none());
        }
        // A refresh with the same event does not reset the fired set
        monitor.replace_candidates(vec![event("e1", utc(10, 0, 0), "-PT15M")], utc(9, 46, 0));
        assert!(monitor.tick(utc(9, 46, 5)).is_none());
        assert_eq!(monitor.fired().len(), 1);
    }

    #[test]
    fn waiting_alarms_surface_after_dismiss() {
        let mut monitor = monitor_with(
            vec![
                event("b", utc(10, 5, 0), "-PT20M"),
                event("a", utc(10, 0, 0), "-PT15M"),
            ],
            utc(9, 0, 0),
        );

        // Both due; declaration order after the start sort puts "a" first
        let first = monitor.tick(utc(9, 50, 0)).unwrap();
        assert_eq!(first.event.uid, "a");
        assert!(monitor.tick(utc(9, 50, 5)).is_none());

        monitor.dismiss().unwrap();
        let second = monitor.tick(utc(9, 50, 10)).unwrap();
        assert_eq!(second.event.uid, "b");
    }

    #[test]
    fn candidates_skip_past_and_alarmless_events() {
        let mut no_alarm = event("quiet", utc(11, 0, 0), "-PT5M");
        no_alarm.alarms.clear();
        let monitor = monitor_with(
            vec![event("past", utc(8, 0, 0), "-PT5M"), no_alarm, event("next", utc(11, 0, 0), "-PT5M")],
            utc(9, 0, 0),
        );
        let uids: Vec<&str> = monitor.candidates().iter().map(|e| e.uid.as_str()).collect();
        assert_eq!(uids, vec!["next"]);
    }

    #[test]
    fn unparseable_first_alarm_falls_through_to_next() {
        let mut ev = event("e1", utc(10, 0, 0), "banana");
        ev.alarms.push(Alarm::display("-PT30M"));
        let mut monitor = monitor_with(vec![ev], utc(9, 0, 0));
        let due = monitor.tick(utc(9, 30, 0)).unwrap();
        assert_eq!(due.alarm.trigger, "-PT30M");
    }

    #[test]
    fn dismiss_and_snooze_require_presenting() {
        let mut monitor = AlarmMonitor::new();
        assert!(matches!(monitor.dismiss(), Err(CalarmError::NotPresenting)));
        assert!(matches!(monitor.begin_snooze(5, utc(9, 0, 0)), Err(CalarmError::NotPresenting)));
    }

    #[test]
    fn snooze_builds_reminder_event() {
        let now = utc(9, 45, 0);
        let mut monitor = monitor_with(vec![event("e1", utc(10, 0, 0), "-PT15M")], utc(9, 0, 0));
        monitor.tick(now).unwrap();

        let request = monitor.begin_snooze(5, now).unwrap();
        assert_eq!(request.summary, "⏰ Meeting e1 (Snoozed)");
        assert_eq!(request.start, utc(10, 20, 0));
        assert_eq!(request.end, utc(10, 50, 0));
        assert_eq!(request.alarms.len(), 1);
        assert_eq!(request.alarms[0].action, AlarmAction::Display);
        assert_eq!(resolve_trigger(&request.alarms[0].trigger, request.start), Some(request.start));

        // Still presenting while the create is pending
        assert!(monitor.active().is_some());
        assert!(monitor.tick(utc(9, 45, 5)).is_none());
        assert!(matches!(monitor.begin_snooze(5, now), Err(CalarmError::SnoozeInFlight)));
        assert!(matches!(monitor.dismiss(), Err(CalarmError::SnoozeInFlight)));

        let original = monitor.complete_snooze().unwrap();
        assert_eq!(original.event.uid, "e1");
        assert_eq!(monitor.state(), &MonitorState::Idle);
        assert!(monitor.fired().contains("e1"));
    }

    #[test]
    fn failed_snooze_keeps_alarm_presented() {
        let now = utc(9, 45, 0);
        let mut monitor = monitor_with(vec![event("e1", utc(10, 0, 0), "-PT15M")], utc(9, 0, 0));
        let presented = monitor.tick(now).unwrap();

        monitor.begin_snooze(10, now).unwrap();
        monitor.abort_snooze();

        assert_eq!(monitor.active(), Some(&presented));
        assert!(!monitor.snooze_in_flight());
        // The user can retry
        assert!(monitor.begin_snooze(10, now).is_ok());
    }

    #[test]
    fn snoozed_reminder_is_tracked_independently() {
        let now = utc(9, 45, 0);
        let mut monitor = monitor_with(vec![event("e1", utc(10, 0, 0), "-PT15M")], utc(9, 0, 0));
        monitor.tick(now).unwrap();
        let request = monitor.begin_snooze(5, now).unwrap();
        monitor.complete_snooze().unwrap();

        let snoozed = request.into_event("e1-snoozed".into());
        monitor.replace_candidates(
            vec![event("e1", utc(10, 0, 0), "-PT15M"), snoozed],
            utc(9, 45, 1),
        );

        assert!(monitor.tick(utc(10, 19, 59)).is_none());
        let due = monitor.tick(utc(10, 20, 0)).unwrap();
        assert_eq!(due.event.uid, "e1-snoozed");
    }
}
