//! Alarm fire instants within a time window.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::constants::DEFAULT_WINDOW_DAYS;
use crate::date_range::{DateRange, parse_instant};
use crate::error::{CalarmError, CalarmResult};
use crate::event::{Event, ResolvedAlarm};
use crate::store::CalendarStore;
use crate::trigger::resolve_trigger;

/// An inclusive `[from, to]` window with `from <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl AlarmWindow {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> CalarmResult<Self> {
        if to < from {
            return Err(CalarmError::InvalidWindow(format!(
                "end {} is before start {}",
                to.to_rfc3339(),
                from.to_rfc3339()
            )));
        }
        Ok(AlarmWindow { from, to })
    }

    /// Apply the default window for omitted bounds: now .. now + 30 days.
    pub fn resolve(from: Option<&str>, to: Option<&str>, now: DateTime<Utc>) -> CalarmResult<Self> {
        let from = match from {
            Some(s) => parse_instant(s).map_err(CalarmError::InvalidWindow)?,
            None => now,
        };
        let to = match to {
            Some(s) => parse_instant(s).map_err(CalarmError::InvalidWindow)?,
            None => now + Duration::days(DEFAULT_WINDOW_DAYS),
        };
        AlarmWindow::new(from, to)
    }
}

impl From<AlarmWindow> for DateRange {
    fn from(window: AlarmWindow) -> Self {
        DateRange::new(window.from, window.to)
    }
}

/// Resolve every alarm of every event and keep those firing inside `[from, to]`.
///
/// Sorted by fire instant. Alarms with unparseable triggers are skipped.
pub fn resolve_alarms(events: &[Event], from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<ResolvedAlarm> {
    let mut resolved = Vec::new();

    for event in events {
        for alarm in &event.alarms {
            let Some(fire_instant) = resolve_trigger(&alarm.trigger, event.start) else {
                debug!(uid = %event.uid, trigger = %alarm.trigger, "skipping unparseable trigger");
                continue;
            };
            if from <= fire_instant && fire_instant <= to {
                resolved.push(ResolvedAlarm {
                    source_event_uid: event.uid.clone(),
                    fire_instant,
                });
            }
        }
    }

    resolved.sort_by_key(|r| r.fire_instant);
    resolved
}

/// Fire instants of all alarms inside `[from, to]`, ascending, not deduplicated.
pub fn compute_fire_instants(
    events: &[Event],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<DateTime<Utc>> {
    resolve_alarms(events, from, to)
        .into_iter()
        .map(|r| r.fire_instant)
        .collect()
}

/// Alarm fire instants (epoch milliseconds) for events fetched from `store`.
///
/// Omitted bounds default to now .. now + 30 days.
pub async fn alarm_timestamps<S: CalendarStore>(
    store: &S,
    from: Option<&str>,
    to: Option<&str>,
    now: DateTime<Utc>,
) -> CalarmResult<Vec<i64>> {
    let window = AlarmWindow::resolve(from, to, now)?;
    let events = store.list_events(window.into()).await?;

    let instants = compute_fire_instants(&events, window.from, window.to);
    debug!(events = events.len(), alarms = instants.len(), "computed alarm timestamps");

    Ok(instants.into_iter().map(|at| at.timestamp_millis()).collect())
}
