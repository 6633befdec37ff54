//! Shared defaults.

/// Default alarm window length (days ahead of now).
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Observed tick interval of the due-alarm check.
pub const DEFAULT_TICK_SECS: u64 = 5;

pub const DEFAULT_REFRESH_SECS: u64 = 60;

pub const DEFAULT_SNOOZE_MINUTES: u32 = 5;

/// Offset between the snoozed alarm instant and the synthesized event's start,
/// and also the length of that event.
pub const SNOOZE_EVENT_MINUTES: i64 = 30;

/// Trigger attached to the synthesized snooze event ("at event start").
pub const SNOOZE_TRIGGER: &str = "-PT0M";
