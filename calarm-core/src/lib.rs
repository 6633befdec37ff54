//! Core types for calarm.
//!
//! This crate derives alarm fire instants from calendar events and watches
//! the clock to decide when an alarm is due:
//! - `duration` and `trigger` parse iCalendar TRIGGER values
//! - `window` resolves alarms into a requested time window
//! - `monitor` holds the due-alarm state machine and its polling driver
//! - `store` is the seam to the calendar backend (CalDAV, REST facade)

pub mod config;
pub mod constants;
pub mod date_range;
pub mod duration;
pub mod error;
pub mod event;
pub mod ics;
pub mod monitor;
pub mod store;
pub mod trigger;
pub mod window;

pub use date_range::DateRange;
pub use error::{CalarmError, CalarmResult};
pub use event::{Alarm, AlarmAction, Event, NewEvent, ResolvedAlarm};
pub use store::CalendarStore;
