//! Due-alarm monitoring: the state machine and the task that drives it.

mod driver;
mod state;

pub use driver::{Clock, MonitorEvent, MonitorHandle, MonitorOptions, MonitorSnapshot, SystemClock};
pub use state::{AlarmMonitor, DueAlarm, FiredSet, MonitorState, snooze_event};
