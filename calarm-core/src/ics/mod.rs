//! iCalendar (RFC 5545) text at the CalDAV boundary.
//!
//! Parsing normalizes VEVENT/VALARM into [`Event`](crate::Event) records;
//! generation writes a NewEvent back out for a PUT.

mod generate;
mod parse;

pub use generate::generate_ics;
pub use parse::{parse_calendar, parse_event};
