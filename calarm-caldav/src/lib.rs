//! CalDAV calendar store for calarm.
//!
//! Lists, creates and deletes VEVENT resources in a single calendar
//! collection and normalizes them into calarm-core events.

mod client;
mod multistatus;

pub use client::{CalDavClient, DeleteOutcome, filter_overlapping, is_unsupported};
pub use multistatus::{CalendarResource, calendar_query, parse_multistatus};
