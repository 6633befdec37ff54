//! The seam between the alarm core and whatever owns the events.
//!
//! Implemented by the CalDAV adapter (server side) and by the REST facade
//! client (notifier side). Credentials are bound into the store instance.

use std::future::Future;
use std::sync::Arc;

use crate::date_range::DateRange;
use crate::error::CalarmResult;
use crate::event::{Event, NewEvent};

pub trait CalendarStore: Send + Sync {
    /// List events overlapping `range`. An unbounded range lists everything.
    fn list_events(&self, range: DateRange) -> impl Future<Output = CalarmResult<Vec<Event>>> + Send;

    /// Create an event and return it as stored (at least with its uid).
    fn create_event(&self, event: NewEvent) -> impl Future<Output = CalarmResult<Event>> + Send;
}

impl<S: CalendarStore> CalendarStore for Arc<S> {
    fn list_events(&self, range: DateRange) -> impl Future<Output = CalarmResult<Vec<Event>>> + Send {
        (**self).list_events(range)
    }

    fn create_event(&self, event: NewEvent) -> impl Future<Output = CalarmResult<Event>> + Send {
        (**self).create_event(event)
    }
}
