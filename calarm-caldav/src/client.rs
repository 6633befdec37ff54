//! CalDAV client over reqwest.
//!
//! One client is bound to one calendar collection and one set of
//! credentials. The REST facade builds a client per request from the
//! caller's `Authorization` header.

use std::time::Duration;

use calarm_core::config::CaldavConfig;
use calarm_core::error::{CalarmError, CalarmResult};
use calarm_core::ics::{generate_ics, parse_calendar};
use calarm_core::{CalendarStore, DateRange, Event, NewEvent};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, IF_MATCH, IF_NONE_MATCH};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::multistatus::{calendar_query, parse_multistatus};

/// Statuses a server answers with when it cannot handle a time-range query.
const UNSUPPORTED_STATUSES: [u16; 6] = [400, 403, 405, 415, 422, 501];

/// Whether `status` means "time-range filtering is not supported here".
pub fn is_unsupported(status: StatusCode) -> bool {
    UNSUPPORTED_STATUSES.contains(&status.as_u16())
}

/// How a reconciled delete concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// The DELETE itself succeeded (or the resource was already gone)
    Deleted,
    /// The DELETE failed but a follow-up listing no longer contains the uid
    ConfirmedAbsent,
}

#[derive(Debug, Clone)]
pub struct CalDavClient {
    http: reqwest::Client,
    calendar_url: Url,
    authorization: Option<String>,
}

impl CalDavClient {
    pub fn new(calendar_url: &str, http: reqwest::Client) -> CalarmResult<Self> {
        let mut calendar_url = Url::parse(calendar_url)
            .map_err(|e| CalarmError::Config(format!("Invalid calendar URL '{calendar_url}': {e}")))?;
        if !calendar_url.path().ends_with('/') {
            let path = format!("{}/", calendar_url.path());
            calendar_url.set_path(&path);
        }

        Ok(CalDavClient {
            http,
            calendar_url,
            authorization: None,
        })
    }

    pub fn from_config(config: &CaldavConfig) -> CalarmResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CalarmError::Config(format!("Could not build HTTP client: {e}")))?;
        Self::new(&config.calendar_url(), http)
    }

    /// Forward this `Authorization` header value on every request.
    pub fn with_authorization(mut self, authorization: Option<String>) -> Self {
        self.authorization = authorization;
        self
    }

    pub fn calendar_url(&self) -> &Url {
        &self.calendar_url
    }

    /// URL of the resource `{calendar}/{uid}.ics`.
    pub fn event_url(&self, uid: &str) -> Url {
        let mut url = self.calendar_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&format!("{uid}.ics"));
        }
        url
    }

    /// Step one of listing: a calendar-query REPORT with a server-side time-range.
    ///
    /// A server that rejects the filter yields [`CalarmError::Unsupported`].
    pub async fn list_in_range(&self, range: DateRange) -> CalarmResult<Vec<Event>> {
        self.report(Some(&range)).await
    }

    /// Step two of listing: every VEVENT in the collection, unfiltered.
    pub async fn list_all(&self) -> CalarmResult<Vec<Event>> {
        self.report(None).await
    }

    /// List events overlapping `range`, falling back to a full listing
    /// filtered locally when the server cannot filter by time.
    pub async fn list_events(&self, range: DateRange) -> CalarmResult<Vec<Event>> {
        if range.is_all() {
            return self.list_all().await;
        }

        match self.list_in_range(range).await {
            Err(CalarmError::Unsupported(reason)) => {
                info!(%reason, "time-range query unsupported, filtering locally");
                let events = self.list_all().await?;
                Ok(filter_overlapping(events, &range))
            }
            other => other,
        }
    }

    /// Create `event` with `PUT {calendar}/{uid}.ics` and `If-None-Match: *`.
    pub async fn create_event(&self, event: NewEvent) -> CalarmResult<Event> {
        let uid = event
            .uid
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let event = event.into_event(uid);
        let ics = generate_ics(&event)?;
        let url = self.event_url(&event.uid);

        let response = self
            .request(Method::PUT, url.clone())
            .header(IF_NONE_MATCH, "*")
            .header(CONTENT_TYPE, "text/calendar; charset=utf-8")
            .body(ics)
            .send()
            .await
            .map_err(|e| CalarmError::Store(format!("Failed to create event: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, "create event", &body));
        }

        debug!(uid = %event.uid, %url, "created event");
        Ok(event)
    }

    /// `DELETE {calendar}/{uid}.ics`, conditional on `etag` when given.
    ///
    /// 404 counts as success.
    pub async fn delete_event(&self, uid: &str, etag: Option<&str>) -> CalarmResult<()> {
        let mut request = self.request(Method::DELETE, self.event_url(uid));
        if let Some(etag) = etag {
            request = request.header(IF_MATCH, etag);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CalarmError::Store(format!("Failed to delete event: {e}")))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            debug!(uid, %status, "deleted event");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, "delete event", &body))
    }

    /// Delete, and if that fails, check whether the event is gone anyway.
    ///
    /// Returns the original delete error unless a full listing confirms the
    /// uid is absent.
    pub async fn delete_event_reconciled(
        &self,
        uid: &str,
        etag: Option<&str>,
    ) -> CalarmResult<DeleteOutcome> {
        let error = match self.delete_event(uid, etag).await {
            Ok(()) => return Ok(DeleteOutcome::Deleted),
            Err(e) => e,
        };

        match self.list_all().await {
            Ok(events) if !events.iter().any(|e| e.uid == uid) => {
                info!(uid, %error, "delete failed but event is absent");
                Ok(DeleteOutcome::ConfirmedAbsent)
            }
            Ok(_) => Err(error),
            Err(list_error) => {
                warn!(uid, error = %list_error, "could not verify deletion");
                Err(error)
            }
        }
    }

    async fn report(&self, range: Option<&DateRange>) -> CalarmResult<Vec<Event>> {
        let method = Method::from_bytes(b"REPORT")
            .map_err(|e| CalarmError::Store(format!("Invalid method: {e}")))?;

        let response = self
            .request(method, self.calendar_url.clone())
            .header("Depth", "1")
            .header(CONTENT_TYPE, "application/xml; charset=utf-8")
            .body(calendar_query(range))
            .send()
            .await
            .map_err(|e| CalarmError::Store(format!("Failed to query calendar: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CalarmError::Store(format!("Failed to read calendar response: {e}")))?;

        if !status.is_success() {
            if range.is_some() && is_unsupported(status) {
                return Err(CalarmError::Unsupported(format!("time-range REPORT (status {status})")));
            }
            return Err(status_error(status, "query calendar", &body));
        }

        let mut events = Vec::new();
        for resource in parse_multistatus(&body)? {
            match parse_calendar(&resource.data) {
                Ok(parsed) => events.extend(parsed.into_iter().map(|mut event| {
                    event.etag = resource.etag.clone();
                    event
                })),
                Err(e) => warn!(href = %resource.href, error = %e, "skipping unparseable resource"),
            }
        }

        debug!(
            events = events.len(),
            filtered = range.is_some(),
            "listed calendar events"
        );
        Ok(events)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.http.request(method, url);
        match &self.authorization {
            Some(auth) => request.header(AUTHORIZATION, auth),
            None => request,
        }
    }
}

impl CalendarStore for CalDavClient {
    async fn list_events(&self, range: DateRange) -> CalarmResult<Vec<Event>> {
        CalDavClient::list_events(self, range).await
    }

    async fn create_event(&self, event: NewEvent) -> CalarmResult<Event> {
        CalDavClient::create_event(self, event).await
    }
}

/// Keep events overlapping `range`: `start < to && end >= from`.
pub fn filter_overlapping(events: Vec<Event>, range: &DateRange) -> Vec<Event> {
    events
        .into_iter()
        .filter(|e| range.overlaps(e.start, e.end))
        .collect()
}

fn status_error(status: StatusCode, action: &str, body: &str) -> CalarmError {
    let message = format!("Failed to {action} (status {status}): {body}");
    match status {
        StatusCode::UNAUTHORIZED => CalarmError::Unauthorized(message),
        StatusCode::NOT_FOUND => CalarmError::NotFound(message),
        _ => CalarmError::Store(message),
    }
}
