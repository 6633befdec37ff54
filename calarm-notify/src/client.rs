//! REST facade client: the notifier's calendar store.

use std::time::Duration;

use calarm_core::config::MonitorConfig;
use calarm_core::date_range::format_caldav;
use calarm_core::error::{CalarmError, CalarmResult};
use calarm_core::{CalendarStore, DateRange, Event, NewEvent};
use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

#[derive(Deserialize)]
struct EventsResponse {
    events: Vec<Event>,
}

#[derive(Deserialize)]
struct CreatedResponse {
    created: Event,
}

#[derive(Deserialize)]
struct AlarmsResponse {
    alarms: Vec<i64>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Clone)]
pub struct RestStore {
    http: reqwest::Client,
    base_url: Url,
    authorization: Option<String>,
}

impl RestStore {
    pub fn new(base_url: &str, authorization: Option<String>, timeout: Duration) -> CalarmResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| CalarmError::Config(format!("Invalid api_url '{base_url}': {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CalarmError::Config(format!("Could not build HTTP client: {e}")))?;

        Ok(RestStore {
            http,
            base_url,
            authorization,
        })
    }

    pub fn from_config(config: &MonitorConfig) -> CalarmResult<Self> {
        Self::new(
            &config.api_url,
            config.authorization.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// GET /alarms: fire instants (epoch ms) in the window, server defaults for omitted bounds.
    pub async fn alarms(&self, from: Option<&str>, to: Option<&str>) -> CalarmResult<Vec<i64>> {
        let mut query = Vec::new();
        if let Some(from) = from {
            query.push(("from", from));
        }
        if let Some(to) = to {
            query.push(("to", to));
        }

        let response = self.get("alarms").query(&query).send().await.map_err(network)?;
        let body: AlarmsResponse = json_or_error(response).await?;
        Ok(body.alarms)
    }

    fn url(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(path);
        }
        url
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.get(self.url(path)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.authorization {
            Some(auth) => request.header(AUTHORIZATION, auth),
            None => request,
        }
    }
}

impl CalendarStore for RestStore {
    async fn list_events(&self, range: DateRange) -> CalarmResult<Vec<Event>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if range.is_all() {
            query.push(("all", "true".to_string()));
        }
        if let Some(from) = range.from {
            query.push(("start", from.to_rfc3339()));
        }
        if let Some(to) = range.to {
            query.push(("end", to.to_rfc3339()));
        }

        let response = self.get("events").query(&query).send().await.map_err(network)?;
        let body: EventsResponse = json_or_error(response).await?;

        debug!(
            events = body.events.len(),
            from = ?range.from.map(format_caldav),
            "fetched events from api"
        );
        Ok(body.events)
    }

    async fn create_event(&self, event: NewEvent) -> CalarmResult<Event> {
        let response = self
            .authorize(self.http.post(self.url("events")))
            .json(&event)
            .send()
            .await
            .map_err(network)?;
        let body: CreatedResponse = json_or_error(response).await?;
        Ok(body.created)
    }
}

fn network(e: reqwest::Error) -> CalarmError {
    CalarmError::Store(format!("Request to calarm API failed: {e}"))
}

async fn json_or_error<T: serde::de::DeserializeOwned>(response: Response) -> CalarmResult<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| CalarmError::Serialization(e.to_string()));
    }

    let message = response
        .json::<ErrorResponse>()
        .await
        .map(|body| body.error)
        .unwrap_or_else(|_| status.to_string());

    Err(match status {
        StatusCode::BAD_REQUEST => CalarmError::InvalidWindow(message),
        StatusCode::UNAUTHORIZED => CalarmError::Unauthorized(message),
        StatusCode::NOT_FOUND => CalarmError::NotFound(message),
        _ => CalarmError::Store(message),
    })
}
