//! Event endpoints

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::HeaderMap,
    routing::{delete, get},
};
use calarm_caldav::DeleteOutcome;
use calarm_core::{CalarmError, DateRange, Event, NewEvent};
use serde::{Deserialize, Serialize};

use crate::routes::{AppError, authorization, require_authorization};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route("/events/{uid}", delete(delete_event))
}

#[derive(Deserialize)]
pub struct ListEventsQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    #[serde(default)]
    pub all: bool,
}

#[derive(Serialize)]
pub struct EventsResponse {
    pub events: Vec<Event>,
}

/// GET /events?start&end&all - List events overlapping a range
async fn list_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<EventsResponse>, AppError> {
    let range = if query.all {
        DateRange::all()
    } else {
        DateRange::from_args(query.start.as_deref(), query.end.as_deref())
            .map_err(CalarmError::InvalidWindow)?
    };

    let events = state.caldav(authorization(&headers)).list_events(range).await?;

    Ok(Json(EventsResponse { events }))
}

#[derive(Serialize)]
pub struct CreatedResponse {
    pub created: Event,
}

/// POST /events - Create a new event
async fn create_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<NewEvent>, JsonRejection>,
) -> Result<Json<CreatedResponse>, AppError> {
    let Json(event) = payload.map_err(|rejection| {
        AppError::bad_request(format!(
            "Required: summary, start, end. Optional: description, location, uid, alarms ({})",
            rejection.body_text()
        ))
    })?;

    if event.summary.trim().is_empty() {
        return Err(AppError::bad_request("summary must not be empty"));
    }
    if event.end < event.start {
        return Err(AppError::bad_request("end is before start"));
    }

    let created = state.caldav(authorization(&headers)).create_event(event).await?;

    Ok(Json(CreatedResponse { created }))
}

#[derive(Deserialize)]
pub struct DeleteEventQuery {
    pub etag: Option<String>,
    #[serde(default)]
    pub reconcile: bool,
}

#[derive(Serialize)]
pub struct DeletedResponse {
    pub ok: bool,
    pub outcome: DeleteOutcome,
}

/// DELETE /events/{uid}?etag&reconcile - Delete an event by uid
async fn delete_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(uid): Path<String>,
    Query(query): Query<DeleteEventQuery>,
) -> Result<Json<DeletedResponse>, AppError> {
    let caldav = state.caldav(Some(require_authorization(&headers)?));
    let etag = query.etag.as_deref();

    let outcome = if query.reconcile {
        caldav.delete_event_reconciled(&uid, etag).await?
    } else {
        caldav.delete_event(&uid, etag).await?;
        DeleteOutcome::Deleted
    };

    Ok(Json(DeletedResponse { ok: true, outcome }))
}

#[cfg(test)]
mod tests {
    use crate::routes::tests::{app, call};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn create_without_required_fields_is_400() {
        let request = Request::post("/events")
            .header("Content-Type", "application/json")
            .body(Body::from(json!({ "summary": "Lunch" }).to_string()))
            .unwrap();
        let (status, body) = call(app("http://127.0.0.1:9/"), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Required: summary, start, end"));
    }

    #[tokio::test]
    async fn list_with_garbage_bound_is_400() {
        let request = Request::get("/events?start=soon").body(Body::empty()).unwrap();
        let (status, _) = call(app("http://127.0.0.1:9/"), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_requires_authorization() {
        let request = Request::delete("/events/e1").body(Body::empty()).unwrap();
        let (status, body) = call(app("http://127.0.0.1:9/"), request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Missing Authorization header");
    }

    #[tokio::test]
    async fn create_forwards_to_caldav() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/cal/lunch-1.ics"))
            .and(header("Authorization", "Bearer t"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let request = Request::post("/events")
            .header("Content-Type", "application/json")
            .header("Authorization", "Bearer t")
            .body(Body::from(
                json!({
                    "uid": "lunch-1",
                    "summary": "Lunch",
                    "start": "2025-06-01T12:00:00Z",
                    "end": "2025-06-01T13:00:00Z",
                    "alarms": [{ "action": "DISPLAY", "trigger": "-PT10M" }]
                })
                .to_string(),
            ))
            .unwrap();
        let (status, body) = call(app(&format!("{}/cal/", server.uri())), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["created"]["uid"], "lunch-1");
        assert_eq!(body["created"]["alarms"][0]["trigger"], "-PT10M");
    }

    #[tokio::test]
    async fn delete_reports_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/cal/e1.ics"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let request = Request::delete("/events/e1?etag=%22abc%22")
            .header("Authorization", "Bearer t")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(app(&format!("{}/cal/", server.uri())), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "outcome": "deleted" }));
    }
}
