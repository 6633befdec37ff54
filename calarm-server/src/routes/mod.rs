pub mod alarms;
pub mod events;

use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::get,
};
use calarm_core::CalarmError;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(events::router())
        .merge(alarms::router())
        .with_state(state)
}

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// Standard API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An error with the HTTP status it is reported as
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = %self.status, error = %self.message, "request failed");
        }
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<CalarmError> for AppError {
    fn from(err: CalarmError) -> Self {
        let status = match &err {
            CalarmError::InvalidWindow(_) | CalarmError::IcsParse(_) => StatusCode::BAD_REQUEST,
            CalarmError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            CalarmError::NotFound(_) => StatusCode::NOT_FOUND,
            CalarmError::Store(_) | CalarmError::Unsupported(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError {
            status,
            message: err.to_string(),
        }
    }
}

/// The caller's `Authorization` header, forwarded to CalDAV.
pub fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn require_authorization(headers: &HeaderMap) -> Result<String, AppError> {
    authorization(headers).ok_or_else(|| AppError::unauthorized("Missing Authorization header"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use calarm_core::config::CalarmConfig;
    use tower::ServiceExt;

    pub fn app(caldav_url: &str) -> Router {
        let mut config = CalarmConfig::default();
        config.caldav.url = caldav_url.to_string();
        router(AppState::new(&config).unwrap())
    }

    pub async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn health_is_ok() {
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = call(app("http://127.0.0.1:9/"), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
    }

    #[test]
    fn error_statuses() {
        let status = |e: CalarmError| AppError::from(e).status;
        assert_eq!(status(CalarmError::InvalidWindow("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(CalarmError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status(CalarmError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(CalarmError::Store("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status(CalarmError::MonitorClosed), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
