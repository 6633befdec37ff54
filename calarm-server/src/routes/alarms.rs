//! Alarm endpoints

use axum::{
    Json, Router,
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
};
use calarm_core::window::alarm_timestamps;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::routes::{AppError, require_authorization};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/alarms", get(list_alarms))
}

#[derive(Deserialize)]
pub struct AlarmsQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Serialize)]
pub struct AlarmsResponse {
    /// Fire instants in epoch milliseconds, ascending
    pub alarms: Vec<i64>,
}

/// GET /alarms?from&to - Alarm fire instants in a window (default: the next 30 days)
async fn list_alarms(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AlarmsQuery>,
) -> Result<Json<AlarmsResponse>, AppError> {
    let caldav = state.caldav(Some(require_authorization(&headers)?));

    let alarms = alarm_timestamps(
        &caldav,
        query.from.as_deref(),
        query.to.as_deref(),
        Utc::now(),
    )
    .await?;

    Ok(Json(AlarmsResponse { alarms }))
}
