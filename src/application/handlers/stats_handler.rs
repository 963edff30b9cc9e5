use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::application::services::stats_service::{StatsError, StatsService};
use crate::config::parse_date;

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub stats: Arc<StatsService>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn error_response(status: StatusCode, error: &str, actor: Option<&str>, message: Option<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            actor: actor.map(str::to_string),
            message,
        }),
    )
        .into_response()
}

fn stats_error_response(actor: &str, e: StatsError) -> Response {
    match e {
        StatsError::NotConfigured { .. } => {
            error_response(StatusCode::PRECONDITION_FAILED, "not_configured", Some(actor), None)
        }
        other => {
            error!(actor = %actor, error = %other, "Report request failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                Some(actor),
                Some(other.to_string()),
            )
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

async fn report_response(state: &AppState, actor: &str, date: NaiveDate) -> Response {
    match state.stats.daily_report_json(actor, date).await {
        Ok(json) => ([(header::CONTENT_TYPE, "application/json")], json).into_response(),
        Err(e) => stats_error_response(actor, e),
    }
}

pub async fn health_check() -> &'static str {
    "ok"
}

/// Today's report for a seller
pub async fn get_today_report(State(state): State<AppState>, Path(actor): Path<String>) -> Response {
    report_response(&state, &actor, today()).await
}

/// Report for a seller on a given `YYYY-MM-DD` date
pub async fn get_report_for_date(
    State(state): State<AppState>,
    Path((actor, date)): Path<(String, String)>,
) -> Response {
    match parse_date(&date) {
        Ok(date) => report_response(&state, &actor, date).await,
        Err(e) => error_response(
            StatusCode::BAD_REQUEST,
            "invalid_date",
            Some(actor.as_str()),
            Some(e.to_string()),
        ),
    }
}

/// Drop today's cached report so the next request refetches it
pub async fn clear_today_cache(State(state): State<AppState>, Path(actor): Path<String>) -> StatusCode {
    state.stats.clear(&actor, today()).await;
    StatusCode::NO_CONTENT
}
