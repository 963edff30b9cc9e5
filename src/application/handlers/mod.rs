pub mod stats_handler;

use axum::{
    middleware,
    routing::{delete, get},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::rate_limit::{rate_limit_middleware, GlobalRateLimiter};
use stats_handler::{clear_today_cache, get_report_for_date, get_today_report, health_check, AppState};

/// HTTP routes of the report server
pub fn router(state: AppState, limiter: GlobalRateLimiter) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/stats/:actor", get(get_today_report))
        .route("/api/stats/:actor/cache", delete(clear_today_cache))
        .route("/api/stats/:actor/:date", get(get_report_for_date))
        .with_state(state)
        .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
        .layer(TraceLayer::new_for_http())
}
