//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! exporter health statistics as plain text.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::state::SharedState;

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = concat!(
    "process-stats-exporter ",
    env!("CARGO_PKG_VERSION"),
    " | built ",
    env!("VERGEN_BUILD_TIMESTAMP")
);

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    state.health_stats.record_http_request();

    // Derive HTTP status from the last update cycle
    let (status, message) = if state.health_stats.last_update_failed() {
        (StatusCode::SERVICE_UNAVAILABLE, "Last update cycle failed")
    } else {
        (StatusCode::OK, "OK")
    };

    let uptime_hours = state.health_stats.get_uptime_seconds() as f64 / SECONDS_PER_HOUR;
    let uptime_str = format_uptime(uptime_hours);

    // Render plain-text table from HealthStats
    let table = state.health_stats.render_table();

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!("{message}\n\nUptime: {uptime_str}\n\n{table}\n{FOOTER_TEXT}\n"),
    )
}

fn format_uptime(uptime_hours: f64) -> String {
    if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    }
}
