//! Metrics endpoint handler for Prometheus scraping.
//!
//! Every request runs one update cycle before the registry is encoded, so
//! the exposition always reflects the processes as they are right now.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus::{Encoder, TextEncoder};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::SharedState;
use crate::updater::update_metrics;

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 64 * 1024;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    UpdateFailed,
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        let message = match self {
            MetricsError::UpdateFailed => "Failed to update process metrics",
            MetricsError::EncodingFailed => "Failed to encode metrics",
        };
        (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, MetricsError> {
    let start = Instant::now();
    debug!("Processing /metrics request");
    state.health_stats.record_http_request();

    // The update error is already logged by the updater
    let summary = update_metrics(&state)
        .await
        .map_err(|_| MetricsError::UpdateFailed)?;

    let families = state.registry.gather();
    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    let encoder = TextEncoder::new();

    if encoder.encode(&families, &mut buffer).is_err() {
        error!("Failed to encode Prometheus metrics");
        return Err(MetricsError::EncodingFailed);
    }

    // Record response size
    let response_size_kb = buffer.len() as f64 / 1024.0;
    state
        .health_stats
        .record_metrics_response_size_kb(response_size_kb);

    // Record metrics request statistics
    let request_duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    state.health_stats.record_metrics_endpoint_call();
    state
        .health_stats
        .record_request_duration(request_duration_ms);

    if let Some(telemetry) = &state.telemetry {
        telemetry.scrape_duration.set(start.elapsed().as_secs_f64());
    }

    debug!(
        "Metrics request completed: {} processes, {} bytes, {:.3}ms",
        summary.processes,
        buffer.len(),
        request_duration_ms
    );

    String::from_utf8(buffer).map_err(|_| MetricsError::EncodingFailed)
}
