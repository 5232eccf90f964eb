//! Update cycle driver for the metrics exporter.
//!
//! Runs one `update_metrics` pass on a blocking thread and feeds the result
//! into health stats and self-telemetry. Triggered by the metrics endpoint.

use process_stats_exporter::{HandlerError, UpdateSummary};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error("update task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Runs one update cycle against the shared registry.
#[instrument(skip(state))]
pub async fn update_metrics(state: &SharedState) -> Result<UpdateSummary, UpdateError> {
    let start = Instant::now();
    let task_state = state.clone();

    let result = tokio::task::spawn_blocking(move || {
        let _guard = task_state
            .update_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        task_state.handler.update_metrics(&task_state.metrics)
    })
    .await;

    let duration = start.elapsed().as_secs_f64();

    let summary = match result {
        Ok(Ok(summary)) => summary,
        Ok(Err(e)) => {
            error!("Update cycle failed: {}", e);
            state.health_stats.record_update_failure();
            return Err(e.into());
        }
        Err(e) => {
            error!("Update task panicked or was cancelled: {}", e);
            state.health_stats.record_update_failure();
            return Err(e.into());
        }
    };

    state.health_stats.record_update(&summary, duration);

    if let Some(telemetry) = &state.telemetry {
        telemetry.processes.set(summary.processes as f64);
        telemetry
            .missing_values_total
            .inc_by(summary.missing.len() as f64);
    }

    if summary.processes == 0 {
        debug!("No processes matched the configured selection");
    }

    debug!(
        "Update cycle completed in {:.3}s: {} processes, {} series",
        duration, summary.processes, summary.updated
    );

    Ok(summary)
}
