//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and used by the update cycle.

use process_stats_exporter::health_stats::HealthStats;
use process_stats_exporter::{ProcessMetrics, ProcessMetricsHandler};
use prometheus::{Counter, Gauge, Registry};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::config::Config;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Internal `process_stats_exporter_*` metrics.
pub struct Telemetry {
    pub scrape_duration: Gauge,
    pub processes: Gauge,
    pub missing_values_total: Counter,
}

impl Telemetry {
    /// Creates the self-telemetry metrics and registers them with `registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let scrape_duration = Gauge::new(
            "process_stats_exporter_scrape_duration_seconds",
            "Time spent serving the last /metrics request",
        )?;
        let processes = Gauge::new(
            "process_stats_exporter_processes",
            "Number of processes handled by the last update cycle",
        )?;
        let missing_values_total = Counter::new(
            "process_stats_exporter_missing_values_total",
            "Number of metric values that could not be read",
        )?;

        registry.register(Box::new(scrape_duration.clone()))?;
        registry.register(Box::new(processes.clone()))?;
        registry.register(Box::new(missing_values_total.clone()))?;

        Ok(Self {
            scrape_duration,
            processes,
            missing_values_total,
        })
    }
}

/// Global application state shared across requests.
pub struct AppState {
    pub registry: Registry,
    pub handler: ProcessMetricsHandler,
    pub metrics: ProcessMetrics,
    /// Serializes update cycles; concurrent scrapes must not interleave counter updates.
    pub update_lock: Mutex<()>,
    /// `None` when telemetry is disabled.
    pub telemetry: Option<Telemetry>,
    pub config: Arc<Config>,
    pub health_stats: Arc<HealthStats>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Encoder;

    #[test]
    fn test_telemetry_names() {
        let registry = Registry::new();
        let telemetry = Telemetry::register(&registry).unwrap();
        telemetry.processes.set(3.0);

        let mut buffer = Vec::new();
        prometheus::TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("# TYPE process_stats_exporter_processes gauge"));
        assert!(text.contains("process_stats_exporter_processes 3"));
        assert!(text.contains("# TYPE process_stats_exporter_missing_values_total counter"));
        // gauges do not carry the counter suffix
        assert!(!text.contains("process_stats_exporter_processes_total"));
    }
}
