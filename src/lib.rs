//! Process Stats Exporter Library
//!
//! This library turns a selection of operating-system processes into labeled
//! Prometheus metrics. It is framework-agnostic: the HTTP transport lives in
//! the binary, and any caller can drive an update cycle against its own
//! `prometheus::Registry`.
//!
//! # Features
//!
//! - **Process Selection**: Explicit pids, or regular expressions matched against command lines
//! - **Per-Process Stats**: CPU time, RSS, peak RSS, page faults, context switches
//! - **Task States**: Thread counts by scheduling state
//! - **Graceful Races**: Processes exiting mid-read are skipped with a warning
//!
//! # Usage
//!
//! ```rust,no_run
//! use process_stats_exporter::{LabelSet, ProcessMetrics, ProcessMetricsHandler, Selection};
//! use prometheus::Registry;
//!
//! let handler = ProcessMetricsHandler::new(
//!     Selection::Pids(vec![1]),
//!     LabelSet::new(),
//!     "/proc",
//! );
//!
//! let registry = Registry::new();
//! let metrics = ProcessMetrics::create(&registry, &handler.get_metric_configs()).unwrap();
//!
//! let summary = handler.update_metrics(&metrics).unwrap();
//! println!("updated {} series", summary.updated);
//! ```

pub mod handler;
pub mod health_stats;
pub mod label;
pub mod metrics;
pub mod process;
pub mod resolver;
pub mod stats;

// Re-export main types for convenience
pub use handler::{HandlerError, ProcessMetricsHandler, UpdateSummary};
pub use label::{LabelSet, Labeler};
pub use metrics::{Metric, MetricsError, ProcessMetrics};
pub use resolver::{ProcessResolver, Selection};
pub use stats::{Collector, MetricConfig, MetricKind, StatSpec};
