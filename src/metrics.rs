//! Prometheus metric objects for the process statistics.
//!
//! Metrics are created once from the collectors' descriptors and registered
//! with a `prometheus::Registry`. Each metric keeps the kind declared by its
//! descriptor, which selects the update operation.

use ahash::AHashMap as HashMap;
use prometheus::{Counter, CounterVec, Gauge, GaugeVec, Opts, Registry};

use crate::label::LabelSet;
use crate::stats::{MetricConfig, MetricKind};

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("failed to create metric {name}: {source}")]
    Create {
        name: String,
        source: prometheus::Error,
    },

    #[error("labels {labels:?} do not match metric {name}: {source}")]
    LabelMismatch {
        name: String,
        labels: LabelSet,
        source: prometheus::Error,
    },
}

/// A registered labeled metric family.
#[derive(Clone)]
pub enum Metric {
    Counter(CounterVec),
    Gauge(GaugeVec),
}

/// One labeled series of a metric.
pub enum LabeledMetric {
    Counter(Counter),
    Gauge(Gauge),
}

impl Metric {
    fn new(config: &MetricConfig) -> Result<Self, prometheus::Error> {
        let opts = Opts::new(config.name.as_str(), config.description.as_str());
        let label_names: Vec<&str> = config.labels.iter().map(String::as_str).collect();
        Ok(match config.kind {
            MetricKind::Counter => Metric::Counter(CounterVec::new(opts, &label_names)?),
            MetricKind::Gauge => Metric::Gauge(GaugeVec::new(opts, &label_names)?),
        })
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Counter(_) => MetricKind::Counter,
            Metric::Gauge(_) => MetricKind::Gauge,
        }
    }

    /// Returns the series for `labels`.
    ///
    /// The label names must match the metric's declared names exactly.
    pub fn labels(&self, labels: &LabelSet) -> Result<LabeledMetric, prometheus::Error> {
        let labels: std::collections::HashMap<&str, &str> = labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        Ok(match self {
            Metric::Counter(vec) => LabeledMetric::Counter(vec.get_metric_with(&labels)?),
            Metric::Gauge(vec) => LabeledMetric::Gauge(vec.get_metric_with(&labels)?),
        })
    }

    fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        match self {
            Metric::Counter(vec) => registry.register(Box::new(vec.clone())),
            Metric::Gauge(vec) => registry.register(Box::new(vec.clone())),
        }
    }
}

impl LabeledMetric {
    /// Applies a collected value.
    ///
    /// Gauges are set. Counters are incremented so that they follow the
    /// kernel's cumulative value; a value lower than the current one means
    /// the process was replaced, and the counter restarts from it.
    pub fn update(&self, value: f64) {
        match self {
            LabeledMetric::Gauge(gauge) => gauge.set(value),
            LabeledMetric::Counter(counter) => {
                let current = counter.get();
                if value >= current {
                    counter.inc_by(value - current);
                } else {
                    counter.reset();
                    counter.inc_by(value);
                }
            }
        }
    }

    pub fn get(&self) -> f64 {
        match self {
            LabeledMetric::Gauge(gauge) => gauge.get(),
            LabeledMetric::Counter(counter) => counter.get(),
        }
    }
}

/// Live metric objects keyed by metric name.
#[derive(Clone, Default)]
pub struct ProcessMetrics {
    metrics: HashMap<String, Metric>,
    order: Vec<String>,
}

impl ProcessMetrics {
    /// Creates and registers a metric for each descriptor.
    pub fn create(registry: &Registry, configs: &[MetricConfig]) -> Result<Self, MetricsError> {
        let mut out = Self::default();
        for config in configs {
            let metric = Metric::new(config)
                .and_then(|m| m.register(registry).map(|_| m))
                .map_err(|source| MetricsError::Create {
                    name: config.name.clone(),
                    source,
                })?;
            out.order.push(config.name.clone());
            out.metrics.insert(config.name.clone(), metric);
        }
        Ok(out)
    }

    pub fn get(&self, name: &str) -> Option<&Metric> {
        self.metrics.get(name)
    }

    /// Iterates metrics in descriptor order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Metric)> {
        self.order
            .iter()
            .filter_map(|name| self.metrics.get(name).map(|m| (name.as_str(), m)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn config(name: &str, kind: MetricKind) -> MetricConfig {
        MetricConfig {
            name: name.to_string(),
            description: format!("{name} help"),
            kind,
            labels: BTreeSet::from(["cmd".to_string()]),
        }
    }

    fn cmd(value: &str) -> LabelSet {
        LabelSet::from([("cmd".to_string(), value.to_string())])
    }

    #[test]
    fn test_create_registers_all() {
        let registry = Registry::new();
        let metrics = ProcessMetrics::create(
            &registry,
            &[config("a_total", MetricKind::Counter), config("b", MetricKind::Gauge)],
        )
        .unwrap();

        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics.get("a_total").unwrap().kind(), MetricKind::Counter);
        assert_eq!(metrics.get("b").unwrap().kind(), MetricKind::Gauge);
        let names: Vec<&str> = metrics.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a_total", "b"]);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Registry::new();
        let configs = [config("dup", MetricKind::Gauge)];
        ProcessMetrics::create(&registry, &configs).unwrap();
        let err = ProcessMetrics::create(&registry, &configs).err().unwrap();
        assert!(matches!(err, MetricsError::Create { .. }));
    }

    #[test]
    fn test_counter_follows_cumulative_value() {
        let registry = Registry::new();
        let metrics =
            ProcessMetrics::create(&registry, &[config("faults", MetricKind::Counter)]).unwrap();
        let series = metrics.get("faults").unwrap().labels(&cmd("app")).unwrap();

        series.update(10.0);
        assert_eq!(series.get(), 10.0);
        series.update(15.0);
        assert_eq!(series.get(), 15.0);
        // process restarted with a lower kernel counter
        series.update(3.0);
        assert_eq!(series.get(), 3.0);
    }

    #[test]
    fn test_gauge_is_set() {
        let registry = Registry::new();
        let metrics = ProcessMetrics::create(&registry, &[config("rss", MetricKind::Gauge)]).unwrap();
        let series = metrics.get("rss").unwrap().labels(&cmd("app")).unwrap();

        series.update(100.0);
        series.update(40.0);
        assert_eq!(series.get(), 40.0);
    }

    #[test]
    fn test_label_mismatch_is_error() {
        let registry = Registry::new();
        let metrics = ProcessMetrics::create(&registry, &[config("rss", MetricKind::Gauge)]).unwrap();
        let wrong = LabelSet::from([("pid".to_string(), "1".to_string())]);
        assert!(metrics.get("rss").unwrap().labels(&wrong).is_err());
    }
}
