//! Binds resolver, collectors and labelers into one update cycle.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::label::{LabelSet, Labeler};
use crate::metrics::{MetricsError, ProcessMetrics};
use crate::resolver::{ProcessResolver, Selection};
use crate::stats::{Collector, MetricConfig, MetricValue};

/// Error that aborts an update cycle.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

/// Outcome of one `update_metrics` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSummary {
    /// Number of (labeler, process) pairs handled.
    pub processes: usize,
    /// Number of series updated.
    pub updated: usize,
    /// `(metric name, pid)` for every value that could not be read.
    pub missing: Vec<(String, u32)>,
}

/// Handles metrics for the selected processes.
pub struct ProcessMetricsHandler {
    resolver: ProcessResolver,
    labels: LabelSet,
    collectors: Vec<Collector>,
}

impl ProcessMetricsHandler {
    /// Creates a handler for `selection`, adding the static `labels` to every
    /// sample.
    pub fn new(selection: Selection, labels: LabelSet, proc_root: impl Into<PathBuf>) -> Self {
        let label_names = label_names(&selection, &labels);
        Self {
            resolver: ProcessResolver::new(selection, proc_root),
            labels,
            collectors: vec![
                Collector::process(label_names.clone()),
                Collector::tasks(label_names),
            ],
        }
    }

    pub fn resolver(&self) -> &ProcessResolver {
        &self.resolver
    }

    /// Descriptors for all metrics, in collector order.
    pub fn get_metric_configs(&self) -> Vec<MetricConfig> {
        self.collectors.iter().flat_map(Collector::metrics).collect()
    }

    /// Runs one update cycle over the currently selected processes.
    ///
    /// Missing values are logged and skipped. Processes that produce the same
    /// label set (e.g. several workers sharing a command name) are summed into
    /// one series, which is then updated exactly once. A label set that does
    /// not match a metric's declared label names aborts the cycle.
    pub fn update_metrics(&self, metrics: &ProcessMetrics) -> Result<UpdateSummary, HandlerError> {
        let mut summary = UpdateSummary::default();
        let mut merged: BTreeMap<(String, LabelSet), f64> = BTreeMap::new();
        let mut contributed: HashSet<(LabelSet, u32)> = HashSet::new();

        for (labeler, mut process) in self.resolver.resolve() {
            let process_labels = match labeler.apply(&process) {
                Ok(labels) => labels,
                Err(e) => {
                    debug!("Skipping vanished process: {}", e);
                    continue;
                }
            };
            let labels = self.effective_labels(process_labels);
            summary.processes += 1;

            // a process matched by several regexps counts once per label set
            if !contributed.insert((labels.clone(), process.pid)) {
                debug!("PID {} already counted under {:?}", process.pid, labels);
                continue;
            }

            let mut values: HashMap<&'static str, MetricValue> = HashMap::new();
            for collector in &self.collectors {
                values.extend(collector.collect(&mut process));
            }

            for (name, _) in metrics.iter() {
                let value = values.get(name).copied().flatten();
                let Some(value) = value else {
                    warn!("empty value for metric \"{}\" on PID {}", name, process.pid);
                    summary.missing.push((name.to_string(), process.pid));
                    continue;
                };

                match merged.entry((name.to_string(), labels.clone())) {
                    Entry::Vacant(entry) => {
                        entry.insert(value);
                    }
                    Entry::Occupied(mut entry) => {
                        debug!(
                            "Adding PID {} to series {} {:?}",
                            process.pid, name, labels
                        );
                        *entry.get_mut() += value;
                    }
                }
            }
        }

        for ((name, labels), value) in merged {
            let Some(metric) = metrics.get(&name) else {
                continue;
            };
            let series = metric
                .labels(&labels)
                .map_err(|source| MetricsError::LabelMismatch {
                    name: name.clone(),
                    labels: labels.clone(),
                    source,
                })?;
            series.update(value);
            summary.updated += 1;
        }

        debug!(
            "Updated {} series for {} processes ({} missing values)",
            summary.updated,
            summary.processes,
            summary.missing.len()
        );
        Ok(summary)
    }

    /// Static labels overlaid with the labeler's labels.
    fn effective_labels(&self, process_labels: LabelSet) -> LabelSet {
        let mut labels = self.labels.clone();
        labels.extend(process_labels);
        labels
    }
}

/// Label names in effect for a selection: the static label names plus the
/// selection mode's label.
pub fn label_names(selection: &Selection, labels: &LabelSet) -> BTreeSet<String> {
    let mut names: BTreeSet<String> = labels.keys().cloned().collect();
    let labeler = match selection {
        Selection::Pids(_) => Labeler::Pid,
        Selection::CmdlineRegexps(regexps) => match regexps.first() {
            Some(re) => Labeler::Cmdline(re.clone()),
            None => return names,
        },
    };
    names.extend(labeler.labels());
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{CMD_LABEL, PID_LABEL};
    use regex::Regex;

    #[test]
    fn test_label_names_pid_mode() {
        let names = label_names(&Selection::Pids(vec![1]), &LabelSet::new());
        assert_eq!(names, BTreeSet::from([PID_LABEL.to_string()]));
    }

    #[test]
    fn test_label_names_regexp_mode_with_static_labels() {
        let labels = LabelSet::from([("env".to_string(), "prod".to_string())]);
        let selection = Selection::CmdlineRegexps(vec![Regex::new("x").unwrap()]);
        let names = label_names(&selection, &labels);
        assert_eq!(
            names,
            BTreeSet::from(["env".to_string(), CMD_LABEL.to_string()])
        );
    }

    #[test]
    fn test_effective_labels_labeler_wins() {
        let labels = LabelSet::from([
            ("pid".to_string(), "static".to_string()),
            ("env".to_string(), "prod".to_string()),
        ]);
        let handler = ProcessMetricsHandler::new(Selection::Pids(vec![]), labels, "/nonexistent");
        let merged =
            handler.effective_labels(LabelSet::from([("pid".to_string(), "42".to_string())]));
        assert_eq!(merged.get("pid").map(String::as_str), Some("42"));
        assert_eq!(merged.get("env").map(String::as_str), Some("prod"));
    }

    #[test]
    fn test_get_metric_configs_idempotent() {
        let handler =
            ProcessMetricsHandler::new(Selection::Pids(vec![1, 2]), LabelSet::new(), "/nonexistent");
        assert_eq!(handler.get_metric_configs(), handler.get_metric_configs());
        assert_eq!(handler.get_metric_configs().len(), 12);
    }
}
