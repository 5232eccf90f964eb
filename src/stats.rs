//! Stat collectors: static metric tables and per-process value extraction.
//!
//! Each collector owns a fixed table of `StatSpec`s. The same table drives
//! both the metric descriptors and the collected values, so the two always
//! contain exactly the same metric names.

use ahash::AHashMap as HashMap;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use crate::process::{Process, CLK_TCK, PAGE_SIZE};

/// Kind of a Prometheus metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
}

/// Conversion from the kernel's unit to the exported unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Raw,
    /// Clock ticks to seconds.
    Ticks,
    /// Memory pages to bytes.
    Pages,
    /// Kibibytes to bytes.
    Kibibytes,
}

impl Unit {
    fn convert(self, value: f64) -> f64 {
        match self {
            Unit::Raw => value,
            Unit::Ticks => value / *CLK_TCK,
            Unit::Pages => value * *PAGE_SIZE,
            Unit::Kibibytes => value * 1024.0,
        }
    }
}

/// How one raw kernel field maps to one exported metric.
#[derive(Debug, Clone, Copy)]
pub struct StatSpec {
    pub name: &'static str,
    pub kind: MetricKind,
    pub description: &'static str,
    pub field: &'static str,
    pub unit: Unit,
}

/// Metric descriptor handed to the metric registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricConfig {
    pub name: String,
    pub description: String,
    pub kind: MetricKind,
    pub labels: BTreeSet<String>,
}

/// A collected value; `None` when the field could not be read.
pub type MetricValue = Option<f64>;

/// Per-process statistics.
pub const PROCESS_STATS: &[StatSpec] = &[
    StatSpec {
        name: "proc_time_user",
        kind: MetricKind::Counter,
        description: "Time scheduled in user mode (seconds)",
        field: "stat.utime",
        unit: Unit::Ticks,
    },
    StatSpec {
        name: "proc_time_system",
        kind: MetricKind::Counter,
        description: "Time scheduled in kernel mode (seconds)",
        field: "stat.stime",
        unit: Unit::Ticks,
    },
    StatSpec {
        name: "proc_mem_rss",
        kind: MetricKind::Gauge,
        description: "Memory resident segment size (bytes)",
        field: "stat.rss",
        unit: Unit::Pages,
    },
    // The high water mark only grows, so it is exported as a counter.
    StatSpec {
        name: "proc_mem_rss_max",
        kind: MetricKind::Counter,
        description: "Maximum memory resident segment size (bytes)",
        field: "status.VmHWM",
        unit: Unit::Kibibytes,
    },
    StatSpec {
        name: "proc_maj_fault",
        kind: MetricKind::Counter,
        description: "Number of major faults that required a page load",
        field: "stat.majflt",
        unit: Unit::Raw,
    },
    StatSpec {
        name: "proc_min_fault",
        kind: MetricKind::Counter,
        description: "Number of minor faults that did not require a page load",
        field: "stat.minflt",
        unit: Unit::Raw,
    },
    StatSpec {
        name: "proc_ctx_involuntary",
        kind: MetricKind::Counter,
        description: "Number of involuntary context switches",
        field: "status.nonvoluntary_ctxt_switches",
        unit: Unit::Raw,
    },
    StatSpec {
        name: "proc_ctx_voluntary",
        kind: MetricKind::Counter,
        description: "Number of voluntary context switches",
        field: "status.voluntary_ctxt_switches",
        unit: Unit::Raw,
    },
];

/// Per-process task (thread) statistics.
///
/// `field` holds the task state character counted by each metric; an empty
/// field counts every task. Tasks in other states (zombie, stopped, idle...)
/// only contribute to the total.
pub const TASK_STATS: &[StatSpec] = &[
    StatSpec {
        name: "proc_tasks_count",
        kind: MetricKind::Gauge,
        description: "Number of process tasks",
        field: "",
        unit: Unit::Raw,
    },
    StatSpec {
        name: "proc_tasks_state_running",
        kind: MetricKind::Gauge,
        description: "Number of process tasks in running state",
        field: "R",
        unit: Unit::Raw,
    },
    StatSpec {
        name: "proc_tasks_state_sleeping",
        kind: MetricKind::Gauge,
        description: "Number of process tasks in sleeping state",
        field: "S",
        unit: Unit::Raw,
    },
    StatSpec {
        name: "proc_tasks_state_uninterruptible_sleep",
        kind: MetricKind::Gauge,
        description: "Number of process tasks in uninterruptible sleep state",
        field: "D",
        unit: Unit::Raw,
    },
];

/// Collects a fixed set of metrics for a process.
#[derive(Debug, Clone)]
pub enum Collector {
    /// CPU time, memory, faults and context switches.
    Process { labels: BTreeSet<String> },
    /// Task counts by scheduling state.
    Tasks { labels: BTreeSet<String> },
}

impl Collector {
    pub fn process(labels: BTreeSet<String>) -> Self {
        Collector::Process { labels }
    }

    pub fn tasks(labels: BTreeSet<String>) -> Self {
        Collector::Tasks { labels }
    }

    fn specs(&self) -> &'static [StatSpec] {
        match self {
            Collector::Process { .. } => PROCESS_STATS,
            Collector::Tasks { .. } => TASK_STATS,
        }
    }

    fn label_names(&self) -> &BTreeSet<String> {
        match self {
            Collector::Process { labels } | Collector::Tasks { labels } => labels,
        }
    }

    /// Descriptors for the metrics this collector produces.
    pub fn metrics(&self) -> Vec<MetricConfig> {
        self.specs()
            .iter()
            .map(|spec| MetricConfig {
                name: spec.name.to_string(),
                description: spec.description.to_string(),
                kind: spec.kind,
                labels: self.label_names().clone(),
            })
            .collect()
    }

    /// Collects values for every metric in `metrics()`.
    ///
    /// A process that exited before its files could be read yields `None`
    /// for every metric.
    pub fn collect(&self, process: &mut Process) -> HashMap<&'static str, MetricValue> {
        match self {
            Collector::Process { .. } => collect_process(process),
            Collector::Tasks { .. } => collect_tasks(process),
        }
    }
}

fn absent(specs: &[StatSpec]) -> HashMap<&'static str, MetricValue> {
    specs.iter().map(|spec| (spec.name, None)).collect()
}

fn collect_process(process: &mut Process) -> HashMap<&'static str, MetricValue> {
    if let Err(e) = process.collect_stats() {
        debug!("Failed to read stats for pid {}: {}", process.pid, e);
        return absent(PROCESS_STATS);
    }

    PROCESS_STATS
        .iter()
        .map(|spec| {
            let value = process.get(spec.field).map(|v| spec.unit.convert(v));
            (spec.name, value)
        })
        .collect()
}

fn collect_tasks(process: &Process) -> HashMap<&'static str, MetricValue> {
    let tasks = match process.tasks() {
        Ok(tasks) => tasks,
        Err(e) => {
            debug!("Failed to list tasks for pid {}: {}", process.pid, e);
            return absent(TASK_STATS);
        }
    };

    let mut states: Vec<char> = Vec::with_capacity(tasks.len());
    for mut task in tasks {
        match task.collect_stats() {
            Ok(()) => states.push(task.state().unwrap_or('?')),
            // the thread exited after the directory was listed
            Err(e) => debug!("Skipping task {} of pid {}: {}", task.pid, process.pid, e),
        }
    }

    TASK_STATS
        .iter()
        .map(|spec| {
            let count = match spec.field.chars().next() {
                None => states.len(),
                Some(state) => states.iter().filter(|&&s| s == state).count(),
            };
            (spec.name, Some(count as f64))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn label_names() -> BTreeSet<String> {
        BTreeSet::from(["cmd".to_string(), "env".to_string()])
    }

    fn write_task(base: &Path, tid: u32, state: char) {
        let dir = base.join("task").join(tid.to_string());
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("stat"),
            format!("{tid} (worker) {state} 1 1 1 0 -1 0 0 0 0 0 0 0 0 0 20 0 1 0 5 0 0"),
        )
        .unwrap();
    }

    #[test]
    fn test_metrics_carry_label_names() {
        for collector in [Collector::process(label_names()), Collector::tasks(label_names())] {
            for config in collector.metrics() {
                assert_eq!(config.labels, label_names());
            }
        }
    }

    #[test]
    fn test_process_metric_kinds() {
        let configs = Collector::process(BTreeSet::new()).metrics();
        let kind = |name: &str| configs.iter().find(|c| c.name == name).unwrap().kind;
        assert_eq!(configs.len(), 8);
        assert_eq!(kind("proc_mem_rss"), MetricKind::Gauge);
        assert_eq!(kind("proc_mem_rss_max"), MetricKind::Counter);
        assert_eq!(kind("proc_min_fault"), MetricKind::Counter);
    }

    #[test]
    fn test_collect_process_values() {
        let root = tempdir().unwrap();
        let base = root.path().join("10");
        fs::create_dir_all(&base).unwrap();
        fs::write(
            base.join("stat"),
            "10 (app) S 1 10 10 0 -1 0 33 0 4 0 200 100 0 0 20 0 2 0 5 4096 25",
        )
        .unwrap();
        fs::write(
            base.join("status"),
            "VmHWM:\t 2 kB\nvoluntary_ctxt_switches:\t5\nnonvoluntary_ctxt_switches:\t6\n",
        )
        .unwrap();

        let mut process = Process::new(10, root.path());
        let values = Collector::process(BTreeSet::new()).collect(&mut process);

        assert_eq!(values["proc_min_fault"], Some(33.0));
        assert_eq!(values["proc_maj_fault"], Some(4.0));
        assert_eq!(values["proc_mem_rss"], Some(25.0 * *PAGE_SIZE));
        assert_eq!(values["proc_mem_rss_max"], Some(2048.0));
        assert_eq!(values["proc_ctx_voluntary"], Some(5.0));
        assert_eq!(values["proc_ctx_involuntary"], Some(6.0));
        assert_eq!(values["proc_time_user"], Some(200.0 / *CLK_TCK));
        assert_eq!(values["proc_time_system"], Some(100.0 / *CLK_TCK));
    }

    #[test]
    fn test_collect_keys_match_metrics() {
        let root = tempdir().unwrap();
        let base = root.path().join("10");
        fs::create_dir_all(&base).unwrap();
        fs::write(base.join("stat"), "10 (app) R 1 10 10 0 -1 0 1 0 0 0 0 0 0 0 20 0 1 0 5 0 1").unwrap();
        write_task(&base, 10, 'R');

        for collector in [Collector::process(BTreeSet::new()), Collector::tasks(BTreeSet::new())] {
            let names: BTreeSet<String> =
                collector.metrics().into_iter().map(|c| c.name).collect();

            let mut present = Process::new(10, root.path());
            let keys: BTreeSet<String> =
                collector.collect(&mut present).keys().map(|k| k.to_string()).collect();
            assert_eq!(keys, names);

            let mut gone = Process::new(99, root.path());
            let values = collector.collect(&mut gone);
            let keys: BTreeSet<String> = values.keys().map(|k| k.to_string()).collect();
            assert_eq!(keys, names);
            assert!(values.values().all(Option::is_none));
        }
    }

    #[test]
    fn test_collect_process_missing_status_fields() {
        let root = tempdir().unwrap();
        let base = root.path().join("2");
        fs::create_dir_all(&base).unwrap();
        fs::write(base.join("stat"), "2 (kthreadd) S 0 0 0 0 -1 0 0 0 0 0 0 0 0 0 20 0 1 0 5 0 0").unwrap();

        let mut process = Process::new(2, root.path());
        let values = Collector::process(BTreeSet::new()).collect(&mut process);
        assert_eq!(values["proc_min_fault"], Some(0.0));
        assert_eq!(values["proc_mem_rss_max"], None);
        assert_eq!(values["proc_ctx_voluntary"], None);
    }

    #[test]
    fn test_collect_task_states() {
        let root = tempdir().unwrap();
        let base = root.path().join("50");
        for (tid, state) in [(50, 'R'), (51, 'S'), (52, 'S'), (53, 'D')] {
            write_task(&base, tid, state);
        }

        let mut process = Process::new(50, root.path());
        let values = Collector::tasks(BTreeSet::new()).collect(&mut process);
        assert_eq!(values["proc_tasks_count"], Some(4.0));
        assert_eq!(values["proc_tasks_state_running"], Some(1.0));
        assert_eq!(values["proc_tasks_state_sleeping"], Some(2.0));
        assert_eq!(values["proc_tasks_state_uninterruptible_sleep"], Some(1.0));
    }

    #[test]
    fn test_collect_task_other_states_count_toward_total_only() {
        let root = tempdir().unwrap();
        let base = root.path().join("60");
        for (tid, state) in [(60, 'Z'), (61, 'T'), (62, 'S')] {
            write_task(&base, tid, state);
        }
        // listed but already gone
        fs::create_dir_all(base.join("task").join("63")).unwrap();

        let mut process = Process::new(60, root.path());
        let values = Collector::tasks(BTreeSet::new()).collect(&mut process);
        assert_eq!(values["proc_tasks_count"], Some(3.0));
        assert_eq!(values["proc_tasks_state_running"], Some(0.0));
        assert_eq!(values["proc_tasks_state_sleeping"], Some(1.0));
        assert_eq!(values["proc_tasks_state_uninterruptible_sleep"], Some(0.0));
    }
}
