//! Health statistics and monitoring for the exporter.
//!
//! This module provides types for tracking exporter health: update cycle
//! performance, missing values and HTTP request metrics. The stats are
//! rendered as a plain-text table on `/health`.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock as StdRwLock};
use std::time::{Duration, Instant};

use crate::handler::UpdateSummary;

/// Running statistics for a single metric.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    /// Returns (last, avg, max, min, count).
    pub fn snapshot(&self) -> (f64, f64, f64, f64, u64) {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min, s.count)
        } else {
            (0.0, 0.0, 0.0, 0.0, 0)
        }
    }
}

/// Thread-safe circular buffer for tracking HTTP request timestamps.
pub struct RequestTimestamps {
    inner: Mutex<VecDeque<Instant>>,
}

impl Default for RequestTimestamps {
    fn default() -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(1024)),
        }
    }
}

impl RequestTimestamps {
    pub fn record(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            let now = Instant::now();
            guard.push_back(now);
            // Keep only last 10 minutes of timestamps to avoid unbounded growth
            while guard
                .front()
                .is_some_and(|&t| now.duration_since(t) > Duration::from_secs(600))
            {
                guard.pop_front();
            }
        }
    }

    pub fn count_last_minute(&self) -> u64 {
        if let Ok(guard) = self.inner.lock() {
            let now = Instant::now();
            guard
                .iter()
                .filter(|&&t| now.duration_since(t) <= Duration::from_secs(60))
                .count() as u64
        } else {
            0
        }
    }
}

/// Health statistics for the exporter.
pub struct HealthStats {
    // Update cycles
    pub processes: Stat,
    pub updated_series: Stat,
    pub update_duration_seconds: Stat,
    pub total_updates: AtomicU64,
    pub update_success_count: AtomicU64,
    pub update_failure_count: AtomicU64,
    pub missing_values: AtomicU64,
    pub last_update_failed: AtomicBool,

    // HTTP server stats
    pub http_request_timestamps: RequestTimestamps,
    pub request_duration_ms: Stat,
    pub metrics_endpoint_calls: AtomicU64,
    pub metrics_response_size_kb: Stat,

    // Timing
    pub start_time: Instant,
    pub last_update: StdRwLock<Option<DateTime<Utc>>>,
}

impl Default for HealthStats {
    fn default() -> Self {
        Self {
            processes: Stat::default(),
            updated_series: Stat::default(),
            update_duration_seconds: Stat::default(),
            total_updates: AtomicU64::new(0),
            update_success_count: AtomicU64::new(0),
            update_failure_count: AtomicU64::new(0),
            missing_values: AtomicU64::new(0),
            last_update_failed: AtomicBool::new(false),
            http_request_timestamps: RequestTimestamps::default(),
            request_duration_ms: Stat::default(),
            metrics_endpoint_calls: AtomicU64::new(0),
            metrics_response_size_kb: Stat::default(),
            start_time: Instant::now(),
            last_update: StdRwLock::new(None),
        }
    }
}

impl HealthStats {
    pub fn new() -> Self {
        Default::default()
    }

    /// Records a completed update cycle.
    pub fn record_update(&self, summary: &UpdateSummary, duration_seconds: f64) {
        self.processes.add_sample(summary.processes as f64);
        self.updated_series.add_sample(summary.updated as f64);
        self.update_duration_seconds.add_sample(duration_seconds);
        self.missing_values
            .fetch_add(summary.missing.len() as u64, Ordering::Relaxed);
        self.total_updates.fetch_add(1, Ordering::Relaxed);
        self.update_success_count.fetch_add(1, Ordering::Relaxed);
        self.last_update_failed.store(false, Ordering::Relaxed);
        if let Ok(mut guard) = self.last_update.write() {
            *guard = Some(Utc::now());
        }
    }

    pub fn record_update_failure(&self) {
        self.total_updates.fetch_add(1, Ordering::Relaxed);
        self.update_failure_count.fetch_add(1, Ordering::Relaxed);
        self.last_update_failed.store(true, Ordering::Relaxed);
    }

    /// Whether the most recent update cycle failed.
    pub fn last_update_failed(&self) -> bool {
        self.last_update_failed.load(Ordering::Relaxed)
    }

    pub fn record_http_request(&self) {
        self.http_request_timestamps.record();
    }

    pub fn record_request_duration(&self, duration_ms: f64) {
        self.request_duration_ms.add_sample(duration_ms);
    }

    pub fn record_metrics_endpoint_call(&self) {
        self.metrics_endpoint_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_metrics_response_size_kb(&self, size_kb: f64) {
        self.metrics_response_size_kb.add_sample(size_kb);
    }

    pub fn get_update_success_rate(&self) -> f64 {
        let success = self.update_success_count.load(Ordering::Relaxed);
        let failure = self.update_failure_count.load(Ordering::Relaxed);
        let total = success + failure;
        if total == 0 {
            100.0
        } else {
            (success as f64 / total as f64) * 100.0
        }
    }

    pub fn get_uptime_hours(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64() / 3600.0
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn get_last_update_str(&self) -> String {
        match self.last_update.read() {
            Ok(guard) => guard
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            Err(_) => "N/A".to_string(),
        }
    }

    pub fn render_table(&self) -> String {
        let total = self.total_updates.load(Ordering::Relaxed);
        let missing = self.missing_values.load(Ordering::Relaxed);
        let failures = self.update_failure_count.load(Ordering::Relaxed);
        let metrics_calls = self.metrics_endpoint_calls.load(Ordering::Relaxed);
        let http_requests_last_minute = self.http_request_timestamps.count_last_minute();
        let success_rate = self.get_update_success_rate();

        let mut out = String::new();

        writeln!(out, "HEALTH ENDPOINT - EXPORTER INTERNAL STATS").ok();
        writeln!(out, "==========================================").ok();
        writeln!(out).ok();
        write_row(&mut out, "", ["current", "average", "max", "min"]);

        writeln!(out).ok();
        writeln!(out, "UPDATE CYCLES").ok();
        writeln!(out, "-------------").ok();
        write_stat(&mut out, "processes", &self.processes, 0);
        write_stat(&mut out, "updated_series", &self.updated_series, 0);
        write_stat(&mut out, "update_duration (s)", &self.update_duration_seconds, 3);
        write_counter(&mut out, "update_success_rate (%)", format!("{:.1}", success_rate));
        write_counter(&mut out, "update_failures", failures.to_string());
        write_counter(&mut out, "missing_values_total", missing.to_string());

        writeln!(out).ok();
        writeln!(out, "HTTP SERVER").ok();
        writeln!(out, "-----------").ok();
        write_counter(
            &mut out,
            "http_requests_last_minute",
            http_requests_last_minute.to_string(),
        );
        write_stat(&mut out, "request_duration (ms)", &self.request_duration_ms, 1);
        write_stat(&mut out, "response_size (KB)", &self.metrics_response_size_kb, 1);
        write_counter(&mut out, "metrics_endpoint_calls", metrics_calls.to_string());

        writeln!(out).ok();
        writeln!(
            out,
            "number of updates: {} | last update: {} | uptime: {:.1}h",
            total,
            self.get_last_update_str(),
            self.get_uptime_hours()
        )
        .ok();

        out
    }
}

const LEFT_COL: usize = 26;
const COL_W: usize = 12;

fn write_row(out: &mut String, name: &str, cols: [&str; 4]) {
    writeln!(
        out,
        "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
        name,
        cols[0],
        cols[1],
        cols[2],
        cols[3],
        left = LEFT_COL,
        col = COL_W
    )
    .ok();
}

fn write_stat(out: &mut String, name: &str, stat: &Stat, precision: usize) {
    let (cur, avg, max, min, _) = stat.snapshot();
    let cols = [cur, avg, max, min].map(|v| format!("{:.prec$}", v, prec = precision));
    write_row(out, name, [&cols[0], &cols[1], &cols[2], &cols[3]]);
}

fn write_counter(out: &mut String, name: &str, value: String) {
    write_row(out, name, [&value, "N/A", "N/A", "N/A"]);
}
