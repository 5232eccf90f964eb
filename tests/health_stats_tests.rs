//! Integration tests for health stats module.
//!
//! These tests verify that HealthStats tracks update cycles and HTTP
//! requests and renders them in the plain-text table.

use process_stats_exporter::health_stats::HealthStats;
use process_stats_exporter::UpdateSummary;
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn summary(processes: usize, updated: usize, missing: usize) -> UpdateSummary {
    UpdateSummary {
        processes,
        updated,
        missing: (0..missing).map(|i| ("proc_mem_rss_max".to_string(), i as u32)).collect(),
    }
}

#[test]
fn test_health_stats_initialize_empty() {
    let stats = HealthStats::new();

    let (cur, avg, _, _, count) = stats.processes.snapshot();
    assert_eq!(count, 0);
    assert_eq!(cur, 0.0);
    assert_eq!(avg, 0.0);

    assert_eq!(stats.total_updates.load(Ordering::Relaxed), 0);
    assert_eq!(stats.missing_values.load(Ordering::Relaxed), 0);
    assert_eq!(stats.get_update_success_rate(), 100.0);
    assert_eq!(stats.get_last_update_str(), "N/A");
    assert!(!stats.last_update_failed());
}

#[test]
fn test_record_update() {
    let stats = HealthStats::new();

    stats.record_update(&summary(2, 24, 3), 0.010);
    stats.record_update(&summary(4, 48, 0), 0.030);

    let (cur, avg, max, min, count) = stats.processes.snapshot();
    assert_eq!(count, 2);
    assert_eq!(cur, 4.0);
    assert_eq!(avg, 3.0);
    assert_eq!(max, 4.0);
    assert_eq!(min, 2.0);

    let (cur, _, _, _, _) = stats.updated_series.snapshot();
    assert_eq!(cur, 48.0);

    assert_eq!(stats.missing_values.load(Ordering::Relaxed), 3);
    assert_eq!(stats.total_updates.load(Ordering::Relaxed), 2);
    assert_ne!(stats.get_last_update_str(), "N/A");
}

#[test]
fn test_update_failures_affect_success_rate() {
    let stats = HealthStats::new();

    stats.record_update(&summary(1, 12, 0), 0.001);
    stats.record_update_failure();
    assert!(stats.last_update_failed());
    assert_eq!(stats.get_update_success_rate(), 50.0);

    stats.record_update(&summary(1, 12, 0), 0.001);
    assert!(!stats.last_update_failed());
    assert_eq!(stats.total_updates.load(Ordering::Relaxed), 3);
}

#[test]
fn test_render_table_sections() {
    let stats = HealthStats::new();
    stats.record_update(&summary(3, 36, 1), 0.005);
    stats.record_http_request();
    stats.record_metrics_endpoint_call();
    stats.record_request_duration(12.5);
    stats.record_metrics_response_size_kb(4.2);

    let table = stats.render_table();

    assert!(table.contains("HEALTH ENDPOINT - EXPORTER INTERNAL STATS"));
    assert!(table.contains("UPDATE CYCLES"));
    assert!(table.contains("HTTP SERVER"));
    assert!(table.contains("processes"));
    assert!(table.contains("missing_values_total"));
    assert!(table.contains("http_requests_last_minute"));
    assert!(table.contains("number of updates: 1"));
}

#[test]
fn test_request_timestamps_count_last_minute() {
    let stats = HealthStats::new();
    for _ in 0..5 {
        stats.record_http_request();
    }
    assert_eq!(stats.http_request_timestamps.count_last_minute(), 5);
}

#[test]
fn test_thread_safety() {
    use std::thread;

    let stats = Arc::new(HealthStats::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let stats = Arc::clone(&stats);
            thread::spawn(move || {
                for _ in 0..100 {
                    stats.record_update(&summary(1, 12, 1), 0.001);
                    stats.record_metrics_endpoint_call();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    assert_eq!(stats.total_updates.load(Ordering::Relaxed), 800);
    assert_eq!(stats.missing_values.load(Ordering::Relaxed), 800);
    assert_eq!(stats.metrics_endpoint_calls.load(Ordering::Relaxed), 800);
    let (_, _, _, _, count) = stats.processes.snapshot();
    assert_eq!(count, 800);
}
