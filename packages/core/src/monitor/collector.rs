//! Bounded metrics buffers and derived performance figures.
//!
//! `MetricsCollector` holds three capacity-capped ring buffers (backed by
//! `VecDeque`): request records, error records, and system samples. When a
//! buffer is full the oldest entry is evicted before the new one is
//! inserted, so memory stays bounded regardless of uptime. A separate
//! [`MetricsCollector::cleanup`] pass drops over-age records independently
//! of the size caps.
//!
//! The collector itself is not `Sync` — the [`crate::monitor::Monitor`]
//! wraps it in `RwLock` and is the only owner.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

use crate::monitor::types::{ErrorRecord, PerformanceMetrics, RequestRecord, SystemSample};

/// Maximum request records retained in memory.
pub const MAX_REQUEST_SAMPLES: usize = 1_000;
/// Maximum error records retained in memory.
pub const MAX_ERROR_SAMPLES: usize = 500;
/// Maximum system samples retained in memory.
pub const MAX_SYSTEM_SAMPLES: usize = 100;

/// Latency percentile over a sorted slice: index = floor(count × p),
/// clamped to the last element.
fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let index = ((sorted.len() as f64) * p).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
}

#[derive(Debug)]
pub struct MetricsCollector {
    requests: VecDeque<RequestRecord>,
    errors: VecDeque<ErrorRecord>,
    samples: VecDeque<SystemSample>,
    request_retention: Duration,
    error_retention: Duration,
}

impl MetricsCollector {
    pub fn new(request_retention_secs: i64, error_retention_secs: i64) -> Self {
        Self {
            requests: VecDeque::with_capacity(MAX_REQUEST_SAMPLES),
            errors: VecDeque::with_capacity(MAX_ERROR_SAMPLES),
            samples: VecDeque::with_capacity(MAX_SYSTEM_SAMPLES),
            request_retention: Duration::seconds(request_retention_secs),
            error_retention: Duration::seconds(error_retention_secs),
        }
    }

    pub fn record_request(&mut self, record: RequestRecord) {
        if self.requests.len() >= MAX_REQUEST_SAMPLES {
            self.requests.pop_front();
        }
        self.requests.push_back(record);
    }

    pub fn record_error(&mut self, record: ErrorRecord) {
        if self.errors.len() >= MAX_ERROR_SAMPLES {
            self.errors.pop_front();
        }
        self.errors.push_back(record);
    }

    pub fn push_sample(&mut self, sample: SystemSample) {
        if self.samples.len() >= MAX_SYSTEM_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn latest_sample(&self) -> Option<&SystemSample> {
        self.samples.back()
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Derive latency percentiles, throughput, and error rate over the
    /// trailing `window`.
    pub fn performance_metrics(&self, now: DateTime<Utc>, window: Duration) -> PerformanceMetrics {
        let since = now - window;
        let mut latencies: Vec<u64> = self
            .requests
            .iter()
            .filter(|r| r.timestamp >= since)
            .map(|r| r.latency_ms)
            .collect();

        let error_count = self
            .errors
            .iter()
            .filter(|e| e.timestamp >= since)
            .count();

        if latencies.is_empty() {
            let mut metrics = PerformanceMetrics::empty(window.num_seconds());
            metrics.error_count = error_count;
            return metrics;
        }

        latencies.sort_unstable();
        let request_count = latencies.len();
        let sum: u64 = latencies.iter().sum();

        let minute_ago = now - Duration::seconds(60);
        let last_minute = self
            .requests
            .iter()
            .filter(|r| r.timestamp >= minute_ago)
            .count();

        PerformanceMetrics {
            window_secs: window.num_seconds(),
            request_count,
            error_count,
            min_ms: latencies[0],
            avg_ms: sum as f64 / request_count as f64,
            max_ms: latencies[request_count - 1],
            p95_ms: percentile(&latencies, 0.95),
            p99_ms: percentile(&latencies, 0.99),
            throughput_rps: last_minute as f64 / 60.0,
            error_rate_pct: error_count as f64 / request_count as f64 * 100.0,
        }
    }

    /// Drop records older than the retention windows. Returns how many
    /// requests and errors were discarded.
    pub fn cleanup(&mut self, now: DateTime<Utc>) -> (usize, usize) {
        let request_cutoff = now - self.request_retention;
        let error_cutoff = now - self.error_retention;

        let before_requests = self.requests.len();
        self.requests.retain(|r| r.timestamp >= request_cutoff);

        let before_errors = self.errors.len();
        self.errors.retain(|e| e.timestamp >= error_cutoff);

        // System samples share the error retention window.
        self.samples.retain(|s| s.timestamp >= error_cutoff);

        (
            before_requests - self.requests.len(),
            before_errors - self.errors.len(),
        )
    }
}
