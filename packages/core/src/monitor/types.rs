//! Core data types for the operational monitor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Thresholds;

/// One host/process resource reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSample {
    pub timestamp: DateTime<Utc>,
    pub cpu_pct: f64,
    pub memory_pct: f64,
    /// One-minute load average.
    pub load_one: f64,
    pub cpu_count: usize,
}

/// One observed HTTP request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    pub timestamp: DateTime<Utc>,
    pub endpoint: String,
    pub latency_ms: u64,
    pub status: u16,
}

/// One observed error (failed request or reported failure).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub endpoint: String,
    pub message: String,
}

/// Latency/throughput digest over a trailing window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub window_secs: i64,
    pub request_count: usize,
    pub error_count: usize,
    pub min_ms: u64,
    pub avg_ms: f64,
    pub max_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
    /// Requests in the last 60 seconds divided by 60.
    pub throughput_rps: f64,
    /// Errors over requests in the trailing window, as a percentage.
    pub error_rate_pct: f64,
}

impl PerformanceMetrics {
    pub fn empty(window_secs: i64) -> Self {
        Self {
            window_secs,
            request_count: 0,
            error_count: 0,
            min_ms: 0,
            avg_ms: 0.0,
            max_ms: 0,
            p95_ms: 0,
            p99_ms: 0,
            throughput_rps: 0.0,
            error_rate_pct: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Error,
    Critical,
}

/// Threshold condition backing an auto-resolvable alert.
///
/// Alerts raised for conditions outside this set (job failures) carry no
/// rule and are only resolved manually.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertRule {
    HighCpu,
    HighMemory,
    HighLoad,
    SlowRequests,
    HighErrorRate,
}

impl AlertRule {
    /// Whether the condition still holds against the latest observations.
    pub fn holds(
        &self,
        sample: Option<&SystemSample>,
        perf: &PerformanceMetrics,
        thresholds: &Thresholds,
    ) -> bool {
        match self {
            AlertRule::HighCpu => sample.is_some_and(|s| s.cpu_pct > thresholds.cpu_pct),
            AlertRule::HighMemory => sample.is_some_and(|s| s.memory_pct > thresholds.memory_pct),
            AlertRule::HighLoad => sample.is_some_and(|s| {
                s.load_one > s.cpu_count.max(1) as f64 * thresholds.load_per_core
            }),
            AlertRule::SlowRequests => {
                perf.request_count > 0 && perf.max_ms > thresholds.slow_request_ms
            }
            AlertRule::HighErrorRate => {
                perf.request_count > 0 && perf.error_rate_pct > thresholds.error_rate_pct
            }
        }
    }
}

/// One open or resolved alert. At most one unresolved alert exists per id.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub id: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    /// Bumped every time the same condition re-triggers while unresolved.
    pub updated_at: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub rule: Option<AlertRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Result of one dependency's health-check contract.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyHealth {
    pub name: &'static str,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl DependencyHealth {
    pub fn healthy(name: &'static str) -> Self {
        Self {
            name,
            status: HealthStatus::Healthy,
            details: None,
        }
    }

    pub fn healthy_with_details(name: &'static str, details: Value) -> Self {
        Self {
            name,
            status: HealthStatus::Healthy,
            details: Some(details),
        }
    }

    pub fn unhealthy(name: &'static str, error: impl Into<String>) -> Self {
        Self {
            name,
            status: HealthStatus::Unhealthy,
            details: Some(serde_json::json!({ "error": error.into() })),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// The single consolidated operational signal.
#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub status: HealthStatus,
    pub dependencies: Vec<DependencyHealth>,
    pub alerts: Vec<Alert>,
    pub checked_at: DateTime<Utc>,
}

/// Snapshot served by the metrics endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub performance: PerformanceMetrics,
    pub system: Option<SystemSample>,
}
