//! Operational monitor: metrics collection, threshold alerting, health.
//!
//! [`Monitor`] owns the metrics buffers and the alert set and is shared by
//! handle (`Arc<Monitor>`) — there are no ambient singletons, so tests get
//! isolation from fresh instances. Threshold rules map to independent
//! alert ids so concurrent breaches surface separately:
//!
//! - `high-cpu-usage`, `high-memory-usage`, `high-load-average` —
//!   evaluated on every resource sample
//! - `slow-response-time` — evaluated per recorded request
//! - `high-error-rate` — evaluated by the once-per-minute sweep over the
//!   trailing 5 minutes
//! - `error-<job>` — raised by the scheduler on job failure; no rule, so
//!   it only resolves manually
//!
//! The sweep also auto-resolves rule-backed alerts (hysteresis: only past
//! the grace period) and garbage-collects resolved ones.

pub mod alerts;
pub mod collector;
pub mod health;
pub mod sampler;
pub mod types;

use chrono::{Duration, Utc};
use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::config::{MonitorConfig, Thresholds};
use self::alerts::AlertManager;
use self::collector::MetricsCollector;
use self::sampler::{ResourceSampler, SysinfoSampler};
use self::types::{
    Alert, AlertRule, AlertSeverity, ErrorRecord, MetricsSnapshot, PerformanceMetrics,
    RequestRecord, SystemSample,
};

/// Trailing window used for error-rate and snapshot metrics.
const METRICS_WINDOW_SECS: i64 = 300;

pub struct Monitor {
    collector: RwLock<MetricsCollector>,
    alerts: RwLock<AlertManager>,
    sampler: Mutex<Box<dyn ResourceSampler>>,
    thresholds: Thresholds,
    config: MonitorConfig,
}

impl Monitor {
    pub fn new(thresholds: Thresholds, config: MonitorConfig) -> Self {
        Self::with_sampler(thresholds, config, Box::new(SysinfoSampler::new()))
    }

    pub fn with_sampler(
        thresholds: Thresholds,
        config: MonitorConfig,
        sampler: Box<dyn ResourceSampler>,
    ) -> Self {
        Self {
            collector: RwLock::new(MetricsCollector::new(
                config.request_retention_secs,
                config.error_retention_secs,
            )),
            alerts: RwLock::new(AlertManager::new(
                config.alert_grace_secs,
                config.alert_retention_secs,
            )),
            sampler: Mutex::new(sampler),
            thresholds,
            config,
        }
    }

    pub fn sample_interval_secs(&self) -> u64 {
        self.config.sample_interval_secs
    }

    // ---- Sampling and request recording ----

    /// Take one resource reading and evaluate the resource thresholds.
    pub async fn sample_now(&self) {
        let sample = self.sampler.lock().await.sample();
        self.ingest_sample(sample).await;
    }

    /// Record a resource sample and raise/merge resource alerts.
    pub async fn ingest_sample(&self, sample: SystemSample) {
        let t = &self.thresholds;
        let mut alerts = self.alerts.write().await;

        if sample.cpu_pct > t.cpu_pct {
            alerts.create_or_update(
                "high-cpu-usage",
                resource_severity(sample.cpu_pct),
                format!("CPU usage at {:.1}%", sample.cpu_pct),
                json!({ "cpu_pct": sample.cpu_pct, "threshold": t.cpu_pct }),
                Some(AlertRule::HighCpu),
            );
        }

        if sample.memory_pct > t.memory_pct {
            alerts.create_or_update(
                "high-memory-usage",
                resource_severity(sample.memory_pct),
                format!("Memory usage at {:.1}%", sample.memory_pct),
                json!({ "memory_pct": sample.memory_pct, "threshold": t.memory_pct }),
                Some(AlertRule::HighMemory),
            );
        }

        let load_limit = sample.cpu_count.max(1) as f64 * t.load_per_core;
        if sample.load_one > load_limit {
            alerts.create_or_update(
                "high-load-average",
                AlertSeverity::Warning,
                format!(
                    "Load average {:.2} over limit {:.2} ({} cores)",
                    sample.load_one, load_limit, sample.cpu_count
                ),
                json!({ "load_one": sample.load_one, "limit": load_limit }),
                Some(AlertRule::HighLoad),
            );
        }

        drop(alerts);
        self.collector.write().await.push_sample(sample);
    }

    /// Record one served request. 5xx responses also count as errors, and
    /// over-limit latencies raise the slow-response alert.
    pub async fn record_request(&self, endpoint: &str, latency_ms: u64, status: u16) {
        let now = Utc::now();
        {
            let mut collector = self.collector.write().await;
            collector.record_request(RequestRecord {
                timestamp: now,
                endpoint: endpoint.to_string(),
                latency_ms,
                status,
            });
            if status >= 500 {
                collector.record_error(ErrorRecord {
                    timestamp: now,
                    endpoint: endpoint.to_string(),
                    message: format!("HTTP {}", status),
                });
            }
        }

        if latency_ms > self.thresholds.slow_request_ms {
            self.alerts.write().await.create_or_update(
                "slow-response-time",
                AlertSeverity::Warning,
                format!("{} took {}ms", endpoint, latency_ms),
                json!({ "endpoint": endpoint, "latency_ms": latency_ms }),
                Some(AlertRule::SlowRequests),
            );
        }
    }

    pub async fn record_error(&self, endpoint: &str, message: &str) {
        self.collector.write().await.record_error(ErrorRecord {
            timestamp: Utc::now(),
            endpoint: endpoint.to_string(),
            message: message.to_string(),
        });
    }

    // ---- Periodic passes ----

    /// Once-per-minute pass: evaluate the rolling error rate, auto-resolve
    /// aged alerts whose condition cleared, and collect resolved ones.
    pub async fn sweep(&self) {
        let now = Utc::now();
        let (sample, perf) = {
            let collector = self.collector.read().await;
            (
                collector.latest_sample().cloned(),
                collector.performance_metrics(now, Duration::seconds(METRICS_WINDOW_SECS)),
            )
        };

        let mut alerts = self.alerts.write().await;

        if perf.request_count > 0 && perf.error_rate_pct > self.thresholds.error_rate_pct {
            alerts.create_or_update(
                "high-error-rate",
                AlertSeverity::Error,
                format!(
                    "Error rate at {:.1}% over the last {} minutes",
                    perf.error_rate_pct,
                    METRICS_WINDOW_SECS / 60
                ),
                json!({ "error_rate_pct": perf.error_rate_pct, "request_count": perf.request_count }),
                Some(AlertRule::HighErrorRate),
            );
        }

        let resolved =
            alerts.auto_resolve(now, |rule| rule.holds(sample.as_ref(), &perf, &self.thresholds));
        if resolved > 0 {
            tracing::debug!("Auto-resolved {} alert(s)", resolved);
        }
        alerts.gc(now);
    }

    /// Drop metric records past their retention windows.
    pub async fn cleanup(&self) {
        let (requests, errors) = self.collector.write().await.cleanup(Utc::now());
        if requests + errors > 0 {
            tracing::debug!(
                "Metrics cleanup dropped {} request and {} error record(s)",
                requests,
                errors
            );
        }
    }

    // ---- Alert surface ----

    /// Raise (or refresh) the failure alert for a job. Carries no rule, so
    /// it is only ever resolved manually.
    pub async fn raise_job_failure(&self, job: &str, error: &str) {
        self.alerts.write().await.create_or_update(
            &format!("error-{}", job),
            AlertSeverity::Error,
            format!("Job '{}' failed: {}", job, error),
            json!({ "job": job }),
            None,
        );
    }

    pub async fn active_alerts(&self) -> Vec<Alert> {
        self.alerts.read().await.active()
    }

    pub async fn all_alerts(&self) -> Vec<Alert> {
        self.alerts.read().await.all()
    }

    pub async fn alert(&self, id: &str) -> Option<Alert> {
        self.alerts.read().await.get(id).cloned()
    }

    pub async fn resolve_alert(&self, id: &str) -> bool {
        self.alerts.write().await.resolve(id)
    }

    pub async fn has_unresolved_critical(&self) -> bool {
        self.alerts.read().await.has_unresolved_critical()
    }

    // ---- Read side ----

    pub async fn performance_metrics(&self) -> PerformanceMetrics {
        self.collector
            .read()
            .await
            .performance_metrics(Utc::now(), Duration::seconds(METRICS_WINDOW_SECS))
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let collector = self.collector.read().await;
        MetricsSnapshot {
            performance: collector
                .performance_metrics(Utc::now(), Duration::seconds(METRICS_WINDOW_SECS)),
            system: collector.latest_sample().cloned(),
        }
    }

    pub async fn latest_sample(&self) -> Option<SystemSample> {
        self.collector.read().await.latest_sample().cloned()
    }
}

fn resource_severity(value_pct: f64) -> AlertSeverity {
    if value_pct > 95.0 {
        AlertSeverity::Critical
    } else {
        AlertSeverity::Warning
    }
}

// ---- Periodic tasks ----

/// Handles to the monitor's named repeating tasks, so a clean shutdown can
/// cancel all of them instead of relying on process exit.
pub struct MonitorTasks {
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl MonitorTasks {
    pub fn shutdown(self) {
        for (name, handle) in self.handles {
            handle.abort();
            tracing::debug!("Stopped monitor task '{}'", name);
        }
    }
}

/// Spawn the sampler, alert sweep, and cleanup as independent repeating
/// tasks. A slow pass delays only its own next tick.
pub fn spawn_monitor_tasks(monitor: std::sync::Arc<Monitor>) -> MonitorTasks {
    let mut handles = Vec::new();

    let sample_interval = std::time::Duration::from_secs(monitor.sample_interval_secs().max(1));
    let sampler = monitor.clone();
    handles.push((
        "metrics-sampler",
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sample_interval);
            loop {
                interval.tick().await;
                sampler.sample_now().await;
            }
        }),
    ));

    let sweeper = monitor.clone();
    handles.push((
        "alert-sweep",
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                sweeper.sweep().await;
            }
        }),
    ));

    let cleaner = monitor;
    handles.push((
        "metrics-cleanup",
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                cleaner.cleanup().await;
            }
        }),
    ));

    tracing::info!("Monitor tasks started");
    MonitorTasks { handles }
}
