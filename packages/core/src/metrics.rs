//! Prometheus metrics registry for the control plane.
//!
//! [`AppMetrics`] owns all registered metrics and the [`Registry`] they
//! belong to. Construct it once at startup, wrap in `Arc`, and pass it
//! to the scheduler and HTTP middleware.
//!
//! Exposed at `GET /metrics` in Prometheus text exposition format
//! (`text/plain; version=0.0.4`).

use prometheus::{CounterVec, Gauge, Histogram, HistogramOpts, Opts, Registry};

/// All application-level Prometheus metrics.
pub struct AppMetrics {
    /// Job executions, labelled by job name and outcome (`ok` / `error`).
    pub jobs_run_total: CounterVec,
    /// HTTP request count, labelled by method, path, and status code.
    pub http_requests_total: CounterVec,
    /// HTTP request latency histogram in seconds.
    pub http_request_duration: Histogram,
    /// Current number of unresolved alerts.
    pub alerts_active: Gauge,
    /// Cache hit counter value at last render.
    pub cache_hits: Gauge,
    /// Cache miss counter value at last render.
    pub cache_misses: Gauge,
    /// The registry that owns all of the above metrics.
    pub registry: Registry,
}

impl AppMetrics {
    /// Create and register all metrics. Returns an error if any metric
    /// name is invalid or duplicated (should not happen in practice).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let jobs_run_total = CounterVec::new(
            Opts::new(
                "marquee_ops_jobs_run_total",
                "Job executions by name and outcome",
            ),
            &["job", "outcome"],
        )?;

        let http_requests_total = CounterVec::new(
            Opts::new(
                "marquee_ops_http_requests_total",
                "HTTP requests by method, path, and status",
            ),
            &["method", "path", "status"],
        )?;

        let http_request_duration = Histogram::with_opts(
            HistogramOpts::new(
                "marquee_ops_http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;

        let alerts_active = Gauge::with_opts(Opts::new(
            "marquee_ops_alerts_active",
            "Unresolved alerts",
        ))?;

        let cache_hits = Gauge::with_opts(Opts::new(
            "marquee_ops_cache_hits",
            "Cache hits since start or last stats reset",
        ))?;

        let cache_misses = Gauge::with_opts(Opts::new(
            "marquee_ops_cache_misses",
            "Cache misses since start or last stats reset",
        ))?;

        registry.register(Box::new(jobs_run_total.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;
        registry.register(Box::new(alerts_active.clone()))?;
        registry.register(Box::new(cache_hits.clone()))?;
        registry.register(Box::new(cache_misses.clone()))?;

        Ok(Self {
            jobs_run_total,
            http_requests_total,
            http_request_duration,
            alerts_active,
            cache_hits,
            cache_misses,
            registry,
        })
    }

    /// Render all metrics as Prometheus text format (for the `/metrics` endpoint).
    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_metrics_register_without_error() {
        let metrics = AppMetrics::new();
        assert!(metrics.is_ok(), "AppMetrics::new() failed: {:?}", metrics.err());
    }

    #[test]
    fn render_produces_non_empty_output_after_increment() {
        let metrics = AppMetrics::new().unwrap();
        metrics
            .jobs_run_total
            .with_label_values(&["trendingRefresh", "ok"])
            .inc();
        let output = metrics.render().unwrap();
        assert!(output.contains("marquee_ops_jobs_run_total"));
    }

    #[test]
    fn counter_vec_labels_work() {
        let metrics = AppMetrics::new().unwrap();
        metrics
            .http_requests_total
            .with_label_values(&["GET", "/admin/jobs", "200"])
            .inc();
        let value = metrics
            .http_requests_total
            .with_label_values(&["GET", "/admin/jobs", "200"])
            .get();
        assert!((value - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn gauge_set_and_get() {
        let metrics = AppMetrics::new().unwrap();
        metrics.alerts_active.set(3.0);
        assert!((metrics.alerts_active.get() - 3.0).abs() < f64::EPSILON);
    }
}
