//! Usage report job. Read-only aggregation of cache and request metrics,
//! logged for operators.

use async_trait::async_trait;

use super::{Job, JobContext, JobError};

pub struct UsageReport;

#[async_trait]
impl Job for UsageReport {
    fn name(&self) -> &'static str {
        "usageReport"
    }

    async fn run(&self, ctx: &JobContext) -> Result<String, JobError> {
        let cache = ctx.cache.stats();
        let perf = ctx.monitor.performance_metrics().await;

        tracing::info!(
            "Usage: cache {} hits / {} misses ({:.0}% hit rate)",
            cache.hits,
            cache.misses,
            cache.hit_rate * 100.0
        );
        tracing::info!(
            "Usage: {} request(s) in the last {}s, avg {:.0}ms, p95 {}ms, {:.2} req/s",
            perf.request_count,
            perf.window_secs,
            perf.avg_ms,
            perf.p95_ms,
            perf.throughput_rps
        );

        Ok(format!(
            "cache hit rate {:.0}%, {} request(s) in window, error rate {:.1}%",
            cache.hit_rate * 100.0,
            perf.request_count,
            perf.error_rate_pct
        ))
    }
}
