//! Health ping job. Probes every dependency contract and logs the result.
//! A down dependency is reported, never fatal.

use async_trait::async_trait;

use super::{Job, JobContext, JobError};

pub struct HealthPing;

#[async_trait]
impl Job for HealthPing {
    fn name(&self) -> &'static str {
        "healthPing"
    }

    async fn run(&self, ctx: &JobContext) -> Result<String, JobError> {
        let (store_health, provider_health, cache_ping) = tokio::join!(
            ctx.store.health_check(),
            ctx.provider.health_check(),
            ctx.cache.ping(),
        );

        let cache_up = cache_ping.is_ok();
        for (name, healthy) in [
            ("database", store_health.is_healthy()),
            ("provider", provider_health.is_healthy()),
            ("cache", cache_up),
        ] {
            if healthy {
                tracing::debug!("Health ping: {} ok", name);
            } else {
                tracing::warn!("Health ping: {} is down", name);
            }
        }

        Ok(format!(
            "database {}, provider {}, cache {}",
            if store_health.is_healthy() { "ok" } else { "down" },
            if provider_health.is_healthy() { "ok" } else { "down" },
            if cache_up { "ok" } else { "down" },
        ))
    }
}
