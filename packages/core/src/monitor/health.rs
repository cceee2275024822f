//! Aggregated system health.
//!
//! Polls each dependency's health-check contract and merges the results
//! with the unresolved alert set into one overall status — the single
//! operational signal external consumers read.

use std::sync::Arc;

use chrono::Utc;

use crate::cache::CacheStore;
use crate::monitor::types::{DependencyHealth, HealthStatus, SystemHealth};
use crate::monitor::Monitor;
use crate::services::provider::ProviderClient;
use crate::store::DataStore;

pub struct HealthAggregator {
    store: Arc<dyn DataStore>,
    provider: Arc<dyn ProviderClient>,
    cache: Arc<CacheStore>,
    monitor: Arc<Monitor>,
}

impl HealthAggregator {
    pub fn new(
        store: Arc<dyn DataStore>,
        provider: Arc<dyn ProviderClient>,
        cache: Arc<CacheStore>,
        monitor: Arc<Monitor>,
    ) -> Self {
        Self {
            store,
            provider,
            cache,
            monitor,
        }
    }

    /// Probe every dependency concurrently and fold in the alert state.
    ///
    /// `unhealthy` when any dependency is down or any unresolved alert is
    /// critical; `degraded` when unresolved alerts exist against healthy
    /// dependencies; `healthy` otherwise.
    pub async fn aggregate(&self) -> SystemHealth {
        let (store_health, provider_health, cache_ping) = tokio::join!(
            self.store.health_check(),
            self.provider.health_check(),
            self.cache.ping(),
        );

        let cache_health = match cache_ping {
            Ok(()) => DependencyHealth::healthy("cache"),
            Err(err) => DependencyHealth::unhealthy("cache", err.to_string()),
        };

        let dependencies = vec![store_health, provider_health, cache_health];
        let alerts = self.monitor.active_alerts().await;

        let any_dependency_down = dependencies.iter().any(|dep| !dep.is_healthy());
        let any_critical = self.monitor.has_unresolved_critical().await;

        let status = if any_dependency_down || any_critical {
            HealthStatus::Unhealthy
        } else if !alerts.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        SystemHealth {
            status,
            dependencies,
            alerts,
            checked_at: Utc::now(),
        }
    }
}
