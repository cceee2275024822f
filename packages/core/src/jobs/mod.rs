//! Scheduled job bodies.
//!
//! A [`Job`] is a short procedure built on the cache, data store, and
//! provider contracts carried in [`JobContext`]. Bodies return an explicit
//! [`JobError`] with a failure kind; best-effort sub-steps use the
//! [`LogAndContinue`] combinator instead of silently swallowing errors.

pub mod cache_cleanup;
pub mod card_backfill;
pub mod db_maintenance;
pub mod health_ping;
pub mod trending_refresh;
pub mod usage_report;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::cache::CacheStore;
use crate::monitor::Monitor;
use crate::services::provider::{ProviderClient, ProviderError};
use crate::store::{DataStore, StoreError};

/// Everything a job body may touch, shared by handle.
#[derive(Clone)]
pub struct JobContext {
    pub store: Arc<dyn DataStore>,
    pub provider: Arc<dyn ProviderClient>,
    pub cache: Arc<CacheStore>,
    pub monitor: Arc<Monitor>,
}

/// Job failure with its kind, threaded back to the scheduler wrapper.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    #[error("provider failure: {0}")]
    Provider(#[from] ProviderError),

    #[error("cache failure: {0}")]
    Cache(String),

    #[error("{0}")]
    Other(String),
}

/// One registered job body.
#[async_trait]
pub trait Job: Send + Sync {
    /// Registry key (also used in the `error-<name>` alert id).
    fn name(&self) -> &'static str;

    /// Run once. The `Ok` string is a human-readable run summary.
    async fn run(&self, ctx: &JobContext) -> Result<String, JobError>;
}

/// Named log-and-continue combinator for best-effort sub-steps.
///
/// A failed sub-step is logged with its context and the step's value
/// becomes `None`; the surrounding job keeps going.
pub trait LogAndContinue<T> {
    fn log_and_continue(self, context: &str) -> Option<T>;
}

impl<T, E: std::fmt::Display> LogAndContinue<T> for Result<T, E> {
    fn log_and_continue(self, context: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!("{}: {} (continuing)", context, err);
                None
            }
        }
    }
}
