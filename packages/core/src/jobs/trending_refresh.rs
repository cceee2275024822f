//! Trending refresh job.
//!
//! Pulls the ranked trending list from the provider, persists any record
//! the store has not seen (full detail fetch), replaces the trending table
//! atomically, and invalidates the `trending:*` cache namespace so the
//! next read repopulates from fresh data.

use async_trait::async_trait;

use crate::store::MovieRecord;

use super::{Job, JobContext, JobError, LogAndContinue};

pub struct TrendingRefresh;

#[async_trait]
impl Job for TrendingRefresh {
    fn name(&self) -> &'static str {
        "trendingRefresh"
    }

    async fn run(&self, ctx: &JobContext) -> Result<String, JobError> {
        let trending = ctx.provider.get_trending().await?;

        let mut ids = Vec::with_capacity(trending.len());
        let mut fetched = 0;

        for movie in &trending {
            ids.push(movie.id);

            if ctx.store.get_by_id(movie.id).await?.is_some() {
                continue;
            }

            // A single bad detail record must not sink the whole refresh.
            let detail = ctx
                .provider
                .get_by_id(movie.id)
                .await
                .log_and_continue(&format!("Detail fetch for movie {}", movie.id))
                .flatten();

            if let Some(detail) = detail {
                ctx.store.save(&MovieRecord::from(&detail)).await?;
                fetched += 1;
            }
        }

        ctx.store.save_trending_set(&ids).await?;
        let invalidated = ctx.cache.clear_by_pattern("trending:*").await;

        Ok(format!(
            "{} trending entries, {} new records, {} cache key(s) invalidated",
            ids.len(),
            fetched,
            invalidated
        ))
    }
}
