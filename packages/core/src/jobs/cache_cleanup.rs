//! Cache janitor job.
//!
//! Clears only the short-lived namespaces (`temp:*`, `search:*`) to bound
//! memory growth. Long-TTL entries are never touched.

use async_trait::async_trait;

use super::{Job, JobContext, JobError};

const SHORT_LIVED_NAMESPACES: &[&str] = &["temp:*", "search:*"];

pub struct CacheCleanup;

#[async_trait]
impl Job for CacheCleanup {
    fn name(&self) -> &'static str {
        "cacheCleanup"
    }

    async fn run(&self, ctx: &JobContext) -> Result<String, JobError> {
        let mut removed = 0;
        for pattern in SHORT_LIVED_NAMESPACES {
            removed += ctx.cache.clear_by_pattern(pattern).await;
        }
        Ok(format!("{} short-lived cache key(s) removed", removed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::testutil::make_ctx;
    use crate::services::mock::{MemoryStore, MockProvider};

    #[tokio::test]
    async fn clears_only_short_lived_namespaces() {
        let ctx = make_ctx(MemoryStore::new(), MockProvider::new());
        ctx.cache.set("temp:upload", &1_u64, None).await;
        ctx.cache.set("search:blackout", &2_u64, None).await;
        ctx.cache.set("trending:day", &3_u64, None).await;
        ctx.cache.set("movie:1", &4_u64, None).await;

        let summary = CacheCleanup.run(&ctx).await.unwrap();

        assert!(summary.contains("2 short-lived"));
        assert_eq!(ctx.cache.get::<u64>("temp:upload").await, None);
        assert_eq!(ctx.cache.get::<u64>("search:blackout").await, None);
        assert_eq!(ctx.cache.get::<u64>("trending:day").await, Some(3));
        assert_eq!(ctx.cache.get::<u64>("movie:1").await, Some(4));
    }

    #[tokio::test]
    async fn empty_cache_is_a_no_op() {
        let ctx = make_ctx(MemoryStore::new(), MockProvider::new());
        let summary = CacheCleanup.run(&ctx).await.unwrap();
        assert!(summary.contains("0 short-lived"));
    }
}
