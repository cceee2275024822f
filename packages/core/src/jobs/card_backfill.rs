//! Summary-card backfill job.
//!
//! Finds trending items without a generated summary card and fills the gap
//! in fixed-size batches with an inter-batch delay, respecting provider
//! rate limits. Each card is persisted as it completes so partial progress
//! survives a mid-run failure. Card text is a plain digest of the stored
//! record.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::config::BackfillConfig;
use crate::store::{MovieRecord, SummaryCard};

use super::{Job, JobContext, JobError};

pub struct CardBackfill {
    batch_size: usize,
    batch_delay: Duration,
}

impl CardBackfill {
    pub fn new(config: &BackfillConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            batch_delay: Duration::from_millis(config.batch_delay_ms),
        }
    }
}

#[async_trait]
impl Job for CardBackfill {
    fn name(&self) -> &'static str {
        "cardBackfill"
    }

    async fn run(&self, ctx: &JobContext) -> Result<String, JobError> {
        let trending = ctx.store.trending_ids().await?;

        let mut missing = Vec::new();
        for id in trending {
            if ctx.store.get_card(id).await?.is_none() {
                missing.push(id);
            }
        }

        let mut written = 0;
        for (index, batch) in missing.chunks(self.batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.batch_delay).await;
            }

            for id in batch {
                let Some(record) = ctx.store.get_by_id(*id).await? else {
                    tracing::warn!("Trending movie {} has no stored record, skipping card", id);
                    continue;
                };
                let card = SummaryCard {
                    movie_id: *id,
                    body: compose_summary(&record),
                    generated_at: Utc::now(),
                };
                ctx.store.save_card(&card).await?;
                written += 1;
            }
        }

        Ok(format!(
            "{} of {} missing summary card(s) generated",
            written,
            missing.len()
        ))
    }
}

/// Deterministic one-paragraph digest of a record.
fn compose_summary(record: &MovieRecord) -> String {
    let year = record.release_date.as_deref().and_then(|date| date.get(..4));
    let mut body = match year {
        Some(year) => format!("{} ({})", record.title, year),
        None => record.title.clone(),
    };
    if record.vote_average > 0.0 {
        body.push_str(&format!(", rated {:.1}/10", record.vote_average));
    }
    body.push('.');
    if !record.overview.is_empty() {
        body.push(' ');
        body.extend(record.overview.chars().take(240));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::testutil::make_ctx;
    use crate::services::mock::{MemoryStore, MockProvider};

    fn make_record(id: i64, title: &str) -> MovieRecord {
        MovieRecord {
            id,
            title: title.to_string(),
            overview: "A slow-burn thriller.".to_string(),
            release_date: Some("2023-11-02".to_string()),
            vote_average: 7.4,
            popularity: 10.0,
            poster_path: None,
        }
    }

    fn make_job() -> CardBackfill {
        CardBackfill::new(&BackfillConfig {
            batch_size: 2,
            batch_delay_ms: 0,
        })
    }

    #[tokio::test]
    async fn generates_cards_for_trending_items_without_one() {
        let ctx = make_ctx(MemoryStore::new(), MockProvider::new());
        for id in 1..=3 {
            ctx.store.save(&make_record(id, &format!("Movie {}", id))).await.unwrap();
        }
        ctx.store.save_trending_set(&[1, 2, 3]).await.unwrap();

        let summary = make_job().run(&ctx).await.unwrap();

        assert!(summary.contains("3 of 3"));
        for id in 1..=3 {
            assert!(ctx.store.get_card(id).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn existing_cards_are_left_alone() {
        let ctx = make_ctx(MemoryStore::new(), MockProvider::new());
        ctx.store.save(&make_record(1, "Blackout")).await.unwrap();
        ctx.store.save_trending_set(&[1]).await.unwrap();
        let original = SummaryCard {
            movie_id: 1,
            body: "Hand-written card.".to_string(),
            generated_at: Utc::now(),
        };
        ctx.store.save_card(&original).await.unwrap();

        make_job().run(&ctx).await.unwrap();

        assert_eq!(
            ctx.store.get_card(1).await.unwrap().unwrap().body,
            "Hand-written card."
        );
    }

    #[tokio::test]
    async fn trending_items_without_records_are_skipped() {
        let ctx = make_ctx(MemoryStore::new(), MockProvider::new());
        ctx.store.save_trending_set(&[99]).await.unwrap();

        let summary = make_job().run(&ctx).await.unwrap();

        assert!(summary.contains("0 of 1"));
        assert!(ctx.store.get_card(99).await.unwrap().is_none());
    }

    #[test]
    fn summary_includes_title_year_and_rating() {
        let body = compose_summary(&make_record(1, "Blackout"));
        assert!(body.starts_with("Blackout (2023), rated 7.4/10."));
        assert!(body.contains("slow-burn"));
    }
}
