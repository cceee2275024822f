//! In-process fakes for the collaborator contracts.
//!
//! Used by unit and integration tests to exercise jobs, the scheduler, and
//! the health aggregator without a network or a database. Builder-style
//! configuration mirrors the way tests assemble scenarios.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::monitor::types::DependencyHealth;
use crate::services::provider::{ProviderClient, ProviderError, ProviderMovie};
use crate::store::{DataStore, MaintenanceReport, MovieRecord, StoreError, SummaryCard};

/// Scripted [`ProviderClient`].
#[derive(Default)]
pub struct MockProvider {
    trending: Vec<ProviderMovie>,
    details: HashMap<i64, ProviderMovie>,
    fail: bool,
    unhealthy: bool,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trending(mut self, trending: Vec<ProviderMovie>) -> Self {
        for movie in &trending {
            self.details.insert(movie.id, movie.clone());
        }
        self.trending = trending;
        self
    }

    /// Every call fails with `ServiceUnavailable` and health reports down.
    pub fn with_outage(mut self) -> Self {
        self.fail = true;
        self.unhealthy = true;
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.unhealthy = true;
        self
    }
}

/// Convenience constructor for provider movies in tests.
pub fn provider_movie(id: i64, title: &str) -> ProviderMovie {
    ProviderMovie {
        id,
        title: title.to_string(),
        overview: Some(format!("{} overview", title)),
        release_date: Some("2024-05-01".to_string()),
        vote_average: Some(7.0),
        popularity: Some(id as f64),
        poster_path: None,
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    async fn get_trending(&self) -> Result<Vec<ProviderMovie>, ProviderError> {
        if self.fail {
            return Err(ProviderError::Unavailable);
        }
        Ok(self.trending.clone())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ProviderMovie>, ProviderError> {
        if self.fail {
            return Err(ProviderError::Unavailable);
        }
        Ok(self.details.get(&id).cloned())
    }

    async fn health_check(&self) -> DependencyHealth {
        if self.unhealthy {
            DependencyHealth::unhealthy("provider", "scripted outage")
        } else {
            DependencyHealth::healthy("provider")
        }
    }
}

/// In-memory [`DataStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
    fail: bool,
    unhealthy: bool,
}

#[derive(Default)]
struct MemoryStoreInner {
    movies: HashMap<i64, MovieRecord>,
    trending: Vec<i64>,
    cards: HashMap<i64, SummaryCard>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation fails and health reports down.
    pub fn with_outage(mut self) -> Self {
        self.fail = true;
        self.unhealthy = true;
        self
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail {
            Err(StoreError::Connection("scripted outage".to_string()))
        } else {
            Ok(())
        }
    }

    pub async fn movie_count(&self) -> usize {
        self.inner.read().await.movies.len()
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn get_by_id(&self, id: i64) -> Result<Option<MovieRecord>, StoreError> {
        self.check()?;
        Ok(self.inner.read().await.movies.get(&id).cloned())
    }

    async fn save(&self, record: &MovieRecord) -> Result<(), StoreError> {
        self.check()?;
        self.inner
            .write()
            .await
            .movies
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn search(&self, query: &str, limit: u32) -> Result<Vec<MovieRecord>, StoreError> {
        self.check()?;
        let inner = self.inner.read().await;
        let needle = query.to_lowercase();
        let mut hits: Vec<MovieRecord> = inner
            .movies
            .values()
            .filter(|movie| movie.title.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.popularity.total_cmp(&a.popularity));
        hits.truncate(limit as usize);
        Ok(hits)
    }

    async fn save_trending_set(&self, ids: &[i64]) -> Result<(), StoreError> {
        self.check()?;
        self.inner.write().await.trending = ids.to_vec();
        Ok(())
    }

    async fn trending_ids(&self) -> Result<Vec<i64>, StoreError> {
        self.check()?;
        Ok(self.inner.read().await.trending.clone())
    }

    async fn get_card(&self, movie_id: i64) -> Result<Option<SummaryCard>, StoreError> {
        self.check()?;
        Ok(self.inner.read().await.cards.get(&movie_id).cloned())
    }

    async fn save_card(&self, card: &SummaryCard) -> Result<(), StoreError> {
        self.check()?;
        self.inner
            .write()
            .await
            .cards
            .insert(card.movie_id, card.clone());
        Ok(())
    }

    async fn maintenance(&self) -> Result<MaintenanceReport, StoreError> {
        self.check()?;
        let inner = self.inner.read().await;
        Ok(MaintenanceReport {
            movies: inner.movies.len() as i64,
            cards: inner.cards.len() as i64,
            vacuumed: false,
        })
    }

    async fn health_check(&self) -> DependencyHealth {
        if self.unhealthy {
            DependencyHealth::unhealthy("database", "scripted outage")
        } else {
            DependencyHealth::healthy("database")
        }
    }
}
