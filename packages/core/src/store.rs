//! Data store contract consumed by the control plane.
//!
//! The scheduler and jobs never see a concrete database — only the
//! [`DataStore`] trait and the record types below. The production
//! implementation is [`crate::repository::MovieRepository`]; tests use the
//! in-memory store from [`crate::services::mock`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::monitor::types::DependencyHealth;

/// Errors surfaced by data store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store query failed: {0}")]
    Query(String),

    #[error("Store unavailable: {0}")]
    Connection(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Connection(err.to_string())
            }
            other => StoreError::Query(other.to_string()),
        }
    }
}

/// A persisted movie record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieRecord {
    pub id: i64,
    pub title: String,
    pub overview: String,
    pub release_date: Option<String>,
    pub vote_average: f64,
    pub popularity: f64,
    pub poster_path: Option<String>,
}

/// A generated summary card for one movie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryCard {
    pub movie_id: i64,
    pub body: String,
    pub generated_at: DateTime<Utc>,
}

/// Outcome of a store maintenance pass.
#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceReport {
    pub movies: i64,
    pub cards: i64,
    pub vacuumed: bool,
}

/// Contract the relational store exposes to the core.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn get_by_id(&self, id: i64) -> Result<Option<MovieRecord>, StoreError>;

    /// Insert or update a record (upsert on id).
    async fn save(&self, record: &MovieRecord) -> Result<(), StoreError>;

    async fn search(&self, query: &str, limit: u32) -> Result<Vec<MovieRecord>, StoreError>;

    /// Replace the entire trending set atomically, preserving order.
    async fn save_trending_set(&self, ids: &[i64]) -> Result<(), StoreError>;

    /// Current trending set, in rank order.
    async fn trending_ids(&self) -> Result<Vec<i64>, StoreError>;

    async fn get_card(&self, movie_id: i64) -> Result<Option<SummaryCard>, StoreError>;

    async fn save_card(&self, card: &SummaryCard) -> Result<(), StoreError>;

    /// Housekeeping pass (compaction, statistics). Returns row counts.
    async fn maintenance(&self) -> Result<MaintenanceReport, StoreError>;

    async fn health_check(&self) -> DependencyHealth;
}
