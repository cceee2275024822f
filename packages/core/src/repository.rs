//! SQLite implementation of the [`DataStore`] contract.
//!
//! All SQLite read/write logic lives here. The trending-refresh job calls
//! [`MovieRepository::save_trending_set`] to replace the trending table in
//! one transaction, and the maintenance job calls
//! [`MovieRepository::maintenance`] to compact the file.
//!
//! Timestamps are stored as RFC 3339 strings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::monitor::types::DependencyHealth;
use crate::store::{DataStore, MaintenanceReport, MovieRecord, StoreError, SummaryCard};

/// Repository for reading and writing movie data to SQLite.
pub struct MovieRepository {
    pool: SqlitePool,
}

impl MovieRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Option<MovieRecord> {
    Some(MovieRecord {
        id: row.try_get("id").ok()?,
        title: row.try_get("title").ok()?,
        overview: row.try_get("overview").ok()?,
        release_date: row.try_get("release_date").ok()?,
        vote_average: row.try_get("vote_average").ok()?,
        popularity: row.try_get("popularity").ok()?,
        poster_path: row.try_get("poster_path").ok()?,
    })
}

#[async_trait]
impl DataStore for MovieRepository {
    async fn get_by_id(&self, id: i64) -> Result<Option<MovieRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, title, overview, release_date, vote_average, popularity, poster_path
             FROM movies WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().and_then(row_to_record))
    }

    async fn save(&self, record: &MovieRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO movies
             (id, title, overview, release_date, vote_average, popularity, poster_path, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 overview = excluded.overview,
                 release_date = excluded.release_date,
                 vote_average = excluded.vote_average,
                 popularity = excluded.popularity,
                 poster_path = excluded.poster_path,
                 updated_at = excluded.updated_at",
        )
        .bind(record.id)
        .bind(&record.title)
        .bind(&record.overview)
        .bind(&record.release_date)
        .bind(record.vote_average)
        .bind(record.popularity)
        .bind(&record.poster_path)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn search(&self, query: &str, limit: u32) -> Result<Vec<MovieRecord>, StoreError> {
        let pattern = format!("%{}%", query);
        let rows = sqlx::query(
            "SELECT id, title, overview, release_date, vote_average, popularity, poster_path
             FROM movies
             WHERE title LIKE ?
             ORDER BY popularity DESC
             LIMIT ?",
        )
        .bind(&pattern)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(row_to_record).collect())
    }

    /// Replace the trending table in a single transaction so readers never
    /// observe a partially written set.
    async fn save_trending_set(&self, ids: &[i64]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM trending").execute(&mut *tx).await?;

        for (rank, movie_id) in ids.iter().enumerate() {
            sqlx::query("INSERT INTO trending (rank, movie_id) VALUES (?, ?)")
                .bind(rank as i64)
                .bind(movie_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn trending_ids(&self) -> Result<Vec<i64>, StoreError> {
        let rows = sqlx::query("SELECT movie_id FROM trending ORDER BY rank ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| row.try_get("movie_id").ok())
            .collect())
    }

    async fn get_card(&self, movie_id: i64) -> Result<Option<SummaryCard>, StoreError> {
        let row = sqlx::query(
            "SELECT movie_id, body, generated_at FROM summary_cards WHERE movie_id = ?",
        )
        .bind(movie_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|row| {
            let generated_at: String = row.try_get("generated_at").ok()?;
            let generated_at = DateTime::parse_from_rfc3339(&generated_at)
                .ok()?
                .with_timezone(&Utc);
            Some(SummaryCard {
                movie_id: row.try_get("movie_id").ok()?,
                body: row.try_get("body").ok()?,
                generated_at,
            })
        }))
    }

    async fn save_card(&self, card: &SummaryCard) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO summary_cards (movie_id, body, generated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(movie_id) DO UPDATE SET
                 body = excluded.body,
                 generated_at = excluded.generated_at",
        )
        .bind(card.movie_id)
        .bind(&card.body)
        .bind(card.generated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn maintenance(&self) -> Result<MaintenanceReport, StoreError> {
        let movies: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM movies")
            .fetch_one(&self.pool)
            .await?;
        let cards: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM summary_cards")
            .fetch_one(&self.pool)
            .await?;

        sqlx::query("VACUUM").execute(&self.pool).await?;
        sqlx::query("ANALYZE").execute(&self.pool).await?;

        Ok(MaintenanceReport {
            movies,
            cards,
            vacuumed: true,
        })
    }

    async fn health_check(&self) -> DependencyHealth {
        match sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
        {
            Ok(_) => DependencyHealth::healthy("database"),
            Err(err) => DependencyHealth::unhealthy("database", err.to_string()),
        }
    }
}
