//! Cache-aside layer over a remote key/value server.
//!
//! [`CacheStore`] is the only cache API the rest of the crate sees. Values
//! are JSON-serialized strings with a per-entry TTL. Backend connectivity
//! errors are caught here: a failed `get` behaves as a miss and `set` /
//! `delete` are best-effort no-ops, so a cache outage degrades latency but
//! never correctness — the cache is never the source of truth.
//!
//! The production backend is Redis ([`RedisBackend`], lazily connected and
//! reconnecting). [`MemoryBackend`] implements the same trait in-process
//! and is what unit tests run against.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::CacheConfig;
use crate::error::AppError;

/// Key/value operations a cache server must provide.
///
/// Patterns are glob-limited: either an exact key or a `prefix*` match,
/// which is all the janitor and post-write invalidation need.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError>;
    async fn delete(&self, key: &str) -> Result<bool, AppError>;
    async fn exists(&self, key: &str) -> Result<bool, AppError>;
    /// Atomic counter increment. `ttl` is applied when the key is created.
    async fn increment(&self, key: &str, ttl: Option<Duration>) -> Result<i64, AppError>;
    /// Delete every key matching `pattern` in one batch. Returns the count.
    async fn delete_matching(&self, pattern: &str) -> Result<u64, AppError>;
    async fn ping(&self) -> Result<(), AppError>;
}

// ---- Redis backend ----------------------------------------------------------

/// Redis-backed [`CacheBackend`].
///
/// The multiplexed connection is established lazily and dropped on command
/// failure, so the next call reconnects. Opening the client only validates
/// the URL — a Redis that is down at startup does not prevent boot.
pub struct RedisBackend {
    client: redis::Client,
    conn: Mutex<Option<redis::aio::MultiplexedConnection>>,
}

impl RedisBackend {
    pub fn open(url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(url)
            .map_err(|err| AppError::Config(format!("invalid Redis URL: {}", err)))?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, AppError> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|err| AppError::Cache(format!("Redis connect failed: {}", err)))?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    /// Drop the cached connection so the next command reconnects.
    async fn invalidate_connection(&self) {
        *self.conn.lock().await = None;
    }

    async fn run<T: redis::FromRedisValue>(&self, cmd: &redis::Cmd) -> Result<T, AppError> {
        let mut conn = self.connection().await?;
        match cmd.query_async::<_, T>(&mut conn).await {
            Ok(value) => Ok(value),
            Err(err) => {
                self.invalidate_connection().await;
                Err(AppError::Cache(format!("Redis command failed: {}", err)))
            }
        }
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        self.run(redis::cmd("GET").arg(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError> {
        self.run::<()>(
            redis::cmd("SETEX")
                .arg(key)
                .arg(ttl.as_secs().max(1))
                .arg(value),
        )
        .await
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        let removed: i64 = self.run(redis::cmd("DEL").arg(key)).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, AppError> {
        let found: i64 = self.run(redis::cmd("EXISTS").arg(key)).await?;
        Ok(found > 0)
    }

    async fn increment(&self, key: &str, ttl: Option<Duration>) -> Result<i64, AppError> {
        let value: i64 = self.run(redis::cmd("INCR").arg(key)).await?;
        if let Some(ttl) = ttl {
            if value == 1 {
                self.run::<i64>(redis::cmd("EXPIRE").arg(key).arg(ttl.as_secs().max(1)))
                    .await?;
            }
        }
        Ok(value)
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, AppError> {
        let keys: Vec<String> = self.run(redis::cmd("KEYS").arg(pattern)).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let mut del = redis::cmd("DEL");
        for key in &keys {
            del.arg(key);
        }
        let removed: u64 = self.run(&del).await?;
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), AppError> {
        let reply: String = self.run(&redis::cmd("PING")).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(AppError::Cache(format!("unexpected PING reply: {}", reply)))
        }
    }
}

// ---- In-memory backend ------------------------------------------------------

/// Process-local [`CacheBackend`] used by tests and cache-less local runs.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key_matches(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                // Expired entries are evicted on read.
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError> {
        self.entries.lock().await.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        Ok(self.entries.lock().await.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, AppError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn increment(&self, key: &str, ttl: Option<Duration>) -> Result<i64, AppError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let current = entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.value.parse::<i64>().ok())
            .unwrap_or(0);
        let next = current + 1;
        let expires_at = if current == 0 {
            now + ttl.unwrap_or(Duration::from_secs(86_400))
        } else {
            entries
                .get(key)
                .map(|entry| entry.expires_at)
                .unwrap_or(now + Duration::from_secs(86_400))
        };
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, AppError> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|key, _| !key_matches(pattern, key));
        Ok((before - entries.len()) as u64)
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

// ---- Cache store ------------------------------------------------------------

/// Hit/miss counters snapshot for reporting.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

/// The cache-aside API used by every read path.
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    prefix: String,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        Self {
            backend,
            prefix: config.key_prefix.clone(),
            default_ttl: Duration::from_secs(config.default_ttl_secs),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Look up `key`. Backend errors and undecodable entries count as misses.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(&self.full_key(key)).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!("Cache get '{}' failed, treating as miss: {}", key, err);
                None
            }
        };
        match raw {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    Some(value)
                }
                Err(err) => {
                    tracing::warn!("Cache entry '{}' is not decodable, evicting: {}", key, err);
                    let _ = self.backend.delete(&self.full_key(key)).await;
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    None
                }
            },
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store `value` under `key`. Best effort — a failed write is logged
    /// and swallowed.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!("Cache set '{}' skipped, value not serializable: {}", key, err);
                return;
            }
        };
        let ttl = ttl.unwrap_or(self.default_ttl);
        if let Err(err) = self.backend.set(&self.full_key(key), &raw, ttl).await {
            tracing::warn!("Cache set '{}' failed: {}", key, err);
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        match self.backend.delete(&self.full_key(key)).await {
            Ok(removed) => removed,
            Err(err) => {
                tracing::warn!("Cache delete '{}' failed: {}", key, err);
                false
            }
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        match self.backend.exists(&self.full_key(key)).await {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!("Cache exists '{}' failed: {}", key, err);
                false
            }
        }
    }

    /// Atomically increment a counter key, creating it with `ttl` if absent.
    pub async fn increment(&self, key: &str, ttl: Option<Duration>) -> Option<i64> {
        match self.backend.increment(&self.full_key(key), ttl).await {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!("Cache increment '{}' failed: {}", key, err);
                None
            }
        }
    }

    /// Cache-aside read: return the cached value if fresh, otherwise invoke
    /// `producer` exactly once, store the result under `ttl`, and return it.
    ///
    /// Producer errors are returned to the caller and never cached.
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get::<T>(key).await {
            return Ok(cached);
        }
        let value = producer().await?;
        self.set(key, &value, ttl).await;
        Ok(value)
    }

    /// Delete all keys matching a glob (exact key or `prefix*`) under the
    /// configured key prefix. Returns the number of keys removed.
    pub async fn clear_by_pattern(&self, pattern: &str) -> u64 {
        match self.backend.delete_matching(&self.full_key(pattern)).await {
            Ok(removed) => removed,
            Err(err) => {
                tracing::warn!("Cache clear '{}' failed: {}", pattern, err);
                0
            }
        }
    }

    /// Delete every key under the configured prefix.
    pub async fn clear_all(&self) -> u64 {
        self.clear_by_pattern("*").await
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        self.backend.ping().await
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }

    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::error::AppError;

    fn make_store() -> CacheStore {
        CacheStore::new(
            Arc::new(MemoryBackend::new()),
            &CacheConfig {
                default_ttl_secs: 60,
                key_prefix: "test:".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn get_returns_none_when_cache_is_empty() {
        let store = make_store();
        assert_eq!(store.get::<u64>("missing").await, None);
        assert_eq!(store.stats().misses, 1);
    }

    #[tokio::test]
    async fn set_then_get_returns_value_within_ttl() {
        let store = make_store();
        store.set("answer", &42_u64, None).await;
        assert_eq!(store.get::<u64>("answer").await, Some(42));
        assert_eq!(store.stats().hits, 1);
    }

    #[tokio::test]
    async fn get_past_ttl_behaves_as_miss() {
        let store = make_store();
        store
            .set("ephemeral", &1_u64, Some(Duration::from_millis(10)))
            .await;
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(store.get::<u64>("ephemeral").await, None);
    }

    #[tokio::test]
    async fn get_or_set_invokes_producer_exactly_once_within_ttl() {
        let store = make_store();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value: Result<u64, AppError> = store
                .get_or_set("popular", None, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await;
            assert_eq!(value.unwrap(), 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_or_set_invokes_producer_again_after_ttl() {
        let store = make_store();
        let calls = AtomicUsize::new(0);
        let produce = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<u64, AppError>(7)
        };

        store
            .get_or_set("short", Some(Duration::from_millis(10)), produce)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        store
            .get_or_set("short", Some(Duration::from_millis(10)), produce)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn get_or_set_does_not_cache_producer_errors() {
        let store = make_store();

        let result: Result<u64, AppError> = store
            .get_or_set("flaky", None, || async {
                Err(AppError::Network("provider down".to_string()))
            })
            .await;
        assert!(result.is_err());

        // A later successful producer is still invoked.
        let result: Result<u64, AppError> = store
            .get_or_set("flaky", None, || async { Ok(9) })
            .await;
        assert_eq!(result.unwrap(), 9);
    }

    #[tokio::test]
    async fn clear_by_pattern_removes_only_matching_keys() {
        let store = make_store();
        store.set("trending:day", &1_u64, None).await;
        store.set("trending:week", &2_u64, None).await;
        store.set("movie:42", &3_u64, None).await;

        let removed = store.clear_by_pattern("trending:*").await;

        assert_eq!(removed, 2);
        assert_eq!(store.get::<u64>("trending:day").await, None);
        assert_eq!(store.get::<u64>("movie:42").await, Some(3));
    }

    #[tokio::test]
    async fn clear_all_removes_everything_under_prefix() {
        let store = make_store();
        store.set("a", &1_u64, None).await;
        store.set("b", &2_u64, None).await;

        assert_eq!(store.clear_all().await, 2);
        assert_eq!(store.get::<u64>("a").await, None);
    }

    #[tokio::test]
    async fn increment_returns_sequence_and_respects_ttl() {
        let store = make_store();
        assert_eq!(store.increment("hits", None).await, Some(1));
        assert_eq!(store.increment("hits", None).await, Some(2));

        assert_eq!(
            store
                .increment("burst", Some(Duration::from_millis(10)))
                .await,
            Some(1)
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
        // Counter expired — starts over.
        assert_eq!(
            store
                .increment("burst", Some(Duration::from_millis(10)))
                .await,
            Some(1)
        );
    }

    #[tokio::test]
    async fn delete_and_exists_round_trip() {
        let store = make_store();
        store.set("key", &1_u64, None).await;
        assert!(store.exists("key").await);
        assert!(store.delete("key").await);
        assert!(!store.exists("key").await);
        assert!(!store.delete("key").await);
    }

    #[tokio::test]
    async fn stats_reset_clears_counters() {
        let store = make_store();
        store.set("key", &1_u64, None).await;
        store.get::<u64>("key").await;
        store.get::<u64>("absent").await;

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);

        store.reset_stats();
        assert_eq!(store.stats().hits, 0);
        assert_eq!(store.stats().misses, 0);
    }

    #[test]
    fn pattern_matching_is_prefix_glob_or_exact() {
        assert!(key_matches("trending:*", "trending:day"));
        assert!(!key_matches("trending:*", "movie:1"));
        assert!(key_matches("movie:1", "movie:1"));
        assert!(!key_matches("movie:1", "movie:12"));
    }
}
