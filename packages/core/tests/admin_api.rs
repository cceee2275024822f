//! Integration tests for the admin API.
//!
//! Each test boots the full Axum router (same assembly as `main.rs`) using
//! `tower::ServiceExt::oneshot` — no live server, Redis, or provider
//! needed. `build_test_app()` wires together:
//! - An in-memory `MemoryStore` and scripted `MockProvider`
//! - A `CacheStore` on the in-memory backend
//! - A `Monitor` on a static resource sampler
//! - A `JobScheduler` with the default job registry (triggers not started)
//! - Prometheus `AppMetrics`

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use marquee_ops::api::{self, AppState};
use marquee_ops::cache::{CacheStore, MemoryBackend};
use marquee_ops::config::Config;
use marquee_ops::jobs::JobContext;
use marquee_ops::metrics::AppMetrics;
use marquee_ops::monitor::health::HealthAggregator;
use marquee_ops::monitor::sampler::StaticSampler;
use marquee_ops::monitor::Monitor;
use marquee_ops::scheduler::JobScheduler;
use marquee_ops::services::mock::{provider_movie, MemoryStore, MockProvider};
use marquee_ops::services::provider::ProviderClient;
use marquee_ops::store::DataStore;

// ---- Helpers ----------------------------------------------------------------

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    cache: Arc<CacheStore>,
    monitor: Arc<Monitor>,
}

async fn build_test_app(store: MemoryStore, provider: MockProvider) -> TestApp {
    let config = Config::from_env().unwrap();

    let store = Arc::new(store);
    let provider = Arc::new(provider);
    let cache = Arc::new(CacheStore::new(
        Arc::new(MemoryBackend::new()),
        &config.cache,
    ));
    let monitor = Arc::new(Monitor::with_sampler(
        config.thresholds.clone(),
        config.monitor.clone(),
        Box::new(StaticSampler::idle()),
    ));
    let metrics = Arc::new(AppMetrics::new().unwrap());

    let ctx = JobContext {
        store: store.clone() as Arc<dyn DataStore>,
        provider: provider.clone() as Arc<dyn ProviderClient>,
        cache: cache.clone(),
        monitor: monitor.clone(),
    };
    let scheduler = Arc::new(JobScheduler::new(ctx).with_metrics(metrics.clone()));
    scheduler.register_default_jobs(&config).await.unwrap();

    let health = Arc::new(HealthAggregator::new(
        store.clone() as Arc<dyn DataStore>,
        provider as Arc<dyn ProviderClient>,
        cache.clone(),
        monitor.clone(),
    ));

    let router = api::router(AppState {
        scheduler,
        monitor: monitor.clone(),
        health,
        cache: cache.clone(),
        metrics,
    });

    TestApp {
        router,
        store,
        cache,
        monitor,
    }
}

async fn body_json(body: Body) -> Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ---- Health -----------------------------------------------------------------

#[tokio::test]
async fn health_is_healthy_with_quiet_system() {
    let app = build_test_app(MemoryStore::new(), MockProvider::new()).await;

    let resp = app.router.oneshot(get("/health")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["dependencies"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn unhealthy_provider_yields_503_even_with_zero_alerts() {
    let app = build_test_app(MemoryStore::new(), MockProvider::new().unhealthy()).await;

    let resp = app.router.oneshot(get("/health")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(resp.into_body()).await;
    assert_eq!(json["status"], "unhealthy");
    assert_eq!(json["alerts"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn open_alert_degrades_health() {
    let app = build_test_app(MemoryStore::new(), MockProvider::new()).await;
    app.monitor
        .raise_job_failure("trendingRefresh", "provider down")
        .await;

    let resp = app.router.oneshot(get("/health")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp.into_body()).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["alerts"][0]["id"], "error-trendingRefresh");
}

// ---- Jobs -------------------------------------------------------------------

#[tokio::test]
async fn jobs_listing_contains_default_registry() {
    let app = build_test_app(MemoryStore::new(), MockProvider::new()).await;

    let resp = app.router.oneshot(get("/admin/jobs")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp.into_body()).await;
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|job| job["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "cacheCleanup",
            "cardBackfill",
            "dbMaintenance",
            "healthPing",
            "trendingRefresh",
            "usageReport",
        ]
    );
    assert!(json[0]["enabled"].as_bool().unwrap());
    assert_eq!(json[0]["run_count"], 0);
}

#[tokio::test]
async fn toggling_unknown_job_is_404() {
    let app = build_test_app(MemoryStore::new(), MockProvider::new()).await;

    let resp = app
        .router
        .oneshot(post("/admin/jobs/noSuchJob/toggle", r#"{"enabled":false}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn toggling_a_job_updates_its_listing() {
    let app = build_test_app(MemoryStore::new(), MockProvider::new()).await;

    let resp = app
        .router
        .clone()
        .oneshot(post("/admin/jobs/cacheCleanup/toggle", r#"{"enabled":false}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app.router.oneshot(get("/admin/jobs")).await.unwrap();
    let json = body_json(resp.into_body()).await;
    let cleanup = json
        .as_array()
        .unwrap()
        .iter()
        .find(|job| job["name"] == "cacheCleanup")
        .unwrap();
    assert!(!cleanup["enabled"].as_bool().unwrap());
    assert!(cleanup["next_run"].is_null());
}

#[tokio::test]
async fn manual_cache_cleanup_run_counts_once_and_raises_no_alert() {
    let app = build_test_app(MemoryStore::new(), MockProvider::new()).await;

    let resp = app
        .router
        .clone()
        .oneshot(post("/admin/jobs/cacheCleanup/run", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let outcome = body_json(resp.into_body()).await;
    assert_eq!(outcome["ok"], true);

    let resp = app.router.clone().oneshot(get("/admin/jobs")).await.unwrap();
    let json = body_json(resp.into_body()).await;
    let cleanup = json
        .as_array()
        .unwrap()
        .iter()
        .find(|job| job["name"] == "cacheCleanup")
        .unwrap();
    assert_eq!(cleanup["run_count"], 1);
    assert_eq!(cleanup["error_count"], 0);

    assert!(app.monitor.alert("error-cacheCleanup").await.is_none());
}

#[tokio::test]
async fn running_unknown_job_is_404() {
    let app = build_test_app(MemoryStore::new(), MockProvider::new()).await;

    let resp = app
        .router
        .oneshot(post("/admin/jobs/noSuchJob/run", ""))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn trending_refresh_run_persists_provider_records() {
    let provider = MockProvider::new().with_trending(vec![
        provider_movie(10, "Blackout"),
        provider_movie(11, "Night Shift"),
    ]);
    let app = build_test_app(MemoryStore::new(), provider).await;

    let resp = app
        .router
        .oneshot(post("/admin/jobs/trendingRefresh/run", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(app.store.movie_count().await, 2);
    assert_eq!(app.store.trending_ids().await.unwrap(), vec![10, 11]);
}

#[tokio::test]
async fn failing_job_reports_error_and_opens_failure_alert() {
    let app = build_test_app(MemoryStore::new(), MockProvider::new().with_outage()).await;

    let resp = app
        .router
        .clone()
        .oneshot(post("/admin/jobs/trendingRefresh/run", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let outcome = body_json(resp.into_body()).await;
    assert_eq!(outcome["ok"], false);

    let resp = app.router.oneshot(get("/admin/alerts")).await.unwrap();
    let alerts = body_json(resp.into_body()).await;
    assert_eq!(alerts[0]["id"], "error-trendingRefresh");
    assert_eq!(alerts[0]["severity"], "error");
}

// ---- Alerts -----------------------------------------------------------------

#[tokio::test]
async fn alert_resolution_is_idempotent_over_http() {
    let app = build_test_app(MemoryStore::new(), MockProvider::new()).await;
    app.monitor
        .raise_job_failure("dbMaintenance", "disk full")
        .await;

    let resp = app
        .router
        .clone()
        .oneshot(post("/admin/alerts/error-dbMaintenance/resolve", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    // Second resolve reports failure rather than pretending to act.
    let resp = app
        .router
        .clone()
        .oneshot(post("/admin/alerts/error-dbMaintenance/resolve", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Resolved alerts disappear from the default listing but stay
    // reachable with include_resolved.
    let resp = app.router.clone().oneshot(get("/admin/alerts")).await.unwrap();
    assert_eq!(body_json(resp.into_body()).await.as_array().unwrap().len(), 0);

    let resp = app
        .router
        .oneshot(get("/admin/alerts?include_resolved=true"))
        .await
        .unwrap();
    let all = body_json(resp.into_body()).await;
    assert_eq!(all.as_array().unwrap().len(), 1);
    assert_eq!(all[0]["resolved"], true);
}

// ---- Metrics ----------------------------------------------------------------

#[tokio::test]
async fn metrics_snapshot_reflects_recorded_traffic() {
    let app = build_test_app(MemoryStore::new(), MockProvider::new()).await;
    app.monitor.record_request("/catalog/search", 45, 200).await;
    app.monitor.record_request("/catalog/search", 55, 200).await;

    let resp = app.router.oneshot(get("/admin/metrics")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp.into_body()).await;
    assert_eq!(json["performance"]["request_count"], 2);
    assert_eq!(json["performance"]["min_ms"], 45);
}

#[tokio::test]
async fn middleware_records_every_served_request() {
    let app = build_test_app(MemoryStore::new(), MockProvider::new()).await;

    app.router.clone().oneshot(get("/admin/jobs")).await.unwrap();
    app.router.clone().oneshot(get("/admin/cache/stats")).await.unwrap();

    let perf = app.monitor.performance_metrics().await;
    assert_eq!(perf.request_count, 2);
}

#[tokio::test]
async fn prometheus_endpoint_renders_registered_metrics() {
    let app = build_test_app(MemoryStore::new(), MockProvider::new()).await;
    app.router
        .clone()
        .oneshot(post("/admin/jobs/cacheCleanup/run", ""))
        .await
        .unwrap();

    let resp = app.router.oneshot(get("/metrics")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert_eq!(content_type, "text/plain; version=0.0.4");

    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.contains("marquee_ops_jobs_run_total"));
    assert!(body.contains("marquee_ops_http_requests_total"));
    assert!(body.contains("marquee_ops_alerts_active"));
}

// ---- Cache administration ---------------------------------------------------

#[tokio::test]
async fn cache_stats_report_and_reset() {
    let app = build_test_app(MemoryStore::new(), MockProvider::new()).await;
    app.cache.set("movie:1", &1_u64, None).await;
    app.cache.get::<u64>("movie:1").await;
    app.cache.get::<u64>("movie:2").await;

    let resp = app.router.clone().oneshot(get("/admin/cache/stats")).await.unwrap();
    let stats = body_json(resp.into_body()).await;
    assert_eq!(stats["hits"], 1);
    assert_eq!(stats["misses"], 1);

    let resp = app
        .router
        .clone()
        .oneshot(post("/admin/cache/stats/reset", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app.router.oneshot(get("/admin/cache/stats")).await.unwrap();
    let stats = body_json(resp.into_body()).await;
    assert_eq!(stats["hits"], 0);
    assert_eq!(stats["misses"], 0);
}

#[tokio::test]
async fn cache_clear_by_pattern_removes_only_matching_keys() {
    let app = build_test_app(MemoryStore::new(), MockProvider::new()).await;
    app.cache.set("trending:day", &1_u64, None).await;
    app.cache.set("movie:1", &2_u64, None).await;

    let req = Request::builder()
        .method(Method::DELETE)
        .uri("/admin/cache?pattern=trending:*")
        .body(Body::empty())
        .unwrap();
    let resp = app.router.oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp.into_body()).await;
    assert_eq!(json["removed"], 1);
    assert_eq!(app.cache.get::<u64>("trending:day").await, None);
    assert_eq!(app.cache.get::<u64>("movie:1").await, Some(2));
}

#[tokio::test]
async fn cache_clear_without_pattern_clears_everything() {
    let app = build_test_app(MemoryStore::new(), MockProvider::new()).await;
    app.cache.set("a", &1_u64, None).await;
    app.cache.set("b", &2_u64, None).await;

    let req = Request::builder()
        .method(Method::DELETE)
        .uri("/admin/cache")
        .body(Body::empty())
        .unwrap();
    let resp = app.router.oneshot(req).await.unwrap();

    let json = body_json(resp.into_body()).await;
    assert_eq!(json["removed"], 2);
}
