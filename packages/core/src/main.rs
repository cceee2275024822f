use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use tower_http::cors::CorsLayer;

use marquee_ops::api::{self, AppState};
use marquee_ops::cache::{CacheStore, RedisBackend};
use marquee_ops::cli::Cli;
use marquee_ops::config::Config;
use marquee_ops::db;
use marquee_ops::jobs::JobContext;
use marquee_ops::logging::init_logging;
use marquee_ops::metrics::AppMetrics;
use marquee_ops::monitor::health::HealthAggregator;
use marquee_ops::monitor::{spawn_monitor_tasks, Monitor};
use marquee_ops::repository::MovieRepository;
use marquee_ops::scheduler::JobScheduler;
use marquee_ops::services::provider::{ProviderClient, TmdbClient};
use marquee_ops::store::DataStore;

fn fatal(message: String) -> ! {
    tracing::error!("{}", message);
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let mut config =
        Config::from_env().unwrap_or_else(|err| fatal(format!("Config error: {}", err)));
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(redis_url) = cli.redis_url {
        config.redis_url = redis_url;
    }
    if let Some(database_url) = cli.database_url {
        config.database_url = database_url;
    }
    if let Some(provider_url) = cli.provider_url {
        config.provider_base_url = provider_url;
    }

    // Collaborators. A Redis that is down at startup is tolerated — the
    // backend reconnects lazily and the cache degrades to misses.
    let pool = db::create_pool(&config.database_url)
        .await
        .unwrap_or_else(|err| fatal(format!("Database error: {}", err)));
    let store: Arc<dyn DataStore> = Arc::new(MovieRepository::new(pool));

    let provider: Arc<dyn ProviderClient> = Arc::new(TmdbClient::new(
        config.provider_base_url.clone(),
        config.provider_api_key.clone(),
    ));

    let backend = RedisBackend::open(&config.redis_url)
        .unwrap_or_else(|err| fatal(format!("Cache error: {}", err)));
    let cache = Arc::new(CacheStore::new(Arc::new(backend), &config.cache));

    // Control plane.
    let monitor = Arc::new(Monitor::new(
        config.thresholds.clone(),
        config.monitor.clone(),
    ));
    let metrics = Arc::new(
        AppMetrics::new().unwrap_or_else(|err| fatal(format!("Metrics error: {}", err))),
    );

    let ctx = JobContext {
        store: store.clone(),
        provider: provider.clone(),
        cache: cache.clone(),
        monitor: monitor.clone(),
    };
    let scheduler = Arc::new(JobScheduler::new(ctx).with_metrics(metrics.clone()));
    scheduler
        .register_default_jobs(&config)
        .await
        .unwrap_or_else(|err| fatal(format!("Job registration error: {}", err)));
    scheduler.start().await;

    let monitor_tasks = spawn_monitor_tasks(monitor.clone());

    let health = Arc::new(HealthAggregator::new(
        store,
        provider,
        cache.clone(),
        monitor.clone(),
    ));

    let state = AppState {
        scheduler: scheduler.clone(),
        monitor,
        health,
        cache,
        metrics,
    };
    let app = api::router(state).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap_or_else(|err| fatal(format!("Bind error on {}: {}", config.bind_addr, err)));
    tracing::info!("Admin API listening on {}", config.bind_addr);

    let serve = axum::serve(listener, app).with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown signal received");
    });
    if let Err(err) = serve.await {
        tracing::error!("Server error: {}", err);
    }

    scheduler.shutdown().await;
    monitor_tasks.shutdown();
    tracing::info!("Control plane stopped cleanly");
}
