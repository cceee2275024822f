//! Cron-driven job scheduler.
//!
//! Each enabled job runs as its own named Tokio task: compute the next
//! fire time, record it, sleep, await the job body, repeat. Invocations
//! never overlap themselves because the next tick is not dispatched until
//! the previous body returns, and a slow job delays only its own next
//! tick. Job failures increment `error_count`, raise an `error-<name>`
//! alert, and leave the cadence untouched — no retry, no backoff, never
//! fatal.
//!
//! Operator errors (unknown job names) come back as `false`/`None`, never
//! as a panic.

pub mod trigger;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::AppError;
use crate::jobs::{
    cache_cleanup::CacheCleanup, card_backfill::CardBackfill, db_maintenance::DbMaintenance,
    health_ping::HealthPing, trending_refresh::TrendingRefresh, usage_report::UsageReport, Job,
    JobContext,
};
use crate::metrics::AppMetrics;
use self::trigger::{CronTrigger, Trigger};

/// Per-job bookkeeping exposed to operators.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub name: String,
    pub schedule: String,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub error_count: u64,
}

/// Result of a manual `run_now`.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct JobEntry {
    runner: Arc<dyn Job>,
    trigger: Arc<dyn Trigger>,
}

pub struct JobScheduler {
    ctx: JobContext,
    metrics: Option<Arc<AppMetrics>>,
    entries: RwLock<HashMap<String, JobEntry>>,
    statuses: Arc<RwLock<HashMap<String, JobStatus>>>,
    handles: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl JobScheduler {
    pub fn new(ctx: JobContext) -> Self {
        Self {
            ctx,
            metrics: None,
            entries: RwLock::new(HashMap::new()),
            statuses: Arc::new(RwLock::new(HashMap::new())),
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<AppMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register the static job set with the configured cron expressions.
    pub async fn register_default_jobs(&self, config: &Config) -> Result<(), AppError> {
        let schedules = &config.schedules;
        self.register(Arc::new(TrendingRefresh), &schedules.trending_refresh)
            .await?;
        self.register(Arc::new(CacheCleanup), &schedules.cache_cleanup)
            .await?;
        self.register(Arc::new(UsageReport), &schedules.usage_report)
            .await?;
        self.register(Arc::new(HealthPing), &schedules.health_ping)
            .await?;
        self.register(Arc::new(DbMaintenance), &schedules.db_maintenance)
            .await?;
        self.register(
            Arc::new(CardBackfill::new(&config.backfill)),
            &schedules.card_backfill,
        )
        .await?;
        Ok(())
    }

    /// Register a job on a cron expression.
    pub async fn register(&self, runner: Arc<dyn Job>, expr: &str) -> Result<(), AppError> {
        let trigger = Arc::new(CronTrigger::parse(expr)?);
        self.register_with_trigger(runner, trigger).await;
        Ok(())
    }

    /// Register a job on an arbitrary trigger (test seam).
    pub async fn register_with_trigger(&self, runner: Arc<dyn Job>, trigger: Arc<dyn Trigger>) {
        let name = runner.name().to_string();
        let status = JobStatus {
            name: name.clone(),
            schedule: trigger.describe().to_string(),
            enabled: true,
            last_run: None,
            next_run: trigger.next_after(Utc::now()),
            run_count: 0,
            error_count: 0,
        };

        self.statuses.write().await.insert(name.clone(), status);
        self.entries
            .write()
            .await
            .insert(name, JobEntry { runner, trigger });
    }

    /// Start the trigger task for every enabled job.
    pub async fn start(&self) {
        let names: Vec<String> = {
            let statuses = self.statuses.read().await;
            statuses
                .values()
                .filter(|s| s.enabled)
                .map(|s| s.name.clone())
                .collect()
        };

        for name in names {
            self.spawn_trigger_task(&name).await;
        }

        tracing::info!("Job scheduler started");
    }

    async fn spawn_trigger_task(&self, name: &str) {
        let entry = {
            let entries = self.entries.read().await;
            match entries.get(name) {
                Some(entry) => (entry.runner.clone(), entry.trigger.clone()),
                None => return,
            }
        };
        let (runner, trigger) = entry;
        let name = name.to_string();
        let ctx = self.ctx.clone();
        let statuses = self.statuses.clone();
        let metrics = self.metrics.clone();

        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let Some(next) = trigger.next_after(now) else {
                    tracing::warn!("Job '{}' has no next fire time; trigger stopped", task_name);
                    break;
                };
                if let Some(status) = statuses.write().await.get_mut(&task_name) {
                    status.next_run = Some(next);
                }

                let wait = (next - now).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                execute_once(&task_name, &runner, &ctx, &statuses, metrics.as_deref()).await;
            }
        });

        if let Some(old) = self.handles.lock().await.insert(name, handle) {
            old.abort();
        }
    }

    /// Enable or disable a job's trigger. Counters are untouched either
    /// way. Returns `false` for an unknown name.
    pub async fn toggle(&self, name: &str, enabled: bool) -> bool {
        {
            let mut statuses = self.statuses.write().await;
            let Some(status) = statuses.get_mut(name) else {
                return false;
            };
            status.enabled = enabled;
            if !enabled {
                status.next_run = None;
            }
        }

        if enabled {
            self.spawn_trigger_task(name).await;
            tracing::info!("Job '{}' enabled", name);
        } else {
            if let Some(handle) = self.handles.lock().await.remove(name) {
                handle.abort();
            }
            tracing::info!("Job '{}' disabled", name);
        }
        true
    }

    /// Execute a job immediately, outside its cadence, through the same
    /// counter path. Returns `None` for an unknown name.
    pub async fn run_now(&self, name: &str) -> Option<RunOutcome> {
        let runner = {
            let entries = self.entries.read().await;
            entries.get(name)?.runner.clone()
        };
        tracing::info!("Job '{}' triggered manually", name);
        Some(
            execute_once(
                name,
                &runner,
                &self.ctx,
                &self.statuses,
                self.metrics.as_deref(),
            )
            .await,
        )
    }

    pub async fn jobs(&self) -> Vec<JobStatus> {
        let mut jobs: Vec<JobStatus> = self.statuses.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        jobs
    }

    pub async fn job(&self, name: &str) -> Option<JobStatus> {
        self.statuses.read().await.get(name).cloned()
    }

    /// Abort every trigger task. Statuses and counters survive.
    pub async fn shutdown(&self) {
        let mut handles = self.handles.lock().await;
        for (name, handle) in handles.drain() {
            handle.abort();
            tracing::debug!("Stopped trigger task for '{}'", name);
        }
        tracing::info!("Job scheduler stopped");
    }
}

/// Run one job invocation and record the outcome.
async fn execute_once(
    name: &str,
    runner: &Arc<dyn Job>,
    ctx: &JobContext,
    statuses: &Arc<RwLock<HashMap<String, JobStatus>>>,
    metrics: Option<&AppMetrics>,
) -> RunOutcome {
    tracing::debug!("Job '{}' starting", name);
    let result = runner.run(ctx).await;
    let now = Utc::now();

    {
        let mut statuses = statuses.write().await;
        if let Some(status) = statuses.get_mut(name) {
            status.last_run = Some(now);
            match &result {
                Ok(_) => status.run_count += 1,
                Err(_) => status.error_count += 1,
            }
        }
    }

    match result {
        Ok(summary) => {
            tracing::info!("Job '{}' finished: {}", name, summary);
            if let Some(metrics) = metrics {
                metrics
                    .jobs_run_total
                    .with_label_values(&[name, "ok"])
                    .inc();
            }
            RunOutcome {
                ok: true,
                summary: Some(summary),
                error: None,
            }
        }
        Err(err) => {
            tracing::error!("Job '{}' failed: {}", name, err);
            ctx.monitor.raise_job_failure(name, &err.to_string()).await;
            if let Some(metrics) = metrics {
                metrics
                    .jobs_run_total
                    .with_label_values(&[name, "error"])
                    .inc();
            }
            RunOutcome {
                ok: false,
                summary: None,
                error: Some(err.to_string()),
            }
        }
    }
}
