//! Job triggering.
//!
//! [`Trigger`] abstracts "when does this job fire next" so scheduling is
//! swappable and testable with a fake clock: production uses
//! [`CronTrigger`] (expression evaluation delegated to the `cron` crate),
//! tests use [`EveryTrigger`].

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};

use crate::error::AppError;

pub trait Trigger: Send + Sync {
    /// The configured schedule, as given (shown in job listings).
    fn describe(&self) -> &str;

    /// Next fire time strictly after `after`, if any.
    fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>>;
}

/// Cron-expression trigger (seconds field included, e.g. `0 */5 * * * *`).
pub struct CronTrigger {
    expr: String,
    schedule: cron::Schedule,
}

impl CronTrigger {
    pub fn parse(expr: &str) -> Result<Self, AppError> {
        let schedule = cron::Schedule::from_str(expr).map_err(|err| {
            AppError::Config(format!("invalid cron expression '{}': {}", expr, err))
        })?;
        Ok(Self {
            expr: expr.to_string(),
            schedule,
        })
    }
}

impl Trigger for CronTrigger {
    fn describe(&self) -> &str {
        &self.expr
    }

    fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}

/// Fires on a fixed period. Used by tests and ad-hoc schedules.
pub struct EveryTrigger {
    label: String,
    period: Duration,
}

impl EveryTrigger {
    pub fn new(period: std::time::Duration) -> Self {
        let period = Duration::from_std(period).unwrap_or_else(|_| Duration::seconds(60));
        Self {
            label: format!("every {}ms", period.num_milliseconds()),
            period,
        }
    }
}

impl Trigger for EveryTrigger {
    fn describe(&self) -> &str {
        &self.label
    }

    fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        Some(after + self.period)
    }
}
