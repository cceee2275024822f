//! Database maintenance job. Delegates to the store's maintenance pass.

use async_trait::async_trait;

use super::{Job, JobContext, JobError};

pub struct DbMaintenance;

#[async_trait]
impl Job for DbMaintenance {
    fn name(&self) -> &'static str {
        "dbMaintenance"
    }

    async fn run(&self, ctx: &JobContext) -> Result<String, JobError> {
        let report = ctx.store.maintenance().await?;
        Ok(format!(
            "{} movie(s), {} card(s), vacuumed: {}",
            report.movies, report.cards, report.vacuumed
        ))
    }
}
