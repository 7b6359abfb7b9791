//! Hourly chart synchronization.
//!
//! Each run opens its own database connection and API clients and drops them
//! when the cycle ends, whatever the outcome.

use crate::background_jobs::{BackgroundJob, JobContext, JobError, JobSchedule};
use crate::chart_store::SqliteChartStore;
use crate::config::AppConfig;
use crate::cycle::SyncCycle;
use crate::source::GoogleSheetReader;
use crate::views::YouTubeViewSource;
use chrono::Utc;
use std::sync::Arc;

pub struct ChartSyncJob {
    config: Arc<AppConfig>,
}

impl ChartSyncJob {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }
}

impl BackgroundJob for ChartSyncJob {
    fn id(&self) -> &'static str {
        "chart_sync"
    }

    fn name(&self) -> &'static str {
        "Chart Sync"
    }

    fn description(&self) -> &'static str {
        "Sync songs from the sheet, collect views and rebuild due charts"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Hourly
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let store = SqliteChartStore::new(&self.config.db_path)
            .map_err(|e| JobError::ExecutionFailed(format!("{:#}", e)))?;
        let sheet = GoogleSheetReader::new(&self.config.sheet)
            .map_err(|e| JobError::ExecutionFailed(format!("{:#}", e)))?;
        let views = YouTubeViewSource::new(&self.config.metrics)
            .map_err(|e| JobError::ExecutionFailed(format!("{:#}", e)))?;

        SyncCycle::new(&store, &sheet, &views, &self.config)
            .run(ctx.tick, Utc::now().timestamp())
            .map(|_| ())
            .map_err(|e| JobError::ExecutionFailed(e.to_string()))
    }
}
