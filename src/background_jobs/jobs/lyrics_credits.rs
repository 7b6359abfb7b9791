use crate::background_jobs::{BackgroundJob, JobContext, JobError, JobSchedule};
use crate::chart_store::SqliteChartStore;
use crate::config::{AppConfig, CreditsSettings};
use crate::credits::refresh_credits;
use crate::source::GoogleSheetReader;
use std::path::PathBuf;

/// Daily refresh of the lyrics contributor credits.
pub struct LyricsCreditsJob {
    db_path: PathBuf,
    service_account_key: PathBuf,
    settings: CreditsSettings,
}

impl LyricsCreditsJob {
    /// `None` when credits are not configured.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        let settings = config.credits.clone()?;
        Some(Self {
            db_path: config.db_path.clone(),
            service_account_key: config.sheet.service_account_key.clone(),
            settings,
        })
    }
}

impl BackgroundJob for LyricsCreditsJob {
    fn id(&self) -> &'static str {
        "lyrics_credits"
    }

    fn name(&self) -> &'static str {
        "Lyrics Credits"
    }

    fn description(&self) -> &'static str {
        "Rank lyrics contributors and update the credits line"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::DailyAt {
            hour: self.settings.run_hour,
        }
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let store = SqliteChartStore::new(&self.db_path)
            .map_err(|e| JobError::ExecutionFailed(format!("{:#}", e)))?;
        let sheet = GoogleSheetReader::for_spreadsheet(
            &self.settings.spreadsheet_id,
            &self.service_account_key,
        )
        .map_err(|e| JobError::ExecutionFailed(format!("{:#}", e)))?;

        refresh_credits(&store, &sheet, &self.settings)
            .map(|_| ())
            .map_err(|e| JobError::ExecutionFailed(format!("{:#}", e)))
    }
}
