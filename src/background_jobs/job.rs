use super::context::JobContext;
use chrono::{NaiveDateTime, Timelike};
use thiserror::Error;

/// When a job runs, evaluated at each top-of-hour tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSchedule {
    /// Every tick.
    Hourly,
    /// Once a day, at the tick of `hour` (0-23, local time).
    DailyAt { hour: u32 },
}

impl JobSchedule {
    pub fn is_due(&self, tick: NaiveDateTime) -> bool {
        match self {
            JobSchedule::Hourly => true,
            JobSchedule::DailyAt { hour } => tick.hour() == *hour,
        }
    }
}

/// Errors that can occur during job execution.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
    #[error("Job was cancelled")]
    Cancelled,
    #[error("Job panicked: {0}")]
    Panicked(String),
}

/// Trait for background jobs.
///
/// Jobs are executed synchronously in a blocking context.
pub trait BackgroundJob: Send + Sync {
    /// Unique identifier for this job.
    fn id(&self) -> &'static str;

    /// Human-readable name for this job.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn schedule(&self) -> JobSchedule;

    /// Execute the job.
    ///
    /// Called from `spawn_blocking`; implementations should return
    /// `JobError::Cancelled` early when `ctx.is_cancelled()`.
    fn execute(&self, ctx: &JobContext) -> Result<(), JobError>;
}
