use super::context::JobContext;
use super::job::{BackgroundJob, JobError};
use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Runs registered jobs at every top of the hour.
///
/// Due jobs run one after the other and the next tick is only awaited once
/// they are all done, so runs never overlap.
pub struct JobScheduler {
    jobs: Vec<Arc<dyn BackgroundJob>>,

    /// Token to signal scheduler shutdown.
    shutdown_token: CancellationToken,
}

/// First top of the hour strictly after `now`.
pub fn next_tick(now: NaiveDateTime) -> NaiveDateTime {
    let hour_start = NaiveTime::from_hms_opt(now.hour(), 0, 0).unwrap_or_default();
    NaiveDateTime::new(now.date(), hour_start) + TimeDelta::hours(1)
}

impl JobScheduler {
    pub fn new(shutdown_token: CancellationToken) -> Self {
        Self {
            jobs: Vec::new(),
            shutdown_token,
        }
    }

    pub fn register_job(&mut self, job: Arc<dyn BackgroundJob>) {
        info!("Registering job: {} - {}", job.id(), job.description());
        self.jobs.push(job);
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Main scheduler loop, returns once the shutdown token is cancelled.
    pub async fn run(&self) {
        info!("Starting job scheduler with {} registered jobs", self.job_count());

        loop {
            let now = Local::now().naive_local();
            let tick = next_tick(now);
            let sleep_duration = (tick - now).to_std().unwrap_or(Duration::ZERO);
            debug!(
                "Scheduler sleeping for {:?} until {}",
                sleep_duration,
                tick.format("%Y-%m-%d %H:%M")
            );

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {
                    self.run_due_jobs(tick).await;
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    break;
                }
            }
        }

        info!("Job scheduler stopped");
    }

    /// Runs every job due at `tick`, sequentially, in registration order.
    pub async fn run_due_jobs(
        &self,
        tick: NaiveDateTime,
    ) -> Vec<(&'static str, Result<(), JobError>)> {
        let mut results = Vec::new();
        for job in self.jobs.iter().filter(|job| job.schedule().is_due(tick)) {
            if self.shutdown_token.is_cancelled() {
                break;
            }
            let result = self.run_job(Arc::clone(job), tick).await;
            results.push((job.id(), result));
        }
        results
    }

    async fn run_job(
        &self,
        job: Arc<dyn BackgroundJob>,
        tick: NaiveDateTime,
    ) -> Result<(), JobError> {
        let job_id = job.id();
        info!("Starting job: {} ({})", job_id, job.name());

        let ctx = JobContext::new(self.shutdown_token.child_token(), tick);
        let start_time = Instant::now();
        let result = tokio::task::spawn_blocking(move || job.execute(&ctx))
            .await
            .unwrap_or_else(|e| Err(JobError::Panicked(e.to_string())));
        let elapsed = start_time.elapsed();

        match &result {
            Ok(()) => info!("Job {} completed successfully in {:?}", job_id, elapsed),
            Err(JobError::Cancelled) => info!("Job {} was cancelled after {:?}", job_id, elapsed),
            Err(e) => error!("Job {} failed after {:?}: {}", job_id, elapsed, e),
        }
        result
    }
}
