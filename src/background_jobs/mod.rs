//! Hourly job scheduling and execution.

mod context;
mod job;
pub mod jobs;
mod scheduler;

pub use context::JobContext;
pub use job::{BackgroundJob, JobError, JobSchedule};
pub use scheduler::{next_tick, JobScheduler};
