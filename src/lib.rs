//! Wakmusic chart crawler library
//!
//! Syncs the song sheet into the chart database, collects view counts and
//! rebuilds the hourly, daily, weekly, monthly and total charts.

pub mod background_jobs;
pub mod chart_store;
pub mod cli_style;
pub mod config;
pub mod credits;
pub mod cycle;
pub mod error;
pub mod ranking;
pub mod reconcile;
pub mod source;
pub mod sqlite_persistence;
pub mod views;

pub use chart_store::{ChartStore, SqliteChartStore};
pub use cycle::{CycleReport, SyncCycle};
pub use error::SyncError;
