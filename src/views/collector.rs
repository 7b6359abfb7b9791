//! Batched, bounded-retry view collection.
//!
//! Requests are split into fixed-size batches that run concurrently on a
//! dedicated rayon pool; songs inside a batch are fetched one after the other.
//! A song whose lookups keep failing gets the views stored in the total chart
//! (or 0), so the result always has one entry per requested video.

use super::{MetricError, ViewCountSource};
use crate::config::MetricSettings;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::HashMap;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricRequest {
    pub video_id: String,
    /// Reaction video whose views count toward the song.
    pub reaction_id: Option<String>,
    /// Row id used to look up the fallback value.
    pub song_id: i64,
}

#[derive(Debug, Default)]
pub struct CollectionReport {
    /// Views by video id.
    pub views: HashMap<String, i64>,
    /// Video ids that got their fallback value.
    pub fallbacks: Vec<String>,
}

pub struct MetricCollector<'a> {
    source: &'a dyn ViewCountSource,
    batch_size: usize,
    max_attempts: u32,
    retry_delay: Duration,
    pool: Option<ThreadPool>,
}

impl<'a> MetricCollector<'a> {
    pub fn new(source: &'a dyn ViewCountSource, settings: &MetricSettings) -> Self {
        let pool = match ThreadPoolBuilder::new()
            .num_threads(settings.workers)
            .thread_name(|idx| format!("metric-worker-{idx}"))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!("Failed to build metric worker pool, collecting sequentially: {}", e);
                None
            }
        };

        Self {
            source,
            batch_size: settings.batch_size.max(1),
            max_attempts: settings.max_attempts.max(1),
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
            pool,
        }
    }

    /// Collects views for every request; never fails.
    ///
    /// `fallback` maps song ids to the views last stored in the total chart.
    pub fn collect(
        &self,
        requests: &[MetricRequest],
        fallback: &HashMap<i64, i64>,
    ) -> CollectionReport {
        let run_batch = |batch: &[MetricRequest]| -> Vec<(String, i64, bool)> {
            batch
                .iter()
                .map(|request| match self.fetch_with_retry(request) {
                    Ok(views) => (request.video_id.clone(), views, false),
                    Err(e) => {
                        warn!(
                            "Falling back to stored views for {}: {}",
                            request.video_id, e
                        );
                        let views = fallback.get(&request.song_id).copied().unwrap_or(0);
                        (request.video_id.clone(), views, true)
                    }
                })
                .collect()
        };

        let results: Vec<(String, i64, bool)> = match &self.pool {
            Some(pool) => pool.install(|| {
                requests
                    .par_chunks(self.batch_size)
                    .flat_map_iter(run_batch)
                    .collect()
            }),
            None => requests.chunks(self.batch_size).flat_map(run_batch).collect(),
        };

        let mut report = CollectionReport::default();
        for (video_id, views, fell_back) in results {
            if fell_back {
                report.fallbacks.push(video_id.clone());
            }
            report.views.insert(video_id, views);
        }

        info!(
            "Collected views for {} songs in {} batches ({} fallbacks)",
            report.views.len(),
            requests.len().div_ceil(self.batch_size),
            report.fallbacks.len()
        );
        report
    }

    fn fetch_with_retry(&self, request: &MetricRequest) -> Result<i64, MetricError> {
        let mut attempt = 1;
        loop {
            match self.fetch_combined(request) {
                Ok(views) => return Ok(views),
                Err(e) if attempt < self.max_attempts && e.is_transient() => {
                    debug!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt, self.max_attempts, request.video_id, e
                    );
                    attempt += 1;
                    if !self.retry_delay.is_zero() {
                        thread::sleep(self.retry_delay);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn fetch_combined(&self, request: &MetricRequest) -> Result<i64, MetricError> {
        let mut total = self.source.view_count(&request.video_id)?;
        if let Some(reaction) = &request.reaction_id {
            total = total.saturating_add(self.source.view_count(reaction)?);
        }
        Ok(i64::try_from(total).unwrap_or(i64::MAX))
    }
}
