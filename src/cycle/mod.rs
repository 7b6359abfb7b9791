//! One synchronization cycle: sheet -> songs -> views -> charts.

mod windows;

pub use windows::due_windows;

use crate::chart_store::{ChartStore, ChartWindow, Song};
use crate::config::AppConfig;
use crate::error::SyncError;
use crate::ranking::ChartRankingEngine;
use crate::reconcile::CatalogReconciler;
use crate::source::{build_catalog, SheetReader, SourceCatalog};
use crate::views::{MetricCollector, MetricRequest, ViewCountSource};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    FetchSource,
    Reconcile,
    CollectMetrics,
    RankCharts,
    Finalize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Windows rebuilt and marked as synced.
    pub windows: Vec<ChartWindow>,
    pub failed_windows: Vec<ChartWindow>,
    /// Entities whose sync was rolled back.
    pub failed_entities: Vec<&'static str>,
    pub skipped_rows: usize,
    pub songs_ranked: usize,
    pub fallbacks: usize,
}

pub struct SyncCycle<'a> {
    store: &'a dyn ChartStore,
    sheet: &'a dyn SheetReader,
    views: &'a dyn ViewCountSource,
    config: &'a AppConfig,
}

impl<'a> SyncCycle<'a> {
    pub fn new(
        store: &'a dyn ChartStore,
        sheet: &'a dyn SheetReader,
        views: &'a dyn ViewCountSource,
        config: &'a AppConfig,
    ) -> Self {
        Self {
            store,
            sheet,
            views,
            config,
        }
    }

    /// Runs a cycle for the hour `tick`; `now` (unix seconds) stamps soft
    /// deletes and sync state.
    ///
    /// Only an unreadable sheet fails the cycle, and then nothing is written.
    pub fn run(&self, tick: NaiveDateTime, now: i64) -> Result<CycleReport, SyncError> {
        let due = due_windows(tick);
        info!(
            "Starting sync cycle for {} (due: {})",
            tick.format("%Y-%m-%d %H:%M"),
            due.iter()
                .map(|w| w.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut report = CycleReport::default();

        self.enter(CycleState::FetchSource);
        let catalog = match self.fetch_catalog() {
            Ok(catalog) => catalog,
            Err(e) => {
                error!("Sync cycle aborted: {}", e);
                self.enter(CycleState::Idle);
                return Err(e);
            }
        };
        report.skipped_rows = catalog.skipped.len();

        self.enter(CycleState::Reconcile);
        let Some(songs) = self.reconcile(&catalog, now, &mut report) else {
            warn!("No song table available, skipping view collection and ranking");
            self.enter(CycleState::Idle);
            return Ok(report);
        };
        let active: Vec<&Song> = songs.iter().filter(|s| s.is_active()).collect();

        self.enter(CycleState::CollectMetrics);
        let views = self.collect_views(&active, &mut report);

        self.enter(CycleState::RankCharts);
        let engine = ChartRankingEngine::new(self.store);
        for window in due {
            match engine.rank(window, &active, &views) {
                Ok(count) => {
                    report.songs_ranked = report.songs_ranked.max(count);
                    report.windows.push(window);
                }
                Err(e) => {
                    error!("Failed to sync {} chart, keeping previous state: {}", window, e);
                    report.failed_windows.push(window);
                }
            }
        }

        self.enter(CycleState::Finalize);
        for window in &report.windows {
            if let Err(e) = self.store.mark_synced(*window, now) {
                error!("Failed to record sync time of {} chart: {:#}", window, e);
            }
        }

        self.enter(CycleState::Idle);
        info!(
            "Sync cycle finished: {} windows ranked, {} failed, {} rows skipped, {} view fallbacks",
            report.windows.len(),
            report.failed_windows.len(),
            report.skipped_rows,
            report.fallbacks
        );
        Ok(report)
    }

    fn enter(&self, state: CycleState) {
        debug!("Sync cycle state: {:?}", state);
    }

    fn fetch_catalog(&self) -> Result<SourceCatalog, SyncError> {
        let settings = &self.config.sheet;
        let mut attempt = 1;
        loop {
            let result = self
                .sheet
                .read_range(&settings.song_range)
                .and_then(|rows| build_catalog(&rows, &self.config.columns));

            match result {
                Ok(catalog) => {
                    info!(
                        "Loaded {} songs from sheet ({} rows skipped)",
                        catalog.songs.len(),
                        catalog.skipped.len()
                    );
                    return Ok(catalog);
                }
                Err(e) if attempt < settings.fetch_attempts && e.is_transient() => {
                    warn!(
                        "Failed to load song sheet (attempt {}/{}): {}",
                        attempt, settings.fetch_attempts, e
                    );
                    attempt += 1;
                    thread::sleep(Duration::from_secs(settings.retry_delay_secs));
                }
                Err(e) => {
                    return Err(SyncError::SourceUnavailable {
                        attempts: attempt,
                        source: e,
                    })
                }
            }
        }
    }

    /// Song table to rank: the reconciled one, or the stored one when the
    /// song transaction failed.
    fn reconcile(
        &self,
        catalog: &SourceCatalog,
        now: i64,
        report: &mut CycleReport,
    ) -> Option<Vec<Song>> {
        let reconciler = CatalogReconciler::new(self.store);

        let songs = match reconciler.reconcile_songs(&catalog.songs, now) {
            Ok(songs) => songs,
            Err(e) => {
                error!("Failed to sync songs, keeping previous state: {}", e);
                report.failed_entities.push("songs");
                match self.store.load_songs() {
                    Ok(songs) => songs,
                    Err(e) => {
                        error!("Failed to load stored songs: {:#}", e);
                        return None;
                    }
                }
            }
        };

        if let Err(e) = reconciler.reconcile_artists(&catalog.artist_links, &songs) {
            error!("Failed to sync artist links, keeping previous state: {}", e);
            report.failed_entities.push("artist links");
        }
        if let Err(e) = reconciler.reconcile_keywords(&catalog.keyword_links, &songs) {
            error!("Failed to sync keywords, keeping previous state: {}", e);
            report.failed_entities.push("keywords");
        }

        Some(songs)
    }

    fn collect_views(&self, active: &[&Song], report: &mut CycleReport) -> HashMap<String, i64> {
        let fallback = self.store.total_views_by_song().unwrap_or_else(|e| {
            warn!("Failed to load stored total views, falling back to 0: {:#}", e);
            HashMap::new()
        });

        let requests: Vec<MetricRequest> = active
            .iter()
            .map(|song| MetricRequest {
                video_id: song.data.external_id.clone(),
                reaction_id: song.data.reaction.clone(),
                song_id: song.id,
            })
            .collect();

        let collection =
            MetricCollector::new(self.views, &self.config.metrics).collect(&requests, &fallback);
        report.fallbacks = collection.fallbacks.len();
        collection.views
    }
}
