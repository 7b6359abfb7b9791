//! Persisted entities of the chart database.

use clap::ValueEnum;
use std::fmt;

/// Song attributes as maintained in the source spreadsheet.
///
/// `sort_order` is fixed point (decimal value × 100).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongData {
    pub external_id: String,
    pub title: String,
    pub artist: String,
    pub remix: Option<String>,
    pub reaction: Option<String>,
    pub release_date: i64,
    pub highlight_start: i64,
    pub highlight_end: i64,
    pub sort_order: i64,
}

/// A song row, identified by the store-assigned `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    pub id: i64,
    pub data: SongData,
    /// Unix seconds of the soft delete, `None` while the song is listed.
    pub deleted_at: Option<i64>,
}

impl Song {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artist {
    pub id: i64,
    /// Key used by the column configuration, e.g. `woowakgood`.
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    pub id: i64,
    pub name: String,
}

/// One row of a chart window.
///
/// `last_rank` is the rank the song held in the previous snapshot of the
/// same window (0 when it was not charted).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartEntry {
    pub song_id: i64,
    pub views: i64,
    pub increase: i64,
    pub last_rank: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum)]
pub enum ChartWindow {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Total,
}

impl ChartWindow {
    pub const ALL: [ChartWindow; 5] = [
        ChartWindow::Hourly,
        ChartWindow::Daily,
        ChartWindow::Weekly,
        ChartWindow::Monthly,
        ChartWindow::Total,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartWindow::Hourly => "hourly",
            ChartWindow::Daily => "daily",
            ChartWindow::Weekly => "weekly",
            ChartWindow::Monthly => "monthly",
            ChartWindow::Total => "total",
        }
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            ChartWindow::Hourly => "chart_hourly",
            ChartWindow::Daily => "chart_daily",
            ChartWindow::Weekly => "chart_weekly",
            ChartWindow::Monthly => "chart_monthly",
            ChartWindow::Total => "chart_total",
        }
    }

    /// Value a chart of this window is ordered by, descending.
    pub fn ranking_key(&self, entry: &ChartEntry) -> i64 {
        match self {
            ChartWindow::Total => entry.views,
            _ => entry.increase,
        }
    }
}

impl fmt::Display for ChartWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Song mutations computed by the reconciler, applied in one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SongChangeSet {
    /// New songs, in source order.
    pub inserts: Vec<SongData>,
    /// Rows whose fields changed or that come back from a soft delete.
    /// Applying an update always clears `deleted_at`.
    pub updates: Vec<(i64, SongData)>,
    pub soft_deletes: Vec<i64>,
}

impl SongChangeSet {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.soft_deletes.is_empty()
    }
}

/// Keyword table mutations; keywords are hard deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordChangeSet {
    pub inserts: Vec<String>,
    pub deletes: Vec<i64>,
}
