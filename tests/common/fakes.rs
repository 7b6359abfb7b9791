//! In-memory stand-ins for the spreadsheet and the view count API.

use anyhow::{bail, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use wakmusic_chart_crawler::chart_store::{
    Artist, ChartEntry, ChartStore, ChartWindow, Keyword, KeywordChangeSet, Song, SongChangeSet,
};
use wakmusic_chart_crawler::source::{SheetReader, SourceError};
use wakmusic_chart_crawler::views::{MetricError, ViewCountSource};

use super::constants::HEADER;

/// Serves a fixed sheet, optionally failing the next reads with a 503.
pub struct FakeSheetReader {
    rows: Mutex<Vec<Vec<String>>>,
    failures_left: AtomicU32,
    reads: AtomicU32,
}

impl FakeSheetReader {
    /// A sheet with the standard header followed by `body`.
    pub fn new(body: Vec<Vec<String>>) -> Self {
        let reader = Self {
            rows: Mutex::new(Vec::new()),
            failures_left: AtomicU32::new(0),
            reads: AtomicU32::new(0),
        };
        reader.set_body(body);
        reader
    }

    /// A sheet whose every read fails.
    pub fn unavailable() -> Self {
        let reader = Self::new(Vec::new());
        reader.fail_next(u32::MAX);
        reader
    }

    pub fn set_body(&self, body: Vec<Vec<String>>) {
        let mut rows = vec![HEADER.iter().map(|h| h.to_string()).collect()];
        rows.extend(body);
        *self.rows.lock().unwrap() = rows;
    }

    pub fn fail_next(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }
}

impl SheetReader for FakeSheetReader {
    fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, SourceError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SourceError::Status {
                status: 503,
                range: range.to_string(),
            });
        }
        Ok(self.rows.lock().unwrap().clone())
    }
}

/// Scripted view counts. Unknown ids are reported as not found.
pub struct FakeViewSource {
    views: Mutex<HashMap<String, u64>>,
    failing: Mutex<HashSet<String>>,
}

impl FakeViewSource {
    pub fn new(views: &[(&str, u64)]) -> Self {
        Self {
            views: Mutex::new(
                views
                    .iter()
                    .map(|(id, count)| (id.to_string(), *count))
                    .collect(),
            ),
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn set_views(&self, video_id: &str, count: u64) {
        self.views
            .lock()
            .unwrap()
            .insert(video_id.to_string(), count);
    }

    /// Every lookup of `video_id` fails with a transient error from now on.
    pub fn fail(&self, video_id: &str) {
        self.failing.lock().unwrap().insert(video_id.to_string());
    }
}

impl ViewCountSource for FakeViewSource {
    fn view_count(&self, video_id: &str) -> Result<u64, MetricError> {
        if self.failing.lock().unwrap().contains(video_id) {
            return Err(MetricError::Status {
                status: 500,
                id: video_id.to_string(),
            });
        }
        self.views
            .lock()
            .unwrap()
            .get(video_id)
            .copied()
            .ok_or_else(|| MetricError::NotFound(video_id.to_string()))
    }
}

/// Delegates to a real store, failing the writes it is told to fail.
pub struct FailingStore<'a> {
    inner: &'a dyn ChartStore,
    pub fail_song_changes: bool,
    pub fail_window: Option<ChartWindow>,
}

impl<'a> FailingStore<'a> {
    pub fn new(inner: &'a dyn ChartStore) -> Self {
        Self {
            inner,
            fail_song_changes: false,
            fail_window: None,
        }
    }
}

impl ChartStore for FailingStore<'_> {
    fn load_songs(&self) -> Result<Vec<Song>> {
        self.inner.load_songs()
    }

    fn apply_song_changes(&self, changes: &SongChangeSet, deleted_at: i64) -> Result<()> {
        if self.fail_song_changes {
            bail!("UNIQUE constraint failed: song.external_id");
        }
        self.inner.apply_song_changes(changes, deleted_at)
    }

    fn load_artists(&self) -> Result<Vec<Artist>> {
        self.inner.load_artists()
    }

    fn replace_artist_songs(&self, links: &[(i64, i64)]) -> Result<()> {
        self.inner.replace_artist_songs(links)
    }

    fn load_artist_songs(&self) -> Result<Vec<(i64, i64)>> {
        self.inner.load_artist_songs()
    }

    fn load_keywords(&self) -> Result<Vec<Keyword>> {
        self.inner.load_keywords()
    }

    fn replace_keyword_songs(
        &self,
        changes: &KeywordChangeSet,
        links: &[(String, i64)],
    ) -> Result<()> {
        self.inner.replace_keyword_songs(changes, links)
    }

    fn load_keyword_songs(&self) -> Result<Vec<(String, i64)>> {
        self.inner.load_keyword_songs()
    }

    fn load_chart(&self, window: ChartWindow) -> Result<Vec<ChartEntry>> {
        self.inner.load_chart(window)
    }

    fn replace_chart(&self, window: ChartWindow, entries: &[ChartEntry]) -> Result<()> {
        if self.fail_window == Some(window) {
            bail!("database is locked");
        }
        self.inner.replace_chart(window, entries)
    }

    fn total_views_by_song(&self) -> Result<HashMap<i64, i64>> {
        self.inner.total_views_by_song()
    }

    fn mark_synced(&self, window: ChartWindow, updated_at: i64) -> Result<()> {
        self.inner.mark_synced(window, updated_at)
    }

    fn last_synced(&self, window: ChartWindow) -> Result<Option<i64>> {
        self.inner.last_synced(window)
    }

    fn set_team_name(&self, team: &str, name: &str) -> Result<()> {
        self.inner.set_team_name(team, name)
    }

    fn get_team_name(&self, team: &str) -> Result<Option<String>> {
        self.inner.get_team_name(team)
    }
}
