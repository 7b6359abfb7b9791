//! Reconciliation of the stored catalog with the song sheet.

mod plan;

pub use plan::{plan_keyword_changes, plan_song_changes, resolve_artist_links, resolve_links};

use crate::chart_store::{ChartStore, Song, SongData};
use crate::error::SyncError;
use std::collections::BTreeMap;
use tracing::info;

pub struct CatalogReconciler<'a> {
    store: &'a dyn ChartStore,
}

impl<'a> CatalogReconciler<'a> {
    pub fn new(store: &'a dyn ChartStore) -> Self {
        Self { store }
    }

    /// Brings the song table in line with `source` and returns the whole
    /// table as stored afterwards.
    pub fn reconcile_songs(&self, source: &[SongData], now: i64) -> Result<Vec<Song>, SyncError> {
        let persisted = self
            .store
            .load_songs()
            .map_err(|e| SyncError::persistence("songs", e))?;

        let changes = plan_song_changes(source, &persisted);
        if !changes.is_empty() {
            self.store
                .apply_song_changes(&changes, now)
                .map_err(|e| SyncError::persistence("songs", e))?;
        }
        info!(
            "Songs reconciled: {} inserted, {} updated, {} soft deleted",
            changes.inserts.len(),
            changes.updates.len(),
            changes.soft_deletes.len()
        );

        self.store
            .load_songs()
            .map_err(|e| SyncError::persistence("songs", e))
    }

    /// Replaces `artist_song` with the links implied by the sheet.
    pub fn reconcile_artists(
        &self,
        links: &BTreeMap<String, Vec<String>>,
        songs: &[Song],
    ) -> Result<usize, SyncError> {
        let artists = self
            .store
            .load_artists()
            .map_err(|e| SyncError::persistence("artist links", e))?;
        let links = resolve_artist_links(resolve_links(links, songs), &artists);

        self.store
            .replace_artist_songs(&links)
            .map_err(|e| SyncError::persistence("artist links", e))?;
        info!("Artist links replaced: {}", links.len());
        Ok(links.len())
    }

    /// Creates and drops keywords, then replaces `keyword_song`.
    pub fn reconcile_keywords(
        &self,
        links: &BTreeMap<String, Vec<String>>,
        songs: &[Song],
    ) -> Result<usize, SyncError> {
        let existing = self
            .store
            .load_keywords()
            .map_err(|e| SyncError::persistence("keywords", e))?;
        let changes = plan_keyword_changes(&existing, links);
        let links = resolve_links(links, songs);

        self.store
            .replace_keyword_songs(&changes, &links)
            .map_err(|e| SyncError::persistence("keywords", e))?;
        info!(
            "Keywords reconciled: {} created, {} dropped, {} links",
            changes.inserts.len(),
            changes.deletes.len(),
            links.len()
        );
        Ok(links.len())
    }
}
