//! Storage abstraction used by the sync cycle.

use super::models::*;
use anyhow::Result;
use std::collections::HashMap;

/// Persistence for songs, their associations, chart snapshots and sync state.
///
/// Every mutating method runs in its own transaction: either all of its
/// changes are committed or none are.
pub trait ChartStore: Send + Sync {
    // =========================================================================
    // Songs
    // =========================================================================

    /// All songs, soft deleted ones included, ordered by id.
    fn load_songs(&self) -> Result<Vec<Song>>;

    /// Applies inserts, updates and soft deletes atomically.
    fn apply_song_changes(&self, changes: &SongChangeSet, deleted_at: i64) -> Result<()>;

    // =========================================================================
    // Associations
    // =========================================================================

    fn load_artists(&self) -> Result<Vec<Artist>>;

    /// Replaces the whole `artist_song` relation with `links` (artist id, song id).
    fn replace_artist_songs(&self, links: &[(i64, i64)]) -> Result<()>;

    fn load_artist_songs(&self) -> Result<Vec<(i64, i64)>>;

    fn load_keywords(&self) -> Result<Vec<Keyword>>;

    /// Applies the keyword diff, then replaces `keyword_song` with `links`
    /// (keyword name, song id), all in one transaction.
    fn replace_keyword_songs(
        &self,
        changes: &KeywordChangeSet,
        links: &[(String, i64)],
    ) -> Result<()>;

    /// Keyword name and song id pairs.
    fn load_keyword_songs(&self) -> Result<Vec<(String, i64)>>;

    // =========================================================================
    // Charts
    // =========================================================================

    /// Snapshot of a window in insertion order.
    fn load_chart(&self, window: ChartWindow) -> Result<Vec<ChartEntry>>;

    /// Replaces the snapshot of a window atomically.
    fn replace_chart(&self, window: ChartWindow, entries: &[ChartEntry]) -> Result<()>;

    /// Views recorded in the total chart, by song id.
    fn total_views_by_song(&self) -> Result<HashMap<i64, i64>>;

    // =========================================================================
    // Sync state
    // =========================================================================

    fn mark_synced(&self, window: ChartWindow, updated_at: i64) -> Result<()>;

    fn last_synced(&self, window: ChartWindow) -> Result<Option<i64>>;

    // =========================================================================
    // Credits
    // =========================================================================

    fn set_team_name(&self, team: &str, name: &str) -> Result<()>;

    fn get_team_name(&self, team: &str) -> Result<Option<String>>;
}
