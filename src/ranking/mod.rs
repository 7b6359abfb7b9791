//! Chart re-ranking against the previous snapshot of a window.
//!
//! A stored row carries the rank the song held in the previous snapshot
//! (`last_rank`), not the rank it holds now. The current rank is derived by
//! ordering the snapshot with the window's ranking key.

use crate::chart_store::{ChartEntry, ChartStore, ChartWindow, Song};
use crate::error::SyncError;
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviousPosition {
    pub views: i64,
    /// 1-based.
    pub rank: i64,
}

/// Indices of `entries` in ranking order; ties keep insertion order.
fn ranking_order(window: ChartWindow, entries: &[ChartEntry]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..entries.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(window.ranking_key(&entries[i])));
    order
}

pub fn previous_positions(
    window: ChartWindow,
    entries: &[ChartEntry],
) -> HashMap<i64, PreviousPosition> {
    ranking_order(window, entries)
        .into_iter()
        .enumerate()
        .map(|(position, i)| {
            let entry = &entries[i];
            (
                entry.song_id,
                PreviousPosition {
                    views: entry.views,
                    rank: position as i64 + 1,
                },
            )
        })
        .collect()
}

/// New snapshot rows for `songs`, in song order.
pub fn compute_chart(
    previous: &HashMap<i64, PreviousPosition>,
    songs: &[&Song],
    views: &HashMap<String, i64>,
) -> Vec<ChartEntry> {
    songs
        .iter()
        .map(|song| {
            let views = views.get(&song.data.external_id).copied().unwrap_or(0);
            match previous.get(&song.id) {
                Some(prev) => ChartEntry {
                    song_id: song.id,
                    views,
                    increase: views - prev.views,
                    last_rank: prev.rank,
                },
                None => ChartEntry {
                    song_id: song.id,
                    views,
                    increase: views,
                    last_rank: 0,
                },
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankedEntry {
    pub rank: i64,
    pub entry: ChartEntry,
    /// Positions gained since the previous snapshot; `None` for new entries.
    pub rank_delta: Option<i64>,
}

/// Current ranking of a stored snapshot.
pub fn ranked_view(window: ChartWindow, entries: &[ChartEntry]) -> Vec<RankedEntry> {
    ranking_order(window, entries)
        .into_iter()
        .enumerate()
        .map(|(position, i)| {
            let entry = entries[i];
            let rank = position as i64 + 1;
            RankedEntry {
                rank,
                entry,
                rank_delta: (entry.last_rank > 0).then(|| entry.last_rank - rank),
            }
        })
        .collect()
}

pub struct ChartRankingEngine<'a> {
    store: &'a dyn ChartStore,
}

impl<'a> ChartRankingEngine<'a> {
    pub fn new(store: &'a dyn ChartStore) -> Self {
        Self { store }
    }

    /// Rebuilds the snapshot of `window` for the active `songs`.
    pub fn rank(
        &self,
        window: ChartWindow,
        songs: &[&Song],
        views: &HashMap<String, i64>,
    ) -> Result<usize, SyncError> {
        let entity = window.table_name();
        let previous_entries = self
            .store
            .load_chart(window)
            .map_err(|e| SyncError::persistence(entity, e))?;
        let previous = previous_positions(window, &previous_entries);

        let entries = compute_chart(&previous, songs, views);
        self.store
            .replace_chart(window, &entries)
            .map_err(|e| SyncError::persistence(entity, e))?;

        info!(
            "Ranked {} chart: {} songs, {} new",
            window,
            entries.len(),
            entries.iter().filter(|e| e.last_rank == 0).count()
        );
        Ok(entries.len())
    }
}
