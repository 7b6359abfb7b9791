use crate::chart_store::{Artist, Keyword, KeywordChangeSet, Song, SongChangeSet, SongData};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

/// Diffs the sheet songs against the stored ones.
///
/// Stored rows keep their id: changed or returning songs are updated in
/// place, missing ones are soft deleted once, unseen ids are inserted in
/// sheet order.
pub fn plan_song_changes(source: &[SongData], persisted: &[Song]) -> SongChangeSet {
    let mut remaining: HashMap<&str, &SongData> = source
        .iter()
        .map(|song| (song.external_id.as_str(), song))
        .collect();

    let mut changes = SongChangeSet::default();
    for song in persisted {
        match remaining.remove(song.data.external_id.as_str()) {
            Some(data) => {
                if song.data != *data || !song.is_active() {
                    changes.updates.push((song.id, data.clone()));
                }
            }
            None => {
                if song.is_active() {
                    changes.soft_deletes.push(song.id);
                }
            }
        }
    }

    let mut inserted = HashSet::new();
    for song in source {
        let id = song.external_id.as_str();
        if remaining.contains_key(id) && inserted.insert(id) {
            changes.inserts.push(song.clone());
        }
    }
    changes
}

/// Keywords to create and to drop so the table holds exactly `referenced`.
pub fn plan_keyword_changes(
    existing: &[Keyword],
    referenced: &BTreeMap<String, Vec<String>>,
) -> KeywordChangeSet {
    let existing_names: HashSet<&str> = existing.iter().map(|k| k.name.as_str()).collect();
    KeywordChangeSet {
        inserts: referenced
            .keys()
            .filter(|name| !existing_names.contains(name.as_str()))
            .cloned()
            .collect(),
        deletes: existing
            .iter()
            .filter(|k| !referenced.contains_key(&k.name))
            .map(|k| k.id)
            .collect(),
    }
}

/// Resolves `name -> video ids` to `(name, song id)` pairs.
///
/// Video ids unknown to `songs` are dropped; duplicates collapse.
pub fn resolve_links(
    links: &BTreeMap<String, Vec<String>>,
    songs: &[Song],
) -> Vec<(String, i64)> {
    let ids: HashMap<&str, i64> = songs
        .iter()
        .map(|s| (s.data.external_id.as_str(), s.id))
        .collect();

    let mut resolved = BTreeSet::new();
    for (name, video_ids) in links {
        for video_id in video_ids {
            match ids.get(video_id.as_str()) {
                Some(song_id) => {
                    resolved.insert((name.clone(), *song_id));
                }
                None => debug!("Dropping link {} -> {}: unknown song", name, video_id),
            }
        }
    }
    resolved.into_iter().collect()
}

/// Maps artist keys of resolved links to artist ids.
pub fn resolve_artist_links(resolved: Vec<(String, i64)>, artists: &[Artist]) -> Vec<(i64, i64)> {
    let by_key: HashMap<&str, i64> = artists.iter().map(|a| (a.key.as_str(), a.id)).collect();

    let mut unknown = BTreeSet::new();
    let mut links = BTreeSet::new();
    for (key, song_id) in resolved {
        match by_key.get(key.as_str()) {
            Some(artist_id) => {
                links.insert((*artist_id, song_id));
            }
            None => {
                unknown.insert(key);
            }
        }
    }
    for key in unknown {
        warn!("Artist {} is not in the artist table, ignoring its songs", key);
    }
    links.into_iter().collect()
}
