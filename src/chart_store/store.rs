//! SQLite-backed chart store.

use super::models::*;
use super::schema::CHART_VERSIONED_SCHEMAS;
use super::trait_def::ChartStore;
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{anyhow, bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

const SONG_COLUMNS: &str = "id, external_id, title, artist, remix, reaction, release_date, \
                            highlight_start, highlight_end, sort_order, deleted_at";

pub struct SqliteChartStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteChartStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let mut conn = Connection::open(path).context("Failed to open chart database")?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;

        let latest = CHART_VERSIONED_SCHEMAS
            .last()
            .context("No chart schema declared")?;

        if is_new_db {
            info!("Creating new chart database at {:?}", path);
            latest.create(&conn)?;
        } else {
            let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
            let db_version = raw_version - BASE_DB_VERSION as i64;
            if db_version < 1 {
                bail!(
                    "Chart database version {} is invalid (expected >= 1)",
                    db_version
                );
            }

            let schema = CHART_VERSIONED_SCHEMAS
                .iter()
                .find(|s| s.version == db_version as usize)
                .with_context(|| format!("Unknown chart database version {}", db_version))?;
            schema.validate(&conn).with_context(|| {
                format!(
                    "Chart database schema validation failed for version {}",
                    db_version
                )
            })?;

            if (db_version as usize) < latest.version {
                Self::migrate(&mut conn, db_version as usize)?;
            }
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate(conn: &mut Connection, from_version: usize) -> Result<()> {
        let tx = conn.transaction()?;
        let mut current = from_version;
        for schema in CHART_VERSIONED_SCHEMAS
            .iter()
            .filter(|s| s.version > from_version)
        {
            info!(
                "Migrating chart database from version {} to {}",
                current, schema.version
            );
            if let Some(migration_fn) = schema.migration {
                migration_fn(&tx).with_context(|| {
                    format!("Failed to run migration to version {}", schema.version)
                })?;
            }
            current = schema.version;
        }
        tx.pragma_update(None, "user_version", (BASE_DB_VERSION + current) as i64)?;
        tx.commit()?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Chart database connection lock poisoned"))
    }

    fn row_to_song(row: &rusqlite::Row) -> rusqlite::Result<Song> {
        Ok(Song {
            id: row.get(0)?,
            data: SongData {
                external_id: row.get(1)?,
                title: row.get(2)?,
                artist: row.get(3)?,
                remix: row.get(4)?,
                reaction: row.get(5)?,
                release_date: row.get(6)?,
                highlight_start: row.get(7)?,
                highlight_end: row.get(8)?,
                sort_order: row.get(9)?,
            },
            deleted_at: row.get(10)?,
        })
    }
}

impl ChartStore for SqliteChartStore {
    fn load_songs(&self) -> Result<Vec<Song>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM song ORDER BY id", SONG_COLUMNS))?;
        let songs = stmt
            .query_map([], Self::row_to_song)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(songs)
    }

    fn apply_song_changes(&self, changes: &SongChangeSet, deleted_at: i64) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut update = tx.prepare(
                "UPDATE song SET external_id = ?1, title = ?2, artist = ?3, remix = ?4, reaction = ?5,
                 release_date = ?6, highlight_start = ?7, highlight_end = ?8, sort_order = ?9,
                 deleted_at = NULL WHERE id = ?10",
            )?;
            for (id, song) in &changes.updates {
                let updated = update.execute(params![
                    song.external_id,
                    song.title,
                    song.artist,
                    song.remix,
                    song.reaction,
                    song.release_date,
                    song.highlight_start,
                    song.highlight_end,
                    song.sort_order,
                    id
                ])?;
                if updated != 1 {
                    bail!("Song {} vanished while updating it", id);
                }
            }

            let mut soft_delete =
                tx.prepare("UPDATE song SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL")?;
            for id in &changes.soft_deletes {
                soft_delete.execute(params![deleted_at, id])?;
            }

            let mut insert = tx.prepare(
                "INSERT INTO song (external_id, title, artist, remix, reaction, release_date,
                 highlight_start, highlight_end, sort_order) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for song in &changes.inserts {
                insert
                    .execute(params![
                        song.external_id,
                        song.title,
                        song.artist,
                        song.remix,
                        song.reaction,
                        song.release_date,
                        song.highlight_start,
                        song.highlight_end,
                        song.sort_order
                    ])
                    .with_context(|| format!("Failed to insert song {}", song.external_id))?;
            }
        }
        tx.commit()?;
        debug!(
            "Applied song changes: {} inserted, {} updated, {} soft deleted",
            changes.inserts.len(),
            changes.updates.len(),
            changes.soft_deletes.len()
        );
        Ok(())
    }

    fn load_artists(&self) -> Result<Vec<Artist>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, artist_key, name FROM artist ORDER BY id")?;
        let artists = stmt
            .query_map([], |row| {
                Ok(Artist {
                    id: row.get(0)?,
                    key: row.get(1)?,
                    name: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(artists)
    }

    fn replace_artist_songs(&self, links: &[(i64, i64)]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM artist_song", [])?;
        {
            let mut insert =
                tx.prepare("INSERT INTO artist_song (artist_id, song_id) VALUES (?1, ?2)")?;
            for (artist_id, song_id) in links {
                insert.execute(params![artist_id, song_id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_artist_songs(&self) -> Result<Vec<(i64, i64)>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT artist_id, song_id FROM artist_song ORDER BY artist_id, song_id")?;
        let links = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(links)
    }

    fn load_keywords(&self) -> Result<Vec<Keyword>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, name FROM keyword ORDER BY id")?;
        let keywords = stmt
            .query_map([], |row| {
                Ok(Keyword {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keywords)
    }

    fn replace_keyword_songs(
        &self,
        changes: &KeywordChangeSet,
        links: &[(String, i64)],
    ) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM keyword_song", [])?;
        {
            let mut delete = tx.prepare("DELETE FROM keyword WHERE id = ?1")?;
            for id in &changes.deletes {
                delete.execute(params![id])?;
            }

            let mut insert = tx.prepare("INSERT INTO keyword (name) VALUES (?1)")?;
            for name in &changes.inserts {
                insert
                    .execute(params![name])
                    .with_context(|| format!("Failed to insert keyword {}", name))?;
            }

            let mut link = tx.prepare(
                "INSERT INTO keyword_song (keyword_id, song_id)
                 SELECT id, ?2 FROM keyword WHERE name = ?1",
            )?;
            for (name, song_id) in links {
                if link.execute(params![name, song_id])? != 1 {
                    bail!("Keyword {} is not in the keyword table", name);
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_keyword_songs(&self) -> Result<Vec<(String, i64)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT k.name, ks.song_id FROM keyword_song ks
             JOIN keyword k ON k.id = ks.keyword_id ORDER BY k.name, ks.song_id",
        )?;
        let links = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(links)
    }

    fn load_chart(&self, window: ChartWindow) -> Result<Vec<ChartEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT song_id, views, increase, last_rank FROM {} ORDER BY id",
            window.table_name()
        ))?;
        let entries = stmt
            .query_map([], |row| {
                Ok(ChartEntry {
                    song_id: row.get(0)?,
                    views: row.get(1)?,
                    increase: row.get(2)?,
                    last_rank: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn replace_chart(&self, window: ChartWindow, entries: &[ChartEntry]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(&format!("DELETE FROM {}", window.table_name()), [])?;
        {
            let mut insert = tx.prepare(&format!(
                "INSERT INTO {} (song_id, views, increase, last_rank) VALUES (?1, ?2, ?3, ?4)",
                window.table_name()
            ))?;
            for entry in entries {
                insert.execute(params![
                    entry.song_id,
                    entry.views,
                    entry.increase,
                    entry.last_rank
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn total_views_by_song(&self) -> Result<HashMap<i64, i64>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT song_id, views FROM chart_total")?;
        let views = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(views)
    }

    fn mark_synced(&self, window: ChartWindow, updated_at: i64) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sync_state (chart_window, updated_at) VALUES (?1, ?2)
             ON CONFLICT(chart_window) DO UPDATE SET updated_at = excluded.updated_at",
            params![window.as_str(), updated_at],
        )?;
        Ok(())
    }

    fn last_synced(&self, window: ChartWindow) -> Result<Option<i64>> {
        let conn = self.lock()?;
        let updated_at = conn
            .query_row(
                "SELECT updated_at FROM sync_state WHERE chart_window = ?1",
                params![window.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(updated_at)
    }

    fn set_team_name(&self, team: &str, name: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO team (team, name) VALUES (?1, ?2)
             ON CONFLICT(team) DO UPDATE SET name = excluded.name",
            params![team, name],
        )?;
        Ok(())
    }

    fn get_team_name(&self, team: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let name = conn
            .query_row(
                "SELECT name FROM team WHERE team = ?1",
                params![team],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct TestStore {
        store: SqliteChartStore,
        _temp_dir: TempDir,
    }

    fn create_test_store() -> TestStore {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteChartStore::new(temp_dir.path().join("chart.db")).unwrap();
        TestStore {
            store,
            _temp_dir: temp_dir,
        }
    }

    fn song_data(external_id: &str, title: &str) -> SongData {
        SongData {
            external_id: external_id.to_string(),
            title: title.to_string(),
            artist: "Artist".to_string(),
            remix: None,
            reaction: None,
            release_date: 20230101,
            highlight_start: 0,
            highlight_end: 0,
            sort_order: 100,
        }
    }

    fn insert_songs(store: &SqliteChartStore, ids: &[&str]) -> Vec<Song> {
        let changes = SongChangeSet {
            inserts: ids.iter().map(|id| song_data(id, "Title")).collect(),
            ..Default::default()
        };
        store.apply_song_changes(&changes, 0).unwrap();
        store.load_songs().unwrap()
    }

    #[test]
    fn test_reopen_existing_database() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("chart.db");
        {
            let store = SqliteChartStore::new(&path).unwrap();
            insert_songs(&store, &["a"]);
        }
        let store = SqliteChartStore::new(&path).unwrap();
        assert_eq!(store.load_songs().unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_foreign_database() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("chart.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute("CREATE TABLE other (id INTEGER)", []).unwrap();
        }
        let err = SqliteChartStore::new(&path).err().unwrap().to_string();
        assert!(err.contains("invalid"));
    }

    #[test]
    fn test_insert_update_and_soft_delete() {
        let test = create_test_store();
        let store = &test.store;
        let songs = insert_songs(store, &["a", "b"]);
        assert_eq!(songs.len(), 2);
        let a = songs[0].id;
        let b = songs[1].id;

        let changes = SongChangeSet {
            updates: vec![(a, song_data("a", "Renamed"))],
            soft_deletes: vec![b],
            ..Default::default()
        };
        store.apply_song_changes(&changes, 1234).unwrap();

        let songs = store.load_songs().unwrap();
        assert_eq!(songs[0].id, a);
        assert_eq!(songs[0].data.title, "Renamed");
        assert!(songs[0].is_active());
        assert_eq!(songs[1].id, b);
        assert_eq!(songs[1].deleted_at, Some(1234));
    }

    #[test]
    fn test_soft_delete_keeps_original_timestamp() {
        let test = create_test_store();
        let store = &test.store;
        let songs = insert_songs(store, &["a"]);
        let id = songs[0].id;

        let changes = SongChangeSet {
            soft_deletes: vec![id],
            ..Default::default()
        };
        store.apply_song_changes(&changes, 100).unwrap();
        store.apply_song_changes(&changes, 200).unwrap();

        assert_eq!(store.load_songs().unwrap()[0].deleted_at, Some(100));
    }

    #[test]
    fn test_update_clears_soft_delete() {
        let test = create_test_store();
        let store = &test.store;
        let id = insert_songs(store, &["a"])[0].id;
        store
            .apply_song_changes(
                &SongChangeSet {
                    soft_deletes: vec![id],
                    ..Default::default()
                },
                100,
            )
            .unwrap();
        store
            .apply_song_changes(
                &SongChangeSet {
                    updates: vec![(id, song_data("a", "Title"))],
                    ..Default::default()
                },
                200,
            )
            .unwrap();

        let song = &store.load_songs().unwrap()[0];
        assert_eq!(song.id, id);
        assert_eq!(song.deleted_at, None);
    }

    #[test]
    fn test_failed_song_changes_roll_back() {
        let test = create_test_store();
        let store = &test.store;
        insert_songs(store, &["a"]);

        // Second insert of "a" violates the unique constraint.
        let changes = SongChangeSet {
            inserts: vec![song_data("b", "B"), song_data("a", "Again")],
            ..Default::default()
        };
        assert!(store.apply_song_changes(&changes, 0).is_err());

        let songs = store.load_songs().unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].data.external_id, "a");
    }

    #[test]
    fn test_replace_artist_songs() {
        let test = create_test_store();
        let store = &test.store;
        let songs = insert_songs(store, &["a", "b"]);
        {
            let conn = store.lock().unwrap();
            conn.execute(
                "INSERT INTO artist (id, artist_key, name) VALUES (1, 'gosegu', 'Gosegu')",
                [],
            )
            .unwrap();
        }

        store
            .replace_artist_songs(&[(1, songs[0].id), (1, songs[1].id)])
            .unwrap();
        store.replace_artist_songs(&[(1, songs[1].id)]).unwrap();

        assert_eq!(store.load_artist_songs().unwrap(), vec![(1, songs[1].id)]);
        assert_eq!(store.load_artists().unwrap()[0].key, "gosegu");
    }

    #[test]
    fn test_replace_keyword_songs() {
        let test = create_test_store();
        let store = &test.store;
        let songs = insert_songs(store, &["a", "b"]);

        store
            .replace_keyword_songs(
                &KeywordChangeSet {
                    inserts: vec!["cover".to_string(), "original".to_string()],
                    deletes: vec![],
                },
                &[
                    ("cover".to_string(), songs[0].id),
                    ("original".to_string(), songs[1].id),
                ],
            )
            .unwrap();

        let keywords = store.load_keywords().unwrap();
        let cover = keywords.iter().find(|k| k.name == "cover").unwrap().id;
        store
            .replace_keyword_songs(
                &KeywordChangeSet {
                    inserts: vec![],
                    deletes: vec![cover],
                },
                &[("original".to_string(), songs[0].id)],
            )
            .unwrap();

        let keywords = store.load_keywords().unwrap();
        assert_eq!(keywords.len(), 1);
        assert_eq!(keywords[0].name, "original");
        assert_eq!(
            store.load_keyword_songs().unwrap(),
            vec![("original".to_string(), songs[0].id)]
        );
    }

    #[test]
    fn test_keyword_link_to_unknown_keyword_rolls_back() {
        let test = create_test_store();
        let store = &test.store;
        let songs = insert_songs(store, &["a"]);
        store
            .replace_keyword_songs(
                &KeywordChangeSet {
                    inserts: vec!["cover".to_string()],
                    deletes: vec![],
                },
                &[("cover".to_string(), songs[0].id)],
            )
            .unwrap();

        let result = store.replace_keyword_songs(
            &KeywordChangeSet::default(),
            &[("missing".to_string(), songs[0].id)],
        );
        assert!(result.is_err());
        assert_eq!(
            store.load_keyword_songs().unwrap(),
            vec![("cover".to_string(), songs[0].id)]
        );
    }

    #[test]
    fn test_replace_chart_and_total_views() {
        let test = create_test_store();
        let store = &test.store;
        let songs = insert_songs(store, &["a", "b"]);
        let entries = vec![
            ChartEntry {
                song_id: songs[1].id,
                views: 50,
                increase: 50,
                last_rank: 0,
            },
            ChartEntry {
                song_id: songs[0].id,
                views: 100,
                increase: 100,
                last_rank: 0,
            },
        ];
        store.replace_chart(ChartWindow::Total, &entries).unwrap();

        assert_eq!(store.load_chart(ChartWindow::Total).unwrap(), entries);
        assert!(store.load_chart(ChartWindow::Daily).unwrap().is_empty());

        let totals = store.total_views_by_song().unwrap();
        assert_eq!(totals.get(&songs[0].id), Some(&100));
        assert_eq!(totals.get(&songs[1].id), Some(&50));

        store.replace_chart(ChartWindow::Total, &entries[..1]).unwrap();
        assert_eq!(store.load_chart(ChartWindow::Total).unwrap().len(), 1);
    }

    #[test]
    fn test_sync_state() {
        let test = create_test_store();
        let store = &test.store;

        assert_eq!(store.last_synced(ChartWindow::Hourly).unwrap(), None);
        store.mark_synced(ChartWindow::Hourly, 10).unwrap();
        store.mark_synced(ChartWindow::Hourly, 20).unwrap();
        assert_eq!(store.last_synced(ChartWindow::Hourly).unwrap(), Some(20));
        assert_eq!(store.last_synced(ChartWindow::Weekly).unwrap(), None);
    }

    #[test]
    fn test_team_name_upsert() {
        let test = create_test_store();
        let store = &test.store;

        assert_eq!(store.get_team_name("special2").unwrap(), None);
        store.set_team_name("special2", "a, b").unwrap();
        store.set_team_name("special2", "b, a").unwrap();
        assert_eq!(
            store.get_team_name("special2").unwrap(),
            Some("b, a".to_string())
        );
    }
}
