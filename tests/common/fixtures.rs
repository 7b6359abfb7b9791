//! Test database and configuration fixtures

use super::constants::*;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tempfile::TempDir;
use wakmusic_chart_crawler::chart_store::SqliteChartStore;
use wakmusic_chart_crawler::config::{AppConfig, ColumnSettings, MetricSettings, SheetSettings};

/// A chart database in a temporary directory, seeded with two artists.
pub struct TestStore {
    pub store: SqliteChartStore,
    pub db_path: PathBuf,
    _temp_dir: TempDir,
}

impl TestStore {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("chart.db");
        let store = SqliteChartStore::new(&db_path).unwrap();

        // Artists are maintained outside the crawler.
        let conn = Connection::open(&db_path).unwrap();
        conn.execute(
            "INSERT INTO artist (artist_key, name) VALUES (?1, 'Gosegu'), (?2, 'Lilpa')",
            [GOSEGU_KEY, LILPA_KEY],
        )
        .unwrap();

        Self {
            store,
            db_path,
            _temp_dir: temp_dir,
        }
    }
}

/// Config with no retry delays and a small worker pool.
pub fn test_config(store: &TestStore) -> AppConfig {
    AppConfig {
        db_path: store.db_path.clone(),
        sheet: SheetSettings {
            spreadsheet_id: "test-sheet".to_string(),
            song_range: SONG_RANGE.to_string(),
            service_account_key: PathBuf::from("unused.json"),
            fetch_attempts: 3,
            retry_delay_secs: 0,
        },
        columns: ColumnSettings {
            keyword: Some("keyword".to_string()),
            removed: Some("removed".to_string()),
            artists: BTreeMap::from([
                (GOSEGU_KEY.to_string(), "Gosegu".to_string()),
                (LILPA_KEY.to_string(), "Lilpa".to_string()),
            ]),
            ..ColumnSettings::default()
        },
        metrics: MetricSettings {
            api_key: "test-key".to_string(),
            batch_size: 2,
            max_attempts: 3,
            workers: 2,
            retry_delay_ms: 0,
            request_timeout_secs: 1,
        },
        credits: None,
    }
}

pub fn at(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

/// A sheet row with `title` ("Artist - Title") and a watch link to `video_id`.
pub fn song_row(title: &str, video_id: &str) -> Vec<String> {
    song_row_with(title, video_id, &[])
}

/// Like [`song_row`], with extra cells by header name.
pub fn song_row_with(title: &str, video_id: &str, cells: &[(&str, &str)]) -> Vec<String> {
    let url = format!("https://www.youtube.com/watch?v={}", video_id);
    let mut values: Vec<(&str, &str)> = vec![
        ("title", title),
        ("url", &url),
        ("date", "2023.01.25"),
        ("order", "1"),
    ];
    values.extend_from_slice(cells);

    let mut row = vec![String::new(); HEADER.len()];
    for (name, value) in values {
        let idx = HEADER.iter().position(|h| *h == name).unwrap();
        row[idx] = value.to_string();
    }
    row
}
