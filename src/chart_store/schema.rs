//! SQLite schema of the chart database.
//!
//! Songs keep an integer rowid that chart rows reference, so rows are only
//! soft deleted. Join tables are rebuilt every cycle.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
};

const SONG_FK: ForeignKey = ForeignKey {
    foreign_table: "song",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const ARTIST_FK: ForeignKey = ForeignKey {
    foreign_table: "artist",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const KEYWORD_FK: ForeignKey = ForeignKey {
    foreign_table: "keyword",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const SONG_TABLE: Table = Table {
    name: "song",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("external_id", &SqlType::Text, non_null = true), // YouTube video id
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("artist", &SqlType::Text, non_null = true),
        sqlite_column!("remix", &SqlType::Text),
        sqlite_column!("reaction", &SqlType::Text),
        sqlite_column!("release_date", &SqlType::Integer, non_null = true),
        sqlite_column!("highlight_start", &SqlType::Integer, non_null = true),
        sqlite_column!("highlight_end", &SqlType::Integer, non_null = true),
        sqlite_column!("sort_order", &SqlType::Integer, non_null = true),
        sqlite_column!("deleted_at", &SqlType::Integer),
    ],
    indices: &[("idx_song_deleted_at", "deleted_at")],
    unique_constraints: &[&["external_id"]],
};

const ARTIST_TABLE: Table = Table {
    name: "artist",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("artist_key", &SqlType::Text, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[&["artist_key"]],
};

const ARTIST_SONG_TABLE: Table = Table {
    name: "artist_song",
    columns: &[
        sqlite_column!(
            "artist_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!(
            "song_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&SONG_FK)
        ),
    ],
    indices: &[("idx_artist_song_song", "song_id")],
    unique_constraints: &[&["artist_id", "song_id"]],
};

const KEYWORD_TABLE: Table = Table {
    name: "keyword",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[&["name"]],
};

const KEYWORD_SONG_TABLE: Table = Table {
    name: "keyword_song",
    columns: &[
        sqlite_column!(
            "keyword_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&KEYWORD_FK)
        ),
        sqlite_column!(
            "song_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&SONG_FK)
        ),
    ],
    indices: &[("idx_keyword_song_song", "song_id")],
    unique_constraints: &[&["keyword_id", "song_id"]],
};

macro_rules! chart_table {
    ($name:expr, $index:expr) => {
        Table {
            name: $name,
            columns: &[
                sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
                sqlite_column!(
                    "song_id",
                    &SqlType::Integer,
                    non_null = true,
                    foreign_key = Some(&SONG_FK)
                ),
                sqlite_column!("views", &SqlType::Integer, non_null = true),
                sqlite_column!("increase", &SqlType::Integer, non_null = true),
                sqlite_column!("last_rank", &SqlType::Integer, non_null = true),
            ],
            indices: &[($index, "song_id")],
            unique_constraints: &[&["song_id"]],
        }
    };
}

const CHART_HOURLY_TABLE: Table = chart_table!("chart_hourly", "idx_chart_hourly_song");
const CHART_DAILY_TABLE: Table = chart_table!("chart_daily", "idx_chart_daily_song");
const CHART_WEEKLY_TABLE: Table = chart_table!("chart_weekly", "idx_chart_weekly_song");
const CHART_MONTHLY_TABLE: Table = chart_table!("chart_monthly", "idx_chart_monthly_song");
const CHART_TOTAL_TABLE: Table = chart_table!("chart_total", "idx_chart_total_song");

/// Last time each chart window was rebuilt, in unix seconds.
const SYNC_STATE_TABLE: Table = Table {
    name: "sync_state",
    columns: &[
        sqlite_column!("chart_window", &SqlType::Text, is_primary_key = true),
        sqlite_column!("updated_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

/// Credit lines shown by the site, keyed by team.
const TEAM_TABLE: Table = Table {
    name: "team",
    columns: &[
        sqlite_column!("team", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

pub const CHART_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[
        SONG_TABLE,
        ARTIST_TABLE,
        ARTIST_SONG_TABLE,
        KEYWORD_TABLE,
        KEYWORD_SONG_TABLE,
        CHART_HOURLY_TABLE,
        CHART_DAILY_TABLE,
        CHART_WEEKLY_TABLE,
        CHART_MONTHLY_TABLE,
        CHART_TOTAL_TABLE,
        SYNC_STATE_TABLE,
        TEAM_TABLE,
    ],
    migration: None,
}];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart_store::ChartWindow;
    use rusqlite::Connection;

    #[test]
    fn test_latest_schema_creates_and_validates() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = CHART_VERSIONED_SCHEMAS.last().unwrap();
        schema.create(&conn).unwrap();
        schema.validate(&conn).unwrap();
    }

    #[test]
    fn test_every_window_has_a_table() {
        let schema = CHART_VERSIONED_SCHEMAS.last().unwrap();
        for window in ChartWindow::ALL {
            assert!(
                schema.tables.iter().any(|t| t.name == window.table_name()),
                "missing table for {}",
                window
            );
        }
    }

    #[test]
    fn test_deleting_song_cascades_to_charts() {
        let conn = Connection::open_in_memory().unwrap();
        CHART_VERSIONED_SCHEMAS
            .last()
            .unwrap()
            .create(&conn)
            .unwrap();

        conn.execute(
            "INSERT INTO song (id, external_id, title, artist, release_date, highlight_start, highlight_end, sort_order)
             VALUES (1, 'vid1', 'Title', 'Artist', 20220101, 0, 0, 100)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO chart_total (song_id, views, increase, last_rank) VALUES (1, 10, 10, 0)",
            [],
        )
        .unwrap();
        conn.execute("DELETE FROM song WHERE id = 1", []).unwrap();

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM chart_total", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 0);
    }
}
