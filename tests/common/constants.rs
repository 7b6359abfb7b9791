//! Shared constants for integration tests

// ============================================================================
// Sheet layout
// ============================================================================

/// Header row of the fake song sheet.
pub const HEADER: [&str; 10] = [
    "title", "url", "reaction", "date", "remix", "order", "keyword", "removed", "Gosegu", "Lilpa",
];

/// Range the fake sheet is read with.
pub const SONG_RANGE: &str = "Songs!A1:J";

// ============================================================================
// Artists seeded into every test database
// ============================================================================

pub const GOSEGU_KEY: &str = "gosegu";
pub const LILPA_KEY: &str = "lilpa";

// ============================================================================
// Clock
// ============================================================================

/// Unix seconds used to stamp cycles.
pub const NOW: i64 = 1_704_067_200;
