//! Header-resolved parsing of song sheet rows.

use super::SourceError;
use crate::chart_store::SongData;
use crate::config::ColumnSettings;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

const SHORT_LINK_PREFIX: &str = "https://youtu.be/";

/// Why a sheet row did not produce a song.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowSkip {
    #[error("missing url")]
    MissingUrl,
    #[error("no video id in url {0:?}")]
    MalformedUrl(String),
    #[error("title {0:?} is not in \"Artist - Title\" form")]
    MalformedTitle(String),
    #[error("malformed date {0:?}")]
    MalformedDate(String),
    #[error("invalid order {0:?}")]
    InvalidOrder(String),
    #[error("invalid highlight [{start:?}, {end:?})")]
    InvalidHighlight { start: String, end: String },
    #[error("temporarily removed")]
    TemporarilyRemoved,
    #[error("duplicate video id {0}")]
    DuplicateId(String),
}

/// Column positions resolved from the header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnIndex {
    title: usize,
    url: usize,
    reaction: usize,
    date: usize,
    remix: usize,
    order: usize,
    start: Option<usize>,
    end: Option<usize>,
    keyword: Option<usize>,
    removed: Option<usize>,
    artists: Vec<(String, usize)>,
}

impl ColumnIndex {
    /// Fails when a configured column is absent from the header.
    pub fn resolve(header: &[String], columns: &ColumnSettings) -> Result<Self, SourceError> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| SourceError::MissingColumn(name.to_string()))
        };
        let find_optional = |name: &Option<String>| name.as_deref().map(find).transpose();

        let artists = columns
            .artists
            .iter()
            .map(|(key, name)| Ok((key.clone(), find(name)?)))
            .collect::<Result<Vec<_>, SourceError>>()?;

        Ok(Self {
            title: find(&columns.title)?,
            url: find(&columns.url)?,
            reaction: find(&columns.reaction)?,
            date: find(&columns.date)?,
            remix: find(&columns.remix)?,
            order: find(&columns.order)?,
            start: find_optional(&columns.start)?,
            end: find_optional(&columns.end)?,
            keyword: find_optional(&columns.keyword)?,
            removed: find_optional(&columns.removed)?,
            artists,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    pub song: SongData,
    /// Artist keys whose flag column is set.
    pub artists: Vec<String>,
    pub keywords: Vec<String>,
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|s| s.trim()).unwrap_or("")
}

fn optional_cell(row: &[String], idx: Option<usize>) -> &str {
    idx.map(|i| cell(row, i)).unwrap_or("")
}

/// Extracts the video id from a watch, short or embed link.
fn video_id(url: &str) -> Option<String> {
    let segment = url.trim_end_matches('/').rsplit('/').next()?;
    let (path, query) = segment.split_once('?').unwrap_or((segment, ""));
    let id = if path == "watch" {
        query.split('&').find_map(|pair| pair.strip_prefix("v="))?
    } else {
        path
    };
    let id = id.split('#').next()?.trim();
    (!id.is_empty()).then(|| id.to_string())
}

/// Parses a decimal with at most two fraction digits into hundredths.
fn parse_fixed_point(raw: &str) -> Option<i64> {
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    if int_part.is_empty() || frac_part.len() > 2 {
        return None;
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let int_value: i64 = int_part.parse().ok()?;
    let frac_value: i64 = match frac_part.len() {
        0 => 0,
        1 => frac_part.parse::<i64>().ok()? * 10,
        _ => frac_part.parse().ok()?,
    };
    let value = int_value.checked_mul(100)?.checked_add(frac_value)?;
    Some(if negative { -value } else { value })
}

fn parse_seconds(raw: &str) -> Option<i64> {
    if raw.is_empty() {
        return Some(0);
    }
    raw.parse::<i64>().ok().filter(|v| *v >= 0)
}

pub fn parse_row(row: &[String], index: &ColumnIndex) -> Result<ParsedRow, RowSkip> {
    let url = cell(row, index.url);
    if url.is_empty() || url == "0" {
        return Err(RowSkip::MissingUrl);
    }
    if !optional_cell(row, index.removed).is_empty() {
        return Err(RowSkip::TemporarilyRemoved);
    }

    let external_id = video_id(url).ok_or_else(|| RowSkip::MalformedUrl(url.to_string()))?;

    let full_title = cell(row, index.title);
    let mut parts = full_title.split(" - ");
    let (artist, title) = parts
        .next()
        .zip(parts.next())
        .map(|(a, t)| (a.trim(), t.trim()))
        .filter(|(a, t)| !a.is_empty() && !t.is_empty())
        .ok_or_else(|| RowSkip::MalformedTitle(full_title.to_string()))?;

    let reaction = cell(row, index.reaction);
    let reaction = reaction.strip_prefix(SHORT_LINK_PREFIX).unwrap_or(reaction);
    let reaction = match reaction {
        "" | "0" => None,
        r => Some(r.to_string()),
    };

    let raw_date = cell(row, index.date);
    let release_date = raw_date
        .replace('.', "")
        .parse::<i64>()
        .map_err(|_| RowSkip::MalformedDate(raw_date.to_string()))?;

    let remix = Some(cell(row, index.remix))
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    let raw_order = cell(row, index.order);
    let sort_order =
        parse_fixed_point(raw_order).ok_or_else(|| RowSkip::InvalidOrder(raw_order.to_string()))?;

    let raw_start = optional_cell(row, index.start);
    let raw_end = optional_cell(row, index.end);
    let (highlight_start, highlight_end) = match (parse_seconds(raw_start), parse_seconds(raw_end))
    {
        (Some(start), Some(end)) if end >= start => (start, end),
        _ => {
            return Err(RowSkip::InvalidHighlight {
                start: raw_start.to_string(),
                end: raw_end.to_string(),
            })
        }
    };

    let mut keywords: Vec<String> = Vec::new();
    for keyword in optional_cell(row, index.keyword).split(',') {
        let keyword = keyword.trim();
        if !keyword.is_empty() && !keywords.iter().any(|k| k == keyword) {
            keywords.push(keyword.to_string());
        }
    }

    let artists = index
        .artists
        .iter()
        .filter(|(_, idx)| !cell(row, *idx).is_empty())
        .map(|(key, _)| key.clone())
        .collect();

    Ok(ParsedRow {
        song: SongData {
            external_id,
            title: title.to_string(),
            artist: artist.replace(" x ", ", "),
            remix,
            reaction,
            release_date,
            highlight_start,
            highlight_end,
            sort_order,
        },
        artists,
        keywords,
    })
}

/// The song list and the associations it implies, in sheet order.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    pub songs: Vec<SongData>,
    /// Artist key -> video ids.
    pub artist_links: BTreeMap<String, Vec<String>>,
    /// Keyword -> video ids.
    pub keyword_links: BTreeMap<String, Vec<String>>,
    /// Sheet row number (1-based, header is row 1) and reason.
    pub skipped: Vec<(usize, RowSkip)>,
}

/// Builds the catalog from a sheet whose first row is the header.
pub fn build_catalog(
    rows: &[Vec<String>],
    columns: &ColumnSettings,
) -> Result<SourceCatalog, SourceError> {
    let (header, body) = rows.split_first().ok_or(SourceError::Empty)?;
    let index = ColumnIndex::resolve(header, columns)?;

    let mut catalog = SourceCatalog::default();
    let mut seen = HashSet::new();

    for (i, row) in body.iter().enumerate() {
        let row_number = i + 2;
        let parsed = parse_row(row, &index).and_then(|parsed| {
            if seen.insert(parsed.song.external_id.clone()) {
                Ok(parsed)
            } else {
                Err(RowSkip::DuplicateId(parsed.song.external_id))
            }
        });

        let parsed = match parsed {
            Ok(parsed) => parsed,
            Err(skip) => {
                // Placeholder rows without a link are routine in the sheet.
                if skip == RowSkip::MissingUrl {
                    debug!("Skipping row {}: {}", row_number, skip);
                } else {
                    warn!("Skipping row {}: {}", row_number, skip);
                }
                catalog.skipped.push((row_number, skip));
                continue;
            }
        };

        let id = &parsed.song.external_id;
        for artist in parsed.artists {
            catalog
                .artist_links
                .entry(artist)
                .or_default()
                .push(id.clone());
        }
        for keyword in parsed.keywords {
            catalog
                .keyword_links
                .entry(keyword)
                .or_default()
                .push(id.clone());
        }
        catalog.songs.push(parsed.song);
    }

    debug!(
        "Parsed {} songs from sheet, skipped {} rows",
        catalog.songs.len(),
        catalog.skipped.len()
    );
    Ok(catalog)
}
