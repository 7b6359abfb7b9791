//! Reading the song catalog out of the spreadsheet.

mod google_sheets;
mod rows;

pub use google_sheets::GoogleSheetReader;
pub use rows::{build_catalog, parse_row, ColumnIndex, ParsedRow, RowSkip, SourceCatalog};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("range {range} returned status {status}")]
    Status { status: u16, range: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("column {0:?} not found in header row")]
    MissingColumn(String),
    #[error("sheet has no header row")]
    Empty,
}

impl SourceError {
    /// Whether retrying the same read can succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Request(_) | SourceError::Auth(_) => true,
            SourceError::Status { status, .. } => *status == 429 || *status >= 500,
            SourceError::Malformed(_) | SourceError::MissingColumn(_) | SourceError::Empty => {
                false
            }
        }
    }
}

/// Row-oriented access to a spreadsheet.
pub trait SheetReader: Send + Sync {
    /// Cells of an A1 range, rows padded to equal width.
    fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, SourceError>;
}

/// Pads ragged rows to the width of the widest one.
pub(crate) fn pad_rows(mut rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut rows {
        row.resize(width, String::new());
    }
    rows
}
