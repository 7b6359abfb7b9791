use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,

    pub sheet: Option<SheetConfig>,
    pub columns: Option<ColumnsConfig>,
    pub metrics: Option<MetricsConfig>,
    pub credits: Option<CreditsConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SheetConfig {
    pub spreadsheet_id: Option<String>,
    /// A1 range holding the header row and the song rows, e.g. `Songs!A1:Z`.
    pub song_range: Option<String>,
    /// Path to the Google service account JSON key.
    pub service_account_key: Option<String>,
    pub fetch_attempts: Option<u32>,
    pub retry_delay_secs: Option<u64>,
}

/// Header names of the song sheet columns.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ColumnsConfig {
    pub title: Option<String>,
    pub url: Option<String>,
    pub reaction: Option<String>,
    pub date: Option<String>,
    pub remix: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub order: Option<String>,
    pub keyword: Option<String>,
    pub removed: Option<String>,
    /// Artist key -> header of the flag column marking that artist.
    pub artists: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct MetricsConfig {
    pub api_key: Option<String>,
    pub batch_size: Option<usize>,
    pub max_attempts: Option<u32>,
    pub workers: Option<usize>,
    pub retry_delay_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CreditsConfig {
    /// Defaults to the song spreadsheet.
    pub spreadsheet_id: Option<String>,
    /// Worker column of the current lyrics sheet.
    pub current_range: Option<String>,
    /// Historical worker rows: name, _, _, count, kind.
    pub history_range: Option<String>,
    pub run_hour: Option<u32>,
    pub team_key: Option<String>,
    pub prefix: Option<Vec<String>>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
