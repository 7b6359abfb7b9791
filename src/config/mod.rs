mod file_config;

pub use file_config::{ColumnsConfig, CreditsConfig, FileConfig, MetricsConfig, SheetConfig};

use anyhow::{anyhow, bail, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// TOML values override these where present.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub spreadsheet_id: Option<String>,
    pub youtube_api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub sheet: SheetSettings,
    pub columns: ColumnSettings,
    pub metrics: MetricSettings,
    /// `None` when the config file has no `[credits]` section.
    pub credits: Option<CreditsSettings>,
}

#[derive(Debug, Clone)]
pub struct SheetSettings {
    pub spreadsheet_id: String,
    pub song_range: String,
    pub service_account_key: PathBuf,
    pub fetch_attempts: u32,
    pub retry_delay_secs: u64,
}

/// Header names resolved against the first row of the song sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSettings {
    pub title: String,
    pub url: String,
    pub reaction: String,
    pub date: String,
    pub remix: String,
    pub order: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub keyword: Option<String>,
    pub removed: Option<String>,
    pub artists: BTreeMap<String, String>,
}

impl Default for ColumnSettings {
    fn default() -> Self {
        Self {
            title: "title".to_string(),
            url: "url".to_string(),
            reaction: "reaction".to_string(),
            date: "date".to_string(),
            remix: "remix".to_string(),
            order: "order".to_string(),
            start: None,
            end: None,
            keyword: None,
            removed: None,
            artists: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricSettings {
    pub api_key: String,
    pub batch_size: usize,
    pub max_attempts: u32,
    pub workers: usize,
    pub retry_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl MetricSettings {
    pub const DEFAULT_BATCH_SIZE: usize = 30;
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditsSettings {
    pub spreadsheet_id: String,
    pub current_range: String,
    pub history_range: String,
    pub run_hour: u32,
    pub team_key: String,
    pub prefix: Vec<String>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = resolve_db_path(cli, Some(&file))?;

        let sheet_file = file.sheet.unwrap_or_default();
        let spreadsheet_id = sheet_file
            .spreadsheet_id
            .or_else(|| cli.spreadsheet_id.clone())
            .ok_or_else(|| {
                anyhow!("sheet.spreadsheet_id must be specified via --spreadsheet-id or in config file")
            })?;
        let sheet = SheetSettings {
            spreadsheet_id: spreadsheet_id.clone(),
            song_range: sheet_file
                .song_range
                .ok_or_else(|| anyhow!("sheet.song_range must be specified in config file"))?,
            service_account_key: sheet_file
                .service_account_key
                .map(PathBuf::from)
                .ok_or_else(|| {
                    anyhow!("sheet.service_account_key must be specified in config file")
                })?,
            fetch_attempts: sheet_file.fetch_attempts.unwrap_or(5),
            retry_delay_secs: sheet_file.retry_delay_secs.unwrap_or(2),
        };
        if sheet.fetch_attempts == 0 {
            bail!("sheet.fetch_attempts must be at least 1");
        }

        let columns = resolve_columns(file.columns.unwrap_or_default());

        let metrics_file = file.metrics.unwrap_or_default();
        let metrics = MetricSettings {
            api_key: metrics_file
                .api_key
                .or_else(|| cli.youtube_api_key.clone())
                .ok_or_else(|| {
                    anyhow!("metrics.api_key must be specified via --youtube-api-key or in config file")
                })?,
            batch_size: metrics_file
                .batch_size
                .unwrap_or(MetricSettings::DEFAULT_BATCH_SIZE),
            max_attempts: metrics_file
                .max_attempts
                .unwrap_or(MetricSettings::DEFAULT_MAX_ATTEMPTS),
            workers: metrics_file.workers.unwrap_or(16),
            retry_delay_ms: metrics_file.retry_delay_ms.unwrap_or(250),
            request_timeout_secs: metrics_file.request_timeout_secs.unwrap_or(10),
        };
        if metrics.batch_size == 0 {
            bail!("metrics.batch_size must be at least 1");
        }
        if metrics.max_attempts == 0 {
            bail!("metrics.max_attempts must be at least 1");
        }
        if metrics.workers == 0 {
            bail!("metrics.workers must be at least 1");
        }

        let credits = match file.credits {
            Some(credits_file) => Some(resolve_credits(credits_file, &spreadsheet_id)?),
            None => None,
        };

        Ok(AppConfig {
            db_path,
            sheet,
            columns,
            metrics,
            credits,
        })
    }
}

/// Database path alone, for commands that only read the chart database.
pub fn resolve_db_path(cli: &CliConfig, file: Option<&FileConfig>) -> Result<PathBuf> {
    let db_path = file
        .and_then(|f| f.db_path.as_ref())
        .map(PathBuf::from)
        .or_else(|| cli.db_path.clone())
        .ok_or_else(|| anyhow!("db_path must be specified via --db-path or in config file"))?;
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            bail!("Database directory does not exist: {:?}", parent);
        }
    }
    Ok(db_path)
}

fn resolve_columns(file: ColumnsConfig) -> ColumnSettings {
    let defaults = ColumnSettings::default();
    ColumnSettings {
        title: file.title.unwrap_or(defaults.title),
        url: file.url.unwrap_or(defaults.url),
        reaction: file.reaction.unwrap_or(defaults.reaction),
        date: file.date.unwrap_or(defaults.date),
        remix: file.remix.unwrap_or(defaults.remix),
        order: file.order.unwrap_or(defaults.order),
        start: file.start,
        end: file.end,
        keyword: file.keyword,
        removed: file.removed,
        artists: file.artists.unwrap_or_default(),
    }
}

fn resolve_credits(file: CreditsConfig, default_spreadsheet: &str) -> Result<CreditsSettings> {
    let run_hour = file.run_hour.unwrap_or(1);
    if run_hour > 23 {
        bail!("credits.run_hour must be between 0 and 23, got {}", run_hour);
    }
    Ok(CreditsSettings {
        spreadsheet_id: file
            .spreadsheet_id
            .unwrap_or_else(|| default_spreadsheet.to_string()),
        current_range: file
            .current_range
            .ok_or_else(|| anyhow!("credits.current_range must be specified in config file"))?,
        history_range: file
            .history_range
            .ok_or_else(|| anyhow!("credits.history_range must be specified in config file"))?,
        run_hour,
        team_key: file.team_key.unwrap_or_else(|| "special2".to_string()),
        prefix: file.prefix.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn full_cli(temp_dir: &TempDir) -> CliConfig {
        CliConfig {
            db_path: Some(temp_dir.path().join("chart.db")),
            spreadsheet_id: Some("cli-sheet".to_string()),
            youtube_api_key: Some("cli-key".to_string()),
        }
    }

    fn parse(toml_str: &str) -> FileConfig {
        toml::from_str(toml_str).unwrap()
    }

    const MINIMAL_TOML: &str = r#"
        [sheet]
        song_range = "Songs!A1:Z"
        service_account_key = "/etc/crawler/key.json"
    "#;

    #[test]
    fn test_resolve_with_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::resolve(&full_cli(&temp_dir), Some(parse(MINIMAL_TOML))).unwrap();

        assert_eq!(config.db_path, temp_dir.path().join("chart.db"));
        assert_eq!(config.sheet.spreadsheet_id, "cli-sheet");
        assert_eq!(config.sheet.fetch_attempts, 5);
        assert_eq!(config.metrics.api_key, "cli-key");
        assert_eq!(config.metrics.batch_size, 30);
        assert_eq!(config.metrics.max_attempts, 6);
        assert_eq!(config.columns, ColumnSettings::default());
        assert!(config.credits.is_none());
    }

    #[test]
    fn test_toml_overrides_cli() {
        let temp_dir = TempDir::new().unwrap();
        let toml_str = format!(
            r#"
            db_path = "{}"

            [sheet]
            spreadsheet_id = "file-sheet"
            song_range = "Songs!A1:Z"
            service_account_key = "key.json"

            [metrics]
            api_key = "file-key"
            workers = 4

            [columns]
            title = "제목"
            keyword = "키워드"

            [columns.artists]
            woowakgood = "우왁굳"
            "#,
            temp_dir.path().join("other.db").display()
        );

        let config = AppConfig::resolve(&full_cli(&temp_dir), Some(parse(&toml_str))).unwrap();

        assert_eq!(config.db_path, temp_dir.path().join("other.db"));
        assert_eq!(config.sheet.spreadsheet_id, "file-sheet");
        assert_eq!(config.metrics.api_key, "file-key");
        assert_eq!(config.metrics.workers, 4);
        assert_eq!(config.columns.title, "제목");
        assert_eq!(config.columns.url, "url");
        assert_eq!(config.columns.keyword.as_deref(), Some("키워드"));
        assert_eq!(
            config.columns.artists.get("woowakgood").map(String::as_str),
            Some("우왁굳")
        );
    }

    #[test]
    fn test_missing_required_values_fail() {
        let temp_dir = TempDir::new().unwrap();

        let err = AppConfig::resolve(&CliConfig::default(), Some(parse(MINIMAL_TOML)))
            .unwrap_err()
            .to_string();
        assert!(err.contains("db_path"));

        let err = AppConfig::resolve(&full_cli(&temp_dir), None)
            .unwrap_err()
            .to_string();
        assert!(err.contains("song_range"));

        let cli = CliConfig {
            youtube_api_key: None,
            ..full_cli(&temp_dir)
        };
        let err = AppConfig::resolve(&cli, Some(parse(MINIMAL_TOML)))
            .unwrap_err()
            .to_string();
        assert!(err.contains("api_key"));
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let temp_dir = TempDir::new().unwrap();
        let toml_str = format!("{}\n[metrics]\nbatch_size = 0\n", MINIMAL_TOML);
        assert!(AppConfig::resolve(&full_cli(&temp_dir), Some(parse(&toml_str))).is_err());
    }

    #[test]
    fn test_credits_section() {
        let temp_dir = TempDir::new().unwrap();
        let toml_str = format!(
            r#"{}
            [credits]
            current_range = "Lyrics!J3:J"
            history_range = "Workers!A2:E"
            prefix = ["a", "b"]
            "#,
            MINIMAL_TOML
        );

        let credits = AppConfig::resolve(&full_cli(&temp_dir), Some(parse(&toml_str)))
            .unwrap()
            .credits
            .unwrap();
        assert_eq!(credits.spreadsheet_id, "cli-sheet");
        assert_eq!(credits.run_hour, 1);
        assert_eq!(credits.team_key, "special2");
        assert_eq!(credits.prefix, vec!["a".to_string(), "b".to_string()]);

        let bad = toml_str.replace("prefix", "run_hour = 24\nprefix");
        assert!(AppConfig::resolve(&full_cli(&temp_dir), Some(parse(&bad))).is_err());
    }
}
