use anyhow::{Context, Result};
use chrono::{DateTime, Local, Timelike, Utc};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wakmusic_chart_crawler::background_jobs::jobs::{ChartSyncJob, LyricsCreditsJob};
use wakmusic_chart_crawler::background_jobs::{BackgroundJob, JobContext, JobScheduler};
use wakmusic_chart_crawler::chart_store::{ChartStore, ChartWindow, Song, SqliteChartStore};
use wakmusic_chart_crawler::cli_style::{
    format_rank_delta, get_styles, print_error, print_key_value, print_success, TableBuilder,
};
use wakmusic_chart_crawler::config::{resolve_db_path, AppConfig, CliConfig, FileConfig};
use wakmusic_chart_crawler::ranking::ranked_view;

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles = get_styles(), version)]
struct CliArgs {
    /// Path to a TOML config file. Its values override the flags below.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite chart database file.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Id of the spreadsheet holding the song sheet.
    #[clap(long)]
    pub spreadsheet_id: Option<String>,

    /// YouTube Data API key.
    #[clap(long)]
    pub youtube_api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the hourly scheduler until interrupted.
    Run,

    /// Run one sync cycle for the current hour and exit.
    Once,

    /// Show the current ranking of a chart.
    Chart {
        #[clap(value_enum)]
        window: ChartWindow,

        /// Number of entries to show.
        #[clap(long, default_value_t = 20)]
        limit: usize,
    },

    /// Refresh the lyrics credits once and exit.
    Credits,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_path: self.db_path.clone(),
            spreadsheet_id: self.spreadsheet_id.clone(),
            youtube_api_key: self.youtube_api_key.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let cli_config = cli_args.to_cli_config();

    // The read view only needs the database.
    if let Command::Chart { window, limit } = cli_args.command {
        let db_path = resolve_db_path(&cli_config, file_config.as_ref())?;
        return show_chart(&db_path, window, limit);
    }
    let config = Arc::new(AppConfig::resolve(&cli_config, file_config)?);

    match cli_args.command {
        Command::Run => run_scheduler(config).await,
        Command::Once => {
            let job: Arc<dyn BackgroundJob> = Arc::new(ChartSyncJob::new(config));
            run_job_now(job).await
        }
        Command::Credits => match LyricsCreditsJob::from_config(&config) {
            Some(job) => run_job_now(Arc::new(job)).await,
            None => {
                print_error("No [credits] section in the config file");
                Ok(())
            }
        },
        // Handled before the full config is resolved.
        Command::Chart { .. } => Ok(()),
    }
}

async fn run_scheduler(config: Arc<AppConfig>) -> Result<()> {
    let shutdown_token = CancellationToken::new();
    let mut scheduler = JobScheduler::new(shutdown_token.clone());
    scheduler.register_job(Arc::new(ChartSyncJob::new(config.clone())));
    if let Some(job) = LyricsCreditsJob::from_config(&config) {
        scheduler.register_job(Arc::new(job));
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down after the current job");
            shutdown_token.cancel();
        }
    });

    scheduler.run().await;
    Ok(())
}

/// Runs a job outside the scheduler, for the current hour.
async fn run_job_now(job: Arc<dyn BackgroundJob>) -> Result<()> {
    let now = Local::now().naive_local();
    let tick = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    let ctx = JobContext::new(CancellationToken::new(), tick);

    let job_id = job.id();
    tokio::task::spawn_blocking(move || job.execute(&ctx))
        .await
        .context("Job task panicked")?
        .with_context(|| format!("Job {} failed", job_id))?;
    print_success(&format!("Job {} completed", job_id));
    Ok(())
}

fn show_chart(db_path: &Path, window: ChartWindow, limit: usize) -> Result<()> {
    let store = SqliteChartStore::new(db_path)?;
    let songs: HashMap<i64, Song> = store
        .load_songs()?
        .into_iter()
        .map(|song| (song.id, song))
        .collect();
    let entries = store.load_chart(window)?;

    let updated = store
        .last_synced(window)?
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .map(|ts| {
            ts.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_else(|| "never".to_string());
    print_key_value("Chart", window.as_str());
    print_key_value("Updated", &updated);
    print_key_value("Songs", &entries.len().to_string());

    let mut table = TableBuilder::new(vec!["#", "", "Title", "Artist", "Views", "Increase"]);
    for ranked in ranked_view(window, &entries).into_iter().take(limit) {
        let song = songs.get(&ranked.entry.song_id);
        table.add_row(vec![
            ranked.rank.to_string(),
            format_rank_delta(ranked.rank_delta),
            song.map(|s| s.data.title.clone()).unwrap_or_default(),
            song.map(|s| s.data.artist.clone()).unwrap_or_default(),
            ranked.entry.views.to_string(),
            ranked.entry.increase.to_string(),
        ]);
    }
    table.print();
    Ok(())
}
