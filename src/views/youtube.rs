//! YouTube Data API v3 view counts.

use super::{MetricError, ViewCountSource};
use crate::config::MetricSettings;
use anyhow::Result;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;

const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3/videos";

pub struct YouTubeViewSource {
    client: Client,
    api_key: String,
}

#[derive(Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Deserialize)]
struct VideoItem {
    statistics: Option<VideoStatistics>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    view_count: Option<String>,
}

impl YouTubeViewSource {
    pub fn new(settings: &MetricSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
        })
    }
}

impl ViewCountSource for YouTubeViewSource {
    fn view_count(&self, video_id: &str) -> Result<u64, MetricError> {
        let response = self
            .client
            .get(YOUTUBE_API_BASE)
            .query(&[
                ("part", "statistics"),
                ("id", video_id),
                ("key", self.api_key.as_str()),
            ])
            .send()?;

        if !response.status().is_success() {
            return Err(MetricError::Status {
                status: response.status().as_u16(),
                id: video_id.to_string(),
            });
        }

        let body: VideoListResponse = response
            .json()
            .map_err(|e| MetricError::Malformed(e.to_string()))?;
        parse_view_count(video_id, body)
    }
}

fn parse_view_count(video_id: &str, body: VideoListResponse) -> Result<u64, MetricError> {
    let item = body
        .items
        .into_iter()
        .next()
        .ok_or_else(|| MetricError::NotFound(video_id.to_string()))?;

    // Hidden statistics are not a count of zero.
    let raw = item
        .statistics
        .and_then(|s| s.view_count)
        .ok_or_else(|| MetricError::StatisticsHidden(video_id.to_string()))?;
    raw.parse()
        .map_err(|_| MetricError::Malformed(format!("view count {:?} for {}", raw, video_id)))
}
