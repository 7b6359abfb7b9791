//! View count collection.

mod collector;
mod youtube;

pub use collector::{CollectionReport, MetricCollector, MetricRequest};
pub use youtube::YouTubeViewSource;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("video {id} lookup returned status {status}")]
    Status { status: u16, id: String },
    #[error("video {0} not found")]
    NotFound(String),
    #[error("video {0} has no public view count")]
    StatisticsHidden(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl MetricError {
    pub fn is_transient(&self) -> bool {
        match self {
            MetricError::Request(_) | MetricError::Malformed(_) => true,
            MetricError::Status { status, .. } => *status == 429 || *status >= 500,
            MetricError::NotFound(_) | MetricError::StatisticsHidden(_) => false,
        }
    }
}

/// Looks up the current view count of one video.
pub trait ViewCountSource: Send + Sync {
    fn view_count(&self, video_id: &str) -> Result<u64, MetricError>;
}
