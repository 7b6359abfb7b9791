//! Specific background job implementations.

pub mod chart_sync;
pub mod lyrics_credits;

pub use chart_sync::ChartSyncJob;
pub use lyrics_credits::LyricsCreditsJob;
