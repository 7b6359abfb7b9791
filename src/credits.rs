//! Lyrics contributor credits.
//!
//! Contributors are ranked by the number of lyrics they worked on: the
//! archived counts of the history sheet plus one per song currently listed
//! on the lyrics sheet.

use crate::chart_store::ChartStore;
use crate::config::CreditsSettings;
use crate::source::SheetReader;
use anyhow::{Context, Result};
use std::collections::HashMap;
use tracing::{info, warn};

const HISTORY_NAME_COLUMN: usize = 0;
const HISTORY_COUNT_COLUMN: usize = 3;
const HISTORY_KIND_COLUMN: usize = 4;
/// History rows of this kind are team entries, not people.
const TEAM_KIND: &str = "team";

/// Counts per contributor, highest first; ties keep first-seen order.
pub fn aggregate_credits(current: &[Vec<String>], history: &[Vec<String>]) -> Vec<(String, i64)> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, i64> = HashMap::new();
    let mut add = |name: &str, count: i64| {
        if !counts.contains_key(name) {
            order.push(name.to_string());
        }
        *counts.entry(name.to_string()).or_insert(0) += count;
    };

    for (i, row) in history.iter().enumerate() {
        let cell = |idx: usize| row.get(idx).map(|s| s.trim()).unwrap_or("");
        let name = cell(HISTORY_NAME_COLUMN);
        if name.is_empty() || cell(HISTORY_KIND_COLUMN) == TEAM_KIND {
            continue;
        }
        match cell(HISTORY_COUNT_COLUMN).parse::<i64>() {
            Ok(count) => add(name, count),
            Err(_) => warn!(
                "Skipping credits history row {}: invalid count {:?}",
                i + 1,
                cell(HISTORY_COUNT_COLUMN)
            ),
        }
    }

    for name in current.iter().filter_map(|row| row.first()) {
        let name = name.trim();
        if !name.is_empty() {
            add(name, 1);
        }
    }

    let mut ranked: Vec<(String, i64)> = order
        .into_iter()
        .map(|name| {
            let count = counts.get(&name).copied().unwrap_or(0);
            (name, count)
        })
        .collect();
    ranked.sort_by_key(|(_, count)| std::cmp::Reverse(*count));
    ranked
}

pub fn format_credits(prefix: &[String], ranked: &[(String, i64)]) -> String {
    prefix
        .iter()
        .map(String::as_str)
        .chain(ranked.iter().map(|(name, _)| name.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reads both sheets and stores the credit line under the configured team.
pub fn refresh_credits(
    store: &dyn ChartStore,
    sheet: &dyn SheetReader,
    settings: &CreditsSettings,
) -> Result<String> {
    let current = sheet
        .read_range(&settings.current_range)
        .with_context(|| format!("Failed to read {}", settings.current_range))?;
    let history = sheet
        .read_range(&settings.history_range)
        .with_context(|| format!("Failed to read {}", settings.history_range))?;

    let ranked = aggregate_credits(&current, &history);
    let credits = format_credits(&settings.prefix, &ranked);
    store
        .set_team_name(&settings.team_key, &credits)
        .context("Failed to store lyrics credits")?;

    info!(
        "Updated {} credits with {} contributors",
        settings.team_key,
        ranked.len()
    );
    Ok(credits)
}
