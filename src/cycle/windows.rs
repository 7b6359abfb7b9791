use crate::chart_store::ChartWindow;
use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};

/// Chart windows rebuilt by the cycle scheduled at `tick` (local time).
///
/// Hourly and total run every hour; the others only at midnight on the
/// first day of their period.
pub fn due_windows(tick: NaiveDateTime) -> Vec<ChartWindow> {
    let midnight = tick.hour() == 0;
    ChartWindow::ALL
        .into_iter()
        .filter(|window| match window {
            ChartWindow::Hourly | ChartWindow::Total => true,
            ChartWindow::Daily => midnight,
            ChartWindow::Weekly => midnight && tick.weekday() == Weekday::Mon,
            ChartWindow::Monthly => midnight && tick.day() == 1,
        })
        .collect()
}
