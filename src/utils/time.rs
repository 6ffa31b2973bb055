//! Time display helpers

/// Format seconds as `m:ss`, or `h:mm:ss` from one hour on
///
/// Fractions are truncated; negative and non-finite values show as `0:00`.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Format a `current / total` pair for the player chrome
pub fn format_progress(current: f64, total: f64) -> String {
    format!("{} / {}", format_time(current), format_time(total))
}
