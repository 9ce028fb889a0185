//! Units formatting utilities
//!
//! Human-readable formatting of run durations, throughput and realtime
//! factors for console output.

use std::time::Duration;

/// Format duration into human-readable string
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use vidbench::util::units::format_duration;
///
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 3600 {
        let hours = total_secs / 3600;
        let minutes = (total_secs % 3600) / 60;
        let seconds = total_secs % 60;
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if total_secs >= 60 {
        let minutes = total_secs / 60;
        let seconds = total_secs % 60;
        format!("{}m {}s", minutes, seconds)
    } else if total_secs > 0 {
        if millis > 0 {
            format!("{}.{:02}s", total_secs, millis / 10)
        } else {
            format!("{}s", total_secs)
        }
    } else {
        format!("{}ms", millis)
    }
}

/// Format a duration in seconds with two decimals, e.g. `20.00s`
///
/// # Examples
/// ```
/// use vidbench::util::units::format_seconds;
///
/// assert_eq!(format_seconds(19.996), "20.00s");
/// ```
pub fn format_seconds(secs: f64) -> String {
    format!("{:.2}s", secs)
}

/// Format a list of durations as `[5.00s, 1.00s]`
pub fn format_seconds_list(values: &[f64]) -> String {
    let items: Vec<String> = values.iter().map(|v| format_seconds(*v)).collect();
    format!("[{}]", items.join(", "))
}

/// Format a realtime factor, e.g. `0.25x`
///
/// # Examples
/// ```
/// use vidbench::util::units::format_realtime;
///
/// assert_eq!(format_realtime(0.25), "0.25x");
/// ```
pub fn format_realtime(factor: f64) -> String {
    format!("{:.2}x", factor)
}

/// Realtime factor of a clip generated in `elapsed_secs`
pub fn calculate_realtime_factor(clip_secs: f64, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 {
        return 0.0;
    }
    clip_secs / elapsed_secs
}
