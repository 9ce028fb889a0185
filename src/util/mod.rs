//! Utility functions module
//!
//! Contains statistics helpers and formatting for durations and
//! realtime factors.

pub mod stats;
pub mod units;

// Re-export commonly used functions
pub use stats::{compile_overhead, mean, sample_std_dev};
pub use units::{
    calculate_realtime_factor, format_duration, format_realtime, format_seconds,
    format_seconds_list,
};
