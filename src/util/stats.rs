//! Small statistics helpers over run durations

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample (n - 1) standard deviation
///
/// Returns `Some(0.0)` for a single value and `None` for an empty slice.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    let avg = mean(values)?;
    if values.len() < 2 {
        return Some(0.0);
    }
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Estimated one-time compilation overhead from warm-up durations
///
/// First warm-up minus the mean of the remaining ones, floored at zero.
/// Needs at least two durations.
pub fn compile_overhead(warmup_times: &[f64]) -> Option<f64> {
    let (first, rest) = warmup_times.split_first()?;
    let baseline = mean(rest)?;
    Some((first - baseline).max(0.0))
}
