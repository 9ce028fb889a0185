//! Benchmark result data models
//!
//! Contains structures for storing and serializing benchmark results,
//! per-run samples, and derived performance metrics.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{BenchmarkMode, Configuration};
use crate::util::stats::{compile_overhead, mean, sample_std_dev};
use crate::util::units::calculate_realtime_factor;
use crate::{Result, VidBenchError};

/// Width x height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Check both dimensions are non-zero multiples of `block`
    pub fn is_aligned_to(&self, block: u32) -> bool {
        block > 0
            && self.width > 0
            && self.height > 0
            && self.width % block == 0
            && self.height % block == 0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Which phase of the measurement protocol a sample belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplePhase {
    /// Warm-up run; the first one absorbs one-time compilation
    Warmup,
    /// Steady-state run used for reported metrics
    Timed,
}

impl SamplePhase {
    pub fn label(&self) -> &'static str {
        match self {
            SamplePhase::Warmup => "warmup",
            SamplePhase::Timed => "timed",
        }
    }
}

impl fmt::Display for SamplePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single successful submit+monitor cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSample {
    /// Warm-up or timed
    pub phase: SamplePhase,
    /// Zero-based position within its phase (submission order)
    pub index: usize,
    /// Seed the graph was built with
    pub seed: u64,
    /// Wall-clock seconds from event stream open to completion
    pub elapsed_sec: f64,
}

impl RunSample {
    pub fn new(phase: SamplePhase, index: usize, seed: u64, elapsed_sec: f64) -> Self {
        Self {
            phase,
            index,
            seed,
            elapsed_sec,
        }
    }
}

/// Steady-state metrics derived from the timed samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Mean of the timed durations
    pub avg_time_sec: f64,
    /// Sample standard deviation of the timed durations (0 for one sample)
    pub std_dev_sec: f64,
    /// Generated frames per wall-clock second
    pub fps_generated: f64,
    /// Wall-clock seconds per generated frame
    pub sec_per_frame: f64,
    /// Clip duration divided by mean generation time
    pub realtime_factor: f64,
    /// First warm-up minus mean of the remaining warm-ups, floored at zero
    pub compile_time_sec: f64,
}

impl PerformanceMetrics {
    /// Derive metrics from warm-up and timed durations
    ///
    /// Needs at least two warm-up durations and one timed duration.
    pub fn from_durations(
        configuration: &Configuration,
        warmup_times: &[f64],
        run_times: &[f64],
    ) -> Result<Self> {
        let compile_time_sec =
            compile_overhead(warmup_times).ok_or_else(|| VidBenchError::InsufficientSamples {
                phase: "warmup".to_string(),
                succeeded: warmup_times.len(),
                required: 2,
            })?;

        let avg_time_sec = mean(run_times).ok_or_else(|| VidBenchError::InsufficientSamples {
            phase: "timed".to_string(),
            succeeded: 0,
            required: 1,
        })?;
        let std_dev_sec = sample_std_dev(run_times).unwrap_or(0.0);

        let frames = configuration.frames as f64;
        let (fps_generated, sec_per_frame, realtime_factor) = if avg_time_sec > 0.0 {
            (
                frames / avg_time_sec,
                avg_time_sec / frames,
                calculate_realtime_factor(configuration.duration_sec, avg_time_sec),
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        Ok(Self {
            avg_time_sec,
            std_dev_sec,
            fps_generated,
            sec_per_frame,
            realtime_factor,
            compile_time_sec,
        })
    }
}

/// Complete result for one (mode, configuration) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Mode-qualified configuration name, e.g. `t2v_5s_8steps`
    pub config_name: String,
    /// Benchmark mode
    pub mode: BenchmarkMode,
    /// Catalog entry this result was measured for
    pub configuration: Configuration,
    /// `generation->output`, e.g. `576x1024->1080x1920`
    pub resolution: String,
    /// Resolution the model generated at
    pub generation_resolution: Resolution,
    /// Resolution frames were upscaled to
    pub output_resolution: Resolution,
    /// Successful warm-up runs, in submission order
    pub warmup_samples: Vec<RunSample>,
    /// Successful timed runs, in submission order
    pub timed_samples: Vec<RunSample>,
    /// Derived metrics
    pub metrics: PerformanceMetrics,
    /// When the timed phase completed
    pub timestamp: DateTime<Utc>,
}

impl BenchmarkResult {
    /// Build a result from the samples of a finished configuration
    pub fn from_samples(
        mode: BenchmarkMode,
        configuration: Configuration,
        generation_resolution: Resolution,
        output_resolution: Resolution,
        warmup_samples: Vec<RunSample>,
        timed_samples: Vec<RunSample>,
    ) -> Result<Self> {
        let warmup_times: Vec<f64> = warmup_samples.iter().map(|s| s.elapsed_sec).collect();
        let run_times: Vec<f64> = timed_samples.iter().map(|s| s.elapsed_sec).collect();
        let metrics = PerformanceMetrics::from_durations(&configuration, &warmup_times, &run_times)?;

        Ok(Self {
            config_name: configuration.qualified_name(mode),
            mode,
            resolution: format!("{}->{}", generation_resolution, output_resolution),
            generation_resolution,
            output_resolution,
            configuration,
            warmup_samples,
            timed_samples,
            metrics,
            timestamp: Utc::now(),
        })
    }

    /// Warm-up durations in seconds
    pub fn warmup_times(&self) -> Vec<f64> {
        self.warmup_samples.iter().map(|s| s.elapsed_sec).collect()
    }

    /// Timed durations in seconds
    pub fn run_times(&self) -> Vec<f64> {
        self.timed_samples.iter().map(|s| s.elapsed_sec).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn five_second_config() -> Configuration {
        Configuration::new("5s_8steps", 121, 8, 5.0)
    }

    fn samples(phase: SamplePhase, times: &[f64]) -> Vec<RunSample> {
        times
            .iter()
            .enumerate()
            .map(|(i, &t)| RunSample::new(phase, i, 42, t))
            .collect()
    }

    #[test]
    fn test_resolution_alignment() {
        assert!(Resolution::new(576, 1024).is_aligned_to(32));
        assert!(!Resolution::new(580, 1024).is_aligned_to(32));
        assert!(!Resolution::new(0, 1024).is_aligned_to(32));
        assert_eq!(Resolution::new(1080, 1920).to_string(), "1080x1920");
    }

    #[test]
    fn test_metrics_end_to_end_scenario() {
        let metrics = PerformanceMetrics::from_durations(
            &five_second_config(),
            &[60.0, 21.0, 20.0],
            &[20.0, 21.0, 19.0],
        )
        .unwrap();

        assert!((metrics.avg_time_sec - 20.0).abs() < 1e-9);
        assert!((metrics.std_dev_sec - 1.0).abs() < 1e-9);
        assert!((metrics.fps_generated - 6.05).abs() < 1e-9);
        assert!((metrics.sec_per_frame - 0.1653).abs() < 1e-4);
        assert!((metrics.realtime_factor - 0.25).abs() < 1e-9);
        assert!((metrics.compile_time_sec - 39.5).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_single_timed_sample_has_zero_std_dev() {
        let metrics =
            PerformanceMetrics::from_durations(&five_second_config(), &[5.0, 1.0], &[20.0])
                .unwrap();
        assert_eq!(metrics.std_dev_sec, 0.0);
        assert_eq!(metrics.avg_time_sec, 20.0);
    }

    #[test]
    fn test_metrics_require_two_warmups() {
        let err = PerformanceMetrics::from_durations(&five_second_config(), &[5.0], &[20.0])
            .unwrap_err();
        assert!(matches!(
            err,
            VidBenchError::InsufficientSamples { succeeded: 1, required: 2, .. }
        ));
    }

    #[test]
    fn test_metrics_require_timed_sample() {
        let err = PerformanceMetrics::from_durations(&five_second_config(), &[5.0, 1.0], &[])
            .unwrap_err();
        assert!(matches!(err, VidBenchError::InsufficientSamples { .. }));
    }

    #[test]
    fn test_result_from_samples() {
        let result = BenchmarkResult::from_samples(
            BenchmarkMode::TextImageToVideo,
            five_second_config(),
            Resolution::new(576, 1024),
            Resolution::new(1080, 1920),
            samples(SamplePhase::Warmup, &[5.0, 1.0, 1.2]),
            samples(SamplePhase::Timed, &[20.0, 21.0, 19.0]),
        )
        .unwrap();

        assert_eq!(result.config_name, "ti2v_5s_8steps");
        assert_eq!(result.resolution, "576x1024->1080x1920");
        assert_eq!(result.warmup_times(), vec![5.0, 1.0, 1.2]);
        assert_eq!(result.run_times(), vec![20.0, 21.0, 19.0]);
        assert!((result.metrics.compile_time_sec - 3.9).abs() < 1e-9);
        assert!(result.timestamp <= Utc::now());
    }

    #[test]
    fn test_serde_serialization() {
        let result = BenchmarkResult::from_samples(
            BenchmarkMode::TextToVideo,
            five_second_config(),
            Resolution::new(576, 1024),
            Resolution::new(1080, 1920),
            samples(SamplePhase::Warmup, &[5.0, 1.0, 1.0]),
            samples(SamplePhase::Timed, &[20.0]),
        )
        .unwrap();

        let json = serde_json::to_value(&result).expect("Failed to serialize to JSON");
        assert_eq!(json["mode"], "t2v");
        assert_eq!(json["configuration"]["frames"], 121);
        assert_eq!(json["warmup_samples"][0]["phase"], "warmup");
        assert_eq!(json["metrics"]["compile_time_sec"], 4.0);

        let deserialized: BenchmarkResult =
            serde_json::from_value(json).expect("Failed to deserialize from JSON");
        assert_eq!(deserialized.config_name, result.config_name);
        assert_eq!(deserialized.metrics, result.metrics);
        assert_eq!(deserialized.timestamp, result.timestamp);
    }
}
