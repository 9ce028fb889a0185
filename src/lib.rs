//! VIDBENCH - Video generation latency bench
//!
//! Drives a queue-based video generation server through its submission API,
//! separates one-time compilation cost from steady-state latency, and
//! produces reproducible performance reports.

use std::time::Duration;

use thiserror::Error;

// Public re-exports
pub mod bench;
pub mod client;
pub mod config;
pub mod console;
pub mod models;
pub mod report;
pub mod util;
pub mod workflow;

// Common error types
#[derive(Debug, Error)]
pub enum VidBenchError {
    /// Liveness probe failed or the server could not be reached
    #[error("Connectivity error: {0}")]
    ConnectivityError(String),
    /// No image could be obtained for image-conditioned runs
    #[error("Asset unavailable: {0}")]
    AssetUnavailable(String),
    /// The engine refused a submitted graph
    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),
    /// The engine reported an error event while executing a job
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
    /// A job did not reach a terminal state before its deadline
    #[error("Timed out after {}", humantime::format_duration(*.0))]
    Timeout(Duration),
    /// Too few successful runs to compute a baseline
    #[error("Insufficient samples: {succeeded} of {required} required {phase} runs succeeded")]
    InsufficientSamples {
        phase: String,
        succeeded: usize,
        required: usize,
    },
    /// The engine sent a payload that does not match its event/response contract
    #[error("Protocol error: {0}")]
    ProtocolError(String),
    /// Configuration validation or parsing error
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// Results persistence error
    #[error("Results persistence error: {0}")]
    PersistenceError(String),
    /// I/O operation failed
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serde_json::Error> for VidBenchError {
    fn from(err: serde_json::Error) -> Self {
        VidBenchError::PersistenceError(format!("JSON serialization error: {}", err))
    }
}

impl From<toml::de::Error> for VidBenchError {
    fn from(err: toml::de::Error) -> Self {
        VidBenchError::ConfigError(format!("TOML parsing error: {}", err))
    }
}

impl From<toml::ser::Error> for VidBenchError {
    fn from(err: toml::ser::Error) -> Self {
        VidBenchError::ConfigError(format!("TOML serialization error: {}", err))
    }
}

impl From<reqwest::Error> for VidBenchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            VidBenchError::ProtocolError(format!("Malformed response: {}", err))
        } else {
            VidBenchError::ConnectivityError(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for VidBenchError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        VidBenchError::ConnectivityError(format!("Event stream error: {}", err))
    }
}

/// Result type alias for VIDBENCH operations
pub type Result<T> = std::result::Result<T, VidBenchError>;

/// Error handling utilities
pub mod error {
    use super::{Result, VidBenchError};
    use std::time::Duration;
    use tokio::time::sleep;
    use tracing::debug;

    /// Retry configuration for transient operations
    #[derive(Debug, Clone)]
    pub struct RetryConfig {
        /// Maximum number of retry attempts
        pub max_attempts: usize,
        /// Initial delay between retries
        pub initial_delay: Duration,
        /// Multiplier for exponential backoff
        pub backoff_multiplier: f64,
        /// Maximum delay between retries
        pub max_delay: Duration,
    }

    impl Default for RetryConfig {
        fn default() -> Self {
            Self {
                max_attempts: 3,
                initial_delay: Duration::from_millis(250),
                backoff_multiplier: 2.0,
                max_delay: Duration::from_secs(5),
            }
        }
    }

    /// Retry a fallible async operation with exponential backoff
    pub async fn retry_async<F, Fut, T>(operation: F, config: RetryConfig) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut delay = config.initial_delay;
        let mut last_error = None;

        for attempt in 0..config.max_attempts {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if !is_retryable_error(&err) {
                        return Err(err);
                    }
                    debug!(attempt = attempt + 1, error = %err, "retryable failure");
                    last_error = Some(err);

                    // Don't sleep after the last attempt
                    if attempt < config.max_attempts - 1 {
                        sleep(delay).await;
                        delay = std::cmp::min(
                            Duration::from_millis(
                                (delay.as_millis() as f64 * config.backoff_multiplier) as u64,
                            ),
                            config.max_delay,
                        );
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            VidBenchError::ConnectivityError("Retry failed with no error".to_string())
        }))
    }

    /// Check if an error is retryable
    pub fn is_retryable_error(error: &VidBenchError) -> bool {
        match error {
            VidBenchError::ConnectivityError(_) => true,
            VidBenchError::IoError(io_err) => matches!(
                io_err.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::ConnectionReset
            ),
            _ => false,
        }
    }

    /// Convert error to user-friendly message with suggestions
    pub fn user_friendly_message(error: &VidBenchError) -> String {
        match error {
            VidBenchError::ConnectivityError(_) => {
                "Cannot reach the generation server. Check --server and that the server is running."
                    .to_string()
            }
            VidBenchError::AssetUnavailable(_) => {
                "No input image available. Pass --image or build with the `synth` feature."
                    .to_string()
            }
            VidBenchError::SubmissionRejected(msg) => {
                format!("The server rejected the workflow: {}. Check that the required models and nodes are installed.", msg)
            }
            VidBenchError::Timeout(_) => {
                "The job did not finish in time. Raise --timeout or check the server queue."
                    .to_string()
            }
            VidBenchError::ConfigError(msg) => {
                format!("Configuration error: {}. Check your settings.", msg)
            }
            VidBenchError::PersistenceError(_) => {
                "Failed to save results. Check disk space and permissions.".to_string()
            }
            _ => error.to_string(),
        }
    }
}

// Common types and constants
pub const APP_NAME: &str = "vidbench";
pub const CONFIG_FILE: &str = "vidbench.toml";
pub const RESULTS_FILE: &str = "benchmark_results.json";
pub const DEFAULT_SERVER: &str = "http://localhost:8188";
pub const RESULTS_FORMAT_VERSION: u32 = 1;
