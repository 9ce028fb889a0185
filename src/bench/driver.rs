//! Warm-up and timed measurement of each configuration
//!
//! Every (mode, configuration) pair gets a warm-up phase with a fixed seed,
//! whose first run absorbs one-time compilation, followed by a timed phase
//! with fresh seeds. Jobs run strictly one after another.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::client::monitor::{connect_events, monitor_socket};
use crate::client::{EngineClient, ExecutionMonitor, ProgressUpdate};
use crate::config::{BenchmarkMode, Configuration, SuiteConfig};
use crate::models::{AssetHandle, BenchmarkResult, RunSample, SamplePhase};
use crate::workflow::{GraphTemplate, JobParams, WorkflowGraph};
use crate::{Result, VidBenchError};

/// Runs one graph to completion and reports how long it took
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run_job(&self, graph: &WorkflowGraph) -> Result<Duration>;
}

/// Bound `fut` by `deadline`, mapping expiry to [`VidBenchError::Timeout`]
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(outcome) => outcome,
        Err(_) => Err(VidBenchError::Timeout(deadline)),
    }
}

/// Production runner: submit over HTTP, then watch the job's event stream
#[derive(Debug)]
pub struct EngineJobRunner {
    client: EngineClient,
    monitor_timeout: Duration,
    progress_tx: Option<mpsc::Sender<ProgressUpdate>>,
}

impl EngineJobRunner {
    pub fn new(client: EngineClient, monitor_timeout: Duration) -> Self {
        Self {
            client,
            monitor_timeout,
            progress_tx: None,
        }
    }

    /// Forward monitor progress to `tx`
    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressUpdate>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// Submit, open the event stream and wait; elapsed time starts at stream open
    async fn submit_and_monitor(&self, graph: &WorkflowGraph) -> Result<Duration> {
        let (_job_id, correlation_id) = self.client.submit(graph).await?;
        let socket = connect_events(self.client.server(), correlation_id).await?;

        let mut monitor = ExecutionMonitor::new(correlation_id);
        if let Some(tx) = &self.progress_tx {
            monitor = monitor.with_progress(tx.clone());
        }

        monitor_socket(socket, &mut monitor).await
    }
}

#[async_trait]
impl JobRunner for EngineJobRunner {
    async fn run_job(&self, graph: &WorkflowGraph) -> Result<Duration> {
        // Covers submission and stream open as well as the wait
        with_deadline(self.monitor_timeout, self.submit_and_monitor(graph)).await
    }
}

/// Modes that can actually run given whether the conditioning image was staged
pub fn plan_modes(requested: &[BenchmarkMode], asset_available: bool) -> Vec<BenchmarkMode> {
    requested
        .iter()
        .copied()
        .filter(|mode| asset_available || !mode.requires_asset())
        .collect()
}

/// Sequential measurement driver
pub struct MeasurementDriver<R: JobRunner> {
    config: SuiteConfig,
    runner: R,
    rng: SmallRng,
}

impl<R: JobRunner> MeasurementDriver<R> {
    /// Create a driver; fails if `config` does not validate
    pub fn new(config: SuiteConfig, runner: R) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            runner,
            rng: SmallRng::from_entropy(),
        })
    }

    /// Use a fixed seed for the timed-run seed generator
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Measure one configuration in one mode
    ///
    /// Individual run failures are logged and skipped. Fails with
    /// `InsufficientSamples` when fewer than two warm-ups or no timed run
    /// succeed.
    pub async fn run_configuration(
        &mut self,
        mode: BenchmarkMode,
        configuration: &Configuration,
        asset: Option<&AssetHandle>,
    ) -> Result<BenchmarkResult> {
        let template = GraphTemplate::from_suite(&self.config);
        let config_name = configuration.qualified_name(mode);
        let params = |seed: u64| JobParams {
            mode,
            frames: configuration.frames,
            steps: configuration.steps,
            seed,
            asset,
        };

        let warmup_seed = self.config.warmup_seed;
        let mut warmups = Vec::with_capacity(self.config.warmup_runs);
        for index in 0..self.config.warmup_runs {
            let graph = template.build(params(warmup_seed))?;
            info!(mode = %mode, config = %config_name, phase = "warmup", run = index + 1, "submitting");
            match self.runner.run_job(&graph).await {
                Ok(elapsed) => {
                    let secs = elapsed.as_secs_f64();
                    info!(mode = %mode, config = %config_name, phase = "warmup", run = index + 1, "completed in {:.2}s", secs);
                    warmups.push(RunSample::new(SamplePhase::Warmup, index, warmup_seed, secs));
                }
                Err(err) => {
                    warn!(mode = %mode, config = %config_name, phase = "warmup", run = index + 1, error = %err, "run failed");
                }
            }
        }

        if warmups.len() < 2 {
            return Err(VidBenchError::InsufficientSamples {
                phase: SamplePhase::Warmup.label().to_string(),
                succeeded: warmups.len(),
                required: 2,
            });
        }

        let mut timed = Vec::with_capacity(self.config.timed_runs);
        for index in 0..self.config.timed_runs {
            let seed = self.rng.gen::<u32>() as u64;
            let graph = template.build(params(seed))?;
            info!(mode = %mode, config = %config_name, phase = "timed", run = index + 1, seed, "submitting");
            match self.runner.run_job(&graph).await {
                Ok(elapsed) => {
                    let secs = elapsed.as_secs_f64();
                    info!(mode = %mode, config = %config_name, phase = "timed", run = index + 1, "completed in {:.2}s", secs);
                    timed.push(RunSample::new(SamplePhase::Timed, index, seed, secs));
                }
                Err(err) => {
                    warn!(mode = %mode, config = %config_name, phase = "timed", run = index + 1, error = %err, "run failed");
                }
            }
        }

        if timed.is_empty() {
            return Err(VidBenchError::InsufficientSamples {
                phase: SamplePhase::Timed.label().to_string(),
                succeeded: 0,
                required: 1,
            });
        }

        BenchmarkResult::from_samples(
            mode,
            configuration.clone(),
            self.config.geometry.generation,
            self.config.geometry.output,
            warmups,
            timed,
        )
    }

    /// Measure every catalog entry for each mode, in order
    ///
    /// `on_result` sees each result as soon as its configuration finishes.
    /// Configurations that fail are logged and left out.
    pub async fn run_suite<F>(
        &mut self,
        modes: &[BenchmarkMode],
        asset: Option<&AssetHandle>,
        mut on_result: F,
    ) -> Vec<BenchmarkResult>
    where
        F: FnMut(&BenchmarkResult),
    {
        let catalog = self.config.catalog.clone();
        let mut results = Vec::new();

        for &mode in modes {
            if mode.requires_asset() && asset.is_none() {
                warn!(mode = %mode, "no conditioning image staged, skipping mode");
                continue;
            }

            info!(mode = %mode, "benchmarking {}", mode.description());
            for configuration in &catalog {
                match self.run_configuration(mode, configuration, asset).await {
                    Ok(result) => {
                        on_result(&result);
                        results.push(result);
                    }
                    Err(err) => {
                        error!(
                            mode = %mode,
                            config = %configuration.qualified_name(mode),
                            error = %err,
                            "configuration skipped"
                        );
                    }
                }
            }
        }

        results
    }
}
