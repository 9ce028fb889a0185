use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vidbench::bench::{plan_modes, EngineJobRunner, MeasurementDriver};
use vidbench::client::{AssetStager, EngineClient};
use vidbench::config::persistence::ResultsStorage;
use vidbench::config::{BenchmarkMode, SuiteConfig};
use vidbench::console::{spawn_spinner, PROGRESS_CHANNEL_SIZE};
use vidbench::error::{retry_async, user_friendly_message, RetryConfig};
use vidbench::report::{render_banner, render_report, render_summary};

/// Warm-up aware latency benchmark for video generation servers
#[derive(Debug, Parser)]
#[command(name = "vidbench", version, about, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the benchmark suite (default)
    Run(RunArgs),
    /// Print the report for a saved results file
    Report {
        /// Results JSON written by a previous run
        artifact: PathBuf,
    },
}

#[derive(Debug, Clone, Default, Args)]
struct RunArgs {
    /// Generation server base URL
    #[arg(long)]
    server: Option<String>,

    /// Results JSON output path
    #[arg(long)]
    output: Option<PathBuf>,

    /// Benchmark mode
    #[arg(long, value_parser = ["t2v", "ti2v", "all"])]
    mode: Option<String>,

    /// Conditioning image for ti2v (a gradient placeholder is generated otherwise)
    #[arg(long)]
    image: Option<PathBuf>,

    /// Warm-up runs per configuration
    #[arg(long)]
    warmup: Option<usize>,

    /// Timed runs per configuration
    #[arg(long)]
    runs: Option<usize>,

    /// Per-job deadline, e.g. 30m or 1h
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Suite configuration TOML
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vidbench={}", level)));

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Load the suite configuration and apply command-line overrides
fn resolve_config(args: &RunArgs) -> anyhow::Result<SuiteConfig> {
    let mut config = match &args.config {
        Some(path) => SuiteConfig::load_from(path)?,
        None => SuiteConfig::load()?,
    };

    if let Some(server) = &args.server {
        config = config.with_server(server.clone());
    }
    if let Some(output) = &args.output {
        config = config.with_output_path(output.clone());
    }
    if let Some(mode) = &args.mode {
        config = config.with_modes(BenchmarkMode::parse_selector(mode)?);
    }
    if args.image.is_some() {
        config = config.with_image_path(args.image.clone());
    }
    if let Some(warmup) = args.warmup {
        config = config.with_warmup_runs(warmup);
    }
    if let Some(runs) = args.runs {
        config = config.with_timed_runs(runs);
    }
    if let Some(timeout) = args.timeout {
        config = config.with_monitor_timeout(timeout);
    }

    config.validate()?;
    Ok(config)
}

async fn run(args: RunArgs) -> anyhow::Result<ExitCode> {
    let config = resolve_config(&args)?;
    let client = EngineClient::new(&config.server)?;

    if let Err(err) = retry_async(|| client.check_liveness(), RetryConfig::default()).await {
        error!(server = %config.server, error = %err, "server unreachable");
        eprintln!("{}", user_friendly_message(&err));
        return Ok(ExitCode::FAILURE);
    }
    info!(server = %config.server, "connected");

    let asset = if config.modes.iter().any(|m| m.requires_asset()) {
        let stager = AssetStager::new(&client, config.geometry.generation);
        match stager.stage(config.image_path.as_deref()).await {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(error = %err, "conditioning image unavailable, skipping image-conditioned modes");
                None
            }
        }
    } else {
        None
    };

    let modes = plan_modes(&config.modes, asset.is_some());
    if modes.is_empty() {
        error!("no runnable modes remain");
        return Ok(ExitCode::FAILURE);
    }

    println!("{}", render_banner(&config, &modes));

    let (progress_tx, progress_rx) = mpsc::channel(PROGRESS_CHANNEL_SIZE);
    let spinner = spawn_spinner(progress_rx);

    let runner = EngineJobRunner::new(client, config.monitor_timeout).with_progress(progress_tx);
    let mut driver = MeasurementDriver::new(config.clone(), runner)?;
    let results = driver
        .run_suite(&modes, asset.as_ref(), |result| {
            println!("\n{}", render_summary(result));
        })
        .await;

    // Dropping the driver closes the progress channel
    drop(driver);
    let _ = spinner.await;

    println!("\n{}", render_report(&results));

    if results.is_empty() {
        error!("no configuration produced a result");
        return Ok(ExitCode::FAILURE);
    }

    let storage = ResultsStorage::new(&config.output_path);
    storage
        .save_results(&results)
        .with_context(|| format!("saving results to {}", config.output_path.display()))?;
    println!("Results saved to: {}", storage.get_results_path().display());

    Ok(ExitCode::SUCCESS)
}

fn report(artifact: PathBuf) -> anyhow::Result<ExitCode> {
    let results = ResultsStorage::new(artifact).load_results()?;
    println!("{}", render_report(&results));
    Ok(if results.is_empty() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Some(Command::Run(args)) => run(args).await,
        Some(Command::Report { artifact }) => report(artifact),
        None => run(cli.run).await,
    }
}
