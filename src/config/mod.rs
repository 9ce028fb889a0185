//! Configuration management module
//!
//! Holds the suite configuration (server, geometry, prompts, sampler
//! settings, configuration catalog, warm-up and timed run counts) and
//! handles loading, saving, and validation.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::Resolution;
use crate::{Result, VidBenchError, APP_NAME, CONFIG_FILE, DEFAULT_SERVER, RESULTS_FILE};

pub mod persistence;

/// Tensor tiling block size imposed by the engine on generation resolution
pub const RESOLUTION_BLOCK: u32 = 32;

/// Benchmark mode variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BenchmarkMode {
    /// Text-to-video: latent built from an empty video tensor
    #[serde(rename = "t2v")]
    TextToVideo,
    /// Text+image-to-video: latent built from an uploaded conditioning image
    #[serde(rename = "ti2v")]
    TextImageToVideo,
}

impl BenchmarkMode {
    /// All modes in report order
    pub const ALL: [BenchmarkMode; 2] = [BenchmarkMode::TextToVideo, BenchmarkMode::TextImageToVideo];

    /// Short tag used in configuration names and filename prefixes
    pub fn tag(&self) -> &'static str {
        match self {
            BenchmarkMode::TextToVideo => "t2v",
            BenchmarkMode::TextImageToVideo => "ti2v",
        }
    }

    /// Get a human-readable description of the mode
    pub fn description(&self) -> &'static str {
        match self {
            BenchmarkMode::TextToVideo => "Text-to-Video (T2V)",
            BenchmarkMode::TextImageToVideo => "Text+Image-to-Video (TI2V)",
        }
    }

    /// Check if this mode needs an uploaded image asset
    pub fn requires_asset(&self) -> bool {
        matches!(self, BenchmarkMode::TextImageToVideo)
    }

    /// Parse a mode selector (`t2v`, `ti2v`, or `all`) into a list of modes
    pub fn parse_selector(selector: &str) -> Result<Vec<BenchmarkMode>> {
        match selector.trim().to_ascii_lowercase().as_str() {
            "t2v" => Ok(vec![BenchmarkMode::TextToVideo]),
            "ti2v" => Ok(vec![BenchmarkMode::TextImageToVideo]),
            "all" | "both" => Ok(BenchmarkMode::ALL.to_vec()),
            other => Err(VidBenchError::ConfigError(format!(
                "Unknown mode '{}' (expected t2v, ti2v, or all)",
                other
            ))),
        }
    }
}

impl fmt::Display for BenchmarkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One entry of the configuration catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Catalog name, e.g. `5s_8steps`
    pub name: String,
    /// Number of frames to generate
    pub frames: u32,
    /// Number of sampler steps
    pub steps: u32,
    /// Length of the produced clip in seconds
    pub duration_sec: f64,
}

impl Configuration {
    pub fn new(name: impl Into<String>, frames: u32, steps: u32, duration_sec: f64) -> Self {
        Self {
            name: name.into(),
            frames,
            steps,
            duration_sec,
        }
    }

    /// Mode-qualified name used in logs and reports, e.g. `t2v_5s_8steps`
    pub fn qualified_name(&self, mode: BenchmarkMode) -> String {
        format!("{}_{}", mode.tag(), self.name)
    }

    /// The default catalog: 5 s and 10 s clips at 8 and 10 steps
    pub fn default_catalog() -> Vec<Configuration> {
        vec![
            Configuration::new("5s_8steps", 121, 8, 5.0),
            Configuration::new("5s_10steps", 121, 10, 5.0),
            Configuration::new("10s_8steps", 241, 8, 10.0),
            Configuration::new("10s_10steps", 241, 10, 10.0),
        ]
    }
}

/// Generation and output geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geometry {
    /// Resolution the model generates at (must be divisible by 32)
    pub generation: Resolution,
    /// Resolution the decoded frames are upscaled to
    pub output: Resolution,
    /// Output frame rate
    pub fps: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            generation: Resolution::new(576, 1024),
            output: Resolution::new(1080, 1920),
            fps: 24,
        }
    }
}

/// Prompt text used by the graph templates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    /// Positive prompt for text-to-video runs
    pub text_to_video: String,
    /// Positive prompt for text+image-to-video runs (describes motion only)
    pub text_image_to_video: String,
    /// Negative prompt shared by both modes
    pub negative: String,
}

impl Prompts {
    /// Positive prompt for a mode
    pub fn positive_for(&self, mode: BenchmarkMode) -> &str {
        match mode {
            BenchmarkMode::TextToVideo => &self.text_to_video,
            BenchmarkMode::TextImageToVideo => &self.text_image_to_video,
        }
    }
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            text_to_video: "Cinematic portrait, shallow depth of field. A softly lit indoor setting with warm golden hour light streaming through a window, casting gentle shadows. A young woman with flowing dark hair stands in three-quarter profile, her expression contemplative and serene. She slowly turns her head toward the camera, her hair catching the light as it moves, eyes meeting the lens with quiet intensity. The camera remains steady on a tripod, framing her from shoulders up. Soft ambient room tone with the faint rustle of fabric as she moves.".to_string(),
            text_image_to_video: "The subject's hair begins to drift gently as if touched by a soft breeze, individual strands catching the existing light. Her head turns slowly and smoothly toward the camera, chin lifting slightly. Eyes blink naturally, lips part subtly. The ambient lighting shifts almost imperceptibly as she moves. Soft rustling of hair and fabric, quiet breathing.".to_string(),
            negative: "blurry, low quality, distorted, artifacts, static, frozen, text, watermark, oversaturated, underexposed, grainy, pixelated, unnatural motion, jittery".to_string(),
        }
    }
}

/// Model files and sampler parameters baked into every graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Base model checkpoint (also provides the video VAE and the audio VAE)
    pub checkpoint: String,
    /// Text encoder weights
    pub text_encoder: String,
    /// Text encoder token limit
    pub text_encoder_max_length: u32,
    /// Compile backend for the model wrapper
    pub compile_backend: String,
    /// Classifier-free guidance scale
    pub cfg: f64,
    /// Sampler algorithm
    pub sampler_name: String,
    /// Noise schedule
    pub scheduler: String,
    /// Denoise strength
    pub denoise: f64,
    /// Image conditioning strength for image-to-video runs
    pub image_strength: f64,
    /// Contrast factor applied to decoded frames in image-to-video runs
    pub contrast_factor: f64,
    /// Upscale interpolation method
    pub upscale_method: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            checkpoint: "ltx-2-19b-distilled.safetensors".to_string(),
            text_encoder: "gemma-3-12b-it-qat-q4_0-unquantized/model-00001-of-00005.safetensors"
                .to_string(),
            text_encoder_max_length: 1024,
            compile_backend: "inductor".to_string(),
            cfg: 2.0,
            sampler_name: "ddim".to_string(),
            scheduler: "ddim_uniform".to_string(),
            denoise: 1.0,
            image_strength: 1.0,
            contrast_factor: 0.8,
            upscale_method: "lanczos".to_string(),
        }
    }
}

/// Suite configuration structure containing all benchmark parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Base URL of the generation server
    pub server: String,
    /// Where the JSON results artifact is written
    pub output_path: PathBuf,
    /// Modes to benchmark, in order
    pub modes: Vec<BenchmarkMode>,
    /// Optional conditioning image for image-to-video runs
    pub image_path: Option<PathBuf>,
    /// Warm-up runs per configuration (first one absorbs compilation)
    pub warmup_runs: usize,
    /// Timed runs per configuration after warm-up
    pub timed_runs: usize,
    /// Seed used for every warm-up run
    pub warmup_seed: u64,
    /// Deadline for a single job to reach a terminal state
    pub monitor_timeout: Duration,
    /// Generation and output geometry
    pub geometry: Geometry,
    /// Prompt text
    pub prompts: Prompts,
    /// Model files and sampler parameters
    pub model: ModelSettings,
    /// Configuration catalog
    pub catalog: Vec<Configuration>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            output_path: PathBuf::from(RESULTS_FILE),
            modes: BenchmarkMode::ALL.to_vec(),
            image_path: None,
            warmup_runs: 3,
            timed_runs: 3,
            warmup_seed: 42,
            monitor_timeout: Duration::from_secs(30 * 60),
            geometry: Geometry::default(),
            prompts: Prompts::default(),
            model: ModelSettings::default(),
            catalog: Configuration::default_catalog(),
        }
    }
}

impl SuiteConfig {
    /// Create a new suite configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        let server = url::Url::parse(&self.server).map_err(|e| {
            VidBenchError::ConfigError(format!("Invalid server URL '{}': {}", self.server, e))
        })?;
        if !matches!(server.scheme(), "http" | "https") {
            return Err(VidBenchError::ConfigError(format!(
                "Server URL must use http or https: {}",
                self.server
            )));
        }

        if self.modes.is_empty() {
            return Err(VidBenchError::ConfigError(
                "At least one benchmark mode must be selected".to_string(),
            ));
        }

        let generation = self.geometry.generation;
        if !generation.is_aligned_to(RESOLUTION_BLOCK) {
            return Err(VidBenchError::ConfigError(format!(
                "Generation resolution {} must be divisible by {}",
                generation, RESOLUTION_BLOCK
            )));
        }

        if self.geometry.output.width == 0 || self.geometry.output.height == 0 {
            return Err(VidBenchError::ConfigError(
                "Output resolution must be non-zero".to_string(),
            ));
        }

        if self.geometry.fps == 0 {
            return Err(VidBenchError::ConfigError(
                "Frame rate must be greater than 0".to_string(),
            ));
        }

        // Timed seeds are drawn from the same range
        if self.warmup_seed > u64::from(u32::MAX) {
            return Err(VidBenchError::ConfigError(format!(
                "Warm-up seed {} exceeds {}",
                self.warmup_seed,
                u32::MAX
            )));
        }

        // The compile-overhead estimate needs the first warm-up plus at least one more
        if self.warmup_runs < 2 {
            return Err(VidBenchError::ConfigError(format!(
                "At least 2 warm-up runs are required (got {})",
                self.warmup_runs
            )));
        }

        if self.timed_runs == 0 {
            return Err(VidBenchError::ConfigError(
                "Timed run count must be greater than 0".to_string(),
            ));
        }

        if self.monitor_timeout.is_zero() {
            return Err(VidBenchError::ConfigError(
                "Monitor timeout must be greater than 0".to_string(),
            ));
        }

        if self.catalog.is_empty() {
            return Err(VidBenchError::ConfigError(
                "Configuration catalog is empty".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for entry in &self.catalog {
            if entry.frames == 0 || entry.steps == 0 {
                return Err(VidBenchError::ConfigError(format!(
                    "Configuration '{}' must have frames > 0 and steps > 0",
                    entry.name
                )));
            }
            if !(entry.duration_sec > 0.0) {
                return Err(VidBenchError::ConfigError(format!(
                    "Configuration '{}' must have a positive duration",
                    entry.name
                )));
            }
            if !names.insert(entry.name.as_str()) {
                return Err(VidBenchError::ConfigError(format!(
                    "Duplicate configuration name: {}",
                    entry.name
                )));
            }
        }

        Ok(())
    }

    /// Set the server URL
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    /// Set the results artifact path
    pub fn with_output_path(mut self, path: PathBuf) -> Self {
        self.output_path = path;
        self
    }

    /// Set the modes to benchmark
    pub fn with_modes(mut self, modes: Vec<BenchmarkMode>) -> Self {
        self.modes = modes;
        self
    }

    /// Set the conditioning image path
    pub fn with_image_path(mut self, path: Option<PathBuf>) -> Self {
        self.image_path = path;
        self
    }

    /// Set the warm-up run count
    pub fn with_warmup_runs(mut self, count: usize) -> Self {
        self.warmup_runs = count;
        self
    }

    /// Set the timed run count
    pub fn with_timed_runs(mut self, count: usize) -> Self {
        self.timed_runs = count;
        self
    }

    /// Set the per-job deadline
    pub fn with_monitor_timeout(mut self, timeout: Duration) -> Self {
        self.monitor_timeout = timeout;
        self
    }

    /// Replace the configuration catalog
    pub fn with_catalog(mut self, catalog: Vec<Configuration>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Load configuration from the standard config file location
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            VidBenchError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            VidBenchError::ConfigError(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to the given path as TOML
    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                VidBenchError::ConfigError(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let content = toml::to_string_pretty(self)?;

        fs::write(path, content).map_err(|e| {
            VidBenchError::ConfigError(format!(
                "Failed to write config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Get the standard configuration file path
    /// Uses $CONFIG_HOME/vidbench/vidbench.toml
    pub fn config_file_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            VidBenchError::ConfigError("Unable to determine config directory".to_string())
        })?;

        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}
