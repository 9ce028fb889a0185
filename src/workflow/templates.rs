//! Graph templates for the two benchmark modes
//!
//! Both modes share the model-loading prefix and the decode/mux suffix.
//! They differ in how the sampler's latent is built: text-to-video starts
//! from an empty video latent, text+image-to-video fuses an uploaded image
//! with the text conditioning.

use crate::config::{BenchmarkMode, Geometry, ModelSettings, Prompts, SuiteConfig};
use crate::models::AssetHandle;
use crate::{Result, VidBenchError};

use super::graph::{GraphBuilder, Inputs, NodeRef, WorkflowGraph};
use super::slots::*;

/// Per-job parameters for a template
#[derive(Debug, Clone, Copy)]
pub struct JobParams<'a> {
    pub mode: BenchmarkMode,
    pub frames: u32,
    pub steps: u32,
    pub seed: u64,
    /// Uploaded conditioning image, required for image-conditioned runs
    pub asset: Option<&'a AssetHandle>,
}

/// Builds execution graphs from the suite's fixed settings
#[derive(Debug, Clone, Copy)]
pub struct GraphTemplate<'a> {
    geometry: &'a Geometry,
    prompts: &'a Prompts,
    model: &'a ModelSettings,
}

impl<'a> GraphTemplate<'a> {
    pub fn new(geometry: &'a Geometry, prompts: &'a Prompts, model: &'a ModelSettings) -> Self {
        Self {
            geometry,
            prompts,
            model,
        }
    }

    pub fn from_suite(config: &'a SuiteConfig) -> Self {
        Self::new(&config.geometry, &config.prompts, &config.model)
    }

    /// Output filename prefix for a job
    pub fn filename_prefix(mode: BenchmarkMode, frames: u32, steps: u32) -> String {
        format!("bench_{}_{}f_{}s", mode.tag(), frames, steps)
    }

    /// Build a fully-resolved graph for one job
    pub fn build(&self, params: JobParams<'_>) -> Result<WorkflowGraph> {
        let asset = if params.mode.requires_asset() {
            Some(params.asset.ok_or_else(|| {
                VidBenchError::ConfigError(format!(
                    "{} requires an uploaded image",
                    params.mode.description()
                ))
            })?)
        } else {
            None
        };

        let seed = i64::try_from(params.seed).map_err(|_| {
            VidBenchError::ConfigError(format!("Seed {} does not fit the sampler's range", params.seed))
        })?;

        let model = self.model;
        let geometry = self.geometry;
        let mut g = GraphBuilder::new();

        // Shared prefix
        let checkpoint = g.add::<CheckpointLoader>(
            "1",
            Inputs::new().with("ckpt_name", model.checkpoint.as_str()),
        );
        let compiled = g.add::<CompileModel>(
            "1b",
            Inputs::new()
                .with("model", checkpoint.output(CheckpointSlot::Model))
                .with("backend", model.compile_backend.as_str()),
        );
        let text_encoder = g.add::<TextEncoderLoader>(
            "2",
            Inputs::new()
                .with("gemma_path", model.text_encoder.as_str())
                .with("ltxv_path", model.checkpoint.as_str())
                .with("max_length", model.text_encoder_max_length),
        );
        let audio_vae = g.add::<AudioVaeLoader>(
            "3",
            Inputs::new().with("ckpt_name", model.checkpoint.as_str()),
        );
        let audio_latent = g.add::<EmptyLatentAudio>(
            "5",
            Inputs::new()
                .with("frames_number", params.frames)
                .with("frame_rate", geometry.fps)
                .with("batch_size", 1u32)
                .with("audio_vae", audio_vae.output(AudioVaeSlot::AudioVae)),
        );
        let positive = g.add::<TextEncode>(
            "7",
            Inputs::new()
                .with("text", self.prompts.positive_for(params.mode))
                .with("clip", text_encoder.output(ClipSlot::Clip)),
        );
        let negative = g.add::<TextEncode>(
            "8",
            Inputs::new()
                .with("text", self.prompts.negative.as_str())
                .with("clip", text_encoder.output(ClipSlot::Clip)),
        );

        // Latent construction: (conditioning pair, video latent, concat node id)
        let (cond_positive, cond_negative, video_latent, concat_id) = match asset {
            None => {
                let empty = g.add::<EmptyLatentVideo>(
                    "9",
                    Inputs::new()
                        .with("width", geometry.generation.width)
                        .with("height", geometry.generation.height)
                        .with("length", params.frames)
                        .with("batch_size", 1u32),
                );
                (
                    positive.output(ConditioningSlot::Conditioning),
                    negative.output(ConditioningSlot::Conditioning),
                    empty.output(EmptyLatentVideoSlot::Latent),
                    "6",
                )
            }
            Some(asset) => {
                let image = g.add::<LoadImage>("4", Inputs::new().with("image", asset.as_str()));
                let fused = g.add::<ImageToVideo>(
                    "9",
                    Inputs::new()
                        .with("positive", positive.output(ConditioningSlot::Conditioning))
                        .with("negative", negative.output(ConditioningSlot::Conditioning))
                        .with("vae", checkpoint.output(CheckpointSlot::Vae))
                        .with("image", image.output(LoadImageSlot::Image))
                        .with("width", geometry.generation.width)
                        .with("height", geometry.generation.height)
                        .with("length", params.frames)
                        .with("batch_size", 1u32)
                        .with("strength", model.image_strength),
                );
                (
                    fused.output(ImageToVideoSlot::Positive),
                    fused.output(ImageToVideoSlot::Negative),
                    fused.output(ImageToVideoSlot::Latent),
                    "10a",
                )
            }
        };

        let conditioning = g.add::<FrameRateConditioning>(
            "9b",
            Inputs::new()
                .with("positive", cond_positive)
                .with("negative", cond_negative)
                .with("frame_rate", geometry.fps),
        );
        let av_latent = g.add::<ConcatAvLatent>(
            concat_id,
            Inputs::new()
                .with("video_latent", video_latent)
                .with("audio_latent", audio_latent.output(LatentSlot::Latent)),
        );

        // Shared suffix
        let sampled = g.add::<Sampler>(
            "10",
            Inputs::new()
                .with("seed", seed)
                .with("steps", params.steps)
                .with("cfg", model.cfg)
                .with("sampler_name", model.sampler_name.as_str())
                .with("scheduler", model.scheduler.as_str())
                .with("denoise", model.denoise)
                .with("model", compiled.output(ModelSlot::Model))
                .with("positive", conditioning.output(ConditioningPairSlot::Positive))
                .with("negative", conditioning.output(ConditioningPairSlot::Negative))
                .with("latent_image", av_latent.output(LatentSlot::Latent)),
        );
        let separated = g.add::<SeparateAvLatent>(
            "11",
            Inputs::new().with("av_latent", sampled.output(LatentSlot::Latent)),
        );
        let decoded = g.add::<VaeDecode>(
            "12",
            Inputs::new()
                .with("samples", separated.output(SeparateAvSlot::Video))
                .with("vae", checkpoint.output(CheckpointSlot::Vae)),
        );

        let (frames, scale_id): (NodeRef, &str) = if asset.is_some() {
            let contrast = g.add::<AdjustContrast>(
                "12b",
                Inputs::new()
                    .with("images", decoded.output(ImageSlot::Image))
                    .with("factor", model.contrast_factor),
            );
            (contrast.output(ImageSlot::Image), "12c")
        } else {
            (decoded.output(ImageSlot::Image), "12b")
        };

        let upscaled = g.add::<ImageScale>(
            scale_id,
            Inputs::new()
                .with("upscale_method", model.upscale_method.as_str())
                .with("width", geometry.output.width)
                .with("height", geometry.output.height)
                .with("crop", "disabled")
                .with("image", frames),
        );
        let audio = g.add::<AudioVaeDecode>(
            "13",
            Inputs::new()
                .with("samples", separated.output(SeparateAvSlot::Audio))
                .with("audio_vae", audio_vae.output(AudioVaeSlot::AudioVae)),
        );
        let video = g.add::<CreateVideo>(
            "14",
            Inputs::new()
                .with("fps", geometry.fps)
                .with("images", upscaled.output(ImageSlot::Image))
                .with("audio", audio.output(AudioSlot::Audio)),
        );
        g.add::<SaveVideo>(
            "15",
            Inputs::new()
                .with(
                    "filename_prefix",
                    Self::filename_prefix(params.mode, params.frames, params.steps),
                )
                .with("format", "mp4")
                .with("codec", "h264")
                .with("video", video.output(VideoSlot::Video)),
        );

        Ok(g.build())
    }
}
