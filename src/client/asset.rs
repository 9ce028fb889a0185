//! Conditioning image staging
//!
//! Image-conditioned runs need an image registered with the server. A
//! user-supplied file is uploaded verbatim; otherwise a gradient
//! placeholder is rendered locally (feature `synth`).

use std::path::Path;

use tracing::{info, warn};

use super::http::EngineClient;
use crate::models::{AssetHandle, Resolution};
use crate::{Result, VidBenchError};

/// Upload name of the synthesized placeholder
pub const PLACEHOLDER_NAME: &str = "benchmark_test.png";

/// Image bytes ready for upload
#[derive(Debug, Clone, PartialEq)]
pub struct AssetSource {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Color of the warm placeholder gradient at `(x, y)`
pub fn gradient_pixel(x: u32, y: u32, size: Resolution) -> [u8; 3] {
    let fy = y as f64 / size.height as f64;
    let fx = x as f64 / size.width as f64;
    [
        (40.0 + fy * 100.0) as u8,
        (30.0 + fy * 80.0) as u8,
        (50.0 + fx * 60.0) as u8,
    ]
}

/// Render the placeholder gradient as PNG bytes
#[cfg(feature = "synth")]
pub fn synthesize_placeholder(size: Resolution) -> Result<Vec<u8>> {
    use std::io::Cursor;

    use image::{ImageFormat, Rgb, RgbImage};

    let img = RgbImage::from_fn(size.width, size.height, |x, y| Rgb(gradient_pixel(x, y, size)));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| VidBenchError::AssetUnavailable(format!("PNG encoding failed: {}", e)))?;
    Ok(bytes)
}

/// Without the `synth` feature there is no way to render a placeholder
#[cfg(not(feature = "synth"))]
pub fn synthesize_placeholder(_size: Resolution) -> Result<Vec<u8>> {
    Err(VidBenchError::AssetUnavailable(
        "no image provided and placeholder synthesis is not compiled in".to_string(),
    ))
}

/// Pick the bytes to upload: the explicit file if it exists, else a placeholder
pub async fn load_or_synthesize(explicit_path: Option<&Path>, size: Resolution) -> Result<AssetSource> {
    if let Some(path) = explicit_path {
        if path.is_file() {
            let bytes = tokio::fs::read(path).await.map_err(|e| {
                VidBenchError::AssetUnavailable(format!("Failed to read {}: {}", path.display(), e))
            })?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| PLACEHOLDER_NAME.to_string());
            return Ok(AssetSource { file_name, bytes });
        }
        warn!(path = %path.display(), "image not found, using generated placeholder");
    }

    Ok(AssetSource {
        file_name: PLACEHOLDER_NAME.to_string(),
        bytes: synthesize_placeholder(size)?,
    })
}

/// Registers the conditioning image with the server
#[derive(Debug)]
pub struct AssetStager<'a> {
    client: &'a EngineClient,
    size: Resolution,
}

impl<'a> AssetStager<'a> {
    /// `size` is the placeholder resolution (the generation resolution)
    pub fn new(client: &'a EngineClient, size: Resolution) -> Self {
        Self { client, size }
    }

    /// Upload the explicit image or a placeholder and return its handle
    pub async fn stage(&self, explicit_path: Option<&Path>) -> Result<AssetHandle> {
        let source = load_or_synthesize(explicit_path, self.size).await?;
        let handle = self
            .client
            .upload_asset(&source.file_name, source.bytes)
            .await?;
        info!(asset = %handle, "conditioning image staged");
        Ok(handle)
    }
}
