//! Image payload loading for the captioner.

use std::path::Path;

use base64::Engine;
use image::codecs::png::PngEncoder;
use image::{GenericImageView, ImageFormat};

use crate::types::{CritiqueError, CritiqueResult, Service};

const FALLBACK_MIME: &str = "application/octet-stream";

/// Binary image contents plus the MIME type sent alongside them.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl ImagePayload {
    /// Read an image file. An unreadable image counts as a captioner failure.
    pub async fn from_file(path: &Path) -> CritiqueResult<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            CritiqueError::remote(
                Service::Captioner,
                format!("cannot read image {}: {e}", path.display()),
            )
        })?;

        if bytes.is_empty() {
            return Err(CritiqueError::remote(
                Service::Captioner,
                format!("image {} is empty", path.display()),
            ));
        }

        let mime = detect_mime(&bytes, path);
        if !is_supported_format(path) {
            tracing::warn!(
                "Image {} has an unrecognised extension, sending as {mime}",
                path.display()
            );
        }
        Ok(Self { bytes, mime })
    }

    /// Wrap in-memory bytes.
    pub fn from_bytes(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }

    /// Shrink the image so neither side exceeds `max_dim`, re-encoded as PNG.
    ///
    /// Images already within bounds are returned unchanged.
    pub fn downscaled(self, max_dim: u32) -> CritiqueResult<Self> {
        let img = image::load_from_memory(&self.bytes).map_err(|e| {
            CritiqueError::remote(Service::Captioner, format!("cannot decode image: {e}"))
        })?;

        let (w, h) = img.dimensions();
        if w <= max_dim && h <= max_dim {
            return Ok(self);
        }

        let resized = img.resize(max_dim, max_dim, image::imageops::FilterType::Lanczos3);
        let mut buf = Vec::new();
        resized
            .write_with_encoder(PngEncoder::new(&mut buf))
            .map_err(|e| {
                CritiqueError::remote(Service::Captioner, format!("cannot encode image: {e}"))
            })?;

        tracing::debug!(
            "Downscaled image from {w}x{h} to {}x{} ({} bytes)",
            resized.width(),
            resized.height(),
            buf.len()
        );
        Ok(Self {
            bytes: buf,
            mime: "image/png".to_string(),
        })
    }

    /// Encode as a `data:` URI for JSON transport.
    pub fn to_data_uri(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        format!("data:{};base64,{encoded}", self.mime)
    }
}

/// Sniff the MIME type from the bytes, falling back to the file extension.
pub fn detect_mime(bytes: &[u8], path: &Path) -> String {
    let format = image::guess_format(bytes)
        .ok()
        .or_else(|| ImageFormat::from_path(path).ok());

    match format {
        Some(fmt) => fmt.to_mime_type().to_string(),
        None => FALLBACK_MIME.to_string(),
    }
}

/// Check if a file path points to a supported image format.
pub fn is_supported_format(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    matches!(
        ext.as_str(),
        "png" | "jpg" | "jpeg" | "webp" | "gif" | "bmp" | "tiff" | "tif"
    )
}
