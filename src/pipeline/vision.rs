//! Image text extraction through a streaming vision model.
//!
//! ## Flow
//!
//! ```text
//! validate (header decode) ──▶ read bytes ──▶ encode ──▶ chat_stream ──▶ collect
//! ```
//!
//! Any failure along the way, including an undecodable image, becomes a
//! single placeholder chunk.

use crate::error::ExtractError;
use crate::output::{metadata, ExtractionResult};
use crate::pipeline::bridge;
use crate::pipeline::encode::encode_image;
use crate::pipeline::llm::{collect_text, VisionModel};
use crate::pipeline::Extractor;
use crate::prompts::{self, IMAGE_TEXT_PROMPT};
use async_trait::async_trait;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Extractor for `.png`, `.jpg` and `.jpeg` uploads.
#[derive(Clone)]
pub struct VisionExtractor {
    model: Arc<dyn VisionModel>,
    prompt: String,
}

/// Successful read of one image.
struct ImageText {
    text: String,
    width: u32,
    height: u32,
    mime_type: &'static str,
}

impl VisionExtractor {
    /// `prompt` overrides [`IMAGE_TEXT_PROMPT`].
    pub fn new(model: Arc<dyn VisionModel>, prompt: Option<String>) -> Self {
        Self {
            model,
            prompt: prompt.unwrap_or_else(|| IMAGE_TEXT_PROMPT.to_string()),
        }
    }

    /// Blocking variant of [`Extractor::extract`] for synchronous callers.
    ///
    /// Safe to call from inside a tokio runtime; see [`bridge::block_on`].
    pub fn extract_sync(&self, path: &Path, file_name: &str) -> ExtractionResult {
        match bridge::block_on(self.extract(path, file_name)) {
            Ok(result) => result,
            Err(e) => {
                warn!(file = %file_name, error = %e, "Could not drive vision call");
                failure(file_name, &e)
            }
        }
    }

    async fn read(&self, path: &Path, file_name: &str) -> Result<ImageText, ExtractError> {
        let owned: PathBuf = path.to_path_buf();
        let (width, height, bytes) = tokio::task::spawn_blocking(move || {
            let (w, h) = image_dimensions(&owned).map_err(ExtractError::InvalidImage)?;
            let bytes = std::fs::read(&owned).map_err(|source| ExtractError::Io {
                path: owned.clone(),
                source,
            })?;
            Ok::<_, ExtractError>((w, h, bytes))
        })
        .await
        .map_err(|e| ExtractError::Task(format!("image task panicked: {}", e)))??;
        info!(file = %file_name, width, height, "Image validated");

        let image = encode_image(&bytes, file_name);
        let mime_type = image.mime_type;
        let stream = self.model.chat_stream(&self.prompt, vec![image]).await?;
        let text = collect_text(stream).await?;
        info!(file = %file_name, chars = text.chars().count(), "Text read from image");

        Ok(ImageText {
            text,
            width,
            height,
            mime_type,
        })
    }
}

/// Pixel size from the image header. The format is sniffed from the content;
/// upload paths may carry no extension.
fn image_dimensions(path: &Path) -> Result<(u32, u32), image::ImageError> {
    Ok(image::ImageReader::open(path)?
        .with_guessed_format()?
        .into_dimensions()?)
}

pub(crate) fn failure(file_name: &str, error: &dyn std::fmt::Display) -> ExtractionResult {
    ExtractionResult::placeholder(
        prompts::processing_failed("Image", file_name, error),
        metadata([("format", json!("Image")), ("error", json!(error.to_string()))]),
    )
}

#[async_trait]
impl Extractor for VisionExtractor {
    async fn extract(&self, path: &Path, file_name: &str) -> ExtractionResult {
        match self.read(path, file_name).await {
            Ok(img) => {
                let text = if prompts::is_no_text_marker(&img.text) {
                    prompts::image_without_text(file_name)
                } else {
                    img.text
                };
                ExtractionResult::placeholder(
                    text,
                    metadata([
                        ("format", json!("Image")),
                        ("image_size", json!(format!("{}x{}", img.width, img.height))),
                        ("mime_type", json!(img.mime_type)),
                    ]),
                )
            }
            Err(e) => {
                warn!(file = %file_name, error = %e, "Image extraction failed");
                failure(file_name, &e)
            }
        }
    }
}
