//! Format dispatch: pick the extractor for an upload and run it.
//!
//! The dispatch table is the closed [`DocumentFormat`] enum. Unknown
//! extensions are a caller error; everything past dispatch degrades to a
//! placeholder result instead of failing.

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::format::{DocumentFormat, Strategy};
use crate::output::ExtractionResult;
use crate::pipeline::bridge;
use crate::pipeline::convert::{ConvertExtractor, Converter};
use crate::pipeline::llm::{resolve_vision_model, VisionModel};
use crate::pipeline::pdf::PdfExtractor;
use crate::pipeline::slides::SlideExtractor;
use crate::pipeline::text::TextExtractor;
use crate::pipeline::vision::{self, VisionExtractor};
use crate::pipeline::Extractor;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Entry point of the document pipeline.
///
/// Construct once and share; it holds no per-request state.
///
/// ```rust,no_run
/// use docingest::{DocumentProcessor, IngestConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let processor = DocumentProcessor::new(IngestConfig::default());
/// let result = processor.extract("/tmp/upload-1234".as_ref(), "Q3 review.pptx").await?;
/// println!("{} chunks over {} slides", result.chunks.len(), result.page_count);
/// # Ok(())
/// # }
/// ```
pub struct DocumentProcessor {
    config: IngestConfig,
    vision: OnceLock<Arc<dyn VisionModel>>,
}

impl DocumentProcessor {
    pub fn new(config: IngestConfig) -> Self {
        Self {
            config,
            vision: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Extract `path`, choosing the strategy from the extension of
    /// `file_name` (case-insensitive).
    ///
    /// # Errors
    /// [`IngestError::UnsupportedFormat`] for an unknown extension. Every
    /// other failure, including a vision provider that cannot be resolved,
    /// is reported inside the returned result.
    pub async fn extract(
        &self,
        path: &Path,
        file_name: &str,
    ) -> Result<ExtractionResult, IngestError> {
        let format = DocumentFormat::from_file_name(file_name).ok_or_else(|| {
            IngestError::UnsupportedFormat {
                file_name: file_name.to_string(),
                extension: Path::new(file_name)
                    .extension()
                    .map(|e| e.to_string_lossy().to_lowercase())
                    .unwrap_or_default(),
            }
        })?;

        info!(file = %file_name, format = %format, "Extracting document");

        let start = Instant::now();
        let result = match self.extractor_for(format) {
            Ok(extractor) => extractor.extract(path, file_name).await,
            Err(e) => {
                warn!(file = %file_name, error = %e, "No vision model available");
                vision::failure(file_name, &e)
            }
        };
        info!(
            file = %file_name,
            chunks = result.chunks.len(),
            pages = result.page_count,
            degraded = result.error().is_some(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Extraction finished"
        );
        Ok(result)
    }

    /// Synchronous wrapper around [`DocumentProcessor::extract`].
    ///
    /// Safe to call from inside or outside a tokio runtime.
    pub fn extract_sync(
        &self,
        path: &Path,
        file_name: &str,
    ) -> Result<ExtractionResult, IngestError> {
        bridge::block_on(self.extract(path, file_name))?
    }

    fn extractor_for(&self, format: DocumentFormat) -> Result<Box<dyn Extractor>, IngestError> {
        let c = &self.config;
        let extractor: Box<dyn Extractor> = match format.strategy() {
            Strategy::Pdf => Box::new(PdfExtractor::new(c.pdfium_library_path.clone())),
            Strategy::Slides => Box::new(SlideExtractor),
            Strategy::Text => Box::new(TextExtractor::new(c.text_window_chars)),
            Strategy::Converted => Box::new(ConvertExtractor::new(
                Converter::from_config(c),
                c.pdfium_library_path.clone(),
                format,
            )
            .with_work_root(c.conversion_work_dir.clone())),
            Strategy::Vision => Box::new(VisionExtractor::new(
                self.vision_model()?,
                c.vision_prompt.clone(),
            )),
        };
        Ok(extractor)
    }

    fn vision_model(&self) -> Result<Arc<dyn VisionModel>, IngestError> {
        if let Some(model) = self.vision.get() {
            return Ok(Arc::clone(model));
        }
        let model = resolve_vision_model(&self.config)?;
        debug!("Vision model resolved");
        Ok(Arc::clone(self.vision.get_or_init(|| model)))
    }
}

impl std::fmt::Debug for DocumentProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentProcessor")
            .field("config", &self.config)
            .field("vision_resolved", &self.vision.get().is_some())
            .finish()
    }
}
