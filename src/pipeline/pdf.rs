//! PDF text extraction via pdfium.
//!
//! pdfium wraps a C++ library with thread-local state, so every document is
//! opened and read inside `spawn_blocking` with its own binding.

use crate::error::ExtractError;
use crate::output::{metadata, Chunk, ExtractionResult};
use crate::pipeline::Extractor;
use crate::prompts;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the pdfium shared library (file or directory).
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_LIB_PATH";

/// Text chunks of a PDF and its total page count.
#[derive(Debug, Clone)]
pub struct PdfText {
    pub chunks: Vec<Chunk>,
    pub page_count: usize,
}

/// Build chunks from per-page texts, numbering pages from 1.
///
/// Whitespace-only pages produce no chunk but still count toward
/// `page_count`.
pub fn chunks_from_pages<I, S>(pages: I) -> PdfText
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut page_count = 0;
    let chunks = pages
        .into_iter()
        .enumerate()
        .filter_map(|(idx, text)| {
            page_count = idx + 1;
            Chunk::new(idx + 1, text.as_ref())
        })
        .collect();
    PdfText { chunks, page_count }
}

/// Read every page of `path` without blocking the async runtime.
pub async fn read_pdf(path: &Path, library: Option<&Path>) -> Result<PdfText, ExtractError> {
    let path = path.to_path_buf();
    let library = library.map(Path::to_path_buf);

    tokio::task::spawn_blocking(move || read_pdf_blocking(&path, library.as_deref()))
        .await
        .map_err(|e| ExtractError::Task(format!("PDF task panicked: {}", e)))?
}

/// Blocking implementation of [`read_pdf`].
pub fn read_pdf_blocking(path: &Path, library: Option<&Path>) -> Result<PdfText, ExtractError> {
    let pdfium = bind_pdfium(library)?;

    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| ExtractError::Pdf(format!("{}: {:?}", path.display(), e)))?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut texts = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let text = match page.text() {
            Ok(t) => t.all(),
            Err(e) => {
                warn!(page = idx + 1, "No text layer: {:?}", e);
                String::new()
            }
        };
        debug!(page = idx + 1, chars = text.len(), "Page text read");
        texts.push(text);
    }

    Ok(chunks_from_pages(texts))
}

/// Bind pdfium, trying in order: the explicit path, `PDFIUM_LIB_PATH`,
/// the working directory, then the system library.
fn bind_pdfium(explicit: Option<&Path>) -> Result<Pdfium, ExtractError> {
    let configured = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(PDFIUM_LIB_ENV).map(PathBuf::from));

    if let Some(path) = configured {
        let lib = if path.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&path)
        } else {
            path.clone()
        };
        return Pdfium::bind_to_library(&lib)
            .map(Pdfium::new)
            .map_err(|e| ExtractError::PdfiumBinding(format!("{}: {:?}", lib.display(), e)));
    }

    match Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./")) {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(local_err) => match Pdfium::bind_to_system_library() {
            Ok(bindings) => Ok(Pdfium::new(bindings)),
            Err(_) => Err(ExtractError::PdfiumBinding(format!("{:?}", local_err))),
        },
    }
}

/// Extractor for `.pdf` uploads.
#[derive(Debug, Clone, Default)]
pub struct PdfExtractor {
    library: Option<PathBuf>,
}

impl PdfExtractor {
    pub fn new(library: Option<PathBuf>) -> Self {
        Self { library }
    }
}

#[async_trait]
impl Extractor for PdfExtractor {
    async fn extract(&self, path: &Path, file_name: &str) -> ExtractionResult {
        match read_pdf(path, self.library.as_deref()).await {
            Ok(PdfText { chunks, page_count }) => ExtractionResult {
                chunks,
                page_count,
                metadata: metadata([
                    ("format", json!("PDF")),
                    ("total_pages", json!(page_count)),
                ]),
            },
            Err(e) => {
                warn!(file = %file_name, error = %e, "PDF extraction failed");
                ExtractionResult::placeholder(
                    prompts::processing_failed("PDF", file_name, &e),
                    metadata([("format", json!("PDF")), ("error", json!(e.metadata_tag()))]),
                )
            }
        }
    }
}
