//! Extractors: one strategy per family of document formats.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌──▶ pdf ────────────────────────────┐
//!            ├──▶ slides (zip + DrawingML) ────────┤
//! processor ─┼──▶ text (fixed windows) ────────────┼──▶ ExtractionResult
//!            ├──▶ convert (office → PDF) ──▶ pdf ──┤
//!            └──▶ vision ──▶ encode ──▶ llm ───────┘
//! ```
//!
//! 1. [`pdf`]: page text via pdfium, run inside `spawn_blocking`
//!    (pdfium calls block)
//! 2. [`slides`]: slide text read straight from the OOXML parts
//! 3. [`text`]: plain UTF-8 files split into character windows
//! 4. [`convert`]: external office converter with a hard timeout, then [`pdf`]
//! 5. [`vision`]: image validation, [`encode`], and a streaming [`llm`] call
//! 6. [`bridge`]: drives the async pipeline from synchronous callers
//!
//! Every [`Extractor`] returns an [`ExtractionResult`]; failures become a
//! single placeholder chunk and never propagate.

use crate::output::ExtractionResult;
use async_trait::async_trait;
use std::path::Path;

pub mod bridge;
pub mod convert;
pub mod encode;
pub mod llm;
pub mod pdf;
pub mod slides;
pub mod text;
pub mod vision;

/// Turns one file into chunks.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extract `path`. `file_name` is the name the document was uploaded
    /// under and is used in placeholder texts.
    async fn extract(&self, path: &Path, file_name: &str) -> ExtractionResult;
}
