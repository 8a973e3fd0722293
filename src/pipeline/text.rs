//! Plain-text files split into fixed character windows.

use crate::error::ExtractError;
use crate::output::{metadata, Chunk, ExtractionResult};
use crate::pipeline::Extractor;
use crate::prompts;
use async_trait::async_trait;
use serde_json::json;
use std::path::Path;
use tracing::warn;

/// Split `text` into windows of `window` characters.
///
/// Windows are trimmed and blank ones dropped; surviving chunks are
/// numbered consecutively from 1.
pub fn window_chunks(text: &str, window: usize) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(window.max(1))
        .map(|w| w.iter().collect::<String>())
        .filter(|w| !w.trim().is_empty())
        .enumerate()
        .filter_map(|(idx, w)| Chunk::new(idx + 1, &w))
        .collect()
}

/// Extractor for `.txt` and `.md` uploads.
#[derive(Debug, Clone, Copy)]
pub struct TextExtractor {
    window: usize,
}

impl TextExtractor {
    pub fn new(window: usize) -> Self {
        Self { window }
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl Extractor for TextExtractor {
    async fn extract(&self, path: &Path, file_name: &str) -> ExtractionResult {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(source) => {
                let e = ExtractError::Io {
                    path: path.to_path_buf(),
                    source,
                };
                warn!(file = %file_name, error = %e, "Text extraction failed");
                return ExtractionResult::placeholder(
                    prompts::processing_failed("Text", file_name, &e),
                    metadata([("format", json!("Text")), ("error", json!(e.metadata_tag()))]),
                );
            }
        };

        let chunks = window_chunks(&content, self.window);
        ExtractionResult {
            page_count: chunks.len(),
            metadata: metadata([
                ("format", json!("Text")),
                ("total_chars", json!(content.chars().count())),
            ]),
            chunks,
        }
    }
}
