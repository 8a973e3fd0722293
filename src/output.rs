//! Output types produced by the document pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Scalar metadata attached to an [`ExtractionResult`].
///
/// A `BTreeMap` keeps the serialised key order stable across runs.
pub type Metadata = BTreeMap<String, Value>;

/// One extracted unit of text: a PDF page, a slide, or a whole image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 1-indexed page, slide or window number.
    pub page_number: usize,
    /// Trimmed, non-empty text.
    pub text: String,
    /// Random v4 identifier, unique across every chunk ever produced.
    pub chunk_id: Uuid,
}

impl Chunk {
    /// Build a chunk from raw text, trimming surrounding whitespace.
    ///
    /// Returns `None` when nothing but whitespace remains so callers can
    /// skip blank pages with `filter_map`.
    pub fn new(page_number: usize, text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            page_number,
            text: text.to_string(),
            chunk_id: Uuid::new_v4(),
        })
    }
}

/// Result of extracting one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Chunks in page order.
    pub chunks: Vec<Chunk>,
    /// Total logical pages of the source, including pages that yielded no chunk.
    pub page_count: usize,
    /// Format-specific details (`format`, `total_pages`, `error`, …).
    pub metadata: Metadata,
}

impl ExtractionResult {
    /// Build a degraded result carrying a single human-readable chunk.
    ///
    /// Every failure in the document pipeline ends up here: the result has
    /// exactly one chunk and `page_count == 1`.
    pub fn placeholder(text: impl AsRef<str>, metadata: Metadata) -> Self {
        let chunk = Chunk {
            page_number: 1,
            text: text.as_ref().trim().to_string(),
            chunk_id: Uuid::new_v4(),
        };
        Self {
            chunks: vec![chunk],
            page_count: 1,
            metadata,
        }
    }

    /// Attach a metadata entry, builder-style.
    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// `metadata.error`, if the extraction degraded.
    pub fn error(&self) -> Option<&str> {
        self.metadata.get("error").and_then(Value::as_str)
    }

    /// Concatenate all chunk texts separated by blank lines.
    pub fn text(&self) -> String {
        self.chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Build a [`Metadata`] map from `(key, value)` pairs.
pub fn metadata<const N: usize>(entries: [(&str, Value); N]) -> Metadata {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
