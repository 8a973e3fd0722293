//! # docingest
//!
//! Turn uploaded documents into page-level text chunks, and drive a cloud
//! database's start/stop lifecycle through a retrying executor.
//!
//! ## Document pipeline
//!
//! ```text
//! upload (path + original file name)
//!  │
//!  ├─ pdf            pdfium page text            (spawn_blocking)
//!  ├─ pptx           slide XML straight from the zip package
//!  ├─ doc/docx/ppt   external converter → PDF → pdfium, 60 s limit
//!  ├─ png/jpg/jpeg   streaming vision model
//!  └─ txt/md         1000-character windows
//!  │
//!  ▼
//! ExtractionResult { chunks, page_count, metadata }
//! ```
//!
//! Extraction never fails once a format is recognised: timeouts, missing
//! converter output, corrupt images and provider errors each produce a
//! single placeholder chunk with `metadata.error` set.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docingest::{DocumentProcessor, IngestConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let processor = DocumentProcessor::new(IngestConfig::default());
//!     let result = processor.extract("uploads/3f9c".as_ref(), "minutes.docx").await?;
//!     for chunk in &result.chunks {
//!         println!("--- page {} ---\n{}", chunk.page_number, chunk.text);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Remote operations
//!
//! [`remote::executor::Executor`] retries any blocking fallible call with
//! exponential backoff and jitter, backing off harder when the error looks
//! like throttling. [`remote::lifecycle::LifecycleOperator`] uses it to
//! locate, start and stop a database, re-reading the remote state before
//! every transition.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docingest` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod format;
pub mod output;
pub mod pipeline;
pub mod processor;
pub mod prompts;
pub mod remote;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{IngestConfig, IngestConfigBuilder};
pub use error::{ExtractError, IngestError, LifecycleError, VisionError};
pub use format::DocumentFormat;
pub use output::{Chunk, ExtractionResult, Metadata};
pub use pipeline::llm::{ImageInput, TextStream, VisionModel};
pub use processor::DocumentProcessor;
pub use remote::backoff::RetryPolicy;
pub use remote::executor::Executor;
pub use remote::lifecycle::{LifecycleOperator, OperationResponse, OperationStatus};
