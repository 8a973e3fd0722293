//! Error types for the docingest library.
//!
//! Four error types map onto the four failure channels of the crate:
//!
//! * [`IngestError`]: **Fatal** for the caller: the request cannot even be
//!   dispatched (unsupported extension, invalid configuration, no runtime).
//!   Returned as `Err(IngestError)` from [`crate::DocumentProcessor`].
//!
//! * [`ExtractError`]: **Non-fatal**: a single document could not be read.
//!   Never leaves the document pipeline; every variant is rendered into a
//!   placeholder [`crate::output::Chunk`] so downstream consumers always get
//!   a well-formed [`crate::output::ExtractionResult`].
//!
//! * [`VisionError`]: the streaming vision call failed. Folded into
//!   [`ExtractError::Vision`] by the image extractor.
//!
//! * [`LifecycleError`]: the typed reason behind an `"error"` status of an
//!   administrative operation. Its `Display` text is the response message.

use crate::remote::lifecycle::LifecycleState;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by remote collaborators (cloud SDK, client factories).
pub type RemoteError = Box<dyn std::error::Error + Send + Sync>;

/// Fatal errors returned by the document pipeline entry points.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The file extension has no registered extractor.
    #[error("Unsupported file format '{extension}' for '{file_name}'")]
    UnsupportedFormat { file_name: String, extension: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not create the runtime used to drive asynchronous work.
    #[error("Failed to start async runtime: {0}")]
    Runtime(String),

    /// Vision provider could not be created from the environment.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },
}

/// A non-fatal extraction failure for a single document.
///
/// The `Display` text becomes the body of the placeholder chunk, so the
/// messages are written for the person reading the ingested document list.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── File access ───────────────────────────────────────────────────────
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Format parsing ────────────────────────────────────────────────────
    #[error("failed to open PDF: {0}")]
    Pdf(String),

    #[error("failed to bind pdfium library: {0}")]
    PdfiumBinding(String),

    #[error("failed to read presentation: {0}")]
    Presentation(String),

    #[error("invalid image file: {0}")]
    InvalidImage(#[source] image::ImageError),

    // ── External converter ────────────────────────────────────────────────
    #[error("failed to launch converter '{program}': {source}")]
    ConverterLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("converter exited with status {code}: {stderr}")]
    ConversionFailed { code: i32, stderr: String },

    #[error("conversion timed out after {secs}s")]
    ConversionTimeout { secs: u64 },

    #[error("converter did not produce a PDF file")]
    NoPdfProduced,

    // ── Vision ────────────────────────────────────────────────────────────
    #[error(transparent)]
    Vision(#[from] VisionError),

    // ── Catch-all ─────────────────────────────────────────────────────────
    #[error("background task failed: {0}")]
    Task(String),
}

impl ExtractError {
    /// Short machine-readable tag stored under `metadata.error`.
    ///
    /// Timeouts are tagged `"timeout"` so callers can match on them; every
    /// other failure stores its full message.
    pub fn metadata_tag(&self) -> String {
        match self {
            ExtractError::ConversionTimeout { .. } => "timeout".to_string(),
            other => other.to_string(),
        }
    }
}

/// Failure of the streaming text-generation call.
#[derive(Debug, Clone, Error)]
pub enum VisionError {
    /// The provider rejected or failed the request.
    #[error("vision request failed: {0}")]
    Request(String),

    /// The stream broke after it started yielding fragments.
    #[error("vision stream interrupted: {0}")]
    Stream(String),
}

/// Typed reason for an administrative operation that ended in `"error"`.
#[derive(Debug, Error)]
pub enum LifecycleError {
    // ── Configuration ─────────────────────────────────────────────────────
    /// Resource name or container id missing after environment fallback.
    #[error("{name_var} or {container_var} is not set")]
    MissingDefaults {
        name_var: &'static str,
        container_var: &'static str,
    },

    /// The remote client could not be constructed.
    #[error("cloud connection unavailable, check the client configuration: {0}")]
    ClientUnavailable(String),

    // ── Lookup ────────────────────────────────────────────────────────────
    #[error("database '{name}' was not found")]
    NotFound { name: String },

    // ── Preconditions ─────────────────────────────────────────────────────
    #[error("database is already running")]
    AlreadyRunning,

    #[error("database is already stopped")]
    AlreadyStopped,

    /// Current remote state does not allow the requested transition.
    #[error("cannot {action} database in its current state ({state})")]
    InvalidState {
        action: &'static str,
        state: LifecycleState,
    },

    // ── Remote ────────────────────────────────────────────────────────────
    /// A remote call failed after every retry.
    #[error("{action} failed: {detail}")]
    Remote { action: &'static str, detail: String },
}

impl LifecycleError {
    /// Stable snake_case tag exposed in serialised responses.
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleError::MissingDefaults { .. } => "configuration",
            LifecycleError::ClientUnavailable(_) => "client_unavailable",
            LifecycleError::NotFound { .. } => "not_found",
            LifecycleError::AlreadyRunning | LifecycleError::AlreadyStopped => "no_op",
            LifecycleError::InvalidState { .. } => "precondition_failed",
            LifecycleError::Remote { .. } => "remote",
        }
    }
}
