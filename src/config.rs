//! Configuration types for document ingestion.
//!
//! All pipeline behaviour is controlled through [`IngestConfig`], built via
//! its [`IngestConfigBuilder`].

use crate::error::IngestError;
use crate::pipeline::llm::VisionModel;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a [`crate::DocumentProcessor`].
///
/// # Example
/// ```rust
/// use docingest::IngestConfig;
///
/// let config = IngestConfig::builder()
///     .converter_program("soffice")
///     .conversion_timeout_secs(90)
///     .build()
///     .unwrap();
/// assert_eq!(config.conversion_timeout_secs, 90);
/// ```
#[derive(Clone)]
pub struct IngestConfig {
    /// Executable used to render legacy Office files to PDF. Default: `libreoffice`.
    pub converter_program: String,

    /// Arguments placed before `--outdir <dir> <input>`.
    /// Default: `--headless --convert-to pdf`.
    pub converter_args: Vec<String>,

    /// Hard limit for one conversion, in seconds. Default: 60.
    /// The converter and every process it spawned are killed when the limit is hit.
    pub conversion_timeout_secs: u64,

    /// Parent of the per-conversion scratch directories. If None, the
    /// system temporary directory is used.
    pub conversion_work_dir: Option<PathBuf>,

    /// Explicit path to the pdfium shared library. If None, `PDFIUM_LIB_PATH`,
    /// the working directory and the system library are tried in that order.
    pub pdfium_library_path: Option<PathBuf>,

    /// Pre-constructed vision model. Takes precedence over `provider_name`.
    pub vision: Option<Arc<dyn VisionModel>>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `vision`, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// LLM model identifier. If None, uses `gpt-4.1-nano`.
    pub model: Option<String>,

    /// Custom extraction prompt. If None, uses [`crate::prompts::IMAGE_TEXT_PROMPT`].
    pub vision_prompt: Option<String>,

    /// Sampling temperature for the vision call. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the vision model may generate per image. Default: 4096.
    pub max_tokens: usize,

    /// Characters per chunk for plain-text files. Default: 1000.
    pub text_window_chars: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            converter_program: "libreoffice".to_string(),
            converter_args: vec![
                "--headless".to_string(),
                "--convert-to".to_string(),
                "pdf".to_string(),
            ],
            conversion_timeout_secs: 60,
            conversion_work_dir: None,
            pdfium_library_path: None,
            vision: None,
            provider_name: None,
            model: None,
            vision_prompt: None,
            temperature: 0.1,
            max_tokens: 4096,
            text_window_chars: 1000,
        }
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("converter_program", &self.converter_program)
            .field("converter_args", &self.converter_args)
            .field("conversion_timeout_secs", &self.conversion_timeout_secs)
            .field("conversion_work_dir", &self.conversion_work_dir)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("vision", &self.vision.as_ref().map(|_| "<dyn VisionModel>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("text_window_chars", &self.text_window_chars)
            .finish()
    }
}

impl IngestConfig {
    /// Create a new builder for `IngestConfig`.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn converter_program(mut self, program: impl Into<String>) -> Self {
        self.config.converter_program = program.into();
        self
    }

    pub fn converter_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.converter_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn conversion_timeout_secs(mut self, secs: u64) -> Self {
        self.config.conversion_timeout_secs = secs;
        self
    }

    pub fn conversion_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.conversion_work_dir = Some(dir.into());
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn vision(mut self, model: Arc<dyn VisionModel>) -> Self {
        self.config.vision = Some(model);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn vision_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.vision_prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn text_window_chars(mut self, n: usize) -> Self {
        self.config.text_window_chars = n;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        let c = &self.config;
        if c.converter_program.trim().is_empty() {
            return Err(IngestError::InvalidConfig(
                "converter program must not be empty".into(),
            ));
        }
        if c.conversion_timeout_secs == 0 {
            return Err(IngestError::InvalidConfig(
                "conversion timeout must be ≥ 1 second".into(),
            ));
        }
        if c.text_window_chars == 0 {
            return Err(IngestError::InvalidConfig(
                "text window must be ≥ 1 character".into(),
            ));
        }
        Ok(self.config)
    }
}
