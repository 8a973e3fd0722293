//! Vision model interaction: the streaming text-generation seam.
//!
//! The image extractor only depends on [`VisionModel`]. Production code uses
//! [`ProviderVisionModel`], an adapter over an `edgequake_llm` provider;
//! tests plug in fakes that yield scripted fragments or errors.

use crate::config::IngestConfig;
use crate::error::{IngestError, VisionError};
use async_trait::async_trait;
use edgequake_llm::traits::StreamChunk;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use futures::future;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::Stream;
use tracing::debug;

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Name reported by the factory's last-resort stand-in provider.
const MOCK_PROVIDER: &str = "mock";

/// A lazy, finite sequence of text fragments. Not restartable.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, VisionError>> + Send>>;

/// A base64 image ready to be attached to a vision request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub base64: String,
    pub mime_type: &'static str,
}

impl ImageInput {
    pub fn new(base64: String, mime_type: &'static str) -> Self {
        Self { base64, mime_type }
    }
}

/// Streaming text generation over a prompt and attached images.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Start a generation. Errors before the first fragment are returned
    /// directly; errors mid-stream arrive as stream items.
    async fn chat_stream(
        &self,
        prompt: &str,
        images: Vec<ImageInput>,
    ) -> Result<TextStream, VisionError>;
}

/// Drain a [`TextStream`] into one string, fragments in arrival order.
pub async fn collect_text(mut stream: TextStream) -> Result<String, VisionError> {
    let mut text = String::new();
    let mut fragments = 0usize;
    while let Some(fragment) = stream.next().await {
        text.push_str(&fragment?);
        fragments += 1;
    }
    debug!(fragments, chars = text.chars().count(), "Vision stream drained");
    Ok(text)
}

/// [`VisionModel`] backed by an `edgequake_llm` chat provider.
///
/// Providers that stream chat completions yield one fragment per content
/// delta; reasoning, tool-call and finish events are skipped. Providers
/// without streaming answer through `chat()` and the stream holds a single
/// fragment.
pub struct ProviderVisionModel {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl ProviderVisionModel {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            options: build_options(temperature, max_tokens),
        }
    }
}

#[async_trait]
impl VisionModel for ProviderVisionModel {
    async fn chat_stream(
        &self,
        prompt: &str,
        images: Vec<ImageInput>,
    ) -> Result<TextStream, VisionError> {
        let start = Instant::now();
        let images = images
            .into_iter()
            .map(|img| ImageData::new(img.base64, img.mime_type).with_detail("high"))
            .collect();
        let messages = vec![ChatMessage::user_with_images(prompt, images)];

        if self.provider.supports_tool_streaming() {
            let chunks = self
                .provider
                .chat_with_tools_stream(&messages, &[], None, Some(&self.options))
                .await
                .map_err(|e| VisionError::Request(e.to_string()))?;
            debug!(
                provider = self.provider.name(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Vision stream opened"
            );
            let text = chunks.filter_map(|chunk| {
                future::ready(match chunk {
                    Ok(StreamChunk::Content(fragment)) => Some(Ok(fragment)),
                    Ok(_) => None,
                    Err(e) => Some(Err(VisionError::Stream(e.to_string()))),
                })
            });
            return Ok(Box::pin(text));
        }

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| VisionError::Request(e.to_string()))?;

        debug!(
            provider = self.provider.name(),
            input_tokens = response.prompt_tokens,
            output_tokens = response.completion_tokens,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Vision response received"
        );

        Ok(Box::pin(stream::once(async move { Ok(response.content) })))
    }
}

fn build_options(temperature: f32, max_tokens: usize) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(max_tokens),
        ..Default::default()
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, IngestError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        IngestError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the vision model, from most-specific to least-specific.
///
/// 1. **Pre-built model** (`config.vision`): used as-is.
/// 2. **Named provider + model** (`config.provider_name`): the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    honoured only when both are non-empty.
/// 4. **`OPENAI_API_KEY`** present: OpenAI with the configured model.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`). The factory
///    falls back to its mock provider when nothing is configured; that
///    fallback is rejected.
pub fn resolve_vision_model(config: &IngestConfig) -> Result<Arc<dyn VisionModel>, IngestError> {
    if let Some(ref vision) = config.vision {
        return Ok(Arc::clone(vision));
    }
    let wrap = |provider: Arc<dyn LLMProvider>| -> Arc<dyn VisionModel> {
        Arc::new(ProviderVisionModel::new(
            provider,
            config.temperature,
            config.max_tokens,
        ))
    };

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model).map(wrap);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model).map(wrap);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model).map(wrap);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| IngestError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    reject_mock(llm_provider).map(wrap)
}

/// Refuse the factory's mock stand-in; its canned replies must never be
/// stored as document text.
fn reject_mock(provider: Arc<dyn LLMProvider>) -> Result<Arc<dyn LLMProvider>, IngestError> {
    if provider.name() == MOCK_PROVIDER {
        return Err(IngestError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: "No LLM credentials found in the environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider."
                .to_string(),
        });
    }
    Ok(provider)
}
