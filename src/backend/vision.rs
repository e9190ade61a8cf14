//! Vision backend: OCR through a multimodal LLM via `edgequake-llm`.
//!
//! Each unit becomes one chat call: the OCR system prompt (with the request's
//! languages and whitelist) and a user turn carrying the unit as a base64 PNG.
//! The model cannot emit hOCR, cannot be forced onto an alphabet and may wrap
//! its answer in code fences, so the backend advertises none of those
//! capabilities; the dispatcher's post-processing cleans and filters its
//! plain output.

use super::{BackendCapabilities, BackendError, OcrBackend};
use crate::config::ScanConfig;
use crate::pipeline::encode::encode_image_data;
use crate::prompts::ocr_prompt;
use crate::request::RecognitionOptions;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use image::GrayImage;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_VISION_MODEL: &str = "gpt-4.1-nano";

pub struct VisionBackend {
    provider: Arc<dyn LLMProvider>,
}

impl VisionBackend {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

/// Transcription must be deterministic; the output budget covers a dense A4 page.
fn build_options() -> CompletionOptions {
    CompletionOptions {
        temperature: Some(0.0),
        max_tokens: Some(4096),
        ..Default::default()
    }
}

#[async_trait]
impl OcrBackend for VisionBackend {
    fn name(&self) -> &str {
        "vision"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            hocr: false,
            whitelist: false,
            clean_text: false,
        }
    }

    async fn recognize(
        &self,
        image: &GrayImage,
        options: &RecognitionOptions,
    ) -> Result<String, BackendError> {
        let image = image.clone();
        let image_data = tokio::task::spawn_blocking(move || encode_image_data(&image))
            .await
            .map_err(|e| BackendError::Engine(format!("encode task panicked: {e}")))??;
        let messages = vec![
            ChatMessage::system(ocr_prompt(options)),
            ChatMessage::user_with_images("", vec![image_data]),
        ];

        let response = self
            .provider
            .chat(&messages, Some(&build_options()))
            .await
            .map_err(|e| BackendError::Engine(e.to_string()))?;

        debug!(
            "Vision OCR: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, BackendError> {
    ProviderFactory::create_llm_provider(provider_name, model)
        .map_err(|e| BackendError::Unavailable(format!("provider '{provider_name}': {e}")))
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. `config.vision_provider`, used as-is
/// 2. `config.vision_provider_name` + `config.vision_model`
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
/// 4. `OPENAI_API_KEY` present → OpenAI
/// 5. `ProviderFactory::from_env` auto-detection
pub fn resolve_provider(config: &ScanConfig) -> Result<Arc<dyn LLMProvider>, BackendError> {
    if let Some(ref provider) = config.vision_provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.vision_model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);

    if let Some(ref name) = config.vision_provider_name {
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_vision_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) = ProviderFactory::from_env()
        .map_err(|e| BackendError::Unavailable(format!("no LLM provider in environment: {e}")))?;
    Ok(llm_provider)
}
