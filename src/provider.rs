//! [`VisionModel`] implementations.
//!
//! * [`LlmVisionModel`] drives any `edgequake-llm` provider (OpenAI,
//!   Anthropic, Gemini, Mistral, Ollama, Azure, …).
//! * [`OpenAiCompatibleVision`] speaks the OpenAI chat-completions wire
//!   format directly, defaulting to xAI's Grok vision endpoint.
//!
//! Both send exactly one request per call and translate failures into the
//! transport variants of [`ExtractError`] without retrying.

use crate::error::ExtractError;
use crate::pipeline::llm::{InferenceRequest, ModelReply, VisionModel, IMAGE_MIME};
use async_trait::async_trait;
use edgequake_llm::{
    ChatMessage, CompletionOptions, ImageData, LLMProvider, LlmError, ProviderFactory,
};
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Default model when a provider is named without one.
pub const DEFAULT_LLM_MODEL: &str = "gpt-4.1-nano";

/// xAI's OpenAI-compatible API root.
pub const XAI_BASE_URL: &str = "https://api.x.ai/v1";

/// Grok vision model used by [`OpenAiCompatibleVision::xai`].
pub const XAI_VISION_MODEL: &str = "grok-2-vision-1212";

// ── edgequake-llm ─────────────────────────────────────────────────────────

/// A [`VisionModel`] backed by an `edgequake-llm` provider.
pub struct LlmVisionModel {
    provider: Arc<dyn LLMProvider>,
    name: String,
}

impl LlmVisionModel {
    /// Wrap a provider that is already configured.
    pub fn new(provider: Arc<dyn LLMProvider>, name: impl Into<String>) -> Self {
        Self {
            provider,
            name: name.into(),
        }
    }

    /// Build a named provider; its API key is read from the environment by
    /// `edgequake-llm` (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, …).
    pub fn from_provider_name(provider: &str, model: &str) -> Result<Self, ExtractError> {
        let llm = ProviderFactory::create_llm_provider(provider, model).map_err(|e| {
            ExtractError::ProviderNotConfigured {
                provider: provider.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(llm, provider))
    }

    /// Resolve a provider, from most-specific to least-specific:
    ///
    /// 1. `provider` (+ `model`, default [`DEFAULT_LLM_MODEL`])
    /// 2. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
    /// 3. OpenAI, when `OPENAI_API_KEY` is set
    /// 4. `ProviderFactory::from_env` auto-detection
    pub fn from_env(provider: Option<&str>, model: Option<&str>) -> Result<Self, ExtractError> {
        if let Some(name) = provider {
            return Self::from_provider_name(name, model.unwrap_or(DEFAULT_LLM_MODEL));
        }

        if let (Ok(prov), Ok(env_model)) = (
            std::env::var("EDGEQUAKE_LLM_PROVIDER"),
            std::env::var("EDGEQUAKE_MODEL"),
        ) {
            if !prov.is_empty() && !env_model.is_empty() {
                return Self::from_provider_name(&prov, &env_model);
            }
        }

        if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
            if !openai_key.is_empty() {
                return Self::from_provider_name("openai", model.unwrap_or(DEFAULT_LLM_MODEL));
            }
        }

        let (llm, _embedding) =
            ProviderFactory::from_env().map_err(|e| ExtractError::ProviderNotConfigured {
                provider: "auto".to_string(),
                hint: format!(
                    "No LLM provider could be auto-detected from environment.\n\
                    Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                    Error: {}",
                    e
                ),
            })?;
        Ok(Self::new(llm, "auto"))
    }
}

impl fmt::Debug for LlmVisionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmVisionModel")
            .field("name", &self.name)
            .field("provider", &"<dyn LLMProvider>")
            .finish()
    }
}

/// Map an `edgequake-llm` error onto the transport variants.
pub(crate) fn classify_provider_error(
    provider: &str,
    err: LlmError,
    elapsed_ms: u64,
) -> ExtractError {
    let provider = provider.to_string();
    match err {
        LlmError::RateLimited(_) => ExtractError::RateLimited {
            provider,
            retry_after_secs: None,
        },
        LlmError::AuthError(detail) => ExtractError::AuthFailed { provider, detail },
        LlmError::Timeout => ExtractError::Timeout { elapsed_ms },
        LlmError::ConfigError(hint) => ExtractError::ProviderNotConfigured { provider, hint },
        other => ExtractError::Transport {
            provider,
            detail: other.to_string(),
        },
    }
}

#[async_trait]
impl VisionModel for LlmVisionModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &InferenceRequest) -> Result<ModelReply, ExtractError> {
        let images = request
            .images
            .iter()
            .map(|b64| ImageData::new(b64.clone(), IMAGE_MIME).with_detail("high"))
            .collect();
        let messages = vec![ChatMessage::user_with_images(
            request.instruction.as_str(),
            images,
        )];
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let start = Instant::now();
        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| {
                classify_provider_error(&self.name, e, start.elapsed().as_millis() as u64)
            })?;

        Ok(ModelReply {
            content: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

// ── OpenAI-compatible HTTP ────────────────────────────────────────────────

/// Chat-completions client for any OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiCompatibleVision {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    name: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

impl OpenAiCompatibleVision {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: XAI_BASE_URL.to_string(),
            model: model.into(),
            name: "openai-compatible".to_string(),
        }
    }

    /// Grok vision on xAI.
    pub fn xai(api_key: impl Into<String>) -> Self {
        Self::new(api_key, XAI_VISION_MODEL).with_name("xai")
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Use a preconfigured client, e.g. one with a transport-level timeout.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn transport(&self, detail: impl Into<String>) -> ExtractError {
        ExtractError::Transport {
            provider: self.name.clone(),
            detail: detail.into(),
        }
    }
}

impl fmt::Debug for OpenAiCompatibleVision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompatibleVision")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl VisionModel for OpenAiCompatibleVision {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &InferenceRequest) -> Result<ModelReply, ExtractError> {
        let body = request.to_chat_completion_body(&self.model);
        debug!(model = %self.model, images = request.images.len(), "Sending chat completion");

        let start = Instant::now();
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExtractError::Timeout {
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    }
                } else {
                    self.transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            return Err(ExtractError::RateLimited {
                provider: self.name.clone(),
                retry_after_secs,
            });
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let detail = response.text().await.unwrap_or_default();
            return Err(ExtractError::AuthFailed {
                provider: self.name.clone(),
                detail: format!("HTTP {}: {}", status, detail),
            });
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(self.transport(format!("HTTP {}: {}", status, detail)));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| self.transport(format!("cannot decode response body: {e}")))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| self.transport("response has no message content"))?;
        let (input_tokens, output_tokens) = chat
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(ModelReply {
            content,
            input_tokens,
            output_tokens,
        })
    }
}
