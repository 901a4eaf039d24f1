//! Inference gateway: one multimodal request in, one validated invoice out.
//!
//! The request carries the extraction instruction followed by every page
//! image, in page order. The reply must be a bare JSON object; it is parsed
//! and then validated through [`InvoiceDocument::try_from`], the same path
//! user edits take.
//!
//! Nothing here retries. Rate limits, timeouts and transport failures come
//! back as distinct [`ExtractError`] variants for the caller to act on.
//!
//! The transport sits behind the [`VisionModel`] trait; see
//! [`crate::provider`] for the implementations shipped with the crate.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::model::{InvoiceDocument, InvoiceDraft};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// MIME type of every payload image.
pub const IMAGE_MIME: &str = "image/jpeg";

/// A fully assembled model request.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    /// Instruction text, sent before the images.
    pub instruction: String,
    /// Base64 JPEG payloads in page order. Never empty.
    pub images: Vec<String>,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl InferenceRequest {
    /// `data:image/jpeg;base64,…` URIs for the payloads, in order.
    pub fn image_data_uris(&self) -> impl Iterator<Item = String> + '_ {
        self.images
            .iter()
            .map(|b64| format!("data:{};base64,{}", IMAGE_MIME, b64))
    }

    /// OpenAI chat-completions body: one user message holding a text part
    /// and then one `image_url` part per payload.
    pub fn to_chat_completion_body(&self, model: &str) -> Value {
        let mut content = Vec::with_capacity(self.images.len() + 1);
        content.push(json!({ "type": "text", "text": self.instruction }));
        content.extend(self.image_data_uris().map(|url| {
            json!({ "type": "image_url", "image_url": { "url": url } })
        }));

        json!({
            "model": model,
            "messages": [{ "role": "user", "content": content }],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

/// Raw text returned by a model, with token accounting when available.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl ModelReply {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// A vision-capable model endpoint.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Short provider name used in errors and logs.
    fn name(&self) -> &str;

    /// Send `request` once and return the reply text.
    async fn complete(&self, request: &InferenceRequest) -> Result<ModelReply, ExtractError>;
}

/// Assemble the request for `images`.
///
/// Fails with [`ExtractError::EmptyInput`] when there is nothing to send.
pub fn build_request(
    images: Vec<String>,
    config: &ExtractionConfig,
) -> Result<InferenceRequest, ExtractError> {
    if images.is_empty() {
        return Err(ExtractError::EmptyInput);
    }
    Ok(InferenceRequest {
        instruction: config.prompt().to_string(),
        images,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    })
}

/// Parse and validate a raw model reply.
///
/// Text that is not JSON (including JSON wrapped in markdown fences) is a
/// [`ExtractError::MalformedResponse`] carrying the reply unmodified. JSON
/// that breaks any field rule is a [`ExtractError::SchemaViolation`].
pub fn parse_reply(reply: &str) -> Result<InvoiceDocument, ExtractError> {
    let value: Value =
        serde_json::from_str(reply).map_err(|source| ExtractError::MalformedResponse {
            reply: reply.to_string(),
            source,
        })?;

    let draft = InvoiceDraft::from_value(value).map_err(ExtractError::SchemaViolation)?;
    InvoiceDocument::try_from(draft).map_err(ExtractError::SchemaViolation)
}

/// Send the images to `model` and validate what comes back.
pub async fn extract_invoice(
    model: &dyn VisionModel,
    images: Vec<String>,
    config: &ExtractionConfig,
) -> Result<InvoiceDocument, ExtractError> {
    let request = build_request(images, config)?;
    info!(
        "Sending {} image(s) to '{}'",
        request.images.len(),
        model.name()
    );

    let start = Instant::now();
    let reply = if config.api_timeout_secs == 0 {
        model.complete(&request).await?
    } else {
        let limit = Duration::from_secs(config.api_timeout_secs);
        match tokio::time::timeout(limit, model.complete(&request)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("'{}' did not answer within {:?}", model.name(), limit);
                return Err(ExtractError::Timeout {
                    elapsed_ms: start.elapsed().as_millis() as u64,
                });
            }
        }
    };

    debug!(
        "'{}' replied: {} input tokens, {} output tokens, {:?}",
        model.name(),
        reply.input_tokens,
        reply.output_tokens,
        start.elapsed()
    );

    let document = parse_reply(&reply.content)?;
    info!(
        "Extracted invoice {} with {} item(s)",
        document.invoice_number(),
        document.items().len()
    );
    Ok(document)
}
