//! Gemini (Google) try-on provider.

use crate::error::{sanitize_error_message, Result, TryOnError};
use crate::image::provider::TryOnProvider;
use crate::image::types::{ImagePayload, Instruction};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Default endpoint of the Generative Language API.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Returned when the model answers without an image.
const NO_IMAGE_MESSAGE: &str = "The AI model did not return an image. This can happen with \
    complex requests or if the input images are not clear. Please try again with different images.";

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Nano Banana - Gemini 2.5 Flash Image (fast, economical).
    #[default]
    NanoBanana,
    /// Nano Banana Pro - Gemini 3 Pro Image (highest quality).
    NanoBananaPro,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NanoBanana => "gemini-2.5-flash-image",
            Self::NanoBananaPro => "nano-banana-pro-preview",
        }
    }
}

/// Builder for GeminiProvider.
#[derive(Debug, Clone, Default)]
pub struct GeminiProviderBuilder {
    api_key: Option<String>,
    model: GeminiModel,
    instruction: Instruction,
    base_url: Option<String>,
    http_client: Option<reqwest::Client>,
}

impl GeminiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to the `API_KEY`, then `GOOGLE_API_KEY`
    /// env vars.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the Gemini model variant.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Sets the instruction sent with the two images.
    pub fn instruction(mut self, instruction: Instruction) -> Self {
        self.instruction = instruction;
        self
    }

    /// Overrides the API base URL (scheme and host, no trailing path).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Uses a preconfigured HTTP client (proxies, timeouts, TLS).
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<GeminiProvider> {
        let api_key = resolve_api_key(self.api_key, |name| std::env::var(name).ok())
            .ok_or_else(|| {
                TryOnError::Auth("API_KEY not set and no API key provided".into())
            })?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(GeminiProvider {
            client: self.http_client.unwrap_or_default(),
            api_key,
            model: self.model,
            instruction: self.instruction,
            base_url,
        })
    }
}

/// Picks the first non-blank key: explicit, then `API_KEY`, then `GOOGLE_API_KEY`.
fn resolve_api_key(
    explicit: Option<String>,
    env: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    let present = |key: &String| !key.trim().is_empty();
    explicit
        .filter(present)
        .or_else(|| env("API_KEY").filter(present))
        .or_else(|| env("GOOGLE_API_KEY").filter(present))
}

/// Gemini try-on provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: GeminiModel,
    instruction: Instruction,
    base_url: String,
}

impl GeminiProvider {
    /// Creates a new `GeminiProviderBuilder`.
    pub fn builder() -> GeminiProviderBuilder {
        GeminiProviderBuilder::new()
    }

    /// Returns the configured model.
    pub fn model(&self) -> GeminiModel {
        self.model
    }

    async fn compose_impl(
        &self,
        product: &ImagePayload,
        model: &ImagePayload,
    ) -> Result<ImagePayload> {
        let start = Instant::now();

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url,
            self.model.as_str(),
        );

        let body = GeminiRequest::new(product, model, self.instruction);

        tracing::info!(
            model = self.model.as_str(),
            product_mime = %product.mime_type,
            model_mime = %model.mime_type,
            "requesting try-on composition"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text));
        }

        // A 2xx body that is not a generateContent response is a protocol error
        let text = response.text().await?;
        let gemini_response: GeminiResponse = serde_json::from_str(&text)?;
        let image = first_inline_image(gemini_response)?;

        tracing::info!(
            model = self.model.as_str(),
            mime_type = %image.mime_type,
            duration_ms = start.elapsed().as_millis() as u64,
            "try-on composition complete"
        );

        Ok(image)
    }
}

fn parse_error(status: u16, text: &str) -> TryOnError {
    let text = sanitize_error_message(text);
    if status == 404 {
        return TryOnError::InvalidRequest(
            "Model not found. Verify the model name is correct.".into(),
        );
    }
    if status == 429 {
        return TryOnError::RateLimited;
    }
    if status == 401 || status == 403 {
        return TryOnError::Auth(text);
    }
    let lower = text.to_lowercase();
    if lower.contains("safety")
        || lower.contains("blocked")
        || lower.contains("content_policy")
        || lower.contains("prohibited")
    {
        return TryOnError::ContentBlocked(text);
    }
    TryOnError::Api {
        status,
        message: text,
    }
}

/// Extracts the first inline image of the first candidate.
fn first_inline_image(response: GeminiResponse) -> Result<ImagePayload> {
    // Blocks on the prompt itself arrive as HTTP 200
    if let Some(feedback) = response.prompt_feedback {
        if let Some(reason) = feedback.block_reason {
            let msg = feedback
                .block_reason_message
                .unwrap_or_else(|| format!("Prompt blocked: {}", reason));
            tracing::warn!(%reason, "prompt blocked by Gemini");
            return Err(TryOnError::ContentBlocked(msg));
        }
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| TryOnError::NoImage(NO_IMAGE_MESSAGE.into()))?;

    if let Some(ref finish_reason) = candidate.finish_reason {
        match finish_reason.as_str() {
            "SAFETY"
            | "IMAGE_SAFETY"
            | "IMAGE_PROHIBITED_CONTENT"
            | "IMAGE_RECITATION"
            | "RECITATION"
            | "PROHIBITED_CONTENT"
            | "BLOCKLIST" => {
                tracing::warn!(%finish_reason, "candidate blocked by Gemini");
                return Err(TryOnError::ContentBlocked(format!(
                    "Content blocked by Gemini safety filter: {}",
                    finish_reason
                )));
            }
            _ => {}
        }
    }

    candidate
        .content
        .into_iter()
        .flat_map(|c| c.parts)
        .find_map(|p| p.inline_data)
        .map(|inline| ImagePayload::new(inline.data, inline.mime_type))
        .ok_or_else(|| TryOnError::NoImage(NO_IMAGE_MESSAGE.into()))
}

#[async_trait]
impl TryOnProvider for GeminiProvider {
    async fn compose(
        &self,
        product: &ImagePayload,
        model: &ImagePayload,
    ) -> Result<ImagePayload> {
        self.compose_impl(product, model).await
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/v1beta/models/{}", self.base_url, self.model.as_str());

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        match response.status().as_u16() {
            401 | 403 => Err(TryOnError::Auth("Invalid API key".into())),
            404 => Err(TryOnError::InvalidRequest(
                "Model not found. Verify the model name is correct.".into(),
            )),
            s if !(200..300).contains(&s) => Err(TryOnError::Api {
                status: s,
                message: "Health check failed".into(),
            }),
            _ => Ok(()),
        }
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
}

impl GeminiRequest {
    /// Product first, model second, instruction last.
    fn new(product: &ImagePayload, model: &ImagePayload, instruction: Instruction) -> Self {
        let inline = |payload: &ImagePayload| GeminiRequestPart::InlineData {
            inline_data: GeminiInlineData {
                mime_type: payload.mime_type.clone(),
                data: payload.base64.clone(),
            },
        };

        Self {
            contents: vec![GeminiContent {
                parts: vec![
                    inline(product),
                    inline(model),
                    GeminiRequestPart::Text {
                        text: instruction.text().to_string(),
                    },
                ],
            }],
            generation_config: GeminiConfig {
                response_modalities: vec!["IMAGE".to_string()],
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}
