//! Gemini image model integration
//!
//! Provides:
//! - Text-to-image generation
//! - Single-reference image editing
//! - Two-reference image composition
//!
//! Each call forwards one prompt (plus optional style suffix and reference
//! images) to the hosted `generateContent` endpoint and returns the first
//! image of the first candidate. Any failure collapses to a single
//! user-displayable error; no retries, no partial results.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ModelConfig;
use crate::styles::StylePreset;

/// Aspect-ratio tag, applied to text-only generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatio {
    /// Square (1:1)
    #[default]
    Square,
    /// Landscape (4:3)
    Landscape,
    /// Widescreen (16:9)
    Widescreen,
    /// Portrait (3:4)
    Portrait,
    /// Tall (9:16)
    Tall,
}

impl AspectRatio {
    /// Get the API tag for this ratio
    pub fn tag(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape => "4:3",
            AspectRatio::Widescreen => "16:9",
            AspectRatio::Portrait => "3:4",
            AspectRatio::Tall => "9:16",
        }
    }

    /// Parse from string (accepts names and tags)
    pub fn from_str(s: &str) -> Option<AspectRatio> {
        match s.to_lowercase().as_str() {
            "square" | "1:1" => Some(AspectRatio::Square),
            "landscape" | "4:3" => Some(AspectRatio::Landscape),
            "widescreen" | "wide" | "16:9" => Some(AspectRatio::Widescreen),
            "portrait" | "3:4" => Some(AspectRatio::Portrait),
            "tall" | "9:16" => Some(AspectRatio::Tall),
            _ => None,
        }
    }
}

/// Reference image input: base64 payload plus media type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInput {
    pub data: String,
    pub mime_type: String,
}

/// One generated image: raw bytes plus media type
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl GeneratedImage {
    /// Encode as a self-contained data URL for storage and display
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.data))
    }
}

/// Generation errors
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("image model API key not configured")]
    NotConfigured,

    #[error("image generation failed: {0}")]
    Failed(String),
}

/// Gemini image model client
#[derive(Debug)]
pub struct GeminiClient {
    /// HTTP client
    client: Client,
    /// API key
    api_key: Option<String>,
    /// API base URL
    base_url: String,
    /// Image model identifier
    model: String,
}

impl GeminiClient {
    /// Create a new client from model configuration
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        }
    }

    /// Check if API key is configured
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate an image from a text prompt
    pub async fn generate(
        &self,
        prompt: &str,
        style: Option<&StylePreset>,
        aspect: AspectRatio,
    ) -> Result<GeneratedImage, GenerationError> {
        let parts = vec![json!({ "text": styled_prompt(prompt, style) })];
        self.request(parts, Some(aspect)).await
    }

    /// Rework a single reference image according to the prompt
    pub async fn edit(
        &self,
        prompt: &str,
        image: &ImageInput,
        style: Option<&StylePreset>,
    ) -> Result<GeneratedImage, GenerationError> {
        let parts = vec![
            inline_part(image),
            json!({ "text": styled_prompt(prompt, style) }),
        ];
        self.request(parts, None).await
    }

    /// Combine two reference images according to the prompt
    pub async fn compose(
        &self,
        prompt: &str,
        first: &ImageInput,
        second: &ImageInput,
        style: Option<&StylePreset>,
    ) -> Result<GeneratedImage, GenerationError> {
        let parts = vec![
            inline_part(first),
            inline_part(second),
            json!({ "text": styled_prompt(prompt, style) }),
        ];
        self.request(parts, None).await
    }

    /// Send one generateContent request and extract the image
    async fn request(
        &self,
        parts: Vec<Value>,
        aspect: Option<AspectRatio>,
    ) -> Result<GeneratedImage, GenerationError> {
        let api_key = self.api_key.as_ref().ok_or(GenerationError::NotConfigured)?;

        let mut body = json!({
            "contents": [{ "parts": parts }],
            "generationConfig": { "responseModalities": ["IMAGE"] },
        });
        if let Some(aspect) = aspect {
            body["generationConfig"]["imageConfig"] = json!({ "aspectRatio": aspect.tag() });
        }

        debug!("requesting image from model {}", self.model);

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Failed(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("image model API error: {} - {}", status, body);
            return Err(GenerationError::Failed(format!("API error: {}", status)));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| GenerationError::Failed(format!("failed to parse response: {}", e)))?;

        extract_image(&payload)
    }
}

/// Build an inlineData part from a reference image
fn inline_part(image: &ImageInput) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type,
            "data": image.data,
        }
    })
}

/// Append the preset suffix to the user's prompt
fn styled_prompt(prompt: &str, style: Option<&StylePreset>) -> String {
    match style {
        Some(style) => format!("{}. Style: {}", prompt, style.prompt_suffix),
        None => prompt.to_string(),
    }
}

/// Pull the first inline image out of a generateContent response
fn extract_image(payload: &Value) -> Result<GeneratedImage, GenerationError> {
    let parts = payload
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| GenerationError::Failed("no candidates in response".to_string()))?;

    for part in parts {
        let Some(inline) = part.get("inlineData").or_else(|| part.get("inline_data")) else {
            continue;
        };
        let Some(data) = inline.get("data").and_then(Value::as_str) else {
            continue;
        };
        if data.is_empty() {
            continue;
        }

        let bytes = BASE64
            .decode(data)
            .map_err(|e| GenerationError::Failed(format!("invalid image payload: {}", e)))?;
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .unwrap_or("image/png")
            .to_string();

        return Ok(GeneratedImage {
            data: bytes,
            mime_type,
        });
    }

    Err(GenerationError::Failed("no image in response".to_string()))
}
