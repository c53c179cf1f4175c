//! OpenAI-compatible image generation client.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{ImageGenError, ImageRequest, ImageService};
use crate::ai::AiConfig;

#[derive(Debug, Clone)]
pub struct OpenAiImageClient {
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiImageClient {
    pub fn new(config: &AiConfig, timeout: Duration) -> Result<Self, ImageGenError> {
        if config.api_key.trim().is_empty() {
            return Err(ImageGenError::NotConfigured("OPENAI_API_KEY".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ImageGenError::RequestFailed(e.to_string()))?;

        Ok(Self {
            api_key: config.api_key.clone(),
            model: config.image_model.clone(),
            base_url: config.base_url.clone(),
            timeout,
            client,
        })
    }
}

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    quality: &'a str,
    n: u32,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    data: Vec<GeneratedData>,
}

#[derive(Debug, Deserialize)]
struct GeneratedData {
    #[serde(default)]
    b64_json: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Pull the first base64 image out of a generations response body.
fn decode_first_image(body: &str) -> Result<Vec<u8>, ImageGenError> {
    let parsed: GenerationResponse =
        serde_json::from_str(body).map_err(|e| ImageGenError::Decode(e.to_string()))?;

    let encoded = parsed
        .data
        .into_iter()
        .next()
        .and_then(|d| d.b64_json)
        .ok_or_else(|| ImageGenError::Decode("No image data in response".to_string()))?;

    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| ImageGenError::Decode(e.to_string()))
}

#[async_trait]
impl ImageService for OpenAiImageClient {
    async fn generate(&self, request: &ImageRequest) -> Result<Vec<u8>, ImageGenError> {
        let body = GenerationRequest {
            model: &self.model,
            prompt: &request.prompt,
            size: &request.size,
            quality: &request.quality,
            n: 1,
        };

        tracing::debug!(model = %self.model, size = %request.size, "Calling image generation API");

        let response = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ImageGenError::Timeout(self.timeout)
                } else {
                    ImageGenError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ImageGenError::Timeout(self.timeout)
            } else {
                ImageGenError::RequestFailed(e.to_string())
            }
        })?;

        if !(200..300).contains(&status) {
            let message = serde_json::from_str::<ApiErrorResponse>(&text)
                .map(|r| r.error.message)
                .unwrap_or_else(|_| text.chars().take(500).collect());
            return Err(ImageGenError::Api { status, message });
        }

        decode_first_image(&text)
    }
}
