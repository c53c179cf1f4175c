//! Service credentials from environment variables.

use std::env;

use crate::error::ConfigError;

/// Default OpenAI-compatible base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default chat model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Default image model.
pub const DEFAULT_IMAGE_MODEL: &str = "gpt-image-1";

/// Text and image service configuration.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub model: String,
    pub image_model: String,
    pub base_url: String,
}

impl AiConfig {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `OPENAI_API_KEY`
    ///
    /// Optional:
    /// - `SHAKER_AI_MODEL` (default: "gpt-4.1-mini")
    /// - `SHAKER_IMAGE_MODEL` (default: "gpt-image-1")
    /// - `SHAKER_AI_BASE_URL` (default: "https://api.openai.com/v1")
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;

        let model = env::var("SHAKER_AI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let image_model =
            env::var("SHAKER_IMAGE_MODEL").unwrap_or_else(|_| DEFAULT_IMAGE_MODEL.to_string());

        let base_url =
            env::var("SHAKER_AI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            api_key,
            model,
            image_model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}
