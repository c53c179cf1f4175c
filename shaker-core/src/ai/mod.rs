//! Text generation service abstraction.
//!
//! This module provides:
//! - `TextService` trait for abstracting chat-completion providers
//! - `OpenAiTextClient`, an OpenAI-compatible implementation
//! - `FakeTextService` for tests
//! - Prompt templates for recipe, rename and image prompts
//!
//! # Configuration
//!
//! - `OPENAI_API_KEY` (required): API key for the text and image services
//! - `SHAKER_AI_MODEL` (optional): chat model, e.g. "gpt-4.1-mini"
//! - `SHAKER_AI_BASE_URL` (optional): API base URL
//! - `SHAKER_IMAGE_MODEL` (optional): image model, e.g. "gpt-image-1"

mod config;
pub mod fake;
mod openai;
pub mod prompts;
mod types;

pub use config::{AiConfig, DEFAULT_BASE_URL, DEFAULT_IMAGE_MODEL, DEFAULT_MODEL};
pub use fake::FakeTextService;
pub use openai::OpenAiTextClient;
pub use types::{ChatMessage, ChatRequest, ChatResponse, Role, Sampling};

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AiError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("API returned error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Trait for text generation providers.
///
/// `prompt_name` identifies the prompt family in logs ("recipe", "rename").
#[async_trait]
pub trait TextService: Send + Sync {
    async fn complete(
        &self,
        prompt_name: &str,
        request: ChatRequest,
    ) -> Result<ChatResponse, AiError>;
}

/// Run a text service call with a hard deadline.
pub async fn complete_within(
    service: &dyn TextService,
    prompt_name: &str,
    request: ChatRequest,
    limit: Duration,
) -> Result<ChatResponse, AiError> {
    with_deadline(limit, service.complete(prompt_name, request)).await
}

async fn with_deadline<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, AiError>>,
) -> Result<T, AiError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AiError::Timeout(limit)),
    }
}
