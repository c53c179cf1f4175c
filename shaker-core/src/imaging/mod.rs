//! Cocktail image generation and post-processing.
//!
//! - `ImageService` abstracts the image generation API
//! - `crop_and_resize` fits a generated image to the display size
//! - `ImageGenerator` ties prompt, service, post-processing and upload together

mod fake;
mod generator;
mod openai;
mod processing;

pub use fake::FakeImageService;
pub use generator::{image_key, GeneratedImage, ImageGenerator, IMAGE_CONTENT_TYPE};
pub use openai::OpenAiImageClient;
pub use processing::crop_and_resize;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageGenError {
    #[error("Image API request failed: {0}")]
    RequestFailed(String),

    #[error("Image API returned error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Image generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Image provider not configured: {0}")]
    NotConfigured(String),

    #[error("Could not read image from response: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum ImageProcessingError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Invalid target size {width}x{height}")]
    InvalidTarget { width: u32, height: u32 },
}

/// A request to the image generation service.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    /// Provider size string, e.g. "1024x1536".
    pub size: String,
    pub quality: String,
}

/// Trait for image generation providers. Returns encoded image bytes.
#[async_trait]
pub trait ImageService: Send + Sync {
    async fn generate(&self, request: &ImageRequest) -> Result<Vec<u8>, ImageGenError>;
}
