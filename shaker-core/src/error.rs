use std::path::PathBuf;

use thiserror::Error;

use crate::ai::AiError;
use crate::imaging::{ImageGenError, ImageProcessingError};
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },

    #[error("Failed to read data file {path}: {source}")]
    DataFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal outcomes of a creation run.
///
/// Anything that degrades instead of failing (fallback name, upload failure,
/// post-commit linkage) is reported through `Degradation`, never here.
#[derive(Error, Debug)]
pub enum CreationError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Event resolution failed: {0}")]
    EventResolution(StoreError),

    #[error("Text generation failed: {0}")]
    GenerationService(AiError),

    #[error("Could not extract a recipe from the generation output: {0}")]
    MalformedResponse(String),

    #[error("Could not allocate a unique order code after {attempts} attempts")]
    AllocationExhausted { attempts: usize },

    #[error("Order code lookup failed: {0}")]
    CodeLookup(StoreError),

    #[error("Image generation failed: {0}")]
    ImageService(ImageGenError),

    #[error("Image post-processing failed: {0}")]
    ImageProcessing(#[from] ImageProcessingError),

    #[error("Failed to save cocktail record: {0}")]
    Persistence(StoreError),
}

impl From<AiError> for CreationError {
    fn from(e: AiError) -> Self {
        match e {
            AiError::NotConfigured(name) => {
                CreationError::Configuration(ConfigError::MissingEnvVar(name))
            }
            other => CreationError::GenerationService(other),
        }
    }
}

impl From<ImageGenError> for CreationError {
    fn from(e: ImageGenError) -> Self {
        match e {
            ImageGenError::NotConfigured(name) => {
                CreationError::Configuration(ConfigError::MissingEnvVar(name))
            }
            other => CreationError::ImageService(other),
        }
    }
}

impl CreationError {
    /// Short machine-readable tag used in logs and failure responses.
    pub fn kind(&self) -> &'static str {
        match self {
            CreationError::Configuration(_) => "configuration",
            CreationError::EventResolution(_) => "event_resolution",
            CreationError::GenerationService(AiError::Timeout(_)) => "generation_timeout",
            CreationError::GenerationService(_) => "generation_service",
            CreationError::MalformedResponse(_) => "malformed_response",
            CreationError::AllocationExhausted { .. } => "allocation_exhausted",
            CreationError::CodeLookup(_) => "code_lookup",
            CreationError::ImageService(ImageGenError::Timeout(_)) => "image_timeout",
            CreationError::ImageService(_) => "image_service",
            CreationError::ImageProcessing(_) => "image_processing",
            CreationError::Persistence(_) => "persistence",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_not_configured_maps_to_configuration() {
        let err: CreationError = AiError::NotConfigured("OPENAI_API_KEY".to_string()).into();
        assert!(matches!(err, CreationError::Configuration(_)));
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn test_timeout_kinds() {
        let text: CreationError = AiError::Timeout(Duration::from_secs(30)).into();
        assert_eq!(text.kind(), "generation_timeout");

        let image: CreationError = ImageGenError::Timeout(Duration::from_secs(60)).into();
        assert_eq!(image.kind(), "image_timeout");
        assert!(image.to_string().contains("60"));
    }
}
