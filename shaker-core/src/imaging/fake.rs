use std::io::Cursor;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};

use super::{ImageGenError, ImageRequest, ImageService};

#[derive(Debug, Clone)]
enum Outcome {
    Image(Vec<u8>),
    Fail(String),
}

/// A fake image service for testing. Returns a fixed image or a fixed error.
#[derive(Debug)]
pub struct FakeImageService {
    outcome: Outcome,
    delay: Option<Duration>,
    requests: Mutex<Vec<ImageRequest>>,
}

impl FakeImageService {
    /// Return a solid-color PNG of the given size for every request.
    pub fn solid(width: u32, height: u32) -> Self {
        let img = RgbaImage::from_pixel(width, height, Rgba([180, 60, 120, 255]));
        let mut buf = Cursor::new(Vec::new());
        // Encoding an in-memory RGBA buffer as PNG cannot fail.
        let _ = img.write_to(&mut buf, ImageFormat::Png);
        Self::with_bytes(buf.into_inner())
    }

    /// Return these bytes for every request.
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self {
            outcome: Outcome::Image(bytes),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fail every request with an API error.
    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Outcome::Fail(message.to_string()),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<ImageRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl ImageService for FakeImageService {
    async fn generate(&self, request: &ImageRequest) -> Result<Vec<u8>, ImageGenError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.outcome {
            Outcome::Image(bytes) => Ok(bytes.clone()),
            Outcome::Fail(message) => Err(ImageGenError::Api {
                status: 500,
                message: message.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ImageRequest {
        ImageRequest {
            prompt: "a red cocktail".to_string(),
            size: "1024x1536".to_string(),
            quality: "low".to_string(),
        }
    }

    #[tokio::test]
    async fn test_solid_returns_decodable_png() {
        let service = FakeImageService::solid(8, 12);
        let bytes = service.generate(&request()).await.unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (8, 12));
        assert_eq!(service.requests()[0].prompt, "a red cocktail");
    }

    #[tokio::test]
    async fn test_failing() {
        let service = FakeImageService::failing("content policy");
        assert!(matches!(
            service.generate(&request()).await,
            Err(ImageGenError::Api { .. })
        ));
        assert_eq!(service.call_count(), 1);
    }
}
