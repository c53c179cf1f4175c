use std::sync::Arc;

use uuid::Uuid;

use super::{crop_and_resize, ImageGenError, ImageRequest, ImageService};
use crate::ai::prompts::render_image_prompt;
use crate::config::{PipelineConfig, DEFAULT_STYLE_HINT, IMAGE_KEY_PREFIX};
use crate::error::CreationError;
use crate::store::{selected_template, ObjectStore, PromptStore};
use crate::types::{CreationContext, PromptRole, RecipeResult};

pub const IMAGE_CONTENT_TYPE: &str = "image/png";

/// Object key for a cocktail's image. Keyed by the primary id, never the order code.
pub fn image_key(cocktail_id: Uuid) -> String {
    format!("{}/{}.png", IMAGE_KEY_PREFIX, cocktail_id)
}

/// A post-processed image and where it ended up.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    /// PNG bytes at the configured target size.
    pub png: Vec<u8>,
    /// Public locator, when the upload succeeded.
    pub locator: Option<String>,
    /// Why the upload failed, when it was attempted and failed.
    pub upload_error: Option<String>,
}

/// Builds the image prompt, calls the image service, post-processes the
/// result and optionally uploads it.
pub struct ImageGenerator {
    service: Arc<dyn ImageService>,
    objects: Arc<dyn ObjectStore>,
    prompts: Arc<dyn PromptStore>,
    config: PipelineConfig,
}

impl ImageGenerator {
    pub fn new(
        service: Arc<dyn ImageService>,
        objects: Arc<dyn ObjectStore>,
        prompts: Arc<dyn PromptStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            service,
            objects,
            prompts,
            config,
        }
    }

    /// Generate the image for `recipe`. Service failure, timeout and
    /// post-processing failure are fatal; upload failure is not.
    pub async fn generate(
        &self,
        recipe: &RecipeResult,
        ctx: &CreationContext,
        cocktail_id: Uuid,
        upload: bool,
    ) -> Result<GeneratedImage, CreationError> {
        let custom = selected_template(self.prompts.as_ref(), ctx.image_prompt_id, PromptRole::Image)
            .await
            .map(|t| t.text);

        let style = ctx
            .style_hint
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_STYLE_HINT);

        let request = ImageRequest {
            prompt: render_image_prompt(
                &recipe.color.description(),
                recipe.color.target_color().unwrap_or(""),
                &recipe.concept,
                style,
                custom.as_deref(),
            ),
            size: self.config.image_size.clone(),
            quality: self.config.image_quality.clone(),
        };

        let limit = self.config.image_timeout;
        let raw = match tokio::time::timeout(limit, self.service.generate(&request)).await {
            Ok(result) => result?,
            Err(_) => return Err(ImageGenError::Timeout(limit).into()),
        };
        tracing::debug!(bytes = raw.len(), "Image generated");

        let png = crop_and_resize(&raw, self.config.target_width, self.config.target_height)?;

        if !upload {
            return Ok(GeneratedImage {
                png,
                locator: None,
                upload_error: None,
            });
        }

        let key = image_key(cocktail_id);
        match self
            .objects
            .put(&key, png.clone(), IMAGE_CONTENT_TYPE)
            .await
        {
            Ok(locator) => {
                let locator = locator.trim_end_matches('?').to_string();
                tracing::info!(key = %key, "Image uploaded");
                Ok(GeneratedImage {
                    png,
                    locator: Some(locator),
                    upload_error: None,
                })
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Image upload failed, returning embedded image");
                Ok(GeneratedImage {
                    png,
                    locator: None,
                    upload_error: Some(e.to_string()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::imaging::FakeImageService;
    use crate::naming::NameSource;
    use crate::store::memory::{MemoryObjectStore, MemoryPromptStore};
    use crate::types::{ColorDescriptor, PromptTemplate};

    fn recipe() -> RecipeResult {
        RecipeResult {
            name: "Velvet Dawn".to_string(),
            concept: "A quiet morning after a night shift".to_string(),
            color: ColorDescriptor::Structured {
                name: Some("Dawn Pink".to_string()),
                description: Some("soft pink".to_string()),
                target_rgb: Some("RGB(240,170,190)".to_string()),
            },
            recipe: vec![],
            name_source: NameSource::Generated,
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            target_width: 12,
            target_height: 18,
            image_timeout: Duration::from_millis(200),
            ..Default::default()
        }
    }

    fn generator(
        service: FakeImageService,
        objects: Arc<MemoryObjectStore>,
        prompts: Arc<MemoryPromptStore>,
    ) -> (ImageGenerator, Arc<FakeImageService>) {
        let service = Arc::new(service);
        (
            ImageGenerator::new(service.clone(), objects, prompts, config()),
            service,
        )
    }

    #[tokio::test]
    async fn test_uploads_under_id_key() {
        let objects = Arc::new(MemoryObjectStore::default());
        let (gen, service) = generator(
            FakeImageService::solid(30, 30),
            objects.clone(),
            Arc::new(MemoryPromptStore::new()),
        );
        let id = Uuid::new_v4();

        let image = gen
            .generate(&recipe(), &CreationContext::default(), id, true)
            .await
            .unwrap();

        let key = format!("cocktails/{}.png", id);
        assert_eq!(
            image.locator.as_deref(),
            Some(format!("https://objects.test/public/{}", key).as_str())
        );
        let stored = objects.get(&key).await.unwrap();
        assert_eq!(stored.content_type, "image/png");
        assert_eq!(stored.bytes, image.png);

        let decoded = image::load_from_memory(&image.png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (12, 18));

        let prompt = &service.requests()[0].prompt;
        assert!(prompt.contains("Dawn Pink (soft pink)"));
        assert!(prompt.contains("RGB(240,170,190)"));
        assert!(prompt.contains("casual and approachable"));
    }

    #[tokio::test]
    async fn test_upload_failure_is_not_fatal() {
        let (gen, _) = generator(
            FakeImageService::solid(20, 20),
            Arc::new(MemoryObjectStore::failing()),
            Arc::new(MemoryPromptStore::new()),
        );

        let image = gen
            .generate(&recipe(), &CreationContext::default(), Uuid::new_v4(), true)
            .await
            .unwrap();

        assert!(image.locator.is_none());
        assert!(image.upload_error.is_some());
        assert!(!image.png.is_empty());
    }

    #[tokio::test]
    async fn test_no_upload_when_storage_not_requested() {
        let objects = Arc::new(MemoryObjectStore::default());
        let (gen, _) = generator(
            FakeImageService::solid(20, 20),
            objects.clone(),
            Arc::new(MemoryPromptStore::new()),
        );

        let image = gen
            .generate(&recipe(), &CreationContext::default(), Uuid::new_v4(), false)
            .await
            .unwrap();

        assert!(image.locator.is_none());
        assert!(image.upload_error.is_none());
        assert!(objects.is_empty().await);
    }

    #[tokio::test]
    async fn test_timeout_is_fatal() {
        let (gen, _) = generator(
            FakeImageService::solid(20, 20).with_delay(Duration::from_secs(5)),
            Arc::new(MemoryObjectStore::default()),
            Arc::new(MemoryPromptStore::new()),
        );

        let err = gen
            .generate(&recipe(), &CreationContext::default(), Uuid::new_v4(), true)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "image_timeout");
    }

    #[tokio::test]
    async fn test_custom_image_template_and_style() {
        let prompts = Arc::new(MemoryPromptStore::new());
        let template = PromptTemplate {
            id: Uuid::new_v4(),
            name: "Watercolor".to_string(),
            role: PromptRole::Image,
            text: "Soft watercolor on paper.".to_string(),
            is_active: true,
        };
        prompts.seed(template.clone()).await;
        let (gen, service) = generator(
            FakeImageService::solid(20, 20),
            Arc::new(MemoryObjectStore::default()),
            prompts,
        );
        let ctx = CreationContext {
            style_hint: Some("neon, playful".to_string()),
            image_prompt_id: Some(template.id),
            ..Default::default()
        };

        gen.generate(&recipe(), &ctx, Uuid::new_v4(), false)
            .await
            .unwrap();

        let prompt = &service.requests()[0].prompt;
        assert!(prompt.contains("Style: neon, playful."));
        assert!(prompt.ends_with("Soft watercolor on paper."));
    }
}
