//! The creation pipeline.
//!
//! One `create` call runs the stages in order:
//!
//! ```text
//! event resolution -> recipe -> order code -> image -> record write -> post-commit
//! ```
//!
//! A failure in any stage up to and including the record write aborts the
//! run and nothing is left visible to readers. Post-commit actions are
//! best-effort and are reported as `Degradation`s.

mod post_commit;

pub use post_commit::{Degradation, PostCommitAction};

use std::sync::Arc;
use std::time::Instant;

use base64::Engine;
use chrono::Utc;
use serde::Serialize;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::ai::TextService;
use crate::catalog::{Denylist, IngredientCatalog};
use crate::config::PipelineConfig;
use crate::error::{ConfigError, CreationError};
use crate::imaging::{image_key, GeneratedImage, ImageGenerator, ImageService};
use crate::naming::{NameSource, NameValidator};
use crate::order_code::OrderCodeAllocator;
use crate::recipe::RecipeGenerator;
use crate::records;
use crate::store::{
    EventStore, NewEvent, ObjectStore, PromptStore, RecordStore, StoreError, SurveyStore,
};
use crate::types::{
    CocktailRecord, ColorDescriptor, CreationContext, CreationOptions, Event, ImageRef,
    RecipeItem, RecipeResult, Syrup,
};

/// External collaborators the pipeline is built from.
#[derive(Clone)]
pub struct Services {
    pub records: Arc<dyn RecordStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub events: Arc<dyn EventStore>,
    pub prompts: Arc<dyn PromptStore>,
    pub surveys: Arc<dyn SurveyStore>,
    pub text: Arc<dyn TextService>,
    pub images: Arc<dyn ImageService>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    EventResolution,
    Recipe,
    OrderCode,
    Image,
    Persist,
    PostCommit,
}

impl Stage {
    fn as_str(&self) -> &'static str {
        match self {
            Stage::EventResolution => "event_resolution",
            Stage::Recipe => "recipe",
            Stage::OrderCode => "order_code",
            Stage::Image => "image",
            Stage::Persist => "persist",
            Stage::PostCommit => "post_commit",
        }
    }

    fn span(&self) -> tracing::Span {
        info_span!("creation_stage", stage = self.as_str())
    }
}

/// A successfully created cocktail.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedCocktail {
    pub id: Uuid,
    pub order_code: String,
    pub name: String,
    pub concept: String,
    pub color: ColorDescriptor,
    pub recipe: Vec<RecipeItem>,
    pub image: ImageRef,
    pub degradations: Vec<Degradation>,
}

pub struct CocktailPipeline {
    records: Arc<dyn RecordStore>,
    objects: Arc<dyn ObjectStore>,
    events: Arc<dyn EventStore>,
    prompts: Arc<dyn PromptStore>,
    surveys: Arc<dyn SurveyStore>,
    recipes: RecipeGenerator,
    images: ImageGenerator,
    allocator: OrderCodeAllocator,
}

impl CocktailPipeline {
    pub fn new(
        services: Services,
        config: PipelineConfig,
        catalog: IngredientCatalog,
        denylist: Denylist,
    ) -> Self {
        let allocator = OrderCodeAllocator::new(config.max_code_attempts);
        Self::with_allocator(services, config, catalog, denylist, allocator)
    }

    /// Load the ingredient and denylist files named in `config`, then build.
    pub fn from_config(services: Services, config: PipelineConfig) -> Result<Self, ConfigError> {
        let catalog = IngredientCatalog::load(&config.ingredients_file)?;
        let denylist = Denylist::load(&config.denylist_file)?;
        Ok(Self::new(services, config, catalog, denylist))
    }

    pub fn with_allocator(
        services: Services,
        config: PipelineConfig,
        catalog: IngredientCatalog,
        denylist: Denylist,
        allocator: OrderCodeAllocator,
    ) -> Self {
        let recipes = RecipeGenerator::new(
            services.text,
            services.prompts.clone(),
            services.surveys.clone(),
            catalog,
            NameValidator::new(denylist),
            config.clone(),
        );
        let images = ImageGenerator::new(
            services.images,
            services.objects.clone(),
            services.prompts.clone(),
            config,
        );

        Self {
            records: services.records,
            objects: services.objects,
            events: services.events,
            prompts: services.prompts,
            surveys: services.surveys,
            recipes,
            images,
            allocator,
        }
    }

    pub fn records(&self) -> &dyn RecordStore {
        self.records.as_ref()
    }

    pub async fn find_by_order_code(
        &self,
        code: &str,
    ) -> Result<Option<CocktailRecord>, StoreError> {
        records::find_by_order_code(self.records.as_ref(), code).await
    }

    /// Run one creation end to end.
    pub async fn create(
        &self,
        ctx: &CreationContext,
        options: CreationOptions,
    ) -> Result<CreatedCocktail, CreationError> {
        let started = Instant::now();

        let event = self
            .resolve_event(ctx)
            .instrument(Stage::EventResolution.span())
            .await?;

        let recipe = self
            .recipes
            .generate(ctx, event.as_ref(), Utc::now())
            .instrument(Stage::Recipe.span())
            .await?;

        let id = Uuid::new_v4();
        let order_code = self
            .allocator
            .allocate(self.records.as_ref())
            .instrument(Stage::OrderCode.span())
            .await?;

        let image = self
            .images
            .generate(&recipe, ctx, id, options.use_object_storage)
            .instrument(Stage::Image.span())
            .await?;

        let mut degradations = Vec::new();
        if recipe.name_source == NameSource::Fallback {
            degradations.push(Degradation::FallbackName {
                name: recipe.name.clone(),
            });
        }
        if let Some(detail) = &image.upload_error {
            degradations.push(Degradation::UploadFailed {
                detail: detail.clone(),
            });
        }

        let image_ref = match &image.locator {
            Some(url) => ImageRef::Stored { url: url.clone() },
            None => ImageRef::Embedded {
                png: image.png.clone(),
            },
        };
        let record = build_record(
            id,
            order_code,
            &recipe,
            ctx,
            event.as_ref(),
            options,
            image_ref.clone(),
        );

        let order_code = match self.persist(record).instrument(Stage::Persist.span()).await {
            Ok(code) => code,
            Err(e) => {
                self.discard_upload(id, &image).await;
                return Err(e);
            }
        };

        let actions = post_commit::plan(ctx, event.as_ref());
        let failures = post_commit::run_all(
            &actions,
            id,
            self.prompts.as_ref(),
            self.surveys.as_ref(),
        )
        .instrument(Stage::PostCommit.span())
        .await;
        degradations.extend(failures);

        tracing::info!(
            cocktail_id = %id,
            order_code = %order_code,
            name = %recipe.name,
            degradations = degradations.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Cocktail created"
        );

        Ok(CreatedCocktail {
            id,
            order_code,
            name: recipe.name,
            concept: recipe.concept,
            color: recipe.color,
            recipe: recipe.recipe,
            image: image_ref,
            degradations,
        })
    }

    /// Explicit event id, else the named event (created if missing), else none.
    async fn resolve_event(&self, ctx: &CreationContext) -> Result<Option<Event>, CreationError> {
        if let Some(id) = ctx.event_id {
            match self
                .events
                .get(id)
                .await
                .map_err(CreationError::EventResolution)?
            {
                Some(event) => return Ok(Some(event)),
                None => tracing::warn!(event_id = %id, "Event not found, trying event name"),
            }
        }

        let Some(name) = ctx
            .event_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
        else {
            return Ok(None);
        };

        if let Some(event) = self
            .events
            .find_by_name(name)
            .await
            .map_err(CreationError::EventResolution)?
        {
            return Ok(Some(event));
        }

        let new_event = NewEvent {
            name: name.to_string(),
            description: Some(format!("Auto-created event: {}", name)),
            is_active: true,
        };
        match self.events.insert(new_event).await {
            Ok(event) => {
                tracing::info!(event_id = %event.id, name, "Auto-created event");
                Ok(Some(event))
            }
            // Another run created it between our lookup and insert.
            Err(e) if e.is_unique_violation() => self
                .events
                .find_by_name(name)
                .await
                .map_err(CreationError::EventResolution),
            Err(e) => Err(CreationError::EventResolution(e)),
        }
    }

    /// Insert the record. A concurrent run that claimed the same order code
    /// makes the insert fail; re-allocate and retry within the allocator's bound.
    async fn persist(&self, mut record: CocktailRecord) -> Result<String, CreationError> {
        let max_attempts = self.allocator.max_attempts();
        let mut attempt = 1;

        loop {
            match self.records.insert(record.clone()).await {
                Ok(_) => return Ok(record.order_code),
                Err(StoreError::UniqueViolation {
                    field: "order_code",
                }) if attempt < max_attempts => {
                    tracing::warn!(
                        order_code = %record.order_code,
                        attempt,
                        "Order code taken at insert, allocating another"
                    );
                    attempt += 1;
                    record.order_code = self.allocator.allocate(self.records.as_ref()).await?;
                }
                Err(StoreError::UniqueViolation {
                    field: "order_code",
                }) => {
                    return Err(CreationError::AllocationExhausted {
                        attempts: max_attempts,
                    })
                }
                Err(e) => return Err(CreationError::Persistence(e)),
            }
        }
    }

    /// Remove an uploaded image whose record was never written.
    async fn discard_upload(&self, id: Uuid, image: &GeneratedImage) {
        if image.locator.is_none() {
            return;
        }
        let key = image_key(id);
        match self.objects.delete(&key).await {
            Ok(()) => tracing::debug!(key = %key, "Deleted orphaned image"),
            Err(e) => tracing::warn!(key = %key, error = %e, "Failed to delete orphaned image"),
        }
    }
}

fn build_record(
    id: Uuid,
    order_code: String,
    recipe: &RecipeResult,
    ctx: &CreationContext,
    event: Option<&Event>,
    options: CreationOptions,
    image: ImageRef,
) -> CocktailRecord {
    let personal = |value: &str| {
        if options.retain_personal_context {
            value.to_string()
        } else {
            String::new()
        }
    };
    let event_name = event
        .map(|e| e.name.as_str())
        .or(ctx.event_name.as_deref())
        .unwrap_or("");

    CocktailRecord {
        id,
        order_code,
        name: recipe.name.clone(),
        concept: recipe.concept.clone(),
        flavor_ratios: Syrup::ALL.map(|syrup| recipe.ratio_of(syrup).to_string()),
        recent_event: personal(&ctx.recent_event),
        event_name: personal(event_name),
        user_name: personal(ctx.display_name.as_deref().unwrap_or("")),
        career: personal(&ctx.career),
        hobby: personal(&ctx.hobby),
        event_id: event.map(|e| e.id),
        image,
        is_visible: true,
        violation_count: None,
        hidden_at: None,
        copyright_confirmed_at: None,
        created_at: Utc::now(),
    }
}

/// Wire shape of a creation result, success or failure.
#[derive(Debug, Clone, Serialize)]
pub struct CreationResponse {
    pub result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cocktail_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concept: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe: Option<Vec<RecipeItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub degradations: Vec<Degradation>,
    pub requires_copyright_confirmation: bool,
}

impl CreationResponse {
    pub fn from_result(result: &Result<CreatedCocktail, CreationError>) -> Self {
        match result {
            Ok(created) => Self::success(created),
            Err(e) => Self::failure(e),
        }
    }

    fn success(created: &CreatedCocktail) -> Self {
        let (image_base64, image_url) = match &created.image {
            ImageRef::Stored { url } => (None, Some(url.clone())),
            ImageRef::Embedded { png } => (
                Some(base64::engine::general_purpose::STANDARD.encode(png)),
                None,
            ),
        };

        Self {
            result: "success",
            id: Some(created.id),
            order_id: Some(created.order_code.clone()),
            cocktail_name: Some(created.name.clone()),
            concept: Some(created.concept.clone()),
            color: Some(created.color.clone()),
            recipe: Some(created.recipe.clone()),
            image_base64,
            image_url,
            error_kind: None,
            detail: None,
            degradations: created.degradations.clone(),
            requires_copyright_confirmation: true,
        }
    }

    fn failure(error: &CreationError) -> Self {
        Self {
            result: "error",
            id: None,
            order_id: None,
            cocktail_name: None,
            concept: None,
            color: None,
            recipe: None,
            image_base64: None,
            image_url: None,
            error_kind: Some(error.kind()),
            detail: Some(error.to_string()),
            degradations: Vec::new(),
            requires_copyright_confirmation: false,
        }
    }
}
