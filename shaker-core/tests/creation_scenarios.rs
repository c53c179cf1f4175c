//! End-to-end creation runs against in-memory collaborators.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use shaker_core::ai::FakeTextService;
use shaker_core::imaging::FakeImageService;
use shaker_core::order_code::draw_candidate;
use shaker_core::store::memory::{
    sample_record, MemoryEventStore, MemoryObjectStore, MemoryPromptStore, MemoryRecordStore,
    MemorySurveyStore,
};
use shaker_core::store::RecordStore;
use shaker_core::types::{QuestionOption, SurveyQuestion};
use shaker_core::{
    CocktailPipeline, CreationContext, CreationError, CreationOptions, CreationResponse,
    Degradation, Denylist, Event, ImageRef, IngredientCatalog, NameValidator,
    OrderCodeAllocator, PipelineConfig, PromptRole, PromptTemplate, Services, Survey,
    SurveyAnswer, Syrup,
};

const DENYLISTED_RECIPE: &str = r#"{
  "cocktail_name": "Hogwarts Sunrise",
  "concept": "A warm welcome for spring",
  "color": {"name": "Blossom", "description": "soft pink", "target_rgb": "RGB(255,182,193)"},
  "recipe": [
    {"syrup": "Berry", "ratio": "20%"},
    {"syrup": "White", "ratio": "5%"}
  ]
}"#;

const CLEAN_RECIPE: &str = r#"{
  "cocktail_name": "Harbor Lights",
  "concept": "Evenings by the sea",
  "color": {"name": "Teal", "description": "deep teal", "target_rgb": "RGB(0,128,128)"},
  "recipe": [
    {"syrup": "Berry", "ratio": "10%"},
    {"syrup": "Green Apple", "ratio": "20%"},
    {"syrup": "Citrus", "ratio": "15%"},
    {"syrup": "White", "ratio": "5%"}
  ]
}"#;

fn data_file(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("data")
        .join(name)
}

struct World {
    records: Arc<MemoryRecordStore>,
    objects: Arc<MemoryObjectStore>,
    events: Arc<MemoryEventStore>,
    prompts: Arc<MemoryPromptStore>,
    surveys: Arc<MemorySurveyStore>,
    text: Arc<FakeTextService>,
    images: Arc<FakeImageService>,
}

impl World {
    fn new(text: FakeTextService) -> Self {
        Self::with(text, FakeImageService::solid(64, 96), MemoryObjectStore::default())
    }

    fn with(text: FakeTextService, images: FakeImageService, objects: MemoryObjectStore) -> Self {
        Self {
            records: Arc::new(MemoryRecordStore::new()),
            objects: Arc::new(objects),
            events: Arc::new(MemoryEventStore::new()),
            prompts: Arc::new(MemoryPromptStore::new()),
            surveys: Arc::new(MemorySurveyStore::new()),
            text: Arc::new(text),
            images: Arc::new(images),
        }
    }

    fn services(&self) -> Services {
        Services {
            records: self.records.clone(),
            objects: self.objects.clone(),
            events: self.events.clone(),
            prompts: self.prompts.clone(),
            surveys: self.surveys.clone(),
            text: self.text.clone(),
            images: self.images.clone(),
        }
    }

    fn pipeline(&self, config: PipelineConfig, allocator: OrderCodeAllocator) -> CocktailPipeline {
        CocktailPipeline::with_allocator(
            self.services(),
            config,
            IngredientCatalog::load(&data_file("ingredients.txt")).unwrap(),
            Denylist::load(&data_file("name_denylist.txt")).unwrap(),
            allocator,
        )
    }
}

fn config() -> PipelineConfig {
    PipelineConfig {
        target_width: 24,
        target_height: 36,
        text_timeout: Duration::from_millis(300),
        image_timeout: Duration::from_millis(300),
        ..Default::default()
    }
}

fn allocator(seed: u64) -> OrderCodeAllocator {
    OrderCodeAllocator::with_rng(ChaCha8Rng::seed_from_u64(seed), 10)
}

fn predicted_codes(seed: u64, n: usize) -> Vec<String> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n).map(|_| draw_candidate(&mut rng).to_string()).collect()
}

fn spring_mixer() -> CreationContext {
    CreationContext {
        recent_event: "finished a marathon".to_string(),
        career: "nurse".to_string(),
        hobby: "painting".to_string(),
        event_name: Some("Spring Mixer".to_string()),
        ..Default::default()
    }
}

#[test]
fn shipped_data_files_load() {
    let catalog = IngredientCatalog::load(&data_file("ingredients.txt")).unwrap();
    for syrup in Syrup::ALL {
        assert!(catalog.description(syrup).is_some(), "{}", syrup);
    }
    let denylist = Denylist::load(&data_file("name_denylist.txt")).unwrap();
    assert!(denylist.find_in("Hogwarts Sunrise").is_some());
}

#[tokio::test]
async fn denylisted_name_is_repaired() {
    let world = World::new(FakeTextService::new().with_default_response(DENYLISTED_RECIPE));
    let pipeline = world.pipeline(config(), allocator(11));

    let created = pipeline
        .create(&spring_mixer(), CreationOptions::default())
        .await
        .unwrap();

    let validator = NameValidator::new(Denylist::load(&data_file("name_denylist.txt")).unwrap());
    assert_ne!(created.name, "Hogwarts Sunrise");
    assert!(validator.accepts(&created.name), "{}", created.name);

    let record = world.records.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(record.name, created.name);
    assert_eq!(record.event_name, "Spring Mixer");
    assert_eq!(record.career, "nurse");
    assert_eq!(record.hobby, "painting");
    assert_eq!(record.flavor_ratios, ["20%", "0%", "0%", "5%"].map(String::from));
}

#[tokio::test]
async fn fourth_code_candidate_wins_after_four_lookups() {
    let world = World::new(FakeTextService::new().with_default_response(CLEAN_RECIPE));
    let codes = predicted_codes(42, 4);
    for code in &codes[..3] {
        world.records.seed(sample_record(code)).await;
    }
    let pipeline = world.pipeline(config(), allocator(42));

    let created = pipeline
        .create(&CreationContext::default(), CreationOptions::default())
        .await
        .unwrap();

    assert_eq!(created.order_code, codes[3]);
    assert_eq!(world.records.code_lookups(), 4);
}

#[tokio::test]
async fn image_timeout_writes_nothing() {
    let world = World::with(
        FakeTextService::new().with_default_response(CLEAN_RECIPE),
        FakeImageService::solid(64, 96).with_delay(Duration::from_secs(10)),
        MemoryObjectStore::default(),
    );
    let pipeline = world.pipeline(config(), allocator(1));

    let result = pipeline
        .create(&spring_mixer(), CreationOptions::default())
        .await;

    let err = result.as_ref().unwrap_err();
    assert!(matches!(err, CreationError::ImageService(_)));
    assert_eq!(err.kind(), "image_timeout");
    assert!(world.records.is_empty().await);
    assert!(world.objects.is_empty().await);
    assert!(world.prompts.links().await.is_empty());

    let response = CreationResponse::from_result(&result);
    assert_eq!(response.result, "error");
    assert!(response.detail.is_some());
}

#[tokio::test]
async fn upload_failure_returns_embedded_image() {
    let world = World::with(
        FakeTextService::new().with_default_response(CLEAN_RECIPE),
        FakeImageService::solid(64, 96),
        MemoryObjectStore::failing(),
    );
    let pipeline = world.pipeline(config(), allocator(2));

    let result = pipeline
        .create(&spring_mixer(), CreationOptions::default())
        .await;
    let created = result.as_ref().unwrap();

    let ImageRef::Embedded { png } = &created.image else {
        panic!("expected embedded image, got {:?}", created.image);
    };
    let decoded = image::load_from_memory(png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (24, 36));
    assert!(created
        .degradations
        .iter()
        .any(|d| matches!(d, Degradation::UploadFailed { .. })));

    let record = world.records.find_by_id(created.id).await.unwrap().unwrap();
    assert!(matches!(record.image, ImageRef::Embedded { .. }));

    let response = CreationResponse::from_result(&result);
    assert_eq!(response.result, "success");
    assert!(response.image_base64.is_some());
    assert!(response.image_url.is_none());
}

#[tokio::test]
async fn stored_image_is_keyed_by_primary_id() {
    let world = World::new(FakeTextService::new().with_default_response(CLEAN_RECIPE));
    let pipeline = world.pipeline(config(), allocator(3));

    let created = pipeline
        .create(&spring_mixer(), CreationOptions::default())
        .await
        .unwrap();

    let key = format!("cocktails/{}.png", created.id);
    assert!(world.objects.get(&key).await.is_some());
    assert_eq!(
        created.image,
        ImageRef::Stored {
            url: format!("https://objects.test/public/{}", key)
        }
    );
    assert!(created.degradations.is_empty());
}

#[tokio::test]
async fn no_storage_option_skips_upload() {
    let world = World::new(FakeTextService::new().with_default_response(CLEAN_RECIPE));
    let pipeline = world.pipeline(config(), allocator(4));
    let options = CreationOptions {
        use_object_storage: false,
        ..Default::default()
    };

    let created = pipeline.create(&spring_mixer(), options).await.unwrap();

    assert!(matches!(created.image, ImageRef::Embedded { .. }));
    assert!(world.objects.is_empty().await);
    assert!(created.degradations.is_empty());
}

#[tokio::test]
async fn image_service_error_writes_nothing() {
    let world = World::with(
        FakeTextService::new().with_default_response(CLEAN_RECIPE),
        FakeImageService::failing("content policy"),
        MemoryObjectStore::default(),
    );
    let pipeline = world.pipeline(config(), allocator(11));

    let err = pipeline
        .create(&spring_mixer(), CreationOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "image_service");
    assert!(world.records.is_empty().await);
    assert!(world.objects.is_empty().await);
    assert!(world.prompts.links().await.is_empty());
}

#[tokio::test]
async fn malformed_recipe_reply_writes_nothing() {
    let truncated = &CLEAN_RECIPE[..CLEAN_RECIPE.len() / 2];
    let world = World::new(FakeTextService::new().with_default_response(truncated));
    let pipeline = world.pipeline(config(), allocator(12));

    let result = pipeline
        .create(&spring_mixer(), CreationOptions::default())
        .await;

    let err = result.as_ref().unwrap_err();
    assert!(matches!(err, CreationError::MalformedResponse(_)));
    assert_eq!(world.images.call_count(), 0);
    assert_eq!(world.records.code_lookups(), 0);
    assert!(world.records.is_empty().await);
    assert!(world.objects.is_empty().await);

    let response = CreationResponse::from_result(&result);
    assert_eq!(response.error_kind, Some("malformed_response"));
    assert!(!response.requires_copyright_confirmation);
}

#[tokio::test]
async fn event_lookup_failure_aborts_before_generation() {
    let world = World::new(FakeTextService::new().with_default_response(CLEAN_RECIPE));
    world.events.fail_lookups();
    let pipeline = world.pipeline(config(), allocator(13));

    let err = pipeline
        .create(&spring_mixer(), CreationOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, CreationError::EventResolution(_)));
    assert_eq!(world.text.call_count(), 0);
    assert_eq!(world.images.call_count(), 0);
    assert!(world.records.is_empty().await);
    assert!(world.events.all().await.is_empty());
}

#[tokio::test]
async fn text_timeout_is_fatal_before_image() {
    let world = World::new(
        FakeTextService::new()
            .with_default_response(CLEAN_RECIPE)
            .with_delay(Duration::from_secs(10)),
    );
    let pipeline = world.pipeline(config(), allocator(5));

    let err = pipeline
        .create(&spring_mixer(), CreationOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "generation_timeout");
    assert_eq!(world.images.call_count(), 0);
    assert_eq!(world.records.code_lookups(), 0);
    assert!(world.records.is_empty().await);
}

#[tokio::test]
async fn insert_race_reallocates_code() {
    let world = World::new(FakeTextService::new().with_default_response(CLEAN_RECIPE));
    world.records.reject_next_inserts(2);
    let codes = predicted_codes(6, 3);
    let pipeline = world.pipeline(config(), allocator(6));

    let created = pipeline
        .create(&CreationContext::default(), CreationOptions::default())
        .await
        .unwrap();

    assert_eq!(created.order_code, codes[2]);
    assert_eq!(world.records.code_lookups(), 3);
    assert_eq!(world.records.len().await, 1);
}

#[tokio::test]
async fn insert_races_exhaust_bound_and_remove_upload() {
    let world = World::new(FakeTextService::new().with_default_response(CLEAN_RECIPE));
    world.records.reject_next_inserts(100);
    let config = PipelineConfig {
        max_code_attempts: 3,
        ..config()
    };
    let pipeline = world.pipeline(
        config,
        OrderCodeAllocator::with_rng(ChaCha8Rng::seed_from_u64(7), 3),
    );

    let err = pipeline
        .create(&spring_mixer(), CreationOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, CreationError::AllocationExhausted { attempts: 3 }));
    assert!(world.records.is_empty().await);
    assert!(world.objects.is_empty().await);
}

#[tokio::test]
async fn post_commit_failures_do_not_fail_creation() {
    let world = World::new(FakeTextService::new().with_default_response(CLEAN_RECIPE));
    let event = Event {
        id: Uuid::new_v4(),
        name: "Spring Mixer".to_string(),
        description: None,
        is_active: true,
    };
    world.events.seed(event.clone()).await;
    let question_id = Uuid::new_v4();
    world
        .surveys
        .seed(Survey {
            id: Uuid::new_v4(),
            event_id: event.id,
            title: "Mixer survey".to_string(),
            description: None,
            is_active: true,
            questions: vec![SurveyQuestion {
                id: question_id,
                text: "Pick a season".to_string(),
                options: vec![QuestionOption {
                    id: Uuid::from_u128(7),
                    text: "Spring".to_string(),
                }],
            }],
        })
        .await;
    world
        .prompts
        .seed(PromptTemplate {
            id: Uuid::new_v4(),
            name: "Default recipe".to_string(),
            role: PromptRole::Recipe,
            text: "Be bold.".to_string(),
            is_active: true,
        })
        .await;
    world.prompts.fail_links();
    world.surveys.fail_submits();

    let ctx = CreationContext {
        event_id: Some(event.id),
        survey_answers: vec![SurveyAnswer {
            question_id,
            answer_text: None,
            selected_option_ids: vec![Uuid::from_u128(7)],
        }],
        ..spring_mixer()
    };
    let pipeline = world.pipeline(config(), allocator(8));

    let created = pipeline.create(&ctx, CreationOptions::default()).await.unwrap();

    assert!(world.records.find_by_id(created.id).await.unwrap().is_some());
    assert!(created.degradations.iter().any(|d| matches!(
        d,
        Degradation::LinkageFailed {
            role: PromptRole::Recipe,
            ..
        }
    )));
    assert!(created
        .degradations
        .iter()
        .any(|d| matches!(d, Degradation::SurveySaveFailed { .. })));
    assert!(world
        .text
        .prompt(0)
        .unwrap()
        .contains("Question: Pick a season\nAnswer: Spring"));
}

#[tokio::test]
async fn survey_answers_and_prompt_links_are_saved() {
    let world = World::new(FakeTextService::new().with_default_response(CLEAN_RECIPE));
    let event = Event {
        id: Uuid::new_v4(),
        name: "Spring Mixer".to_string(),
        description: None,
        is_active: true,
    };
    world.events.seed(event.clone()).await;
    let survey_id = Uuid::new_v4();
    world
        .surveys
        .seed(Survey {
            id: survey_id,
            event_id: event.id,
            title: "Mixer survey".to_string(),
            description: None,
            is_active: true,
            questions: vec![],
        })
        .await;
    let image_template = PromptTemplate {
        id: Uuid::new_v4(),
        name: "Neon".to_string(),
        role: PromptRole::Image,
        text: "Neon-lit bar counter.".to_string(),
        is_active: true,
    };
    world.prompts.seed(image_template.clone()).await;

    let ctx = CreationContext {
        event_id: Some(event.id),
        image_prompt_id: Some(image_template.id),
        survey_answers: vec![SurveyAnswer {
            question_id: Uuid::new_v4(),
            answer_text: Some("Jazz".to_string()),
            selected_option_ids: vec![],
        }],
        ..spring_mixer()
    };
    let pipeline = world.pipeline(config(), allocator(9));

    let created = pipeline.create(&ctx, CreationOptions::default()).await.unwrap();

    assert!(created.degradations.is_empty());
    assert_eq!(
        world.prompts.links().await,
        vec![(created.id, image_template.id, PromptRole::Image)]
    );
    let submissions = world.surveys.submissions().await;
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].survey_id, survey_id);
    assert_eq!(submissions[0].cocktail_id, created.id);
    assert!(world.images.requests()[0]
        .prompt
        .ends_with("Neon-lit bar counter."));
}

#[tokio::test]
async fn fallback_name_is_flagged() {
    let text = FakeTextService::new()
        .and_error("cannot be used", "overloaded")
        .and_response("Available syrups", DENYLISTED_RECIPE);
    let world = World::new(text);
    let config = PipelineConfig {
        max_name_retries: 0,
        ..config()
    };
    let pipeline = world.pipeline(config, allocator(10));

    let created = pipeline
        .create(&spring_mixer(), CreationOptions::default())
        .await
        .unwrap();

    assert!(created.name.starts_with("Tonight's Inspiration "));
    assert!(created
        .degradations
        .iter()
        .any(|d| matches!(d, Degradation::FallbackName { .. })));
    assert_eq!(world.text.prompt_names(), vec!["recipe", "rename"]);
}

#[tokio::test]
async fn every_recipe_has_four_syrups() {
    let world = World::new(FakeTextService::new().with_default_response(DENYLISTED_RECIPE));
    let pipeline = world.pipeline(config(), allocator(12));

    let created = pipeline
        .create(&spring_mixer(), CreationOptions::default())
        .await
        .unwrap();

    let syrups: Vec<Syrup> = created.recipe.iter().map(|item| item.syrup).collect();
    assert_eq!(syrups, Syrup::ALL.to_vec());
    assert_eq!(created.recipe[1].ratio, "0%");
}

#[tokio::test]
async fn copyright_confirmation_round_trip() {
    let world = World::new(FakeTextService::new().with_default_response(CLEAN_RECIPE));
    let pipeline = world.pipeline(config(), allocator(13));
    let created = pipeline
        .create(&spring_mixer(), CreationOptions::default())
        .await
        .unwrap();

    let status = shaker_core::records::copyright_status(pipeline.records(), created.id)
        .await
        .unwrap();
    assert!(!status.confirmed);

    let confirmed =
        shaker_core::records::confirm_copyright(pipeline.records(), created.id, chrono::Utc::now())
            .await
            .unwrap();
    assert!(confirmed.confirmed);

    let record = pipeline
        .find_by_order_code(&created.order_code)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.copyright_confirmed_at, confirmed.confirmed_at);
    assert_eq!(record.name, created.name);
}
