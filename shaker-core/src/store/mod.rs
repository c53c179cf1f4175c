//! Collaborator interfaces for persistence.
//!
//! The pipeline never talks to a database or bucket directly. Each store is a
//! trait object handed in at construction, so tests and the CLI can supply
//! their own implementations.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::types::{
    CocktailRecord, Event, PromptRole, PromptTemplate, RecordPatch, Survey, SurveyAnswer,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unique constraint violated on {field}")]
    UniqueViolation { field: &'static str },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }
}

/// Durable cocktail records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new record. Fails with `UniqueViolation` if the id or order code exists.
    async fn insert(&self, record: CocktailRecord) -> Result<Uuid, StoreError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<CocktailRecord>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CocktailRecord>, StoreError>;

    /// Apply a partial update. Returns false if no record has this id.
    async fn update(&self, id: Uuid, patch: RecordPatch) -> Result<bool, StoreError>;
}

/// Binary blob storage with publicly readable locators.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes under `key` and return the public locator.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<String, StoreError>;

    fn public_url(&self, key: &str) -> String;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Event>, StoreError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Event>, StoreError>;

    async fn insert(&self, event: NewEvent) -> Result<Event, StoreError>;
}

/// Operator-managed prompt templates and their links to cocktails.
#[async_trait]
pub trait PromptStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<PromptTemplate>, StoreError>;

    /// The first active template for `role`, used when the caller picks none.
    async fn first_active(&self, role: PromptRole) -> Result<Option<PromptTemplate>, StoreError>;

    async fn link(&self, cocktail_id: Uuid, prompt_id: Uuid, role: PromptRole)
        -> Result<(), StoreError>;
}

#[async_trait]
pub trait SurveyStore: Send + Sync {
    /// The first active survey (with its questions) for an event.
    async fn active_for_event(&self, event_id: Uuid) -> Result<Option<Survey>, StoreError>;

    /// Save answers against a cocktail. Returns the response id.
    async fn submit(
        &self,
        survey_id: Uuid,
        cocktail_id: Uuid,
        answers: &[SurveyAnswer],
    ) -> Result<Uuid, StoreError>;
}

/// Load the caller-selected template for `role`.
///
/// Returns `None` (meaning: use the built-in instruction) when no id is given,
/// the template does not exist, its role differs, or the lookup fails.
pub async fn selected_template(
    prompts: &dyn PromptStore,
    id: Option<Uuid>,
    role: PromptRole,
) -> Option<PromptTemplate> {
    let id = id?;
    match prompts.get(id).await {
        Ok(Some(template)) if template.role == role => Some(template),
        Ok(Some(template)) => {
            tracing::warn!(
                prompt_id = %id,
                expected = role.as_str(),
                actual = template.role.as_str(),
                "Prompt template has the wrong role, using default instruction"
            );
            None
        }
        Ok(None) => {
            tracing::warn!(prompt_id = %id, "Prompt template not found, using default instruction");
            None
        }
        Err(e) => {
            tracing::warn!(prompt_id = %id, error = %e, "Prompt template lookup failed, using default instruction");
            None
        }
    }
}
