//! In-memory store implementations.
//!
//! Used by tests and by anyone embedding the pipeline without a database.
//! Failure switches let tests exercise the pipeline's degraded paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    EventStore, NewEvent, ObjectStore, PromptStore, RecordStore, StoreError, SurveyStore,
};
use crate::types::{
    CocktailRecord, Event, ImageRef, PromptRole, PromptTemplate, RecordPatch, Survey,
    SurveyAnswer,
};

/// Records keyed by id, with a unique order code constraint.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<Uuid, CocktailRecord>>,
    code_lookups: AtomicUsize,
    /// Number of upcoming inserts to reject as order code collisions.
    reject_inserts: AtomicUsize,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert without constraint checks or lookup accounting.
    pub async fn seed(&self, record: CocktailRecord) {
        self.records.write().await.insert(record.id, record);
    }

    /// Make the next `n` inserts fail with an order code `UniqueViolation`,
    /// as if a concurrent run had claimed the code first.
    pub fn reject_next_inserts(&self, n: usize) {
        self.reject_inserts.store(n, Ordering::SeqCst);
    }

    /// How many `find_by_code` calls have been made.
    pub fn code_lookups(&self) -> usize {
        self.code_lookups.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn all(&self) -> Vec<CocktailRecord> {
        self.records.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: CocktailRecord) -> Result<Uuid, StoreError> {
        let rejected = self
            .reject_inserts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(StoreError::UniqueViolation {
                field: "order_code",
            });
        }

        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(StoreError::UniqueViolation { field: "id" });
        }
        if records.values().any(|r| r.order_code == record.order_code) {
            return Err(StoreError::UniqueViolation {
                field: "order_code",
            });
        }
        let id = record.id;
        records.insert(id, record);
        Ok(id)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<CocktailRecord>, StoreError> {
        self.code_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.order_code == code)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CocktailRecord>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, patch: RecordPatch) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(&id) {
            Some(record) => {
                patch.apply(record);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// A stored blob.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Blobs kept in a map, with URLs under a fake public base.
pub struct MemoryObjectStore {
    base_url: String,
    objects: RwLock<HashMap<String, StoredObject>>,
    fail_puts: AtomicBool,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new("https://objects.test/public")
    }
}

impl MemoryObjectStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            objects: RwLock::new(HashMap::new()),
            fail_puts: AtomicBool::new(false),
        }
    }

    /// A store whose uploads always fail.
    pub fn failing() -> Self {
        let store = Self::default();
        store.fail_puts.store(true, Ordering::SeqCst);
        store
    }

    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("upload rejected".to_string()));
        }
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(self.public_url(key))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.objects.write().await.remove(key);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryEventStore {
    events: RwLock<Vec<Event>>,
    fail_lookups: AtomicBool,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, event: Event) {
        self.events.write().await.push(event);
    }

    pub async fn all(&self) -> Vec<Event> {
        self.events.read().await.clone()
    }

    /// Make `get` and `find_by_name` fail.
    pub fn fail_lookups(&self) {
        self.fail_lookups.store(true, Ordering::SeqCst);
    }

    fn check_lookup(&self) -> Result<(), StoreError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("event table unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn get(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        self.check_lookup()?;
        Ok(self
            .events
            .read()
            .await
            .iter()
            .find(|e| e.id == id)
            .cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Event>, StoreError> {
        self.check_lookup()?;
        Ok(self
            .events
            .read()
            .await
            .iter()
            .find(|e| e.name == name)
            .cloned())
    }

    async fn insert(&self, event: NewEvent) -> Result<Event, StoreError> {
        let mut events = self.events.write().await;
        if events.iter().any(|e| e.name == event.name) {
            return Err(StoreError::UniqueViolation { field: "name" });
        }
        let event = Event {
            id: Uuid::new_v4(),
            name: event.name,
            description: event.description,
            is_active: event.is_active,
        };
        events.push(event.clone());
        Ok(event)
    }
}

#[derive(Default)]
pub struct MemoryPromptStore {
    templates: RwLock<Vec<PromptTemplate>>,
    links: RwLock<Vec<(Uuid, Uuid, PromptRole)>>,
    fail_links: AtomicBool,
}

impl MemoryPromptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, template: PromptTemplate) {
        self.templates.write().await.push(template);
    }

    /// Make every `link` call fail.
    pub fn fail_links(&self) {
        self.fail_links.store(true, Ordering::SeqCst);
    }

    /// Links as (cocktail id, prompt id, role), in insertion order.
    pub async fn links(&self) -> Vec<(Uuid, Uuid, PromptRole)> {
        self.links.read().await.clone()
    }
}

#[async_trait]
impl PromptStore for MemoryPromptStore {
    async fn get(&self, id: Uuid) -> Result<Option<PromptTemplate>, StoreError> {
        Ok(self
            .templates
            .read()
            .await
            .iter()
            .find(|t| t.id == id)
            .cloned())
    }

    async fn first_active(&self, role: PromptRole) -> Result<Option<PromptTemplate>, StoreError> {
        Ok(self
            .templates
            .read()
            .await
            .iter()
            .find(|t| t.role == role && t.is_active)
            .cloned())
    }

    async fn link(
        &self,
        cocktail_id: Uuid,
        prompt_id: Uuid,
        role: PromptRole,
    ) -> Result<(), StoreError> {
        if self.fail_links.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("link table unavailable".to_string()));
        }
        let mut links = self.links.write().await;
        if links
            .iter()
            .any(|(c, _, r)| *c == cocktail_id && *r == role)
        {
            return Err(StoreError::UniqueViolation {
                field: "cocktail_prompt",
            });
        }
        links.push((cocktail_id, prompt_id, role));
        Ok(())
    }
}

/// A submitted set of survey answers.
#[derive(Debug, Clone)]
pub struct SurveySubmission {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub cocktail_id: Uuid,
    pub answers: Vec<SurveyAnswer>,
}

#[derive(Default)]
pub struct MemorySurveyStore {
    surveys: RwLock<Vec<Survey>>,
    submissions: RwLock<Vec<SurveySubmission>>,
    fail_lookups: AtomicBool,
    fail_submits: AtomicBool,
}

impl MemorySurveyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, survey: Survey) {
        self.surveys.write().await.push(survey);
    }

    pub fn fail_lookups(&self) {
        self.fail_lookups.store(true, Ordering::SeqCst);
    }

    pub fn fail_submits(&self) {
        self.fail_submits.store(true, Ordering::SeqCst);
    }

    pub async fn submissions(&self) -> Vec<SurveySubmission> {
        self.submissions.read().await.clone()
    }
}

#[async_trait]
impl SurveyStore for MemorySurveyStore {
    async fn active_for_event(&self, event_id: Uuid) -> Result<Option<Survey>, StoreError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("survey table unavailable".to_string()));
        }
        Ok(self
            .surveys
            .read()
            .await
            .iter()
            .find(|s| s.event_id == event_id && s.is_active)
            .cloned())
    }

    async fn submit(
        &self,
        survey_id: Uuid,
        cocktail_id: Uuid,
        answers: &[SurveyAnswer],
    ) -> Result<Uuid, StoreError> {
        if self.fail_submits.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("survey table unavailable".to_string()));
        }
        let id = Uuid::new_v4();
        self.submissions.write().await.push(SurveySubmission {
            id,
            survey_id,
            cocktail_id,
            answers: answers.to_vec(),
        });
        Ok(id)
    }
}

/// A minimal visible record with the given order code.
pub fn sample_record(order_code: &str) -> CocktailRecord {
    CocktailRecord {
        id: Uuid::new_v4(),
        order_code: order_code.to_string(),
        name: "Sample Sunrise".to_string(),
        concept: "A sample".to_string(),
        flavor_ratios: [
            "10%".to_string(),
            "10%".to_string(),
            "10%".to_string(),
            "5%".to_string(),
        ],
        recent_event: String::new(),
        event_name: String::new(),
        user_name: String::new(),
        career: String::new(),
        hobby: String::new(),
        event_id: None,
        image: ImageRef::Stored {
            url: format!("https://objects.test/public/cocktails/{}.png", order_code),
        },
        is_visible: true,
        violation_count: None,
        hidden_at: None,
        copyright_confirmed_at: None,
        created_at: Utc::now(),
    }
}
