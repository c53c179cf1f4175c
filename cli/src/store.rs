//! Filesystem-backed stores for the CLI.
//!
//! Layout under the data directory:
//! - `records/{id}.json` for cocktail records
//! - `objects/{key}` for images, e.g. `objects/cocktails/{id}.png`
//! - `events.json` for events, including auto-created ones
//! - `surveys.json` for operator-written surveys, `survey_responses/{id}.json` for answers
//! - `prompts.json` for operator-written prompt templates, `prompt_links.json` for links

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shaker_core::store::{
    EventStore, NewEvent, ObjectStore, PromptStore, RecordStore, StoreError, SurveyStore,
};
use shaker_core::types::RecordPatch;
use shaker_core::{CocktailRecord, Event, PromptRole, PromptTemplate, Survey, SurveyAnswer};
use tokio::sync::Mutex;
use uuid::Uuid;

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// A JSON array file. A missing file reads as empty.
fn read_list<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).map_err(backend),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(backend(e)),
    }
}

fn write_list<T: Serialize>(path: &Path, items: &[T]) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(items).map_err(backend)?;
    fs::write(path, json).map_err(backend)
}

/// One JSON file per record.
///
/// Writes are serialized through a lock so the order code check and the
/// write happen together within this process.
pub struct FileRecordStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileRecordStore {
    pub fn open(dir: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn read(&self, path: &Path) -> Result<Option<CocktailRecord>, StoreError> {
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).map(Some).map_err(backend),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(backend(e)),
        }
    }

    fn write(&self, record: &CocktailRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(record).map_err(backend)?;
        fs::write(self.record_path(record.id), json).map_err(backend)
    }

    fn load_all(&self) -> Result<Vec<CocktailRecord>, StoreError> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(backend)? {
            let path = entry.map_err(backend)?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match self.read(&path) {
                    Ok(Some(record)) => records.push(record),
                    Ok(None) => {}
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable record"),
                }
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn insert(&self, record: CocktailRecord) -> Result<Uuid, StoreError> {
        let _guard = self.write_lock.lock().await;

        if self.record_path(record.id).exists() {
            return Err(StoreError::UniqueViolation { field: "id" });
        }
        if self
            .load_all()?
            .iter()
            .any(|r| r.order_code == record.order_code)
        {
            return Err(StoreError::UniqueViolation {
                field: "order_code",
            });
        }

        self.write(&record)?;
        Ok(record.id)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<CocktailRecord>, StoreError> {
        Ok(self.load_all()?.into_iter().find(|r| r.order_code == code))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CocktailRecord>, StoreError> {
        self.read(&self.record_path(id))
    }

    async fn update(&self, id: Uuid, patch: RecordPatch) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;

        let Some(mut record) = self.read(&self.record_path(id))? else {
            return Ok(false);
        };
        patch.apply(&mut record);
        self.write(&record)?;
        Ok(true)
    }
}

/// Objects as plain files, addressed by `file://` URLs.
pub struct DirObjectStore {
    root: PathBuf,
}

impl DirObjectStore {
    pub fn open(root: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.canonicalize()?,
        })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ObjectStore for DirObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StoreError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(backend)?;
        }
        fs::write(&path, bytes).map_err(backend)?;
        Ok(self.public_url(key))
    }

    fn public_url(&self, key: &str) -> String {
        format!("file://{}", self.path_for(key).display())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(backend(e)),
        }
    }
}

/// Events in `events.json`. Names are unique.
pub struct FileEventStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileEventStore {
    pub fn open(dir: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join("events.json"),
            write_lock: Mutex::new(()),
        })
    }

    fn events(&self) -> Result<Vec<Event>, StoreError> {
        read_list(&self.path)
    }
}

#[async_trait]
impl EventStore for FileEventStore {
    async fn get(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(self.events()?.into_iter().find(|e| e.id == id))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Event>, StoreError> {
        Ok(self.events()?.into_iter().find(|e| e.name == name))
    }

    async fn insert(&self, event: NewEvent) -> Result<Event, StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut events = self.events()?;
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
        write_list(&self.path, &events)?;
        Ok(event)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SurveyResponseFile {
    id: Uuid,
    survey_id: Uuid,
    cocktail_id: Uuid,
    answers: Vec<SurveyAnswer>,
    submitted_at: DateTime<Utc>,
}

/// Surveys read from `surveys.json`; each submission is its own file.
pub struct FileSurveyStore {
    surveys_path: PathBuf,
    responses_dir: PathBuf,
}

impl FileSurveyStore {
    pub fn open(dir: &Path) -> std::io::Result<Self> {
        let responses_dir = dir.join("survey_responses");
        fs::create_dir_all(&responses_dir)?;
        Ok(Self {
            surveys_path: dir.join("surveys.json"),
            responses_dir,
        })
    }
}

#[async_trait]
impl SurveyStore for FileSurveyStore {
    async fn active_for_event(&self, event_id: Uuid) -> Result<Option<Survey>, StoreError> {
        Ok(read_list::<Survey>(&self.surveys_path)?
            .into_iter()
            .find(|s| s.event_id == event_id && s.is_active))
    }

    async fn submit(
        &self,
        survey_id: Uuid,
        cocktail_id: Uuid,
        answers: &[SurveyAnswer],
    ) -> Result<Uuid, StoreError> {
        let response = SurveyResponseFile {
            id: Uuid::new_v4(),
            survey_id,
            cocktail_id,
            answers: answers.to_vec(),
            submitted_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&response).map_err(backend)?;
        fs::write(self.responses_dir.join(format!("{}.json", response.id)), json)
            .map_err(backend)?;
        Ok(response.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PromptLink {
    cocktail_id: Uuid,
    prompt_id: Uuid,
    role: PromptRole,
}

/// Templates read from `prompts.json`; links kept in `prompt_links.json`.
pub struct FilePromptStore {
    templates_path: PathBuf,
    links_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FilePromptStore {
    pub fn open(dir: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            templates_path: dir.join("prompts.json"),
            links_path: dir.join("prompt_links.json"),
            write_lock: Mutex::new(()),
        })
    }

    fn templates(&self) -> Result<Vec<PromptTemplate>, StoreError> {
        read_list(&self.templates_path)
    }
}

#[async_trait]
impl PromptStore for FilePromptStore {
    async fn get(&self, id: Uuid) -> Result<Option<PromptTemplate>, StoreError> {
        Ok(self.templates()?.into_iter().find(|t| t.id == id))
    }

    async fn first_active(&self, role: PromptRole) -> Result<Option<PromptTemplate>, StoreError> {
        Ok(self
            .templates()?
            .into_iter()
            .find(|t| t.role == role && t.is_active))
    }

    async fn link(
        &self,
        cocktail_id: Uuid,
        prompt_id: Uuid,
        role: PromptRole,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut links: Vec<PromptLink> = read_list(&self.links_path)?;
        if links
            .iter()
            .any(|l| l.cocktail_id == cocktail_id && l.role == role)
        {
            return Err(StoreError::UniqueViolation {
                field: "cocktail_prompt",
            });
        }
        links.push(PromptLink {
            cocktail_id,
            prompt_id,
            role,
        });
        write_list(&self.links_path, &links)
    }
}
