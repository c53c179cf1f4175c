use std::fmt;

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::naming::NameSource;

/// The four syrups every recipe is expressed in, in their storage order.
/// Serialized under their display names, as listed in the ingredient file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Syrup {
    #[serde(alias = "berry")]
    Berry,
    #[serde(rename = "Green Apple", alias = "green_apple")]
    GreenApple,
    #[serde(alias = "citrus")]
    Citrus,
    #[serde(alias = "white")]
    White,
}

impl Syrup {
    pub const ALL: [Syrup; 4] = [Syrup::Berry, Syrup::GreenApple, Syrup::Citrus, Syrup::White];

    pub fn display_name(&self) -> &'static str {
        match self {
            Syrup::Berry => "Berry",
            Syrup::GreenApple => "Green Apple",
            Syrup::Citrus => "Citrus",
            Syrup::White => "White",
        }
    }

    /// Position of this syrup in `ALL` and in the record's ratio fields.
    pub fn index(&self) -> usize {
        match self {
            Syrup::Berry => 0,
            Syrup::GreenApple => 1,
            Syrup::Citrus => 2,
            Syrup::White => 3,
        }
    }

    /// Match a free-form syrup name as written by a model or a data file.
    ///
    /// Case, spaces, hyphens and underscores are ignored, so "Green Apple",
    /// "green_apple" and "GREEN-APPLE" all resolve to `GreenApple`.
    pub fn from_name(name: &str) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "berry" | "berries" => Some(Syrup::Berry),
            "greenapple" | "apple" => Some(Syrup::GreenApple),
            "citrus" => Some(Syrup::Citrus),
            "white" => Some(Syrup::White),
            _ => None,
        }
    }
}

impl fmt::Display for Syrup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One line of a recipe: a syrup and its percentage, e.g. "20%".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeItem {
    pub syrup: Syrup,
    pub ratio: String,
}

/// Color of the drink as described by the model.
///
/// Models sometimes answer with a bare string instead of the requested object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorDescriptor {
    Plain(String),
    Structured {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_rgb: Option<String>,
    },
}

impl Default for ColorDescriptor {
    fn default() -> Self {
        ColorDescriptor::Plain(String::new())
    }
}

impl ColorDescriptor {
    /// Human-readable description: name and description joined when both exist.
    pub fn description(&self) -> String {
        match self {
            ColorDescriptor::Plain(s) => s.clone(),
            ColorDescriptor::Structured {
                name, description, ..
            } => match (name.as_deref(), description.as_deref()) {
                (Some(n), Some(d)) if !d.is_empty() => format!("{} ({})", n, d),
                (Some(n), _) => n.to_string(),
                (None, Some(d)) => d.to_string(),
                (None, None) => String::new(),
            },
        }
    }

    pub fn target_color(&self) -> Option<&str> {
        match self {
            ColorDescriptor::Plain(_) => None,
            ColorDescriptor::Structured { target_rgb, .. } => target_rgb.as_deref(),
        }
    }
}

/// Output of recipe generation, before persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeResult {
    pub name: String,
    pub concept: String,
    pub color: ColorDescriptor,
    /// Always four items, one per `Syrup`, in `Syrup::ALL` order.
    pub recipe: Vec<RecipeItem>,
    pub name_source: NameSource,
}

impl RecipeResult {
    pub fn ratio_of(&self, syrup: Syrup) -> &str {
        self.recipe
            .iter()
            .find(|item| item.syrup == syrup)
            .map(|item| item.ratio.as_str())
            .unwrap_or("0%")
    }
}

/// An answer to one survey question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveyAnswer {
    pub question_id: Uuid,
    #[serde(default)]
    pub answer_text: Option<String>,
    #[serde(default)]
    pub selected_option_ids: Vec<Uuid>,
}

/// User-supplied facts a cocktail is created from. Read-only for the whole run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreationContext {
    pub recent_event: String,
    pub career: String,
    pub hobby: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Free-text styling hint for the image, e.g. "neon, playful".
    #[serde(default)]
    pub style_hint: Option<String>,
    #[serde(default)]
    pub recipe_prompt_id: Option<Uuid>,
    #[serde(default)]
    pub image_prompt_id: Option<Uuid>,
    #[serde(default)]
    pub event_id: Option<Uuid>,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub survey_answers: Vec<SurveyAnswer>,
}

/// Per-request switches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CreationOptions {
    /// When false, the stored record keeps no personal context fields.
    pub retain_personal_context: bool,
    /// When false, the image is only returned embedded, never uploaded.
    pub use_object_storage: bool,
}

impl Default for CreationOptions {
    fn default() -> Self {
        Self {
            retain_personal_context: true,
            use_object_storage: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    Recipe,
    Image,
}

impl PromptRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptRole::Recipe => "recipe",
            PromptRole::Image => "image",
        }
    }
}

/// A stored, operator-editable instruction block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub id: Uuid,
    pub name: String,
    pub role: PromptRole,
    pub text: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: Uuid,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyQuestion {
    pub id: Uuid,
    pub text: String,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
    pub id: Uuid,
    pub event_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub is_active: bool,
    pub questions: Vec<SurveyQuestion>,
}

/// Where the finished image can be found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageRef {
    Stored { url: String },
    Embedded {
        #[serde(with = "base64_bytes")]
        png: Vec<u8>,
    },
}

impl ImageRef {
    /// Render as something a browser can display: the stored URL, or a data URL.
    pub fn to_url(&self) -> String {
        match self {
            ImageRef::Stored { url } => url.clone(),
            ImageRef::Embedded { png } => format!(
                "data:image/png;base64,{}",
                base64::engine::general_purpose::STANDARD.encode(png)
            ),
        }
    }
}

/// The durable row for one completed creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CocktailRecord {
    pub id: Uuid,
    /// Six-digit shareable code, unique across all records.
    pub order_code: String,
    pub name: String,
    pub concept: String,
    /// Percentages in `Syrup::ALL` order.
    pub flavor_ratios: [String; 4],
    pub recent_event: String,
    pub event_name: String,
    pub user_name: String,
    pub career: String,
    pub hobby: String,
    #[serde(default)]
    pub event_id: Option<Uuid>,
    pub image: ImageRef,
    pub is_visible: bool,
    #[serde(default)]
    pub violation_count: Option<u32>,
    #[serde(default)]
    pub hidden_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub copyright_confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CocktailRecord {
    pub fn ratio_of(&self, syrup: Syrup) -> &str {
        &self.flavor_ratios[syrup.index()]
    }
}

/// Partial update applied by `RecordStore::update`. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    pub is_visible: Option<bool>,
    pub violation_count: Option<u32>,
    pub hidden_at: Option<DateTime<Utc>>,
    pub copyright_confirmed_at: Option<DateTime<Utc>>,
}

impl RecordPatch {
    pub fn apply(&self, record: &mut CocktailRecord) {
        if let Some(v) = self.is_visible {
            record.is_visible = v;
        }
        if let Some(v) = self.violation_count {
            record.violation_count = Some(v);
        }
        if let Some(v) = self.hidden_at {
            record.hidden_at = Some(v);
        }
        if let Some(v) = self.copyright_confirmed_at {
            record.copyright_confirmed_at = Some(v);
        }
    }
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(serde::de::Error::custom)
    }
}
