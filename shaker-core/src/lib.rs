pub mod ai;
pub mod catalog;
pub mod config;
pub mod error;
pub mod imaging;
pub mod naming;
pub mod order_code;
pub mod pipeline;
pub mod recipe;
pub mod records;
pub mod store;
pub mod types;

pub use catalog::{Denylist, IngredientCatalog};
pub use config::{PipelineConfig, RatioLimits};
pub use error::{ConfigError, CreationError};
pub use imaging::{crop_and_resize, GeneratedImage, ImageGenerator};
pub use naming::{NameSource, NameValidator, NameVerdict};
pub use order_code::OrderCodeAllocator;
pub use pipeline::{CocktailPipeline, CreatedCocktail, CreationResponse, Degradation, Services};
pub use recipe::RecipeGenerator;
pub use types::{
    CocktailRecord, ColorDescriptor, CreationContext, CreationOptions, Event, ImageRef,
    PromptRole, PromptTemplate, RecipeItem, RecipeResult, Survey, SurveyAnswer, SurveyQuestion,
    Syrup,
};
