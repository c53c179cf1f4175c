//! Prompt templates for recipe, rename and image generation.

pub mod image;
pub mod recipe;
pub mod rename;

pub use image::render_image_prompt;
pub use recipe::{
    render_context_prompt, render_fallback_survey_prompt, render_recipe_system_prompt,
    render_survey_prompt, RECIPE_PROMPT_NAME,
};
pub use rename::{render_rename_prompt, RENAME_PROMPT_NAME};
