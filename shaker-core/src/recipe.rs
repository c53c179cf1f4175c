//! Recipe generation: prompt assembly, the text service call, lenient parsing
//! of the model's JSON and the name-repair ladder.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::ai::prompts::{
    render_context_prompt, render_fallback_survey_prompt, render_recipe_system_prompt,
    render_rename_prompt, render_survey_prompt, RECIPE_PROMPT_NAME, RENAME_PROMPT_NAME,
};
use crate::ai::{complete_within, ChatMessage, ChatRequest, Sampling, TextService};
use crate::catalog::IngredientCatalog;
use crate::config::{PipelineConfig, RatioLimits};
use crate::error::CreationError;
use crate::naming::{fallback_name, LadderInput, NameSource, NameValidator, NameVerdict, Rung};
use crate::store::{selected_template, PromptStore, SurveyStore};
use crate::types::{
    ColorDescriptor, CreationContext, Event, PromptRole, RecipeItem, RecipeResult, Syrup,
};

/// The model's answer before normalization. Every field is optional and may
/// be `null`, so a partially filled object still yields a recipe.
#[derive(Debug, Default, Deserialize)]
struct RawRecipe {
    #[serde(default, alias = "name")]
    cocktail_name: Option<String>,
    #[serde(default)]
    concept: Option<String>,
    #[serde(default)]
    color: Value,
    #[serde(default)]
    recipe: Option<Vec<Option<RawItem>>>,
}

impl RawRecipe {
    fn items(&self) -> Vec<&RawItem> {
        self.recipe.iter().flatten().flatten().collect()
    }
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(default)]
    syrup: Option<String>,
    #[serde(default)]
    ratio: Value,
}

impl RawItem {
    fn syrup(&self) -> Option<Syrup> {
        self.syrup.as_deref().and_then(Syrup::from_name)
    }
}

pub struct RecipeGenerator {
    text: Arc<dyn TextService>,
    prompts: Arc<dyn PromptStore>,
    surveys: Arc<dyn SurveyStore>,
    catalog: IngredientCatalog,
    validator: NameValidator,
    config: PipelineConfig,
}

impl RecipeGenerator {
    pub fn new(
        text: Arc<dyn TextService>,
        prompts: Arc<dyn PromptStore>,
        surveys: Arc<dyn SurveyStore>,
        catalog: IngredientCatalog,
        validator: NameValidator,
        config: PipelineConfig,
    ) -> Self {
        Self {
            text,
            prompts,
            surveys,
            catalog,
            validator,
            config,
        }
    }

    /// Generate a recipe for `ctx`. `event` is the resolved event, used for
    /// survey lookup and the event line of the prompt.
    pub async fn generate(
        &self,
        ctx: &CreationContext,
        event: Option<&Event>,
        now: DateTime<Utc>,
    ) -> Result<RecipeResult, CreationError> {
        let custom =
            selected_template(self.prompts.as_ref(), ctx.recipe_prompt_id, PromptRole::Recipe)
                .await
                .map(|t| t.text);

        let system = render_recipe_system_prompt(
            &self.catalog,
            &self.config.ratio_limits,
            custom.as_deref(),
        );
        let user = self.user_prompt(ctx, event).await;

        let request = ChatRequest::json(
            vec![ChatMessage::system(system), ChatMessage::user(user)],
            Sampling::RECIPE,
        );

        let response = complete_within(
            self.text.as_ref(),
            RECIPE_PROMPT_NAME,
            request,
            self.config.text_timeout,
        )
        .await?;
        tracing::debug!(tokens = ?response.total_tokens, "Recipe generation responded");

        let raw = parse_raw_recipe(&response.content)?;
        let color: ColorDescriptor = serde_json::from_value(raw.color.clone()).unwrap_or_default();
        let recipe = normalize_recipe(&raw.items(), &self.config.ratio_limits);
        let concept = raw.concept.unwrap_or_default();

        let (name, name_source) = self
            .repair_name(
                raw.cocktail_name.as_deref().unwrap_or_default(),
                &concept,
                &color.description(),
                now,
            )
            .await;

        Ok(RecipeResult {
            name,
            concept,
            color,
            recipe,
            name_source,
        })
    }

    async fn user_prompt(&self, ctx: &CreationContext, event: Option<&Event>) -> String {
        let event_name = event
            .map(|e| e.name.as_str())
            .or(ctx.event_name.as_deref());

        let Some(event) = event.filter(|_| !ctx.survey_answers.is_empty()) else {
            return render_context_prompt(ctx, event_name);
        };

        match self.surveys.active_for_event(event.id).await {
            Ok(Some(survey)) if !survey.questions.is_empty() => {
                tracing::debug!(survey_id = %survey.id, "Using survey answers for recipe prompt");
                render_survey_prompt(&event.name, &survey, &ctx.survey_answers)
            }
            Ok(_) => render_context_prompt(ctx, event_name),
            Err(e) => {
                tracing::warn!(event_id = %event.id, error = %e, "Survey lookup failed, listing raw answers");
                render_fallback_survey_prompt(&ctx.survey_answers)
                    .unwrap_or_else(|| render_context_prompt(ctx, event_name))
            }
        }
    }

    /// Walk the ladder until a rung yields an acceptable name.
    async fn repair_name(
        &self,
        original: &str,
        concept: &str,
        color: &str,
        now: DateTime<Utc>,
    ) -> (String, NameSource) {
        let input = LadderInput {
            original,
            concept,
            color,
            now,
        };

        for rung in Rung::ladder(self.config.max_name_retries) {
            let candidate = match rung {
                Rung::AskAgain => self.ask_for_new_name(original, concept, color).await,
                _ => rung.candidate(&input),
            };
            let Some(candidate) = candidate else {
                continue;
            };

            if !rung.needs_validation() {
                tracing::warn!(original, name = %candidate, "Every naming strategy failed, using fallback name");
                return (candidate, rung.source());
            }

            match self.validator.check(&candidate) {
                NameVerdict::Accepted => {
                    if rung != Rung::Keep {
                        tracing::info!(original, name = %candidate, ?rung, "Cocktail name repaired");
                    }
                    return (candidate, rung.source());
                }
                verdict => {
                    tracing::debug!(name = %candidate, ?verdict, ?rung, "Name rejected");
                }
            }
        }

        (fallback_name(now), NameSource::Fallback)
    }

    /// The costly rung: one more text service call with the denylist spelled out.
    async fn ask_for_new_name(&self, rejected: &str, concept: &str, color: &str) -> Option<String> {
        let prompt = render_rename_prompt(
            rejected,
            concept,
            color,
            self.validator.denylist().terms(),
        );
        let request = ChatRequest::json(vec![ChatMessage::user(prompt)], Sampling::RENAME);

        match complete_within(
            self.text.as_ref(),
            RENAME_PROMPT_NAME,
            request,
            self.config.text_timeout,
        )
        .await
        {
            Ok(response) => parse_rename(&response.content),
            Err(e) => {
                tracing::warn!(error = %e, "Rename request failed");
                None
            }
        }
    }
}

/// First well-formed top-level JSON object embedded in `text`.
///
/// Models wrap JSON in prose or code fences. Only braces that open at nesting
/// depth zero are tried, so a reply cut off mid-object yields `None` rather
/// than one of its inner objects.
pub fn extract_json_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    top_level_starts(text).into_iter().find_map(|start| {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map))) => Some(map),
            _ => None,
        }
    })
}

/// Byte offsets of every `{` outside any other brace pair. Quoted strings
/// inside braces are skipped so `"}"` does not close an object.
fn top_level_starts(text: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '{' => {
                if depth == 0 {
                    starts.push(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => depth -= 1,
            '"' if depth > 0 => in_string = true,
            _ => {}
        }
    }
    starts
}

fn parse_raw_recipe(content: &str) -> Result<RawRecipe, CreationError> {
    let object = extract_json_object(content).ok_or_else(|| {
        CreationError::MalformedResponse(format!(
            "no JSON object in response: {}",
            content.chars().take(200).collect::<String>()
        ))
    })?;

    serde_json::from_value(Value::Object(object))
        .map_err(|e| CreationError::MalformedResponse(e.to_string()))
}

fn parse_rename(content: &str) -> Option<String> {
    let name = match extract_json_object(content) {
        Some(object) => object
            .get("cocktail_name")
            .or_else(|| object.get("name"))
            .and_then(Value::as_str)?
            .to_string(),
        None => content.lines().next()?.to_string(),
    };

    let name = name.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Exactly one item per syrup, in `Syrup::ALL` order, clamped to the limits.
/// Missing syrups become "0%"; unknown names are dropped.
fn normalize_recipe(items: &[&RawItem], limits: &RatioLimits) -> Vec<RecipeItem> {
    for item in items {
        if item.syrup().is_none() {
            tracing::debug!(syrup = ?item.syrup, "Dropping unknown syrup from recipe");
        }
    }

    Syrup::ALL
        .iter()
        .map(|&syrup| {
            let percent = items
                .iter()
                .find(|item| item.syrup() == Some(syrup))
                .and_then(|item| parse_percent(&item.ratio))
                .unwrap_or(0);
            let limit = u32::from(limits.limit_for(syrup));
            RecipeItem {
                syrup,
                ratio: format!("{}%", percent.min(limit)),
            }
        })
        .collect()
}

/// Accepts "20%", "20", "12.5 %" or a JSON number. Rounds to a whole percent.
fn parse_percent(value: &Value) -> Option<u32> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() || number < 0.0 {
        return None;
    }
    Some(number.round() as u32)
}
