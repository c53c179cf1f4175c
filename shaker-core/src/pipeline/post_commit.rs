//! Side effects that run after the cocktail record is written.
//!
//! Each action is independent. A failure becomes a `Degradation` on the
//! result and never undoes the record.

use serde::Serialize;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::store::{PromptStore, StoreError, SurveyStore};
use crate::types::{CreationContext, Event, PromptRole, SurveyAnswer};

/// A non-fatal shortfall in an otherwise successful creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// Every naming strategy was rejected; the guaranteed fallback name was used.
    FallbackName { name: String },
    /// The image could not be uploaded and is returned embedded instead.
    UploadFailed { detail: String },
    LinkageFailed { role: PromptRole, detail: String },
    SurveySaveFailed { detail: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PostCommitAction {
    /// Link the explicitly selected template, or the first active one for the role.
    LinkPrompt {
        role: PromptRole,
        selected: Option<Uuid>,
    },
    /// Save survey answers against the event's active survey.
    SaveSurvey {
        event_id: Uuid,
        answers: Vec<SurveyAnswer>,
    },
}

impl PostCommitAction {
    pub fn name(&self) -> &'static str {
        match self {
            PostCommitAction::LinkPrompt {
                role: PromptRole::Recipe,
                ..
            } => "link_recipe_prompt",
            PostCommitAction::LinkPrompt {
                role: PromptRole::Image,
                ..
            } => "link_image_prompt",
            PostCommitAction::SaveSurvey { .. } => "save_survey",
        }
    }

    async fn run(
        &self,
        cocktail_id: Uuid,
        prompts: &dyn PromptStore,
        surveys: &dyn SurveyStore,
    ) -> Result<(), Degradation> {
        match self {
            PostCommitAction::LinkPrompt { role, selected } => {
                link_prompt(cocktail_id, *role, *selected, prompts)
                    .await
                    .map_err(|e| Degradation::LinkageFailed {
                        role: *role,
                        detail: e.to_string(),
                    })
            }
            PostCommitAction::SaveSurvey { event_id, answers } => {
                save_survey(cocktail_id, *event_id, answers, surveys)
                    .await
                    .map_err(|e| Degradation::SurveySaveFailed {
                        detail: e.to_string(),
                    })
            }
        }
    }
}

/// The actions owed for a creation, in execution order.
pub fn plan(ctx: &CreationContext, event: Option<&Event>) -> Vec<PostCommitAction> {
    let mut actions = vec![
        PostCommitAction::LinkPrompt {
            role: PromptRole::Recipe,
            selected: ctx.recipe_prompt_id,
        },
        PostCommitAction::LinkPrompt {
            role: PromptRole::Image,
            selected: ctx.image_prompt_id,
        },
    ];

    if let Some(event) = event {
        if !ctx.survey_answers.is_empty() {
            actions.push(PostCommitAction::SaveSurvey {
                event_id: event.id,
                answers: ctx.survey_answers.clone(),
            });
        }
    }

    actions
}

/// Run every action, collecting failures.
pub async fn run_all(
    actions: &[PostCommitAction],
    cocktail_id: Uuid,
    prompts: &dyn PromptStore,
    surveys: &dyn SurveyStore,
) -> Vec<Degradation> {
    let mut failures = Vec::new();

    for action in actions {
        let result = action
            .run(cocktail_id, prompts, surveys)
            .instrument(info_span!("post_commit", action = action.name()))
            .await;

        if let Err(degradation) = result {
            tracing::warn!(action = action.name(), %cocktail_id, ?degradation, "Post-commit action failed");
            failures.push(degradation);
        }
    }

    failures
}

async fn link_prompt(
    cocktail_id: Uuid,
    role: PromptRole,
    selected: Option<Uuid>,
    prompts: &dyn PromptStore,
) -> Result<(), StoreError> {
    let prompt_id = match selected {
        Some(id) => id,
        None => match prompts.first_active(role).await? {
            Some(template) => template.id,
            None => {
                tracing::debug!(role = role.as_str(), "No active prompt template to link");
                return Ok(());
            }
        },
    };

    prompts.link(cocktail_id, prompt_id, role).await
}

async fn save_survey(
    cocktail_id: Uuid,
    event_id: Uuid,
    answers: &[SurveyAnswer],
    surveys: &dyn SurveyStore,
) -> Result<(), StoreError> {
    let Some(survey) = surveys.active_for_event(event_id).await? else {
        tracing::debug!(%event_id, "No active survey, answers not saved");
        return Ok(());
    };

    let response_id = surveys.submit(survey.id, cocktail_id, answers).await?;
    tracing::debug!(%response_id, survey_id = %survey.id, "Saved survey answers");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{MemoryPromptStore, MemorySurveyStore};
    use crate::types::{PromptTemplate, Survey};

    fn template(role: PromptRole, is_active: bool) -> PromptTemplate {
        PromptTemplate {
            id: Uuid::new_v4(),
            name: format!("{} default", role.as_str()),
            role,
            text: "instruction".to_string(),
            is_active,
        }
    }

    fn event() -> Event {
        Event {
            id: Uuid::new_v4(),
            name: "Spring Mixer".to_string(),
            description: None,
            is_active: true,
        }
    }

    fn answers() -> Vec<SurveyAnswer> {
        vec![SurveyAnswer {
            question_id: Uuid::new_v4(),
            answer_text: Some("Jazz".to_string()),
            selected_option_ids: vec![],
        }]
    }

    #[test]
    fn test_plan_without_event_skips_survey() {
        let ctx = CreationContext {
            survey_answers: answers(),
            ..Default::default()
        };
        let actions = plan(&ctx, None);
        let names: Vec<_> = actions.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["link_recipe_prompt", "link_image_prompt"]);

        let actions = plan(&ctx, Some(&event()));
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[2].name(), "save_survey");
    }

    #[tokio::test]
    async fn test_links_explicit_or_first_active() {
        let prompts = MemoryPromptStore::new();
        prompts.seed(template(PromptRole::Recipe, false)).await;
        let active_recipe = template(PromptRole::Recipe, true);
        prompts.seed(active_recipe.clone()).await;
        let surveys = MemorySurveyStore::new();

        let explicit_image = Uuid::new_v4();
        let ctx = CreationContext {
            image_prompt_id: Some(explicit_image),
            ..Default::default()
        };
        let cocktail_id = Uuid::new_v4();

        let failures = run_all(&plan(&ctx, None), cocktail_id, &prompts, &surveys).await;

        assert!(failures.is_empty());
        assert_eq!(
            prompts.links().await,
            vec![
                (cocktail_id, active_recipe.id, PromptRole::Recipe),
                (cocktail_id, explicit_image, PromptRole::Image),
            ]
        );
    }

    #[tokio::test]
    async fn test_failures_are_collected_not_propagated() {
        let prompts = MemoryPromptStore::new();
        prompts.seed(template(PromptRole::Recipe, true)).await;
        prompts.seed(template(PromptRole::Image, true)).await;
        prompts.fail_links();

        let surveys = MemorySurveyStore::new();
        let event = event();
        surveys
            .seed(Survey {
                id: Uuid::new_v4(),
                event_id: event.id,
                title: "Mixer".to_string(),
                description: None,
                is_active: true,
                questions: vec![],
            })
            .await;
        surveys.fail_submits();

        let ctx = CreationContext {
            survey_answers: answers(),
            ..Default::default()
        };
        let failures = run_all(&plan(&ctx, Some(&event)), Uuid::new_v4(), &prompts, &surveys).await;

        assert_eq!(failures.len(), 3);
        assert!(matches!(
            failures[0],
            Degradation::LinkageFailed {
                role: PromptRole::Recipe,
                ..
            }
        ));
        assert!(matches!(failures[2], Degradation::SurveySaveFailed { .. }));
    }

    #[tokio::test]
    async fn test_saves_survey_answers() {
        let prompts = MemoryPromptStore::new();
        let surveys = MemorySurveyStore::new();
        let event = event();
        let survey_id = Uuid::new_v4();
        surveys
            .seed(Survey {
                id: survey_id,
                event_id: event.id,
                title: "Mixer".to_string(),
                description: None,
                is_active: true,
                questions: vec![],
            })
            .await;

        let ctx = CreationContext {
            survey_answers: answers(),
            ..Default::default()
        };
        let cocktail_id = Uuid::new_v4();
        let failures = run_all(&plan(&ctx, Some(&event)), cocktail_id, &prompts, &surveys).await;

        assert!(failures.is_empty());
        let submissions = surveys.submissions().await;
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].survey_id, survey_id);
        assert_eq!(submissions[0].cocktail_id, cocktail_id);
    }
}
