//! Recipe generation prompt.
//!
//! The system prompt has two parts: an instruction block, which an operator
//! may replace with a stored template, and a fixed format block describing the
//! JSON the parser expects. The user prompt carries either survey answers or
//! the raw context fields.

use std::collections::HashMap;
use std::fmt::Write;

use crate::catalog::IngredientCatalog;
use crate::config::RatioLimits;
use crate::types::{CreationContext, Survey, SurveyAnswer, SurveyQuestion, Syrup};

/// Prompt name for logs.
pub const RECIPE_PROMPT_NAME: &str = "recipe";

const DEFAULT_INSTRUCTION: &str = "You are an imaginative bartender. Using only the four syrups listed below, create a one-of-a-kind cocktail for this guest. Read their story and let the drink reflect who they are.";

/// Render the system prompt. `custom_instruction` replaces the default
/// instruction block; the syrup list and output format are always included.
pub fn render_recipe_system_prompt(
    catalog: &IngredientCatalog,
    limits: &RatioLimits,
    custom_instruction: Option<&str>,
) -> String {
    let instruction = custom_instruction
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_INSTRUCTION);

    let mut syrups = String::new();
    for syrup in Syrup::ALL {
        let description = catalog.description(syrup).unwrap_or("no description");
        let _ = writeln!(syrups, "- {}: {}", syrup, description);
    }

    format!(
        r#"{instruction}

Available syrups:
{syrups}
Recipe constraints:
- Give a ratio for all four syrups, in the order listed. Use "0%" for a syrup you do not use; never omit one.
- Each ratio is a whole percentage between 0% and {ceiling}%.
- {capped} is strong: keep it at or below {capped_ceiling}%.
- The cocktail name must be original. Do not use copyrighted or trademarked proper nouns (characters, brands, titles, existing cocktail names).

Respond with a single JSON object only, no other text:
{{
  "cocktail_name": "name",
  "concept": "one or two sentences on the idea behind the drink",
  "color": {{
    "name": "name of the color",
    "description": "description of the color",
    "target_rgb": "RGB(r,g,b)"
  }},
  "recipe": [
    {{"syrup": "{berry}", "ratio": "20%"}},
    {{"syrup": "{apple}", "ratio": "0%"}},
    {{"syrup": "{citrus}", "ratio": "15%"}},
    {{"syrup": "{white}", "ratio": "5%"}}
  ]
}}"#,
        instruction = instruction,
        syrups = syrups,
        ceiling = limits.ceiling,
        capped = Syrup::White,
        capped_ceiling = limits.limit_for(Syrup::White),
        berry = Syrup::Berry,
        apple = Syrup::GreenApple,
        citrus = Syrup::Citrus,
        white = Syrup::White,
    )
}

/// Render the user prompt from the raw context fields.
pub fn render_context_prompt(ctx: &CreationContext, event_name: Option<&str>) -> String {
    format!(
        "Event: {event}\nRecent event: {recent}\nCareer: {career}\nHobby: {hobby}\n\nCreate a cocktail that belongs to this person alone.",
        event = event_name.unwrap_or(""),
        recent = ctx.recent_event,
        career = ctx.career,
        hobby = ctx.hobby,
    )
}

/// Render the user prompt from survey answers.
///
/// Answers to questions the survey does not contain are skipped. A free-text
/// answer wins over selected options.
pub fn render_survey_prompt(event_name: &str, survey: &Survey, answers: &[SurveyAnswer]) -> String {
    let questions: HashMap<_, &SurveyQuestion> =
        survey.questions.iter().map(|q| (q.id, q)).collect();

    let mut out = String::new();
    let _ = writeln!(out, "[Event: {}]", event_name);
    let _ = writeln!(out, "Survey: {}", survey.title);
    if let Some(description) = survey.description.as_deref().filter(|d| !d.is_empty()) {
        let _ = writeln!(out, "{}", description);
    }
    out.push_str("\n[Answers]\n");

    for answer in answers {
        let Some(question) = questions.get(&answer.question_id) else {
            continue;
        };
        let _ = writeln!(out, "\nQuestion: {}", question.text);

        match answer.answer_text.as_deref().filter(|t| !t.is_empty()) {
            Some(text) => {
                let _ = writeln!(out, "Answer: {}", text);
            }
            None => {
                let selected: Vec<&str> = question
                    .options
                    .iter()
                    .filter(|o| answer.selected_option_ids.contains(&o.id))
                    .map(|o| o.text.as_str())
                    .collect();
                if !selected.is_empty() {
                    let _ = writeln!(out, "Answer: {}", selected.join(", "));
                }
            }
        }
    }

    out.push_str(
        "\nRead this person's character, feelings and experiences from the answers above and create a cocktail that exists nowhere else.",
    );
    out
}

/// Plain listing of free-text answers, used when the survey itself could not
/// be loaded. `None` when no answer carries text.
pub fn render_fallback_survey_prompt(answers: &[SurveyAnswer]) -> Option<String> {
    let mut lines = String::new();
    for (i, answer) in answers.iter().enumerate() {
        if let Some(text) = answer.answer_text.as_deref().filter(|t| !t.is_empty()) {
            let _ = writeln!(lines, "Answer {}: {}", i + 1, text);
        }
    }

    if lines.is_empty() {
        return None;
    }

    Some(format!(
        "[Survey answers]\n{}\nRead this person's character, feelings and experiences from the answers above and create a cocktail that exists nowhere else.",
        lines
    ))
}
