//! Prompt asking for a replacement cocktail name.

/// Prompt name for logs.
pub const RENAME_PROMPT_NAME: &str = "rename";

/// Render the rename prompt. `avoid` is the full denylist; the model is told
/// to steer clear of every term.
pub fn render_rename_prompt(rejected: &str, concept: &str, color: &str, avoid: &[String]) -> String {
    let avoid_list = if avoid.is_empty() {
        "(none)".to_string()
    } else {
        avoid.join(", ")
    };

    format!(
        r#"You name cocktails. The name "{rejected}" cannot be used. Invent a completely new, original name for this cocktail.

Cocktail concept: {concept}
Cocktail color: {color}

Rules:
- Two to four words.
- No copyrighted or trademarked proper nouns and no existing cocktail names.
- The name must not contain any of these words: {avoid_list}

Respond with JSON only, no other text: {{"cocktail_name": "new name"}}"#,
        rejected = rejected,
        concept = concept,
        color = color,
        avoid_list = avoid_list
    )
}
