//! Image generation prompt.

const DEFAULT_INSTRUCTION: &str = "Fully transparent background (transparent PNG). Draw nothing but the cocktail itself, as a single photorealistic illustration with real textures. The color of the liquid must stay close to the main RGB color given above.";

/// Render the image prompt. `custom_instruction` replaces the default
/// instruction; the color, concept and style lines are always included.
pub fn render_image_prompt(
    color: &str,
    target_rgb: &str,
    concept: &str,
    style_hint: &str,
    custom_instruction: Option<&str>,
) -> String {
    let instruction = custom_instruction
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_INSTRUCTION);

    format!(
        "A {color} cocktail. Main color RGB: {target_rgb}. {concept}. Style: {style_hint}. {instruction}",
        color = color,
        target_rgb = if target_rgb.is_empty() { "unspecified" } else { target_rgb },
        concept = concept.trim_end_matches('.'),
        style_hint = style_hint,
        instruction = instruction
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompt() {
        let prompt = render_image_prompt(
            "Sunset (warm orange)",
            "RGB(250,120,40)",
            "A toast to new beginnings.",
            "neon, playful",
            None,
        );

        assert!(prompt.starts_with("A Sunset (warm orange) cocktail. Main color RGB: RGB(250,120,40)."));
        assert!(prompt.contains("A toast to new beginnings. Style: neon, playful."));
        assert!(prompt.contains("transparent"));
        assert!(prompt.contains("photorealistic"));
    }

    #[test]
    fn test_custom_instruction_replaces_default() {
        let prompt = render_image_prompt("blue", "", "Calm", "casual", Some("Watercolor on paper."));
        assert!(prompt.ends_with("Watercolor on paper."));
        assert!(!prompt.contains("transparent"));
        assert!(prompt.contains("Main color RGB: unspecified."));
    }
}
