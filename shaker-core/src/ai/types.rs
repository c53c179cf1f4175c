//! What the pipeline sends to the text service and what it reads back.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Output budget and temperature for one kind of call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Sampling {
    /// A whole recipe object: name, concept, color and four ratios.
    pub const RECIPE: Sampling = Sampling {
        max_tokens: 400,
        temperature: 0.7,
    };

    /// A single replacement name, sampled hotter so retries differ.
    pub const RENAME: Sampling = Sampling {
        max_tokens: 60,
        temperature: 0.9,
    };
}

/// One text service call.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Provider defaults apply when unset.
    pub sampling: Option<Sampling>,
    /// Ask the provider to constrain the reply to a JSON object.
    pub json_response: bool,
}

impl ChatRequest {
    /// A call whose reply must be a JSON object.
    pub fn json(messages: Vec<ChatMessage>, sampling: Sampling) -> Self {
        Self {
            messages,
            sampling: Some(sampling),
            json_response: true,
        }
    }

    /// All message contents joined, for prompt matching in fakes and logs.
    pub fn full_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub content: String,
    /// Tokens billed for the call, when the provider reports them.
    pub total_tokens: Option<u32>,
}
