//! Fake text service for testing.
//!
//! Responses are matched by checking if the prompt contains a registered
//! substring, so tests run without network access or API costs.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;

use super::{AiError, ChatRequest, ChatResponse, TextService};

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

/// A fake text service for testing.
///
/// Patterns are checked in registration order, case-insensitively, against
/// every message of the request. The first match wins.
#[derive(Debug, Default)]
pub struct FakeTextService {
    replies: Vec<(String, Reply)>,
    default_reply: Option<Reply>,
    delay: Option<Duration>,
    /// (prompt name, full prompt text) of every call
    calls: RwLock<Vec<(String, String)>>,
}

impl FakeTextService {
    /// Create a fake with no registered responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fake that returns `response` for prompts containing `prompt_contains`.
    pub fn with_response(prompt_contains: &str, response: &str) -> Self {
        Self::new().and_response(prompt_contains, response)
    }

    /// Add a response for prompts containing a substring.
    pub fn and_response(mut self, prompt_contains: &str, response: &str) -> Self {
        self.replies.push((
            prompt_contains.to_lowercase(),
            Reply::Text(response.to_string()),
        ));
        self
    }

    /// Fail with an API error for prompts containing a substring.
    pub fn and_error(mut self, prompt_contains: &str, message: &str) -> Self {
        self.replies.push((
            prompt_contains.to_lowercase(),
            Reply::Fail(message.to_string()),
        ));
        self
    }

    /// Set the default response when no pattern matches.
    pub fn with_default_response(mut self, response: &str) -> Self {
        self.default_reply = Some(Reply::Text(response.to_string()));
        self
    }

    /// Fail every unmatched prompt with an API error.
    pub fn with_default_error(mut self, message: &str) -> Self {
        self.default_reply = Some(Reply::Fail(message.to_string()));
        self
    }

    /// Sleep before answering, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Prompt names of all calls, in order.
    pub fn prompt_names(&self) -> Vec<String> {
        self.calls
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Full prompt text of the nth call.
    pub fn prompt(&self, n: usize) -> Option<String> {
        self.calls
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(n)
            .map(|(_, text)| text.clone())
    }
}

#[async_trait]
impl TextService for FakeTextService {
    async fn complete(
        &self,
        prompt_name: &str,
        request: ChatRequest,
    ) -> Result<ChatResponse, AiError> {
        let prompt = request.full_text();
        self.calls
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((prompt_name.to_string(), prompt.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let prompt_lower = prompt.to_lowercase();
        let reply = self
            .replies
            .iter()
            .find(|(pattern, _)| prompt_lower.contains(pattern.as_str()))
            .map(|(_, reply)| reply)
            .or(self.default_reply.as_ref());

        match reply {
            Some(Reply::Text(content)) => Ok(ChatResponse {
                content: content.clone(),
                total_tokens: None,
            }),
            Some(Reply::Fail(message)) => Err(AiError::Api {
                status: 500,
                message: message.clone(),
            }),
            None => Err(AiError::RequestFailed(format!(
                "FakeTextService: No response configured for prompt (first 100 chars): {}",
                prompt.chars().take(100).collect::<String>()
            ))),
        }
    }
}
