//! OpenAI-compatible chat completions client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AiConfig, AiError, ChatMessage, ChatRequest, ChatResponse, TextService};

/// Chat completions over HTTP.
#[derive(Debug, Clone)]
pub struct OpenAiTextClient {
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiTextClient {
    /// Create a client. `timeout` bounds each HTTP request.
    pub fn new(config: &AiConfig, timeout: Duration) -> Result<Self, AiError> {
        if config.api_key.trim().is_empty() {
            return Err(AiError::NotConfigured("OPENAI_API_KEY".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AiError::RequestFailed(e.to_string()))?;

        Ok(Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            timeout,
            client,
        })
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[async_trait]
impl TextService for OpenAiTextClient {
    async fn complete(
        &self,
        prompt_name: &str,
        request: ChatRequest,
    ) -> Result<ChatResponse, AiError> {
        let body = CompletionRequest {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.sampling.map(|s| s.max_tokens),
            temperature: request.sampling.map(|s| s.temperature),
            response_format: request.json_response.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        tracing::debug!(prompt_name, model = %self.model, "Calling text generation API");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiError::Timeout(self.timeout)
                } else {
                    AiError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| AiError::RequestFailed(e.to_string()))?;

        if !(200..300).contains(&status) {
            let message = serde_json::from_str::<ApiErrorResponse>(&text)
                .map(|r| r.error.message)
                .unwrap_or_else(|_| text.chars().take(500).collect());
            return Err(AiError::Api { status, message });
        }

        let parsed: CompletionResponse =
            serde_json::from_str(&text).map_err(|e| AiError::ParseError(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| AiError::ParseError("No message content in response".to_string()))?;

        Ok(ChatResponse {
            content,
            total_tokens: parsed.usage.map(|u| u.total_tokens),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: &str) -> AiConfig {
        AiConfig {
            api_key: api_key.to_string(),
            model: "gpt-test".to_string(),
            image_model: "gpt-image-test".to_string(),
            base_url: "http://localhost:9".to_string(),
        }
    }

    #[test]
    fn test_blank_api_key_is_not_configured() {
        let err = OpenAiTextClient::new(&config("  "), Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, AiError::NotConfigured(name) if name == "OPENAI_API_KEY"));
        assert!(OpenAiTextClient::new(&config("sk-test"), Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_request_body_shape() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let body = CompletionRequest {
            model: "gpt-test",
            messages: &messages,
            max_tokens: Some(400),
            temperature: Some(0.7),
            response_format: Some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-test");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 400);
        assert_eq!(json["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_parse_completion_response() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "  {\"a\": 1}  "}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let parsed: CompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("  {\"a\": 1}  ")
        );
        assert_eq!(parsed.usage.map(|u| u.total_tokens), Some(15));
    }
}
