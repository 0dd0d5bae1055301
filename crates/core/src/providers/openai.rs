use crate::error::{ConfigError, GenerationError};
use crate::traits::AnswerGenerator;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChatGenerator {
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    client: Client,
}

impl OpenAiChatGenerator {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::MissingCredential("OPENAI_API_KEY".to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            max_tokens: 300,
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl AnswerGenerator for OpenAiChatGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
                "max_tokens": self.max_tokens,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let details = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(|message| format!("{status}: {message}"))
                .unwrap_or_else(|| status.to_string());
            return Err(GenerationError::BackendResponse {
                backend: "openai".to_string(),
                details,
            });
        }

        let parsed: Value = response.json().await?;
        parse_chat_response(&parsed)
    }
}

fn parse_chat_response(parsed: &Value) -> Result<String, GenerationError> {
    parsed
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| GenerationError::BackendResponse {
            backend: "openai".to_string(),
            details: "no message content in first choice".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::DEFAULT_REQUEST_TIMEOUT;
    use std::net::TcpListener;

    #[test]
    fn missing_api_key_is_a_config_error() {
        let result = OpenAiChatGenerator::new(DEFAULT_OPENAI_BASE_URL, None, "gpt-4o-mini", DEFAULT_REQUEST_TIMEOUT);
        assert!(matches!(result, Err(ConfigError::MissingCredential(_))));

        let blank = OpenAiChatGenerator::new(
            DEFAULT_OPENAI_BASE_URL,
            Some("  ".to_string()),
            "gpt-4o-mini",
            DEFAULT_REQUEST_TIMEOUT,
        );
        assert!(blank.is_err());
    }

    #[tokio::test]
    async fn unresponsive_endpoint_times_out() -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let base_url = format!("http://{}/v1", listener.local_addr()?);
        let generator = OpenAiChatGenerator::new(
            base_url,
            Some("sk-test".to_string()),
            "gpt-4o-mini",
            Duration::from_millis(200),
        )?;

        let result = generator.generate("Fertilizer for maize?").await;
        assert!(matches!(result, Err(GenerationError::Http(ref error)) if error.is_timeout()));
        drop(listener);
        Ok(())
    }

    #[test]
    fn first_choice_content_is_the_answer() {
        let parsed = json!({
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": " Use drip irrigation. " } }
            ]
        });
        assert_eq!(parse_chat_response(&parsed).unwrap(), "Use drip irrigation.");
    }

    #[test]
    fn empty_choices_are_an_error() {
        let parsed = json!({ "choices": [] });
        assert!(parse_chat_response(&parsed).is_err());
    }
}
