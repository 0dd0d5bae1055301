use crate::embeddings::Embedder;
use crate::error::{ConfigError, EmbeddingError, GenerationError};
use crate::traits::AnswerGenerator;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Ollama `/api/embed` client. The vector size must be known up front so it can be
/// recorded in the index manifest.
pub struct OllamaEmbedder {
    endpoint: String,
    model: String,
    dimensions: usize,
    client: Client,
}

impl OllamaEmbedder {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            dimensions,
            client: Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_id(&self) -> String {
        format!("ollama:{}", self.model)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors.pop().ok_or_else(|| EmbeddingError::BackendResponse {
            backend: "ollama".to_string(),
            details: "no embedding returned".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/api/embed", self.endpoint))
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EmbeddingError::BackendResponse {
                backend: "ollama".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let vectors = parse_embed_response(&parsed)?;
        if let Some(bad) = vectors.iter().find(|vector| vector.len() != self.dimensions) {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimensions,
                actual: bad.len(),
            });
        }
        Ok(vectors)
    }
}

fn parse_embed_response(parsed: &Value) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let rows = parsed
        .pointer("/embeddings")
        .and_then(Value::as_array)
        .ok_or_else(|| EmbeddingError::BackendResponse {
            backend: "ollama".to_string(),
            details: "response has no embeddings array".to_string(),
        })?;

    rows.iter()
        .map(|row| {
            row.as_array()
                .map(|values| {
                    values
                        .iter()
                        .filter_map(Value::as_f64)
                        .map(|value| value as f32)
                        .collect::<Vec<_>>()
                })
                .ok_or_else(|| EmbeddingError::BackendResponse {
                    backend: "ollama".to_string(),
                    details: "embedding row is not an array".to_string(),
                })
        })
        .collect()
}

/// Ollama `/api/generate` client used as an answer generator.
pub struct OllamaGenerator {
    endpoint: String,
    model: String,
    max_tokens: u32,
    client: Client,
}

impl OllamaGenerator {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
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
impl AnswerGenerator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .json(&json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
                "options": { "num_predict": self.max_tokens },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenerationError::BackendResponse {
                backend: "ollama".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parse_generate_response(&parsed)
    }
}

fn parse_generate_response(parsed: &Value) -> Result<String, GenerationError> {
    if let Some(error) = parsed.pointer("/error").and_then(Value::as_str) {
        return Err(GenerationError::BackendResponse {
            backend: "ollama".to_string(),
            details: error.to_string(),
        });
    }

    parsed
        .pointer("/response")
        .and_then(Value::as_str)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| GenerationError::BackendResponse {
            backend: "ollama".to_string(),
            details: "response field missing".to_string(),
        })
}
