use crate::error::{GenerationError, RetrievalError, WeatherError};
use crate::models::{RetrievedChunk, WeatherSnapshot};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Returns at most `top_k` chunks, best match first.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>, RetrievalError>;
}

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn current_weather(&self, location: &str) -> Result<WeatherSnapshot, WeatherError>;
}

#[async_trait]
impl<T: Retriever + ?Sized> Retriever for Arc<T> {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        (**self).search(query, top_k).await
    }
}

#[async_trait]
impl<T: AnswerGenerator + ?Sized> AnswerGenerator for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        (**self).generate(prompt).await
    }
}

#[async_trait]
impl<T: WeatherProvider + ?Sized> WeatherProvider for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn current_weather(&self, location: &str) -> Result<WeatherSnapshot, WeatherError> {
        (**self).current_weather(location).await
    }
}
