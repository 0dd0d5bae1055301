use crate::context::{assemble_prompt, source_citations, WeatherContext};
use crate::embeddings::Embedder;
use crate::error::{AnswerError, ConfigError, IndexError};
use crate::history::AnswerHistory;
use crate::models::{AnswerRecord, AnswerRequest, PipelineOptions, WeatherSnapshot};
use crate::retriever::IndexRetriever;
use crate::traits::{AnswerGenerator, Retriever, WeatherProvider};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub const FALLBACK_ANSWER: &str =
    "Sorry, an answer could not be generated right now. Please try again in a moment.";

/// Long-lived handles built once at process start and shared by every query.
pub struct PipelineContext<R, G, W> {
    pub retriever: R,
    pub generator: G,
    pub weather: W,
}

impl<G, W> PipelineContext<IndexRetriever, G, W>
where
    G: AnswerGenerator,
    W: WeatherProvider,
{
    /// Loads the persisted index up front so a missing or mismatched index is reported
    /// before any query is served.
    pub fn open(
        index_root: &Path,
        embedder: Arc<dyn Embedder>,
        generator: G,
        weather: W,
    ) -> Result<Self, IndexError> {
        let retriever = IndexRetriever::open(index_root, embedder)?;
        info!(
            path = %index_root.display(),
            entries = retriever.index().len(),
            model = %retriever.index().manifest().embedding_model,
            "index ready"
        );
        Ok(Self {
            retriever,
            generator,
            weather,
        })
    }
}

pub struct AnswerPipeline<R, G, W>
where
    R: Retriever,
    G: AnswerGenerator,
    W: WeatherProvider,
{
    context: PipelineContext<R, G, W>,
    options: PipelineOptions,
}

impl<R, G, W> AnswerPipeline<R, G, W>
where
    R: Retriever,
    G: AnswerGenerator,
    W: WeatherProvider,
{
    pub fn new(context: PipelineContext<R, G, W>, options: PipelineOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        Ok(Self { context, options })
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn context(&self) -> &PipelineContext<R, G, W> {
        &self.context
    }

    /// Retrieve, assemble, generate. Weather and generation failures degrade the
    /// record instead of failing it; only validation and retrieval errors surface.
    pub async fn answer_query(&self, request: &AnswerRequest) -> Result<AnswerRecord, AnswerError> {
        if request.question.trim().is_empty() {
            return Err(AnswerError::EmptyQuestion);
        }

        let hits = self
            .context
            .retriever
            .search(&request.question, self.options.top_k)
            .await?;
        let sources = source_citations(&hits);

        let weather = if request.include_weather {
            self.fetch_weather(&request.location).await
        } else {
            None
        };

        let prompt = assemble_prompt(
            &hits,
            weather.as_ref().map(|snapshot| WeatherContext {
                location: &request.location,
                snapshot,
            }),
            &request.question,
            self.options.max_context_chars,
        );

        let answer = self.generate_answer(&prompt).await;
        info!(
            hits = hits.len(),
            weather = weather.is_some(),
            prompt_chars = prompt.chars().count(),
            "answered query"
        );

        Ok(AnswerRecord {
            question: request.question.clone(),
            answer,
            sources,
            weather,
            location: request.location.clone(),
            asked_at: Utc::now(),
        })
    }

    pub async fn answer_and_record(
        &self,
        history: &mut AnswerHistory,
        request: &AnswerRequest,
    ) -> Result<AnswerRecord, AnswerError> {
        let record = self.answer_query(request).await?;
        history.record(record.clone());
        Ok(record)
    }

    async fn fetch_weather(&self, location: &str) -> Option<WeatherSnapshot> {
        let provider = self.context.weather.name().to_string();
        let lookup = self.context.weather.current_weather(location);

        match tokio::time::timeout(self.options.weather_timeout, lookup).await {
            Ok(Ok(snapshot)) => Some(snapshot),
            Ok(Err(error)) => {
                warn!(%provider, location, %error, "weather unavailable, answering without it");
                None
            }
            Err(_) => {
                warn!(
                    %provider,
                    location,
                    timeout_ms = self.options.weather_timeout.as_millis() as u64,
                    "weather lookup timed out, answering without it"
                );
                None
            }
        }
    }

    async fn generate_answer(&self, prompt: &str) -> String {
        match self.context.generator.generate(prompt).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!(generator = self.context.generator.name(), "generator returned empty text, using fallback answer");
                FALLBACK_ANSWER.to_string()
            }
            Err(error) => {
                warn!(generator = self.context.generator.name(), %error, "generation failed, using fallback answer");
                FALLBACK_ANSWER.to_string()
            }
        }
    }
}
