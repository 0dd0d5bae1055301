use crate::error::ConfigError;
use crate::extractor::PageText;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_COLLECTION: &str = "agri_docs";

/// One source PDF after text extraction. Discarded once chunked.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub pages: Vec<PageText>,
}

impl Document {
    pub fn file_name(&self) -> String {
        file_name_of(&self.path.to_string_lossy())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentFingerprint {
    pub source_path: String,
    pub file_name: String,
    pub checksum: String,
    pub page_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_id: String,
    pub source_path: String,
    pub page: u32,
    /// Position of the chunk within its page, starting at 0.
    pub chunk_index: u32,
    pub text: String,
    /// Number of leading characters shared with the previous chunk of the same page.
    pub overlap_with_previous: usize,
}

impl Chunk {
    pub fn file_name(&self) -> String {
        file_name_of(&self.source_path)
    }

    pub fn citation(&self) -> String {
        format!("{} \u{2014} Page {}", self.file_name(), self.page)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    /// Cosine similarity between the query and the chunk, higher is better.
    pub score: f32,
}

impl RetrievedChunk {
    pub fn distance(&self) -> f32 {
        1.0 - self.score
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherSnapshot {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub description: String,
    pub rainfall_mm: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerRequest {
    pub question: String,
    pub location: String,
    pub include_weather: bool,
}

impl AnswerRequest {
    pub fn new(question: impl Into<String>, location: impl Into<String>, include_weather: bool) -> Self {
        Self {
            question: question.into(),
            location: location.into(),
            include_weather,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question: String,
    pub answer: String,
    pub sources: Vec<String>,
    pub weather: Option<WeatherSnapshot>,
    pub location: String,
    pub asked_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
    pub embed_batch_size: usize,
    pub collection: String,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_max_chars: 1_000,
            chunk_overlap_chars: 200,
            embed_batch_size: 32,
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub top_k: usize,
    pub weather_timeout: Duration,
    /// Character budget for the rendered context blocks of a prompt.
    pub max_context_chars: usize,
    pub history_limit: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            top_k: 3,
            weather_timeout: Duration::from_secs(5),
            max_context_chars: 4_000,
            history_limit: 5,
        }
    }
}

impl PipelineOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::InvalidOption("top_k must be at least 1".to_string()));
        }
        if self.weather_timeout.is_zero() {
            return Err(ConfigError::InvalidOption(
                "weather timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn file_name_of(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}
