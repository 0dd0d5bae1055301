use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("source directory not found: {}", .0.display())]
    MissingSource(PathBuf),

    #[error("no documents found in {}", .0.display())]
    NoDocuments(PathBuf),

    #[error("no documents were provided to the chunker")]
    EmptyCorpus,

    #[error("embedding failed during ingestion: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("failed to write index: {0}")]
    IndexWrite(#[from] IndexError),

    #[error("index at {} is already being rebuilt (lock file {} exists)", .index.display(), .lock.display())]
    RebuildInProgress { index: PathBuf, lock: PathBuf },
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("embedding dimension {actual} does not match expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index not found at {}; run the ingest command first", .0.display())]
    Missing(PathBuf),

    #[error("index at {} is incomplete or corrupt: {details}", .path.display())]
    Corrupt { path: PathBuf, details: String },

    #[error("index was built with embedding model {indexed} ({indexed_dimensions} dims) but the configured model is {configured} ({configured_dimensions} dims); rebuild the index")]
    ModelMismatch {
        indexed: String,
        indexed_dimensions: usize,
        configured: String,
        configured_dimensions: usize,
    },

    #[error("unsupported index format version {found} (expected {expected})")]
    UnsupportedFormat { found: u32, expected: u32 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("top_k must be at least 1")]
    InvalidTopK,

    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("question is empty; please enter a question")]
    EmptyQuestion,

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("location not found: {0}")]
    UnknownLocation(String),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("invalid pipeline option: {0}")]
    InvalidOption(String),

    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
