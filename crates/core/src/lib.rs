pub mod chunking;
pub mod context;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod history;
pub mod indexer;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod retriever;
pub mod store;
pub mod traits;

pub use chunking::{chunk_document, chunk_documents, clean_page_text, split_text, ChunkingConfig};
pub use context::{assemble_prompt, source_citations, WeatherContext, NO_CONTEXT_MARKER};
pub use embeddings::{CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{
    AnswerError, ConfigError, EmbeddingError, GenerationError, IndexError, IngestError,
    RetrievalError, WeatherError,
};
pub use extractor::{load_document, LopdfExtractor, PageText, PdfExtractor};
pub use history::{AnswerHistory, DEFAULT_HISTORY_LIMIT};
pub use indexer::build_index;
pub use ingest::{
    discover_pdf_files, ingest_folder, ingest_folder_with, load_documents, IngestionSummary,
    LoadReport, SkippedPdf,
};
pub use models::{
    AnswerRecord, AnswerRequest, Chunk, Document, DocumentFingerprint, IngestionOptions,
    PipelineOptions, RetrievedChunk, WeatherSnapshot,
};
pub use orchestrator::{AnswerPipeline, PipelineContext, FALLBACK_ANSWER};
pub use providers::{
    OllamaEmbedder, OllamaGenerator, OpenAiChatGenerator, OpenMeteoWeather, WttrWeather,
};
pub use retriever::IndexRetriever;
pub use store::{IndexManifest, PersistedIndex};
pub use traits::{AnswerGenerator, Retriever, WeatherProvider};
