use agri_rag_core::providers::ollama::DEFAULT_OLLAMA_URL;
use agri_rag_core::providers::openai::DEFAULT_OPENAI_BASE_URL;
use agri_rag_core::providers::wttr::DEFAULT_WTTR_URL;
use agri_rag_core::providers::DEFAULT_REQUEST_TIMEOUT;
use agri_rag_core::{
    ingest_folder, AnswerGenerator, AnswerHistory, AnswerPipeline, AnswerRecord, AnswerRequest,
    CharacterNgramEmbedder, Embedder, IngestionOptions, OllamaEmbedder, OllamaGenerator,
    OpenAiChatGenerator, OpenMeteoWeather, PersistedIndex, PipelineContext, PipelineOptions,
    WeatherProvider, WttrWeather, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_HISTORY_LIMIT,
};
use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "agri-rag", version, about = "Answer farmer questions from a library of agricultural PDFs")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the persisted index.
    #[arg(long, global = true, env = "AGRI_INDEX_DIR", default_value = "db")]
    index_dir: PathBuf,

    #[command(flatten)]
    embedding: EmbeddingArgs,
}

#[derive(Args)]
struct EmbeddingArgs {
    /// Embedding backend used for both ingestion and queries.
    #[arg(long, global = true, env = "AGRI_EMBEDDER", value_enum, default_value = "local")]
    embedder: EmbedderKind,

    /// Ollama base URL
    #[arg(long, global = true, env = "OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,

    /// Ollama embedding model
    #[arg(long, global = true, env = "AGRI_EMBEDDING_MODEL", default_value = "all-minilm")]
    embedding_model: String,

    /// Vector size produced by the embedding model.
    #[arg(long, global = true, default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    embedding_dimensions: usize,

    /// Upper bound on each embedding or generation request.
    #[arg(long, global = true, env = "AGRI_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    request_timeout_secs: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedderKind {
    /// Offline character trigram hashing.
    Local,
    Ollama,
}

#[derive(Clone, Copy, ValueEnum)]
enum GeneratorKind {
    Ollama,
    Openai,
}

#[derive(Clone, Copy, ValueEnum)]
enum WeatherBackend {
    Wttr,
    OpenMeteo,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the index from every PDF under the source directory.
    Ingest {
        /// Folder that contains PDFs recursively.
        #[arg(long, env = "AGRI_DATA_DIR", default_value = "data")]
        source: PathBuf,
        #[arg(long, default_value_t = 1_000)]
        chunk_size: usize,
        #[arg(long, default_value_t = 200)]
        chunk_overlap: usize,
        /// Chunks sent to the embedder per request.
        #[arg(long, default_value_t = 32)]
        batch_size: usize,
        #[arg(long, default_value = agri_rag_core::models::DEFAULT_COLLECTION)]
        collection: String,
    },
    /// Answer one question against the index.
    Ask {
        #[arg(long, short)]
        question: String,
        /// Place used for the weather lookup.
        #[arg(long, env = "AGRI_LOCATION", default_value = "Delhi")]
        location: String,
        /// Skip the weather lookup entirely.
        #[arg(long, default_value_t = false)]
        no_weather: bool,
        #[arg(long, env = "AGRI_WEATHER_BACKEND", value_enum, default_value = "wttr")]
        weather_backend: WeatherBackend,
        #[arg(long, default_value_t = 5)]
        weather_timeout_secs: u64,
        #[arg(long, env = "AGRI_GENERATOR", value_enum, default_value = "ollama")]
        generator: GeneratorKind,
        #[arg(long, env = "AGRI_GENERATION_MODEL", default_value = "llama3.2")]
        generation_model: String,
        /// Base URL of an OpenAI-compatible API.
        #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL)]
        openai_url: String,
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        openai_api_key: Option<String>,
        /// Upper bound on generated tokens.
        #[arg(long, default_value_t = 300)]
        max_tokens: u32,
        #[arg(long, default_value_t = 3)]
        top_k: usize,
        /// Character budget for retrieved context in the prompt.
        #[arg(long, default_value_t = 4_000)]
        max_context_chars: usize,
        /// Print the answer record as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
        /// JSON file the answer is appended to, newest first.
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// Show what the current index was built from.
    Status {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print or clear a stored answer history.
    History {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value_t = false)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "agri-rag boot"
    );

    match cli.command {
        Command::Ingest {
            source,
            chunk_size,
            chunk_overlap,
            batch_size,
            collection,
        } => {
            let options = IngestionOptions {
                chunk_max_chars: chunk_size,
                chunk_overlap_chars: chunk_overlap,
                embed_batch_size: batch_size,
                collection,
            };
            let embedder = build_embedder(&cli.embedding)?;
            let summary = ingest_folder(&source, &cli.index_dir, embedder.as_ref(), &options).await?;

            for skipped in &summary.skipped_files {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
            }
            println!(
                "{} documents, {} pages, {} chunks indexed into {} ({} skipped)",
                summary.manifest.documents.len(),
                summary.pages,
                summary.chunks,
                cli.index_dir.display(),
                summary.skipped_files.len()
            );
        }
        Command::Ask {
            question,
            location,
            no_weather,
            weather_backend,
            weather_timeout_secs,
            generator,
            generation_model,
            openai_url,
            openai_api_key,
            max_tokens,
            top_k,
            max_context_chars,
            json,
            history,
        } => {
            let options = PipelineOptions {
                top_k,
                weather_timeout: Duration::from_secs(weather_timeout_secs),
                max_context_chars,
                history_limit: DEFAULT_HISTORY_LIMIT,
            };

            let request_timeout = Duration::from_secs(cli.embedding.request_timeout_secs);
            let generator: Arc<dyn AnswerGenerator> = match generator {
                GeneratorKind::Ollama => Arc::new(
                    OllamaGenerator::new(&cli.embedding.ollama_url, &generation_model, request_timeout)?
                        .with_max_tokens(max_tokens),
                ),
                GeneratorKind::Openai => Arc::new(
                    OpenAiChatGenerator::new(&openai_url, openai_api_key, &generation_model, request_timeout)?
                        .with_max_tokens(max_tokens),
                ),
            };
            let weather: Arc<dyn WeatherProvider> = match weather_backend {
                WeatherBackend::Wttr => Arc::new(WttrWeather::new(DEFAULT_WTTR_URL, options.weather_timeout)?),
                WeatherBackend::OpenMeteo => Arc::new(OpenMeteoWeather::new(options.weather_timeout)?),
            };

            let context = PipelineContext::open(
                &cli.index_dir,
                build_embedder(&cli.embedding)?,
                generator,
                weather,
            )?;
            let pipeline = AnswerPipeline::new(context, options)?;
            let request = AnswerRequest::new(question, location, !no_weather);

            let record = match history {
                Some(path) => {
                    let mut stored = load_history(&path, pipeline.options().history_limit)?;
                    let record = pipeline.answer_and_record(&mut stored, &request).await?;
                    save_history(&path, &stored)?;
                    record
                }
                None => pipeline.answer_query(&request).await?,
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_record(&record);
            }
        }
        Command::Status { json } => {
            let index = PersistedIndex::open(&cli.index_dir)?;
            let manifest = index.manifest();
            if json {
                println!("{}", serde_json::to_string_pretty(manifest)?);
            } else {
                println!("index: {}", index.root().display());
                println!("collection: {}", manifest.collection);
                println!(
                    "embedding_model: {} ({} dims)",
                    manifest.embedding_model, manifest.dimensions
                );
                println!("chunks: {}", manifest.entry_count);
                println!("built_at: {}", manifest.built_at.to_rfc3339());
                for document in &manifest.documents {
                    println!(
                        "  {} pages={} sha256={}",
                        document.source_path, document.page_count, document.checksum
                    );
                }
            }
        }
        Command::History { file, clear } => {
            let mut stored = load_history(&file, DEFAULT_HISTORY_LIMIT)?;
            if clear {
                stored.clear();
                save_history(&file, &stored)?;
                println!("history cleared: {}", file.display());
            } else if stored.is_empty() {
                println!("no answers recorded yet");
            } else {
                for record in stored.iter() {
                    print_record(record);
                    println!();
                }
            }
        }
    }

    Ok(())
}

fn build_embedder(args: &EmbeddingArgs) -> anyhow::Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match args.embedder {
        EmbedderKind::Local => Arc::new(CharacterNgramEmbedder {
            dimensions: args.embedding_dimensions,
        }),
        EmbedderKind::Ollama => Arc::new(OllamaEmbedder::new(
            &args.ollama_url,
            &args.embedding_model,
            args.embedding_dimensions,
            Duration::from_secs(args.request_timeout_secs),
        )?),
    };
    Ok(embedder)
}

fn load_history(path: &Path, limit: usize) -> anyhow::Result<AnswerHistory> {
    if !path.exists() {
        return Ok(AnswerHistory::new(limit));
    }
    let body = fs::read_to_string(path)
        .with_context(|| format!("failed to read history file {}", path.display()))?;
    let stored: AnswerHistory = serde_json::from_str(&body)
        .with_context(|| format!("history file {} is not valid JSON", path.display()))?;
    Ok(stored.with_limit(limit))
}

fn save_history(path: &Path, history: &AnswerHistory) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(history)?)
        .with_context(|| format!("failed to write history file {}", path.display()))
}

fn print_record(record: &AnswerRecord) {
    println!("question: {}", record.question);
    println!("answer:\n{}", record.answer);
    if record.sources.is_empty() {
        println!("sources: none");
    } else {
        println!("sources:");
        for source in &record.sources {
            println!("  {source}");
        }
    }
    if let Some(weather) = &record.weather {
        println!(
            "weather in {}: {}°C, {}% humidity, {}, {}mm rain",
            record.location,
            weather.temperature_c,
            weather.humidity_pct,
            weather.description,
            weather.rainfall_mm
        );
    }
    println!("asked_at: {}", record.asked_at.to_rfc3339());
}
