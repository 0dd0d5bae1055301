use crate::embeddings::Embedder;
use crate::error::{EmbeddingError, IngestError};
use crate::models::{Chunk, DocumentFingerprint, IndexEntry, IngestionOptions};
use crate::store::{IndexManifest, PersistedIndex, RebuildLock, INDEX_FORMAT_VERSION};
use chrono::Utc;
use std::path::Path;
use tracing::{debug, info};

/// Embeds every chunk and persists the full index at `root`, replacing any previous one.
///
/// Embedding happens before anything is written, so a provider failure part way
/// through leaves the previous index (or no index) in place.
pub async fn build_index(
    root: &Path,
    chunks: &[Chunk],
    documents: Vec<DocumentFingerprint>,
    embedder: &dyn Embedder,
    options: &IngestionOptions,
) -> Result<IndexManifest, IngestError> {
    if options.embed_batch_size == 0 {
        return Err(IngestError::InvalidArgument(
            "embed batch size must be greater than zero".to_string(),
        ));
    }

    let _lock = RebuildLock::acquire(root)?;
    let dimensions = embedder.dimensions();
    let total_batches = chunks.len().div_ceil(options.embed_batch_size);
    let mut entries = Vec::with_capacity(chunks.len());

    info!(
        chunks = chunks.len(),
        batches = total_batches,
        model = %embedder.model_id(),
        "embedding chunks"
    );

    for (batch_number, batch) in chunks.chunks(options.embed_batch_size).enumerate() {
        let texts: Vec<&str> = batch.iter().map(|chunk| chunk.text.as_str()).collect();
        let vectors = embedder.embed_batch(&texts).await?;

        if vectors.len() != batch.len() {
            return Err(EmbeddingError::BackendResponse {
                backend: embedder.model_id(),
                details: format!("{} vectors returned for {} texts", vectors.len(), batch.len()),
            }
            .into());
        }

        for (chunk, vector) in batch.iter().zip(vectors) {
            if vector.len() != dimensions {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: dimensions,
                    actual: vector.len(),
                }
                .into());
            }
            entries.push(IndexEntry {
                vector,
                chunk: chunk.clone(),
            });
        }

        debug!(
            batch = batch_number + 1,
            total_batches,
            embedded = entries.len(),
            "embedded batch"
        );
    }

    let manifest = IndexManifest {
        format_version: INDEX_FORMAT_VERSION,
        collection: options.collection.clone(),
        embedding_model: embedder.model_id(),
        dimensions,
        entry_count: entries.len(),
        built_at: Utc::now(),
        documents,
    };

    PersistedIndex::write(root, &manifest, &entries)?;
    info!(path = %root.display(), entries = manifest.entry_count, "index persisted");

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::models::RetrievedChunk;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct FlakyEmbedder {
        inner: CharacterNgramEmbedder,
        calls: AtomicUsize,
        fail_after: usize,
    }

    #[async_trait]
    impl Embedder for FlakyEmbedder {
        fn model_id(&self) -> String {
            self.inner.model_id()
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) >= self.fail_after {
                return Err(EmbeddingError::BackendResponse {
                    backend: "flaky".to_string(),
                    details: "connection refused".to_string(),
                });
            }
            self.inner.embed(text).await
        }
    }

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(position, text)| Chunk {
                chunk_id: format!("chunk-{position}"),
                source_path: "data/guide.pdf".to_string(),
                page: 1,
                chunk_index: position as u32,
                text: text.to_string(),
                overlap_with_previous: 0,
            })
            .collect()
    }

    fn options(batch: usize) -> IngestionOptions {
        IngestionOptions {
            embed_batch_size: batch,
            ..IngestionOptions::default()
        }
    }

    #[tokio::test]
    async fn failed_embedding_leaves_no_index() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("db");
        let embedder = FlakyEmbedder {
            inner: CharacterNgramEmbedder::default(),
            calls: AtomicUsize::new(0),
            fail_after: 3,
        };

        let result = build_index(
            &root,
            &chunks(&["a one", "b two", "c three", "d four", "e five"]),
            Vec::new(),
            &embedder,
            &options(2),
        )
        .await;

        assert!(matches!(result, Err(IngestError::Embedding(_))));
        assert!(!root.exists());
        let leftovers: Vec<String> = fs::read_dir(dir.path())?
            .filter_map(|item| item.ok())
            .map(|item| item.file_name().to_string_lossy().to_string())
            .filter(|name| name != ".db.lock")
            .collect();
        assert!(leftovers.is_empty(), "unexpected leftovers: {leftovers:?}");
        Ok(())
    }

    #[tokio::test]
    async fn failed_rebuild_keeps_previous_index() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("db");
        let embedder = CharacterNgramEmbedder::default();
        build_index(&root, &chunks(&["first build"]), Vec::new(), &embedder, &options(8)).await?;

        let flaky = FlakyEmbedder {
            inner: embedder,
            calls: AtomicUsize::new(0),
            fail_after: 0,
        };
        let result = build_index(&root, &chunks(&["x", "y"]), Vec::new(), &flaky, &options(8)).await;

        assert!(result.is_err());
        let index = PersistedIndex::open(&root)?;
        assert_eq!(index.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_rebuild_is_refused() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("db");
        let _held = RebuildLock::acquire(&root)?;

        let result = build_index(
            &root,
            &chunks(&["text"]),
            Vec::new(),
            &CharacterNgramEmbedder::default(),
            &options(8),
        )
        .await;

        assert!(matches!(result, Err(IngestError::RebuildInProgress { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn lock_left_by_killed_ingest_is_reclaimed() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("db");
        fs::write(dir.path().join(".db.lock"), "4194303\n")?;

        let manifest = build_index(
            &root,
            &chunks(&["rice after a crash"]),
            Vec::new(),
            &CharacterNgramEmbedder::default(),
            &options(8),
        )
        .await?;

        assert_eq!(manifest.entry_count, 1);
        assert_eq!(PersistedIndex::open(&root)?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn rebuilding_identical_input_gives_identical_results() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let embedder = CharacterNgramEmbedder::default();
        let input = chunks(&[
            "Rice grows best in monsoon",
            "Wheat is a rabi crop",
            "Sugarcane needs heavy irrigation",
        ]);

        let first_root = dir.path().join("first");
        let second_root = dir.path().join("second");
        build_index(&first_root, &input, Vec::new(), &embedder, &options(2)).await?;
        build_index(&second_root, &input, Vec::new(), &embedder, &options(1)).await?;

        let query = embedder.embed_sync("rice in monsoon");
        let ids = |hits: Vec<RetrievedChunk>| {
            hits.into_iter()
                .map(|hit| hit.chunk.chunk_id)
                .collect::<Vec<_>>()
        };
        let first = ids(PersistedIndex::open(&first_root)?.nearest(&query, 3));
        let second = ids(PersistedIndex::open(&second_root)?.nearest(&query, 3));

        assert_eq!(first, second);
        Ok(())
    }

    #[tokio::test]
    async fn zero_batch_size_is_rejected() {
        let dir = tempdir().unwrap();
        let result = build_index(
            &dir.path().join("db"),
            &chunks(&["text"]),
            Vec::new(),
            &CharacterNgramEmbedder::default(),
            &options(0),
        )
        .await;
        assert!(matches!(result, Err(IngestError::InvalidArgument(_))));
    }
}
