use crate::embeddings::Embedder;
use crate::error::{EmbeddingError, IndexError, RetrievalError};
use crate::models::RetrievedChunk;
use crate::store::PersistedIndex;
use crate::traits::Retriever;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Query-time view over a persisted index, embedding queries with the model the index was built with.
#[derive(Clone)]
pub struct IndexRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<PersistedIndex>,
}

impl IndexRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<PersistedIndex>) -> Result<Self, IndexError> {
        index.check_model(embedder.as_ref())?;
        Ok(Self { embedder, index })
    }

    pub fn open(root: &Path, embedder: Arc<dyn Embedder>) -> Result<Self, IndexError> {
        let index = PersistedIndex::open_for(root, embedder.as_ref())?;
        Ok(Self {
            embedder,
            index: Arc::new(index),
        })
    }

    pub fn index(&self) -> &PersistedIndex {
        &self.index
    }
}

#[async_trait]
impl Retriever for IndexRetriever {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        if top_k == 0 {
            return Err(RetrievalError::InvalidTopK);
        }
        if self.index.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query).await?;
        if query_vector.len() != self.index.manifest().dimensions {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.index.manifest().dimensions,
                actual: query_vector.len(),
            }
            .into());
        }

        let hits = self.index.nearest(&query_vector, top_k);
        debug!(top_k, hits = hits.len(), "retrieved chunks");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::models::{Chunk, IndexEntry};
    use crate::store::{IndexManifest, INDEX_FORMAT_VERSION};
    use chrono::Utc;
    use tempfile::tempdir;

    fn write_index(root: &Path, texts: &[&str]) -> Result<(), Box<dyn std::error::Error>> {
        let embedder = CharacterNgramEmbedder::default();
        let entries = texts
            .iter()
            .enumerate()
            .map(|(position, text)| IndexEntry {
                vector: embedder.embed_sync(text),
                chunk: Chunk {
                    chunk_id: format!("chunk-{position}"),
                    source_path: "data/crops.pdf".to_string(),
                    page: position as u32 + 1,
                    chunk_index: 0,
                    text: text.to_string(),
                    overlap_with_previous: 0,
                },
            })
            .collect::<Vec<_>>();

        let manifest = IndexManifest {
            format_version: INDEX_FORMAT_VERSION,
            collection: "agri_docs".to_string(),
            embedding_model: embedder.model_id(),
            dimensions: embedder.dimensions(),
            entry_count: entries.len(),
            built_at: Utc::now(),
            documents: Vec::new(),
        };
        PersistedIndex::write(root, &manifest, &entries)?;
        Ok(())
    }

    #[tokio::test]
    async fn search_is_bounded_and_ordered() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("db");
        write_index(
            &root,
            &[
                "Cotton is sown in April and May",
                "Rice grows best in monsoon with heavy rainfall",
                "Drip irrigation saves water for vegetables",
                "Rice seedlings are transplanted after 25 days",
            ],
        )?;

        let retriever = IndexRetriever::open(&root, Arc::new(CharacterNgramEmbedder::default()))?;
        for top_k in 1..=5 {
            let hits = retriever.search("when to plant rice in monsoon", top_k).await?;
            assert!(hits.len() <= top_k);
            for pair in hits.windows(2) {
                assert!(pair[0].score >= pair[1].score);
            }
        }

        let best = retriever.search("rice monsoon rainfall", 1).await?;
        assert_eq!(best[0].chunk.chunk_id, "chunk-1");
        Ok(())
    }

    #[tokio::test]
    async fn empty_index_returns_no_hits() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("db");
        write_index(&root, &[])?;

        let retriever = IndexRetriever::open(&root, Arc::new(CharacterNgramEmbedder::default()))?;
        assert!(retriever.search("anything", 3).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn zero_k_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("db");
        write_index(&root, &["Wheat"])?;

        let retriever = IndexRetriever::open(&root, Arc::new(CharacterNgramEmbedder::default()))?;
        assert!(matches!(
            retriever.search("wheat", 0).await,
            Err(RetrievalError::InvalidTopK)
        ));
        Ok(())
    }

    #[test]
    fn opening_with_another_model_fails() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("db");
        write_index(&root, &["Wheat"])?;

        let other = CharacterNgramEmbedder { dimensions: 64 };
        assert!(matches!(
            IndexRetriever::open(&root, Arc::new(other)),
            Err(IndexError::ModelMismatch { .. })
        ));
        Ok(())
    }
}
