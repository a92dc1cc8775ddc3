//! Build-once, query-many retrieval over a single document

use std::sync::Arc;

use serde::Serialize;

use super::chunking::{Chunk, chunk};
use super::embedder::Embedder;
use super::index::{FlatIndex, VectorIndex};
use crate::{Error, Result};

/// Default number of chunks returned per query
pub const DEFAULT_TOP_K: usize = 2;

/// A retrieved chunk with its distance to the query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    /// Chunk index
    pub index: usize,
    /// Chunk text
    pub text: String,
    /// Squared Euclidean distance to the query vector
    pub distance: f32,
}

/// Chunked, embedded and indexed document
///
/// Immutable after [`KnowledgeBase::build`]; share it as
/// `Arc<KnowledgeBase>` for concurrent read-only queries.
pub struct KnowledgeBase {
    chunks: Vec<Chunk>,
    embedder: Arc<dyn Embedder>,
    index: Box<dyn VectorIndex>,
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("chunks", &self.chunks.len())
            .field("dimension", &self.index.dimension())
            .finish_non_exhaustive()
    }
}

impl KnowledgeBase {
    /// Chunk `document`, embed every chunk in one batch and index the vectors
    ///
    /// # Errors
    ///
    /// Returns error if the document yields no chunks, the embedder fails,
    /// or the embedder returns a wrong number of vectors or vectors of
    /// inconsistent dimension
    pub async fn build(
        document: &str,
        chunk_size: usize,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let chunks = chunk(document, chunk_size);
        if chunks.is_empty() {
            return Err(Error::EmptyDocument);
        }
        tracing::info!(chunks = chunks.len(), chunk_size, "document chunked");

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = embedder.embed(&texts).await?;

        if vectors.len() != chunks.len() {
            return Err(Error::Embedding(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let dimension = vectors.first().map_or(0, Vec::len);
        if dimension == 0 {
            return Err(Error::Embedding(
                "embedder returned zero-dimension vectors".to_string(),
            ));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(Error::EmbeddingDimensionMismatch {
                expected: dimension,
                found: bad.len(),
            });
        }
        tracing::info!(dimension, "embeddings generated");

        let mut index = FlatIndex::new(dimension);
        index.add_all(vectors)?;
        tracing::info!(vectors = index.len(), "vector index ready");

        Ok(Self {
            chunks,
            embedder,
            index: Box::new(index),
        })
    }

    /// Return up to `k` chunk texts nearest to `query`, closest first
    ///
    /// # Errors
    ///
    /// Returns error if `k` is zero or embedding the query fails
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<String>> {
        Ok(self
            .search_scored(query, k)
            .await?
            .into_iter()
            .map(|c| c.text)
            .collect())
    }

    /// Like [`KnowledgeBase::search`] but keeps indices and distances
    ///
    /// # Errors
    ///
    /// Returns error if `k` is zero or embedding the query fails
    pub async fn search_scored(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(Error::InvalidQuery("k must be at least 1".to_string()));
        }

        let query_vector = self.embedder.embed_one(query).await?;
        let neighbors = self.index.search(&query_vector, k)?;

        let results: Vec<ScoredChunk> = neighbors
            .into_iter()
            .filter_map(|n| {
                self.chunks.get(n.index).map(|c| ScoredChunk {
                    index: c.index,
                    text: c.text.clone(),
                    distance: n.distance,
                })
            })
            .collect();

        tracing::debug!(
            k,
            hits = results.len(),
            best = ?results.first().map(|r| r.index),
            "knowledge search"
        );

        Ok(results)
    }

    /// All chunks in index order
    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Number of chunks
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Always false for a successfully built knowledge base
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Embedding dimension fixed at construction
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    /// Number of vectors held by the index
    #[must_use]
    pub fn index_len(&self) -> usize {
        self.index.len()
    }
}
