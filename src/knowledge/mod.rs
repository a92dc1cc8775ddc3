//! Retrieval over a fixed text corpus
//!
//! - **chunking**: Split the document into sentence-aligned passages
//! - **embedder**: Map passages and queries to vectors
//! - **index**: Nearest-neighbor search over the vectors
//! - **base**: Compose the three into a build-once knowledge base

mod base;
mod chunking;
mod embedder;
mod index;

pub use base::{DEFAULT_TOP_K, KnowledgeBase, ScoredChunk};
pub use chunking::{Chunk, DEFAULT_CHUNK_SIZE, chunk};
pub use embedder::{
    DEFAULT_HASHING_DIM, DEFAULT_OPENAI_MODEL, Embedder, HashingEmbedder, OpenAiEmbedder,
};
pub use index::{FlatIndex, Neighbor, VectorIndex, squared_l2};

/// Bundled corpus used when no document is configured
pub const DEFAULT_DOCUMENT: &str = include_str!("../../assets/photosynthesis.txt");
