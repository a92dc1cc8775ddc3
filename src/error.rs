//! Error types for the voice RAG assistant

use thiserror::Error;

/// Result type alias for voice RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice RAG assistant
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Audio capture failed or no input device
    #[error("capture error: {0}")]
    Capture(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Audio playback error
    #[error("playback error: {0}")]
    Playback(String),

    /// Embedding backend error
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Embedder returned vectors whose dimension disagrees with the index
    #[error("embedding dimension mismatch: expected {expected}, found {found}")]
    EmbeddingDimensionMismatch {
        /// Dimension fixed at construction time
        expected: usize,
        /// Dimension of the offending vector
        found: usize,
    },

    /// Document produced no chunks
    #[error("document contains no indexable text")]
    EmptyDocument,

    /// Bulk insert attempted on an index that was already built
    #[error("vector index is frozen after its initial build")]
    IndexFrozen,

    /// Invalid retrieval request
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Answer generation error
    #[error("generation error: {0}")]
    Generation(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error comes from building the knowledge base
    ///
    /// Construction errors abort startup; everything else is scoped to a
    /// single session iteration
    #[must_use]
    pub const fn is_construction(&self) -> bool {
        matches!(
            self,
            Self::Embedding(_)
                | Self::EmbeddingDimensionMismatch { .. }
                | Self::EmptyDocument
                | Self::IndexFrozen
        )
    }
}
