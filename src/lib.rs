//! Voice RAG - spoken question answering over a single document
//!
//! This library provides the core functionality for the assistant:
//! - Knowledge base (chunking, embedding, nearest-neighbor retrieval)
//! - Voice processing (capture, STT, TTS, playback)
//! - Answer generation strategies
//! - The session loop tying them together
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Session                          │
//! │  Capture → Transcribe → Retrieve → Generate → Speak │
//! └──────┬──────────────┬──────────────┬────────────────┘
//!        │              │              │
//! ┌──────▼──────┐ ┌─────▼──────┐ ┌─────▼──────────────┐
//! │    Voice    │ │ Knowledge  │ │    Generation      │
//! │ mic │ STT   │ │ chunk │    │ │ keyword │ Ollama   │
//! │ TTS │ spkr  │ │ embed │ kNN│ │                    │
//! └─────────────┘ └────────────┘ └────────────────────┘
//! ```

pub mod assistant;
pub mod config;
pub mod error;
pub mod generation;
pub mod knowledge;
pub mod session;
pub mod voice;

pub use assistant::{Answer, Assistant};
pub use config::{Config, Overrides};
pub use error::{Error, Result};
pub use generation::{Generator, KeywordGenerator, KeywordRule, OllamaGenerator};
pub use knowledge::{
    Chunk, Embedder, FlatIndex, HashingEmbedder, KnowledgeBase, OpenAiEmbedder, ScoredChunk,
    VectorIndex, chunk,
};
pub use session::{
    Capabilities, IterationOutcome, Session, SessionSettings, SessionState, shutdown_on_ctrl_c,
};
