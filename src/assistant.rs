//! Assistant - wires configuration to a running session
//!
//! Builds the knowledge base once, then either runs the voice loop or
//! answers typed questions against it.

use std::sync::Arc;

use serde::Serialize;

use crate::config::{EmbeddingProvider, GeneratorProvider};
use crate::generation::{Generator, KeywordGenerator, OllamaGenerator};
use crate::knowledge::{Embedder, HashingEmbedder, KnowledgeBase, OpenAiEmbedder, ScoredChunk};
use crate::session::{Capabilities, Session, shutdown_on_ctrl_c};
use crate::voice::{
    Microphone, ScratchSpace, Speakers, Synthesizer, TextToSpeech, Transcriber, TtsProvider,
    WhisperTranscriber,
};
use crate::{Config, Error, Result};

/// A typed question's answer with the context it was generated from
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
    /// Retrieved chunks, nearest first
    pub context: Vec<ScoredChunk>,
}

/// The voice assistant
pub struct Assistant {
    config: Config,
    knowledge: Arc<KnowledgeBase>,
    generator: Arc<dyn Generator>,
}

impl Assistant {
    /// Build the knowledge base and generator from `config`
    ///
    /// # Errors
    ///
    /// Returns error if the document cannot be read or the knowledge base
    /// cannot be built
    pub async fn new(config: Config) -> Result<Self> {
        let document = config.document_text()?;
        let embedder = build_embedder(&config)?;
        let knowledge = KnowledgeBase::build(&document, config.knowledge.chunk_size, embedder)
            .await?;

        tracing::info!(
            chunks = knowledge.len(),
            dimension = knowledge.dimension(),
            embedder = %config.embedding.provider,
            "knowledge base ready"
        );

        let generator = build_generator(&config);

        Ok(Self {
            config,
            knowledge: Arc::new(knowledge),
            generator,
        })
    }

    /// The built knowledge base
    #[must_use]
    pub const fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    /// Answer a typed question without any audio
    ///
    /// # Errors
    ///
    /// Returns error if retrieval or generation fails
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidQuery("question is empty".to_string()));
        }

        let context = self
            .knowledge
            .search_scored(question, self.config.knowledge.top_k)
            .await?;
        let texts: Vec<String> = context.iter().map(|c| c.text.clone()).collect();
        let answer = self.generator.generate(question, &texts).await?;

        Ok(Answer {
            question: question.to_string(),
            answer,
            context,
        })
    }

    /// Run the voice loop until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns error if the speech services cannot be configured or the
    /// microphone keeps failing
    pub async fn run(self) -> Result<()> {
        let capabilities = Capabilities {
            source: Arc::new(Microphone),
            transcriber: build_transcriber(&self.config)?,
            generator: Arc::clone(&self.generator),
            synthesizer: build_synthesizer(&self.config)?,
            player: Arc::new(Speakers),
        };

        let scratch = match &self.config.session.scratch_dir {
            Some(parent) => ScratchSpace::new_in(parent)?,
            None => ScratchSpace::new()?,
        };

        let mut session = Session::new(
            self.knowledge,
            capabilities,
            self.config.session_settings(),
            scratch,
        )?;

        tracing::info!(
            stt = %self.config.stt.model,
            tts = %self.config.tts.provider,
            generator = %self.config.generator.provider,
            "listening, press Ctrl-C to stop"
        );

        let (_shutdown_tx, mut shutdown_rx) = shutdown_on_ctrl_c();
        session.run(&mut shutdown_rx).await
    }
}

/// Embedder for the configured provider
///
/// # Errors
///
/// Returns error if the provider needs an API key that is not set
pub fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    match config.embedding.provider {
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedder::new(
            config.embedding.dimension,
        )?)),
        EmbeddingProvider::OpenAI => {
            let api_key = config.api_keys.openai.clone().ok_or_else(|| {
                Error::Config("OPENAI_API_KEY required for openai embeddings".to_string())
            })?;
            Ok(Arc::new(OpenAiEmbedder::new(
                api_key,
                config.embedding.model.clone(),
                config.embedding.base_url.clone(),
            )?))
        }
    }
}

/// Generator for the configured provider
#[must_use]
pub fn build_generator(config: &Config) -> Arc<dyn Generator> {
    let generator = &config.generator;
    match generator.provider {
        GeneratorProvider::Keyword => match &generator.rules {
            Some(rules) => Arc::new(KeywordGenerator::new(
                rules.clone(),
                generator.fallback.clone(),
            )),
            None => Arc::new(KeywordGenerator::photosynthesis()),
        },
        GeneratorProvider::Ollama => {
            tracing::info!(url = %generator.ollama_url, model = %generator.ollama_model, "using ollama");
            Arc::new(OllamaGenerator::new(
                &generator.ollama_url,
                generator.ollama_model.clone(),
            ))
        }
    }
}

/// Whisper-compatible transcriber
///
/// # Errors
///
/// Returns error if the endpoint URL is empty
pub fn build_transcriber(config: &Config) -> Result<Arc<dyn Transcriber>> {
    let stt = &config.stt;
    let transcriber =
        WhisperTranscriber::new(&stt.base_url, config.api_keys.openai.clone(), stt.model.clone())?
            .with_language(stt.language.clone());
    Ok(Arc::new(transcriber))
}

/// Synthesizer for the configured provider
///
/// # Errors
///
/// Returns error if the provider's API key is not set
pub fn build_synthesizer(config: &Config) -> Result<Arc<dyn Synthesizer>> {
    let tts = &config.tts;
    let synthesizer = match tts.provider {
        TtsProvider::OpenAI => {
            let api_key = config.api_keys.openai.clone().ok_or_else(|| {
                Error::Config("OPENAI_API_KEY required for OpenAI TTS".to_string())
            })?;
            TextToSpeech::new_openai_with_model(
                api_key,
                tts.voice.clone(),
                tts.speed,
                tts.model.clone(),
            )?
        }
        TtsProvider::ElevenLabs => {
            let api_key = config.api_keys.elevenlabs.clone().ok_or_else(|| {
                Error::Config("ELEVENLABS_API_KEY required for ElevenLabs TTS".to_string())
            })?;
            TextToSpeech::new_elevenlabs_with_model(api_key, tts.voice.clone(), tts.model.clone())?
        }
    };
    Ok(Arc::new(synthesizer))
}
