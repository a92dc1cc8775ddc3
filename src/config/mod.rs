//! Configuration management for the voice assistant
//!
//! Layers, lowest to highest precedence: built-in defaults, the TOML file,
//! environment variables, then command-line overrides.

pub mod file;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::generation::{DEFAULT_FALLBACK, DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL, KeywordRule};
use crate::knowledge::{
    DEFAULT_CHUNK_SIZE, DEFAULT_DOCUMENT, DEFAULT_HASHING_DIM, DEFAULT_OPENAI_MODEL, DEFAULT_TOP_K,
};
use crate::session::{DEFAULT_MAX_CAPTURE_FAILURES, DEFAULT_PAUSE, SessionSettings};
use crate::voice::{DEFAULT_CAPTURE_DURATION, DEFAULT_STT_URL, ModelSize, SAMPLE_RATE, TtsProvider};
use crate::{Error, Result};

use file::ConfigFile;

/// Default `OpenAI` API base URL
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Document and retrieval
    pub knowledge: KnowledgeConfig,

    /// Embedding backend
    pub embedding: EmbeddingConfig,

    /// Speech-to-text
    pub stt: SttConfig,

    /// Text-to-speech
    pub tts: TtsConfig,

    /// Microphone recording
    pub capture: CaptureConfig,

    /// Answer generation
    pub generator: GeneratorConfig,

    /// Interaction loop
    pub session: SessionConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Document and retrieval configuration
#[derive(Debug, Clone)]
pub struct KnowledgeConfig {
    /// Source document; the bundled corpus when unset
    pub document: Option<PathBuf>,

    /// Target chunk size in characters
    pub chunk_size: usize,

    /// Chunks retrieved per question
    pub top_k: usize,
}

/// Embedding backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local feature hashing, no network
    #[default]
    Hashing,
    /// `OpenAI`-compatible embeddings API
    OpenAI,
}

impl fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hashing => "hashing",
            Self::OpenAI => "openai",
        })
    }
}

impl FromStr for EmbeddingProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hashing" => Ok(Self::Hashing),
            "openai" => Ok(Self::OpenAI),
            other => Err(Error::Config(format!("unknown embedding provider: {other}"))),
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,

    /// Model for the `OpenAI` provider
    pub model: String,

    /// Vector dimension for the hashing provider
    pub dimension: usize,

    /// API base URL for the `OpenAI` provider
    pub base_url: String,
}

/// Speech-to-text configuration
#[derive(Debug, Clone)]
pub struct SttConfig {
    pub model_size: ModelSize,

    /// Model id sent to the server, derived from `model_size` unless set
    pub model: String,

    /// Spoken language hint
    pub language: Option<String>,

    /// Whisper-compatible API base URL
    pub base_url: String,
}

/// Text-to-speech configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub provider: TtsProvider,

    /// TTS model
    pub model: String,

    /// Voice identifier
    pub voice: String,

    /// Speed multiplier (0.25 to 4.0)
    pub speed: f32,

    /// Language of the spoken answer
    pub language: String,
}

/// Recording configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub duration: Duration,
    pub sample_rate: u32,
}

/// Answer generation backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorProvider {
    /// Deterministic keyword rules
    #[default]
    Keyword,
    /// Local Ollama server
    Ollama,
}

impl fmt::Display for GeneratorProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Keyword => "keyword",
            Self::Ollama => "ollama",
        })
    }
}

impl FromStr for GeneratorProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "keyword" => Ok(Self::Keyword),
            "ollama" => Ok(Self::Ollama),
            other => Err(Error::Config(format!("unknown generator: {other}"))),
        }
    }
}

/// Answer generation configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub provider: GeneratorProvider,
    pub ollama_url: String,
    pub ollama_model: String,

    /// Keyword rules; the built-in photosynthesis rules when `None`
    pub rules: Option<Vec<KeywordRule>>,

    /// Answer when no keyword rule matches
    pub fallback: String,
}

/// Interaction loop configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Pause between iterations
    pub pause: Duration,

    /// Consecutive capture failures before the session gives up
    pub max_capture_failures: u32,

    /// Parent of the scratch directory; the system temp dir when unset
    pub scratch_dir: Option<PathBuf>,
}

/// API keys for external services
#[derive(Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (embeddings, transcription, TTS)
    pub openai: Option<String>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<String>,
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeys")
            .field("openai", &self.openai.as_ref().map(|_| "<redacted>"))
            .field("elevenlabs", &self.elevenlabs.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Command-line overrides, applied last
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub document: Option<PathBuf>,
    pub chunk_size: Option<usize>,
    pub top_k: Option<usize>,
}

impl Config {
    /// Load configuration from the TOML file, environment and `overrides`
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config file is unusable or any value is
    /// invalid
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let fc = file::load_config_file(path)?;
        let mut config = Self::from_sources(fc, |key| std::env::var(key).ok())?;
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Merge a parsed config file with environment lookups
    ///
    /// `env` maps a variable name to its value. Blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns error if an environment value cannot be parsed
    pub fn from_sources(fc: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        // Knowledge (env > toml > default)
        let knowledge = KnowledgeConfig {
            document: env("VOICE_RAG_DOCUMENT")
                .map(PathBuf::from)
                .or(fc.knowledge.document),
            chunk_size: parse_env(&env, "VOICE_RAG_CHUNK_SIZE")?
                .or(fc.knowledge.chunk_size)
                .unwrap_or(DEFAULT_CHUNK_SIZE),
            top_k: parse_env(&env, "VOICE_RAG_TOP_K")?
                .or(fc.knowledge.top_k)
                .unwrap_or(DEFAULT_TOP_K),
        };

        let embedding = EmbeddingConfig {
            provider: parse_env(&env, "VOICE_RAG_EMBEDDING_PROVIDER")?
                .or(fc.embedding.provider)
                .unwrap_or_default(),
            model: env("VOICE_RAG_EMBEDDING_MODEL")
                .or(fc.embedding.model)
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            dimension: fc.embedding.dimension.unwrap_or(DEFAULT_HASHING_DIM),
            base_url: fc
                .embedding
                .base_url
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
        };

        // An explicit model id wins over the size
        let model_size = parse_env(&env, "VOICE_RAG_STT_MODEL_SIZE")?
            .or(fc.stt.model_size)
            .unwrap_or_default();
        let stt = SttConfig {
            model_size,
            model: env("VOICE_RAG_STT_MODEL")
                .or(fc.stt.model)
                .unwrap_or_else(|| model_size.model_id().to_string()),
            language: env("VOICE_RAG_LANGUAGE").or(fc.stt.language),
            base_url: env("VOICE_RAG_STT_URL")
                .or(fc.stt.base_url)
                .unwrap_or_else(|| DEFAULT_STT_URL.to_string()),
        };

        let tts_provider: TtsProvider = parse_env(&env, "VOICE_RAG_TTS_PROVIDER")?
            .or(fc.tts.provider)
            .unwrap_or_default();
        let (default_model, default_voice) = match tts_provider {
            TtsProvider::OpenAI => ("tts-1", "alloy"),
            TtsProvider::ElevenLabs => ("eleven_multilingual_v2", "21m00Tcm4TlvDq8ikWAM"),
        };
        let tts = TtsConfig {
            provider: tts_provider,
            model: fc.tts.model.unwrap_or_else(|| default_model.to_string()),
            voice: fc.tts.voice.unwrap_or_else(|| default_voice.to_string()),
            speed: fc.tts.speed.unwrap_or(1.0),
            language: fc.tts.language.unwrap_or_else(|| "en".to_string()),
        };

        let capture = CaptureConfig {
            duration: match fc.capture.duration_secs {
                Some(secs) => Duration::try_from_secs_f64(secs).map_err(|_| {
                    Error::Config(format!("invalid capture duration: {secs}"))
                })?,
                None => DEFAULT_CAPTURE_DURATION,
            },
            sample_rate: fc.capture.sample_rate.unwrap_or(SAMPLE_RATE),
        };

        let generator = GeneratorConfig {
            provider: parse_env(&env, "VOICE_RAG_GENERATOR")?
                .or(fc.generator.provider)
                .unwrap_or_default(),
            ollama_url: env("OLLAMA_URL")
                .or(fc.generator.ollama_url)
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            ollama_model: fc
                .generator
                .ollama_model
                .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            rules: fc.generator.rules,
            fallback: fc
                .generator
                .fallback
                .unwrap_or_else(|| DEFAULT_FALLBACK.to_string()),
        };

        let session = SessionConfig {
            pause: fc
                .session
                .pause_ms
                .map_or(DEFAULT_PAUSE, Duration::from_millis),
            max_capture_failures: fc
                .session
                .max_capture_failures
                .unwrap_or(DEFAULT_MAX_CAPTURE_FAILURES),
            scratch_dir: fc.session.scratch_dir,
        };

        // API keys (env > toml > None)
        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY").or(fc.api_keys.openai),
            elevenlabs: env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs),
        };

        Ok(Self {
            knowledge,
            embedding,
            stt,
            tts,
            capture,
            generator,
            session,
            api_keys,
        })
    }

    /// Apply command-line overrides
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(document) = &overrides.document {
            self.knowledge.document = Some(document.clone());
        }
        if let Some(chunk_size) = overrides.chunk_size {
            self.knowledge.chunk_size = chunk_size;
        }
        if let Some(top_k) = overrides.top_k {
            self.knowledge.top_k = top_k;
        }
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns the first invalid value found
    pub fn validate(&self) -> Result<()> {
        if self.knowledge.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be at least 1".to_string()));
        }
        if self.knowledge.top_k == 0 {
            return Err(Error::Config("top_k must be at least 1".to_string()));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::Config(
                "embedding dimension must be at least 1".to_string(),
            ));
        }
        if self.capture.sample_rate == 0 {
            return Err(Error::Config("sample rate must be positive".to_string()));
        }
        if self.capture.duration.is_zero() {
            return Err(Error::Config("capture duration must be positive".to_string()));
        }
        if !(0.25..=4.0).contains(&self.tts.speed) {
            return Err(Error::Config(format!(
                "tts speed {} out of range (0.25 to 4.0)",
                self.tts.speed
            )));
        }
        if self.session.max_capture_failures == 0 {
            return Err(Error::Config(
                "max_capture_failures must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Text of the configured document
    ///
    /// # Errors
    ///
    /// Returns error if the document file cannot be read
    pub fn document_text(&self) -> Result<String> {
        match &self.knowledge.document {
            Some(path) => std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("cannot read document {}: {e}", path.display()))
            }),
            None => Ok(DEFAULT_DOCUMENT.to_string()),
        }
    }

    /// Loop settings for a [`crate::Session`]
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            capture_duration: self.capture.duration,
            sample_rate: self.capture.sample_rate,
            top_k: self.knowledge.top_k,
            language: self.tts.language.clone(),
            pause: self.session.pause,
            max_capture_failures: self.session.max_capture_failures,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        // No file, no environment
        match Self::from_sources(ConfigFile::default(), |_| None) {
            Ok(config) => config,
            Err(_) => unreachable!("defaults contain no parseable values"),
        }
    }
}

fn parse_env<T>(env: impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    env(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("{key}={value}: {e}")))
        })
        .transpose()
}
