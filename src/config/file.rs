//! TOML configuration file loading
//!
//! Supports `~/.config/voice-rag/config.toml` as a persistent config source.
//! All fields are optional: the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{EmbeddingProvider, GeneratorProvider};
use crate::generation::KeywordRule;
use crate::voice::{ModelSize, TtsProvider};
use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Document and retrieval settings
    #[serde(default)]
    pub knowledge: KnowledgeFileConfig,

    /// Embedding backend
    #[serde(default)]
    pub embedding: EmbeddingFileConfig,

    /// Speech-to-text
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Text-to-speech
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// Microphone recording
    #[serde(default)]
    pub capture: CaptureFileConfig,

    /// Answer generation
    #[serde(default)]
    pub generator: GeneratorFileConfig,

    /// Interaction loop
    #[serde(default)]
    pub session: SessionFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Knowledge base configuration
#[derive(Debug, Default, Deserialize)]
pub struct KnowledgeFileConfig {
    /// Path to the source document (UTF-8 text)
    pub document: Option<PathBuf>,

    /// Target chunk size in characters
    pub chunk_size: Option<usize>,

    /// Chunks retrieved per question
    pub top_k: Option<usize>,
}

/// Embedding backend configuration
#[derive(Debug, Default, Deserialize)]
pub struct EmbeddingFileConfig {
    /// Embedding backend
    pub provider: Option<EmbeddingProvider>,

    /// Model identifier (e.g. "text-embedding-3-small")
    pub model: Option<String>,

    /// Vector dimension for the hashing embedder
    pub dimension: Option<usize>,

    /// Base URL of an `OpenAI`-compatible API
    pub base_url: Option<String>,
}

/// Speech-to-text configuration
#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    /// Whisper model size
    pub model_size: Option<ModelSize>,

    /// Explicit model id, overrides `model_size`
    pub model: Option<String>,

    /// Spoken language hint (e.g. "en")
    pub language: Option<String>,

    /// Base URL of a Whisper-compatible API
    pub base_url: Option<String>,
}

/// Text-to-speech configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// TTS provider
    pub provider: Option<TtsProvider>,

    /// TTS model (e.g. "tts-1")
    pub model: Option<String>,

    /// Voice identifier (e.g. "alloy")
    pub voice: Option<String>,

    /// Speed multiplier
    pub speed: Option<f32>,

    /// Language of the spoken answer (e.g. "en", "pt-br")
    pub language: Option<String>,
}

/// Recording configuration
#[derive(Debug, Default, Deserialize)]
pub struct CaptureFileConfig {
    /// Seconds recorded per question
    pub duration_secs: Option<f64>,

    /// Sample rate in Hz
    pub sample_rate: Option<u32>,
}

/// Answer generation configuration
#[derive(Debug, Default, Deserialize)]
pub struct GeneratorFileConfig {
    /// Generation backend
    pub provider: Option<GeneratorProvider>,

    /// Ollama server URL
    pub ollama_url: Option<String>,

    /// Ollama model
    pub ollama_model: Option<String>,

    /// Keyword rules, replacing the built-in ones
    pub rules: Option<Vec<KeywordRule>>,

    /// Answer when no keyword rule matches
    pub fallback: Option<String>,
}

/// Interaction loop configuration
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    /// Pause between iterations in milliseconds
    pub pause_ms: Option<u64>,

    /// Consecutive capture failures before giving up
    pub max_capture_failures: Option<u32>,

    /// Parent directory for temporary audio files
    pub scratch_dir: Option<PathBuf>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Load the TOML config file
///
/// With an explicit `path`, a missing or malformed file is an error. Without
/// one, the standard path is tried and problems fall back to defaults.
///
/// # Errors
///
/// Returns error if an explicitly requested file cannot be read or parsed
pub fn load_config_file(path: Option<&Path>) -> Result<ConfigFile> {
    if let Some(path) = path {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let config = parse_config(&content)?;
        tracing::info!(path = %path.display(), "loaded config file");
        return Ok(config);
    }

    let Some(path) = config_file_path() else {
        return Ok(ConfigFile::default());
    };

    if !path.exists() {
        return Ok(ConfigFile::default());
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse_config(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                Ok(config)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                Ok(ConfigFile::default())
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            Ok(ConfigFile::default())
        }
    }
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the TOML is malformed or has unknown sections
pub fn parse_config(content: &str) -> Result<ConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Return the config file path: `~/.config/voice-rag/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "omni", "voice-rag")
        .map(|d| d.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        let config = parse_config("").unwrap();
        assert!(config.knowledge.chunk_size.is_none());
        assert!(config.generator.rules.is_none());
    }

    #[test]
    fn test_partial_overlay() {
        let config = parse_config(
            r#"
            [knowledge]
            chunk_size = 120
            top_k = 3

            [stt]
            model_size = "small"
            language = "pt"

            [tts]
            provider = "elevenlabs"
            language = "pt-br"

            [[generator.rules]]
            keywords = ["water"]
            answer = "Fish live in water."
            "#,
        )
        .unwrap();

        assert_eq!(config.knowledge.chunk_size, Some(120));
        assert_eq!(config.knowledge.top_k, Some(3));
        assert_eq!(config.stt.model_size, Some(ModelSize::Small));
        assert_eq!(config.tts.provider, Some(TtsProvider::ElevenLabs));
        assert_eq!(config.generator.rules.map(|r| r.len()), Some(1));
        assert!(config.capture.sample_rate.is_none());
    }

    #[test]
    fn test_provider_sections() {
        let config = parse_config(
            "[embedding]\nprovider = \"openai\"\n[generator]\nprovider = \"ollama\"\n",
        )
        .unwrap();
        assert_eq!(config.embedding.provider, Some(EmbeddingProvider::OpenAI));
        assert_eq!(config.generator.provider, Some(GeneratorProvider::Ollama));
        assert!(parse_config("[generator]\nprovider = \"gpt\"").is_err());
    }

    #[test]
    fn test_invalid_model_size_rejected() {
        assert!(parse_config("[stt]\nmodel_size = \"huge\"").is_err());
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(parse_config("[telemetry]\nenabled = true").is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config_file(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_explicit_file_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[capture]\nduration_secs = 2.5\n").unwrap();

        let config = load_config_file(Some(&path)).unwrap();
        assert_eq!(config.capture.duration_secs, Some(2.5));
    }
}
