//! Speech-to-text (STT) processing

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Deserialize;

use crate::{Error, Result};

/// Default Whisper-compatible endpoint (a local server)
pub const DEFAULT_STT_URL: &str = "http://localhost:8000/v1";

/// Result of a transcription
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Transcript {
    /// Recognized text, possibly empty
    pub text: String,
}

impl Transcript {
    /// Whether nothing intelligible was recognized
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Converts a recorded audio file to text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the audio file at `path`
    ///
    /// # Errors
    ///
    /// Returns error if transcription fails
    async fn transcribe(&self, path: &Path) -> Result<Transcript>;
}

/// Whisper model size, trading latency for accuracy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    /// Fastest, least accurate
    Tiny,
    /// Balanced default
    #[default]
    Base,
    /// Slower, more accurate
    Small,
    /// Slowest, most accurate
    Medium,
}

impl ModelSize {
    /// Model identifier sent to the transcription server
    #[must_use]
    pub const fn model_id(self) -> &'static str {
        match self {
            Self::Tiny => "tiny",
            Self::Base => "base",
            Self::Small => "small",
            Self::Medium => "medium",
        }
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.model_id())
    }
}

impl FromStr for ModelSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "tiny" => Ok(Self::Tiny),
            "base" => Ok(Self::Base),
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            other => Err(Error::Config(format!(
                "unknown transcription model size: {other} (expected tiny, base, small or medium)"
            ))),
        }
    }
}

/// Transcribes through an `OpenAI`-compatible `/audio/transcriptions` endpoint
///
/// Works against the `OpenAI` API or a local Whisper server exposing the
/// same route.
pub struct WhisperTranscriber {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    language: Option<String>,
}

impl WhisperTranscriber {
    /// Create a transcriber for `model` at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the URL is empty
    pub fn new(base_url: &str, api_key: Option<String>, model: String) -> Result<Self> {
        if base_url.trim().is_empty() {
            return Err(Error::Config(
                "transcription endpoint URL required".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            model,
            language: None,
        })
    }

    /// Hint the spoken language (ISO-639-1, e.g. "en", "pt")
    #[must_use]
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language.filter(|l| !l.is_empty());
        self
    }

    /// Model identifier in use
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, path: &Path) -> Result<Transcript> {
        let audio = tokio::fs::read(path).await?;
        tracing::debug!(audio_bytes = audio.len(), model = %self.model, "starting transcription");

        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let mut request = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .multipart(form);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "transcription request failed");
            e
        })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(Error::Stt(format!("transcription API error {status}: {body}")));
        }

        let transcript: Transcript = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            e
        })?;

        tracing::info!(transcript = %transcript.text, "transcription complete");
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_size_parse() {
        assert_eq!("tiny".parse::<ModelSize>().unwrap(), ModelSize::Tiny);
        assert_eq!(" Medium ".parse::<ModelSize>().unwrap(), ModelSize::Medium);
        assert!("large".parse::<ModelSize>().is_err());
    }

    #[test]
    fn test_model_size_default_is_base() {
        assert_eq!(ModelSize::default(), ModelSize::Base);
        assert_eq!(ModelSize::default().to_string(), "base");
    }

    #[test]
    fn test_blank_transcript() {
        assert!(Transcript::default().is_blank());
        assert!(Transcript { text: " \n\t".to_string() }.is_blank());
        assert!(!Transcript { text: " hi ".to_string() }.is_blank());
    }

    #[test]
    fn test_transcript_parses_extra_fields() {
        let t: Transcript =
            serde_json::from_str(r#"{"text":"hello","language":"en","duration":1.2}"#).unwrap();
        assert_eq!(t.text, "hello");
    }

    #[test]
    fn test_empty_url_rejected() {
        assert!(WhisperTranscriber::new("  ", None, "base".to_string()).is_err());
    }

    #[test]
    fn test_empty_key_and_language_ignored() {
        let stt = WhisperTranscriber::new(DEFAULT_STT_URL, Some(String::new()), "base".to_string())
            .unwrap()
            .with_language(Some(String::new()));
        assert!(stt.api_key.is_none());
        assert!(stt.language.is_none());
        assert_eq!(stt.model(), "base");
    }
}
