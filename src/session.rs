//! Session orchestrator
//!
//! Runs the interaction loop: capture → transcribe → retrieve → generate →
//! speak. Failures are isolated to the iteration they happen in, temporary
//! audio never outlives its stage, and shutdown can interrupt any stage.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::generation::Generator;
use crate::knowledge::{DEFAULT_TOP_K, KnowledgeBase};
use crate::voice::{
    AudioSource, DEFAULT_CAPTURE_DURATION, Player, SAMPLE_RATE, ScratchSpace, Synthesizer,
    Transcriber, samples_to_wav,
};
use crate::{Error, Result};

/// Default pause between iterations
pub const DEFAULT_PAUSE: Duration = Duration::from_secs(1);

/// Default number of consecutive capture failures tolerated
pub const DEFAULT_MAX_CAPTURE_FAILURES: u32 = 3;

/// Stage the session is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Between iterations
    Idle,
    /// Recording the question
    Capturing,
    /// Converting the recording to text
    Transcribing,
    /// Searching the knowledge base
    Retrieving,
    /// Producing the answer text
    Generating,
    /// Synthesizing and playing the answer
    Speaking,
    /// Terminal: cleaning up after a shutdown request
    ShuttingDown,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Capturing => "capturing",
            Self::Transcribing => "transcribing",
            Self::Retrieving => "retrieving",
            Self::Generating => "generating",
            Self::Speaking => "speaking",
            Self::ShuttingDown => "shutting-down",
        })
    }
}

/// How a completed iteration ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationOutcome {
    /// The answer was generated and played
    Answered {
        /// Transcribed question
        query: String,
        /// Spoken answer
        answer: String,
    },
    /// Nothing intelligible was heard; no retrieval or generation happened
    EmptyTranscription,
    /// The answer was generated but synthesis or playback failed
    Unspoken {
        /// Transcribed question
        query: String,
        /// Answer that could not be spoken
        answer: String,
        /// Synthesis or playback failure
        error: String,
    },
}

/// Loop tuning
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Length of each recording
    pub capture_duration: Duration,
    /// Recording sample rate
    pub sample_rate: u32,
    /// Chunks retrieved per question
    pub top_k: usize,
    /// Language passed to the synthesizer
    pub language: String,
    /// Pause between iterations
    pub pause: Duration,
    /// Consecutive capture failures before the session gives up
    pub max_capture_failures: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            capture_duration: DEFAULT_CAPTURE_DURATION,
            sample_rate: SAMPLE_RATE,
            top_k: DEFAULT_TOP_K,
            language: "en".to_string(),
            pause: DEFAULT_PAUSE,
            max_capture_failures: DEFAULT_MAX_CAPTURE_FAILURES,
        }
    }
}

/// External capabilities the session drives
#[derive(Clone)]
pub struct Capabilities {
    /// Microphone or other recorder
    pub source: Arc<dyn AudioSource>,
    /// Speech-to-text
    pub transcriber: Arc<dyn Transcriber>,
    /// Answer generation
    pub generator: Arc<dyn Generator>,
    /// Text-to-speech
    pub synthesizer: Arc<dyn Synthesizer>,
    /// Audio output
    pub player: Arc<dyn Player>,
}

/// The interaction loop
pub struct Session {
    knowledge: Arc<KnowledgeBase>,
    capabilities: Capabilities,
    settings: SessionSettings,
    scratch: ScratchSpace,
    state: SessionState,
}

impl Session {
    /// Create a session over a built knowledge base
    ///
    /// # Errors
    ///
    /// Returns error if the settings are unusable
    pub fn new(
        knowledge: Arc<KnowledgeBase>,
        capabilities: Capabilities,
        settings: SessionSettings,
        scratch: ScratchSpace,
    ) -> Result<Self> {
        if settings.top_k == 0 {
            return Err(Error::Config("top_k must be at least 1".to_string()));
        }
        if settings.sample_rate == 0 {
            return Err(Error::Config("sample rate must be positive".to_string()));
        }

        Ok(Self {
            knowledge,
            capabilities,
            settings,
            scratch,
            state: SessionState::Idle,
        })
    }

    /// Current stage
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Directory holding temporary audio files
    #[must_use]
    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Number of temporary audio files currently on disk
    #[must_use]
    pub fn scratch_file_count(&self) -> usize {
        self.scratch.file_count()
    }

    /// Run until `shutdown_rx` fires or is closed
    ///
    /// Returns `Ok(())` on shutdown. Recoverable iteration errors are logged
    /// and the loop continues.
    ///
    /// # Errors
    ///
    /// Returns the capture error once `max_capture_failures` consecutive
    /// captures have failed
    pub async fn run(&mut self, shutdown_rx: &mut mpsc::Receiver<()>) -> Result<()> {
        let mut capture_failures = 0_u32;

        tracing::info!(
            top_k = self.settings.top_k,
            capture_secs = self.settings.capture_duration.as_secs_f32(),
            "session started"
        );

        let result = loop {
            let outcome = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::info!(state = %self.state, "shutdown requested");
                    break Ok(());
                }
                outcome = self.run_iteration() => outcome,
            };

            match outcome {
                Ok(IterationOutcome::Answered { query, answer }) => {
                    capture_failures = 0;
                    tracing::info!(query = %query, answer = %answer, "answered");
                }
                Ok(IterationOutcome::EmptyTranscription) => {
                    capture_failures = 0;
                }
                Ok(IterationOutcome::Unspoken { query, error, .. }) => {
                    capture_failures = 0;
                    tracing::warn!(query = %query, error = %error, "answer could not be spoken");
                }
                Err(e @ Error::Capture(_)) => {
                    capture_failures += 1;
                    tracing::error!(
                        error = %e,
                        failures = capture_failures,
                        max = self.settings.max_capture_failures,
                        "capture failed"
                    );
                    if capture_failures >= self.settings.max_capture_failures {
                        break Err(e);
                    }
                }
                Err(e) => {
                    capture_failures = 0;
                    tracing::error!(error = %e, "iteration failed");
                }
            }

            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::info!("shutdown requested");
                    break Ok(());
                }
                () = tokio::time::sleep(self.settings.pause) => {}
            }
        };

        self.shutdown();
        result
    }

    /// Run a single capture → speak pass
    ///
    /// Any failure in the capture stage is reported as [`Error::Capture`].
    ///
    /// # Errors
    ///
    /// Returns error if capture, transcription, retrieval or generation fails
    pub async fn run_iteration(&mut self) -> Result<IterationOutcome> {
        let outcome = self.iterate().await;
        self.enter(SessionState::Idle);
        outcome
    }

    async fn iterate(&mut self) -> Result<IterationOutcome> {
        self.enter(SessionState::Capturing);
        let recording = self.capture().await.map_err(|e| match e {
            Error::Capture(_) => e,
            other => Error::Capture(other.to_string()),
        })?;

        self.enter(SessionState::Transcribing);
        let transcript = self.capabilities.transcriber.transcribe(&recording).await;
        if let Err(e) = recording.close() {
            tracing::warn!(error = %e, "failed to remove capture file");
        }
        let transcript = transcript?;

        if transcript.is_blank() {
            tracing::warn!("nothing heard, try again");
            return Ok(IterationOutcome::EmptyTranscription);
        }
        let query = transcript.text.trim().to_string();
        tracing::info!(query = %query, "heard");

        self.enter(SessionState::Retrieving);
        let context = self
            .knowledge
            .search(&query, self.settings.top_k)
            .await?;

        self.enter(SessionState::Generating);
        let answer = self
            .capabilities
            .generator
            .generate(&query, &context)
            .await?;

        self.enter(SessionState::Speaking);
        match self.speak(&answer).await {
            Ok(()) => Ok(IterationOutcome::Answered { query, answer }),
            Err(e) => Ok(IterationOutcome::Unspoken {
                query,
                answer,
                error: e.to_string(),
            }),
        }
    }

    /// Record and store the question as a WAV scratch file
    async fn capture(&self) -> Result<tempfile::TempPath> {
        let samples = self
            .capabilities
            .source
            .record(self.settings.capture_duration, self.settings.sample_rate)
            .await?;

        let wav = samples_to_wav(&samples, self.settings.sample_rate)?;
        self.scratch.write("query-", "wav", &wav)
    }

    /// Synthesize and play `text`; the response file never outlives this call
    async fn speak(&self, text: &str) -> Result<()> {
        let synthesizer = &self.capabilities.synthesizer;
        let audio = synthesizer
            .synthesize(text, &self.settings.language)
            .await?;

        let response = self
            .scratch
            .write("response-", synthesizer.file_extension(), &audio)?;

        let played = self.capabilities.player.play(&response).await;

        if let Err(e) = response.close() {
            tracing::warn!(error = %e, "failed to remove response file");
        }

        played
    }

    fn enter(&mut self, next: SessionState) {
        if self.state != next {
            tracing::debug!(from = %self.state, to = %next, "session state");
            self.state = next;
        }
    }

    fn shutdown(&mut self) {
        self.enter(SessionState::ShuttingDown);
        match self.scratch.purge() {
            Ok(removed) => tracing::info!(removed, "temporary audio cleaned up"),
            Err(e) => tracing::warn!(error = %e, "failed to clean scratch space"),
        }
    }
}

/// Shutdown channel fed by Ctrl-C
///
/// The returned sender can also be used to request shutdown
/// programmatically.
#[must_use]
pub fn shutdown_on_ctrl_c() -> (mpsc::Sender<()>, mpsc::Receiver<()>) {
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx_clone.send(()).await;
        }
    });
    (shutdown_tx, shutdown_rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Idle.to_string(), "idle");
        assert_eq!(SessionState::ShuttingDown.to_string(), "shutting-down");
    }

    #[test]
    fn test_default_settings() {
        let settings = SessionSettings::default();
        assert_eq!(settings.top_k, 2);
        assert_eq!(settings.sample_rate, 16000);
        assert_eq!(settings.capture_duration, Duration::from_secs(5));
        assert_eq!(settings.max_capture_failures, 3);
    }
}
