//! Shared test utilities
//!
//! Fakes for every capability the session drives, so the loop can be
//! exercised without audio hardware or network access.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};

use voice_rag::generation::{Generator, KeywordGenerator};
use voice_rag::knowledge::{DEFAULT_DOCUMENT, Embedder, HashingEmbedder, KnowledgeBase};
use voice_rag::session::{Capabilities, Session, SessionSettings};
use voice_rag::voice::{AudioSource, Player, ScratchSpace, Synthesizer, Transcriber, Transcript};
use voice_rag::{Error, Result};

/// Build a knowledge base over the bundled corpus
pub async fn bundled_knowledge(embedder: Arc<dyn Embedder>) -> Arc<KnowledgeBase> {
    Arc::new(
        KnowledgeBase::build(DEFAULT_DOCUMENT, 250, embedder)
            .await
            .expect("failed to build knowledge base"),
    )
}

/// Settings with short pauses and recordings
#[must_use]
pub fn fast_settings() -> SessionSettings {
    SessionSettings {
        capture_duration: Duration::from_millis(10),
        pause: Duration::from_millis(1),
        ..SessionSettings::default()
    }
}

/// Everything a session test needs to inspect afterwards
pub struct Harness {
    pub source: Arc<ScriptedSource>,
    pub transcriber: Arc<ScriptedTranscriber>,
    pub embedder: Arc<CountingEmbedder>,
    pub generator: Arc<CountingGenerator>,
    pub synthesizer: Arc<RecordingSynthesizer>,
    pub player: Arc<RecordingPlayer>,
    pub scratch_parent: tempfile::TempDir,
}

impl Harness {
    /// Fakes that answer `transcripts` in order, then request shutdown
    pub fn new(transcripts: &[&str], shutdown: Option<mpsc::Sender<()>>) -> Self {
        Self {
            source: Arc::new(ScriptedSource::default()),
            transcriber: Arc::new(ScriptedTranscriber::new(transcripts, shutdown)),
            embedder: Arc::new(CountingEmbedder::default()),
            generator: Arc::new(CountingGenerator::default()),
            synthesizer: Arc::new(RecordingSynthesizer::default()),
            player: Arc::new(RecordingPlayer::default()),
            scratch_parent: tempfile::tempdir().expect("failed to create temp dir"),
        }
    }

    /// Capabilities backed by this harness's fakes
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            source: self.source.clone(),
            transcriber: self.transcriber.clone(),
            generator: self.generator.clone(),
            synthesizer: self.synthesizer.clone(),
            player: self.player.clone(),
        }
    }

    /// Session over the bundled corpus with `capabilities`
    pub async fn session_with(&self, capabilities: Capabilities, settings: SessionSettings) -> Session {
        let knowledge = bundled_knowledge(self.embedder.clone()).await;
        let scratch =
            ScratchSpace::new_in(self.scratch_parent.path()).expect("failed to create scratch");
        Session::new(knowledge, capabilities, settings, scratch).expect("invalid session settings")
    }

    /// Session using every fake in the harness
    pub async fn session(&self) -> Session {
        self.session_with(self.capabilities(), fast_settings()).await
    }

    /// Files and directories left under the scratch parent
    pub fn leftovers(&self) -> usize {
        walk(self.scratch_parent.path())
    }
}

fn walk(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(std::result::Result::ok)
                .map(|e| {
                    let path = e.path();
                    if path.is_dir() { walk(&path) } else { 1 }
                })
                .sum()
        })
        .unwrap_or(0)
}

/// Returns a short burst of silence
#[derive(Default)]
pub struct ScriptedSource {
    pub calls: AtomicUsize,
}

#[async_trait]
impl AudioSource for ScriptedSource {
    async fn record(&self, duration: Duration, sample_rate: u32) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let len = (duration.as_secs_f64() * f64::from(sample_rate)) as usize;
        Ok(vec![0.0; len])
    }
}

/// Always fails, like a machine with no microphone
#[derive(Default)]
pub struct FailingSource {
    pub calls: AtomicUsize,
}

#[async_trait]
impl AudioSource for FailingSource {
    async fn record(&self, _duration: Duration, _sample_rate: u32) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::Audio("no input device available".to_string()))
    }
}

/// Never finishes recording; notes when its future is dropped
#[derive(Default)]
pub struct HangingSource {
    pub started: Notify,
    pub cancelled: Arc<AtomicBool>,
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AudioSource for HangingSource {
    async fn record(&self, _duration: Duration, _sample_rate: u32) -> Result<Vec<f32>> {
        let _guard = DropFlag(Arc::clone(&self.cancelled));
        self.started.notify_one();
        std::future::pending::<Result<Vec<f32>>>().await
    }
}

/// Replays canned transcripts; once exhausted, requests shutdown and hears nothing
pub struct ScriptedTranscriber {
    script: Mutex<VecDeque<String>>,
    shutdown: Option<mpsc::Sender<()>>,
    /// Audio files handed over, in order
    pub paths: Mutex<Vec<PathBuf>>,
    /// Whether each file existed when handed over
    pub existed: Mutex<Vec<bool>>,
}

impl ScriptedTranscriber {
    pub fn new(transcripts: &[&str], shutdown: Option<mpsc::Sender<()>>) -> Self {
        Self {
            script: Mutex::new(transcripts.iter().map(ToString::to_string).collect()),
            shutdown,
            paths: Mutex::new(Vec::new()),
            existed: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.paths.lock().unwrap().len()
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, path: &Path) -> Result<Transcript> {
        self.paths.lock().unwrap().push(path.to_path_buf());
        self.existed.lock().unwrap().push(path.exists());

        let next = self.script.lock().unwrap().pop_front();
        let text = match next {
            Some(text) => text,
            None => {
                if let Some(tx) = &self.shutdown {
                    let _ = tx.try_send(());
                }
                String::new()
            }
        };
        Ok(Transcript { text })
    }
}

/// Hashing embedder that counts calls
#[derive(Default)]
pub struct CountingEmbedder {
    inner: HashingEmbedder,
    pub calls: AtomicUsize,
    pub texts: AtomicUsize,
}

impl CountingEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        self.inner.embed(texts).await
    }
}

/// Embedder with a fixed text → vector table
pub struct TableEmbedder {
    table: HashMap<String, Vec<f32>>,
}

impl TableEmbedder {
    pub fn new(entries: Vec<(&str, Vec<f32>)>) -> Self {
        Self {
            table: entries
                .into_iter()
                .map(|(text, vector)| (text.to_string(), vector))
                .collect(),
        }
    }
}

#[async_trait]
impl Embedder for TableEmbedder {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|text| {
                self.table
                    .get(*text)
                    .cloned()
                    .ok_or_else(|| Error::Embedding(format!("no vector for {text:?}")))
            })
            .collect()
    }
}

/// Keyword generator that records its inputs
#[derive(Default)]
pub struct CountingGenerator {
    inner: KeywordGenerator,
    pub contexts: Mutex<Vec<Vec<String>>>,
}

impl CountingGenerator {
    pub fn calls(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }
}

#[async_trait]
impl Generator for CountingGenerator {
    async fn generate(&self, query: &str, context: &[String]) -> Result<String> {
        self.contexts.lock().unwrap().push(context.to_vec());
        self.inner.generate(query, context).await
    }
}

/// Returns a few fake MP3 bytes and records the text
#[derive(Default)]
pub struct RecordingSynthesizer {
    pub texts: Mutex<Vec<(String, String)>>,
}

impl RecordingSynthesizer {
    pub fn calls(&self) -> usize {
        self.texts.lock().unwrap().len()
    }
}

#[async_trait]
impl Synthesizer for RecordingSynthesizer {
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>> {
        self.texts
            .lock()
            .unwrap()
            .push((text.to_string(), language.to_string()));
        Ok(b"ID3 fake audio".to_vec())
    }
}

/// Always fails to synthesize
#[derive(Default)]
pub struct FailingSynthesizer;

#[async_trait]
impl Synthesizer for FailingSynthesizer {
    async fn synthesize(&self, _text: &str, _language: &str) -> Result<Vec<u8>> {
        Err(Error::Tts("service unavailable".to_string()))
    }
}

/// Records played files and whether they existed at play time
#[derive(Default)]
pub struct RecordingPlayer {
    pub played: Mutex<Vec<(PathBuf, bool)>>,
}

impl RecordingPlayer {
    pub fn calls(&self) -> usize {
        self.played.lock().unwrap().len()
    }
}

#[async_trait]
impl Player for RecordingPlayer {
    async fn play(&self, path: &Path) -> Result<()> {
        self.played
            .lock()
            .unwrap()
            .push((path.to_path_buf(), path.exists()));
        Ok(())
    }
}

/// Fails after seeing the file
#[derive(Default)]
pub struct FailingPlayer {
    pub played: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl Player for FailingPlayer {
    async fn play(&self, path: &Path) -> Result<()> {
        self.played.lock().unwrap().push(path.to_path_buf());
        Err(Error::Playback("no output device available".to_string()))
    }
}

/// Never finishes playing
#[derive(Default)]
pub struct HangingPlayer {
    pub started: Notify,
    pub played: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl Player for HangingPlayer {
    async fn play(&self, path: &Path) -> Result<()> {
        self.played.lock().unwrap().push(path.to_path_buf());
        self.started.notify_one();
        std::future::pending::<Result<()>>().await
    }
}
