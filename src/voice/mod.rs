//! Voice processing module
//!
//! Handles audio capture, transcription, synthesis and playback, plus the
//! scratch space holding temporary audio files between stages.

mod capture;
mod playback;
mod scratch;
mod stt;
mod tts;

pub use capture::{
    AudioCapture, AudioSource, DEFAULT_CAPTURE_DURATION, Microphone, SAMPLE_RATE, read_wav,
    samples_to_wav,
};
pub use playback::{
    AudioPlayback, DecodedAudio, PLAYBACK_SAMPLE_RATE, Player, Speakers, decode_file, decode_mp3,
};
pub use scratch::ScratchSpace;
pub use stt::{DEFAULT_STT_URL, ModelSize, Transcriber, Transcript, WhisperTranscriber};
pub use tts::{Synthesizer, TextToSpeech, TtsProvider};
