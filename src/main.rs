use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use voice_rag::voice::{
    AudioCapture, PLAYBACK_SAMPLE_RATE, Player, SAMPLE_RATE, ScratchSpace, Speakers,
    samples_to_wav,
};
use voice_rag::{Assistant, Config, Overrides, chunk};

/// Voice RAG - ask spoken questions about a document
#[derive(Parser)]
#[command(name = "voice-rag", version, about)]
struct Cli {
    /// Config file (default: ~/.config/voice-rag/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Document to answer questions about
    #[arg(long, global = true)]
    document: Option<PathBuf>,

    /// Target chunk size in characters
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Chunks retrieved per question
    #[arg(long, global = true)]
    top_k: Option<usize>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Listen for spoken questions until Ctrl-C (default)
    Listen,
    /// Answer a typed question, no audio needed
    Ask {
        /// The question
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// Print how the document is chunked
    Chunks,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voice_rag=info",
        1 => "info,voice_rag=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let overrides = Overrides {
        document: cli.document,
        chunk_size: cli.chunk_size,
        top_k: cli.top_k,
    };

    match cli.command.unwrap_or(Command::Listen) {
        Command::TestMic { duration } => test_mic(duration).await,
        Command::TestSpeaker => test_speaker().await,
        Command::Chunks => {
            let config = Config::load(cli.config.as_deref(), &overrides)?;
            print_chunks(&config)
        }
        Command::Ask { question } => {
            let config = Config::load(cli.config.as_deref(), &overrides)?;
            ask(config, &question.join(" ")).await
        }
        Command::Listen => {
            let config = Config::load(cli.config.as_deref(), &overrides)?;
            let assistant = Assistant::new(config).await?;
            assistant.run().await?;
            tracing::info!("goodbye");
            Ok(())
        }
    }
}

/// Print the chunking of the configured document
fn print_chunks(config: &Config) -> anyhow::Result<()> {
    let text = config.document_text()?;
    let chunks = chunk(&text, config.knowledge.chunk_size);

    for c in &chunks {
        println!("[{}] ({} chars) {}", c.index, c.text.chars().count(), c.text);
    }
    println!("---");
    println!(
        "{} chunks at chunk size {}",
        chunks.len(),
        config.knowledge.chunk_size
    );

    Ok(())
}

/// Answer a typed question and show the retrieved context
async fn ask(config: Config, question: &str) -> anyhow::Result<()> {
    let assistant = Assistant::new(config).await?;
    let answer = assistant.ask(question).await?;

    println!("Q: {}", answer.question);
    println!("A: {}", answer.answer);
    println!("---");
    for (rank, c) in answer.context.iter().enumerate() {
        println!(
            "#{} chunk {} (distance {:.4}): {}",
            rank + 1,
            c.index,
            c.distance,
            c.text
        );
    }

    Ok(())
}

/// Test microphone input with a live RMS meter
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new(SAMPLE_RATE)?;
    capture.start()?;

    let sample_rate = capture.sample_rate();
    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_buffer();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);

        capture.clear_buffer();
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave written to a scratch WAV file
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let frequency = 440.0_f32;
    let num_samples = PLAYBACK_SAMPLE_RATE as usize * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / PLAYBACK_SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    let scratch = ScratchSpace::new()?;
    let tone = scratch.write("tone-", "wav", &samples_to_wav(&samples, PLAYBACK_SAMPLE_RATE)?)?;

    println!("Playing {num_samples} samples at {PLAYBACK_SAMPLE_RATE} Hz...");
    Speakers.play(&tone).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}
