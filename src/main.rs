use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use clinic_intake::voice::{AudioCapture, AudioPlayback, TextToSpeech, calculate_rms};
use clinic_intake::{Assistant, CaptureConfig, Config, RealtimeOptions};

/// Clinic Intake - voice-driven appointment intake assistant
#[derive(Parser)]
#[command(name = "clinic-intake", version, about)]
struct Cli {
    /// Max duration for push-to-talk recordings, seconds
    #[arg(long, default_value = "8.0")]
    record_seconds: f64,

    /// Capture a new system prompt from voice input and exit
    #[arg(long)]
    train_prompt: bool,

    /// Continuously listen with automatic speech detection
    #[arg(long)]
    realtime: bool,

    /// Realtime chunk size (seconds) for faster speech detection
    #[arg(long, default_value = "0.25")]
    chunk_seconds: f64,

    /// Silence duration (seconds) that triggers a response in realtime mode
    #[arg(long, default_value = "0.35")]
    silence_timeout: f64,

    /// Minimum average energy to treat audio as speech in realtime mode
    #[arg(long, default_value = "200.0")]
    energy_threshold: f32,

    /// Text-only mode: typed turns, no audio capture or synthesis
    #[arg(long)]
    text: bool,

    /// Directory for session files
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "سلام! این یک آزمایش سیستم گفتار است.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,clinic_intake=info",
        1 => "info,clinic_intake=debug",
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
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(cli.data_dir, &text).await,
        };
    }

    let config = Config::load(cli.data_dir, cli.record_seconds)?;
    let mut assistant = Assistant::new(config)?;

    if cli.train_prompt {
        assistant.train_prompt().await?;
    } else if cli.realtime {
        assistant
            .run_realtime(RealtimeOptions {
                chunk_seconds: cli.chunk_seconds,
                silence_timeout: cli.silence_timeout,
                energy_threshold: cli.energy_threshold,
            })
            .await?;
    } else if cli.text {
        assistant.run_text().await?;
    } else {
        assistant.run().await?;
    }

    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new(CaptureConfig::default())?;
    capture.start()?;

    let sample_rate = capture.sample_rate();
    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_buffer();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );

        capture.clear_buffer();
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check your input device and levels.");

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let mut playback = AudioPlayback::new()?;

    let sample_rate = 24000_u32;
    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let num_samples = (sample_rate as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);
    playback.play(samples, sample_rate).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");

    Ok(())
}

/// Test TTS output
async fn test_tts(data_dir: PathBuf, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load(data_dir, 8.0)?;
    let tts = TextToSpeech::new(config.api_key, config.tts_model, config.tts_voice)?;

    println!("Synthesizing speech...");
    let audio = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", audio.len());

    println!("Playing audio...");
    let mut playback = AudioPlayback::new()?;
    playback.play_encoded(&audio).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
