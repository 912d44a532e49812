use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lyrebird::api::{ApiServer, ApiState};
use lyrebird::audio::{AudioCapture, AudioPlayback, rms_energy};
use lyrebird::feedback::Feedback;
use lyrebird::listener::OrderListener;
use lyrebird::orchestrator::ListenerFactory;
use lyrebird::{Dispatcher, Orchestrator, Settings, SpokenFeedback, Transcriber, TriggerRegistry};

/// Lyrebird - always-on voice assistant runtime
#[derive(Parser)]
#[command(name = "lyrebird", version, about)]
struct Cli {
    /// Configuration file (defaults to ~/.config/lyrebird/config.toml)
    #[arg(short, long, env = "LYREBIRD_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable the REST control surface
    #[arg(long)]
    no_api: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Speak a phrase through the configured TTS
    TestSay {
        /// Text to speak
        #[arg(default_value = "Hello! I am ready when you are.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,lyrebird=info",
        1 => "info,lyrebird=debug",
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

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestSay { text } => test_say(cli.config.as_deref(), &text).await,
        };
    }

    let settings = load_settings(cli.config.as_deref())?;
    tracing::info!(
        default_trigger = %settings.default_trigger,
        stt = %settings.stt.engine,
        "starting lyrebird"
    );

    let settings = Arc::new(settings);
    let transcriber = Arc::new(Transcriber::from_settings(&settings.stt)?);
    let feedback: Arc<dyn Feedback> = Arc::new(SpokenFeedback::from_settings(&settings)?);
    let dispatcher = Arc::new(Dispatcher::from_settings(&settings, Arc::clone(&feedback)));
    let registry = TriggerRegistry::with_builtins(Some(Arc::clone(&transcriber)));

    let order_listener = OrderListener::new(Arc::clone(&transcriber));
    let listener_factory: ListenerFactory = Box::new(move || order_listener.start());

    let orchestrator = Orchestrator::new(
        Arc::clone(&settings),
        Arc::clone(&feedback),
        dispatcher,
        registry,
        listener_factory,
    );

    if settings.rest_api.enabled && !cli.no_api {
        let state = ApiState {
            feedback: Arc::clone(&feedback),
            phase_rx: orchestrator.phase_watch(),
        };
        let _api = ApiServer::new(&settings.rest_api, state).spawn();
    }

    // Ctrl-C flows into the cycle as a shutdown request
    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            let _ = shutdown_tx.send(()).await;
        }
    });

    orchestrator.run(shutdown_rx).await?;

    Ok(())
}

fn load_settings(path: Option<&std::path::Path>) -> anyhow::Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    Ok(settings)
}

/// Test microphone input with a live level meter
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;
    println!("Sample rate: {} Hz", capture.sample_rate());
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = rms_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working.");
    println!("If RMS stayed near 0, check your default input device.");

    Ok(())
}

/// Test speaker output with a short sine tone
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    tokio::task::spawn_blocking(|| {
        let playback = AudioPlayback::new()?;

        let sample_rate = 24000.0f32;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let samples: Vec<f32> = (0..(sample_rate * 2.0) as usize)
            .map(|i| {
                let t = i as f32 / sample_rate;
                (t * 440.0 * std::f32::consts::TAU).sin() * 0.3
            })
            .collect();

        playback.play(samples)
    })
    .await??;

    println!("Done.");
    Ok(())
}

/// Speak a phrase through the configured TTS provider
async fn test_say(config: Option<&std::path::Path>, text: &str) -> anyhow::Result<()> {
    let settings = load_settings(config)?;
    let feedback = SpokenFeedback::from_settings(&settings)?;

    println!("Speaking: {text}");
    feedback.speak(text).await?;

    Ok(())
}
