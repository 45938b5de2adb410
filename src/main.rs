use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wav_recorder::{
    create_router, AppState, Config, DeviceFactory, DeviceKind, HostPermissions, MethodChannel,
    RecordedFile, Recorder,
};

#[derive(Parser)]
#[command(name = "wav-recorder")]
#[command(about = "Capture microphone audio to WAV files")]
struct Cli {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/wav-recorder")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the method channel over HTTP
    Serve,

    /// Record for a fixed duration
    Record {
        /// Duration to record in seconds
        #[arg(short, long, default_value = "5")]
        seconds: u64,

        /// Output file (default: generated in the output directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Output extension
        #[arg(short, long, default_value = ".wav")]
        extension: String,

        /// Record silence from the mock device
        #[arg(long)]
        mock: bool,
    },

    /// Print the format and duration of a WAV file
    Inspect {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Inspect { file } => inspect(&file),
        Command::Record {
            seconds,
            path,
            extension,
            mock,
        } => {
            let cfg = Config::load(&cli.config)?;
            let kind = if mock { DeviceKind::Mock } else { cfg.recorder.device };
            record(&cfg, kind, seconds, path, &extension).await
        }
        Command::Serve => {
            let cfg = Config::load(&cli.config)?;
            serve(&cfg).await
        }
    }
}

async fn record(
    cfg: &Config,
    kind: DeviceKind,
    seconds: u64,
    path: Option<PathBuf>,
    extension: &str,
) -> Result<()> {
    let device = DeviceFactory::create(kind)?;
    let recorder = Recorder::new(cfg.recorder_config(), device);

    info!("Recording for {} seconds", seconds);
    recorder.start(path, extension).await?;

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted, stopping early"),
    }

    let result = recorder.stop().await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}

async fn serve(cfg: &Config) -> Result<()> {
    let recorder_config = cfg.recorder_config();
    let device = DeviceFactory::create(cfg.recorder.device)?;
    let permissions = Arc::new(HostPermissions::new(
        recorder_config.output_dir.clone(),
        Arc::clone(&device),
    ));
    let recorder = Arc::new(Recorder::new(recorder_config, device));
    let state = AppState::new(MethodChannel::new(recorder, permissions));

    let addr = format!("{}:{}", cfg.http.bind, cfg.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);
    axum::serve(listener, create_router(state)).await?;

    Ok(())
}

fn inspect(file: &Path) -> Result<()> {
    let recording = RecordedFile::open(file)?;

    println!("Path:        {}", recording.path);
    println!("Sample rate: {} Hz", recording.format.sample_rate);
    println!("Channels:    {}", recording.format.channels);
    println!("Bits:        {}", recording.format.bits_per_sample);
    println!("Duration:    {:.2} s", recording.duration_seconds);
    println!("Size:        {} bytes", recording.file_size_bytes);
    if recording.is_silent() {
        println!("(silent)");
    }

    Ok(())
}
