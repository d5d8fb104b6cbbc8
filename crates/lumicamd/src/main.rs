use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use lumicam_video::TestPatternSource;
use tracing_subscriber::EnvFilter;

mod capture;
mod config;
mod driver;
mod provider;
mod sink;

use config::Config;
use driver::LogRenderer;
use provider::SyntheticProvider;
use sink::{AnalysisUploader, PersistSink};

#[derive(Parser)]
#[command(name = "lumicamd", about = "lumicam face-lock capture session daemon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full session against the synthetic source and provider
    Simulate {
        /// Stop after this many seconds (default: run until Ctrl-C)
        #[arg(long)]
        duration_secs: Option<u64>,
        /// Frames the synthetic face takes to reach alignment
        #[arg(long, default_value_t = 90)]
        approach_frames: u64,
    },
    /// One-shot diagnostic capture: grab, mirror, encode, save
    Capture,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Simulate {
            duration_secs,
            approach_frames,
        } => simulate(config, duration_secs, approach_frames).await,
        Commands::Capture => one_shot_capture(config).await,
    }
}

async fn simulate(config: Config, duration_secs: Option<u64>, approach_frames: u64) -> Result<()> {
    // Fail fast on resources; everything past this point is non-fatal.
    let persist = PersistSink::new(&config.capture_dir)?;
    tracing::info!(dir = %persist.dir().display(), "captures enabled");
    let uploader = config.upload.as_ref().map(AnalysisUploader::new).transpose()?;
    if uploader.is_none() {
        tracing::info!("no upload config, analysis sink disabled");
    }

    let source = TestPatternSource::new(640, 480).with_warmup(4);
    let provider = SyntheticProvider::new(approach_frames);

    let handle = driver::spawn_session(
        source,
        provider,
        LogRenderer,
        persist,
        uploader,
        config.frame_interval(),
    );

    let mut status = handle.status();
    let watcher = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let ui = status.borrow_and_update().clone();
            tracing::info!(
                camera = ui.is_camera_on,
                locked = ui.is_locked,
                message = %ui.status_message,
                "status"
            );
        }
    });

    match duration_secs {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => {
            tokio::signal::ctrl_c().await?;
            tracing::info!("shutdown requested");
        }
    }

    handle.stop().await?;
    watcher.abort();
    Ok(())
}

/// Diagnostic capture through the real session path: spawn, fire a manual
/// capture, stop.
async fn one_shot_capture(config: Config) -> Result<()> {
    let persist = PersistSink::new(&config.capture_dir)?;

    let handle = driver::spawn_session(
        TestPatternSource::new(640, 480),
        SyntheticProvider::new(1),
        LogRenderer,
        persist,
        None,
        config.frame_interval(),
    );

    let result = handle.capture_now().await;
    handle.stop().await?;

    let path = result?;
    println!("captured -> {}", path.display());
    Ok(())
}
