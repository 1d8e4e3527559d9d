use anyhow::Result;
use clap::{ArgGroup, Parser};
use persona_infer::OrtBackend;
use persona_pipeline::{FaceIdentifier, RunConfig, Runner, StopReason};
use persona_source::SourceSelect;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod config;
use config::Config;

/// Real-time face identification over a camera feed or a video file.
#[derive(Parser)]
#[command(name = "persona", version, about)]
#[command(group(ArgGroup::new("source").required(true).args(["camera", "video"])))]
struct Cli {
    /// Use the configured camera for inference.
    #[arg(long)]
    camera: bool,

    /// Run on a recorded video file instead of the camera.
    #[arg(long, value_name = "PATH")]
    video: Option<PathBuf>,

    /// Disable the debug overlay window.
    #[arg(long)]
    no_debug: bool,

    /// Explicit config file (default: ./persona.toml when present).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let source = match cli.video {
        Some(path) => SourceSelect::Video { path },
        None => SourceSelect::Camera {
            device: config.camera_device.clone(),
        },
    };

    let mut backend = OrtBackend::new();
    let mut pipeline = FaceIdentifier::new(
        config.model_paths(),
        config.gallery_dir.clone(),
        config.stage_timeout(),
    );
    let mut runner = Runner::new(RunConfig {
        source,
        debug: !cli.no_debug,
    });

    let report = runner.run(&mut backend, &mut pipeline)?;

    if report.reason == StopReason::StartupAborted {
        tracing::warn!("run aborted before the first frame");
    } else {
        tracing::info!(
            frames = report.frames,
            fps = format_args!("{:.2}", report.fps),
            "done"
        );
    }
    Ok(())
}
