//! MJPEG streaming server
//!
//! Serves frames from a directory of JPEG files as a live MJPEG stream.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use mjpeg_rs::camera::ReplayCamera;
use mjpeg_rs::{spawn_capture, Config, Context, MjpegServer};

#[derive(Parser, Debug)]
#[command(name = "mjpeg-server")]
#[command(about = "Multi-client MJPEG streaming server")]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of JPEG frames to stream, replayed in name order
    #[arg(short, long, default_value = "frames")]
    frames: PathBuf,

    /// Address to listen on, overrides the configuration
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    fmt().with_env_filter(filter).with_target(false).init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(addr) = cli.bind {
        config = config.bind(addr);
    }

    let camera = ReplayCamera::open(&cli.frames)
        .with_context(|| format!("opening frames in {}", cli.frames.display()))?;
    info!(frames = camera.len(), dir = %cli.frames.display(), "Frame source ready");

    let ctx = Context::new(config).context("building server context")?;
    let capture = spawn_capture(ctx.clone(), camera).context("starting capture")?;

    let server = MjpegServer::new(ctx);
    info!(
        "Stream at http://{}{}",
        server.bind_addr(),
        server.context().config().server.stream_path
    );

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
            }
        })
        .await
        .context("server failed")?;

    capture.stop().await.context("stopping capture")?;
    info!("Stopped");
    Ok(())
}
