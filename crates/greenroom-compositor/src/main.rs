//! Greenroom - chroma-key compositor demo host
//!
//! Keys a synthetic presenter in front of a green screen, paced by a
//! refresh interval, and optionally writes the last keyed frame to a PNG.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use greenroom_compositor::{Compositor, CompositorConfig, SessionEvent};
use greenroom_keyer::{CpuKeyer, GpuKeyer, RenderBackend};
use greenroom_source::{frame_channel, spawn_producer, Pattern, SyntheticSource};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    Cpu,
    Gpu,
}

/// Key a synthetic presenter shot in front of a green screen.
#[derive(Debug, Parser)]
#[command(name = "greenroom", version)]
struct Args {
    /// Keyer to render with. `gpu` falls back to `cpu` without an adapter.
    #[arg(long, value_enum, default_value_t = BackendKind::Gpu)]
    backend: BackendKind,
    /// Config file to use instead of the per-user one.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Frames the synthetic camera produces before ending.
    #[arg(long, default_value_t = 150)]
    frames: u64,
    /// Write the last keyed frame to this PNG.
    #[arg(long)]
    dump: Option<PathBuf>,
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

fn create_backend(kind: BackendKind, config: &CompositorConfig) -> Result<Box<dyn RenderBackend>> {
    match kind {
        BackendKind::Cpu => Ok(Box::new(CpuKeyer::new())),
        BackendKind::Gpu => match GpuKeyer::new(&config.gpu) {
            Ok(keyer) => Ok(Box::new(keyer)),
            Err(e) => {
                warn!(error = %e, "No usable GPU, falling back to the CPU keyer");
                Ok(Box::new(CpuKeyer::new()))
            }
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    info!("Greenroom starting...");

    let config = match &args.config {
        Some(path) => CompositorConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => CompositorConfig::load_or_default(),
    };

    let backend = create_backend(args.backend, &config)?;
    let mut compositor = Compositor::new(config.clone());
    let id = compositor.create_session(backend);

    let (sender, receiver) = frame_channel(config.frame_queue_capacity);
    let source = SyntheticSource::new(Pattern::GREEN_SCREEN_PRESENTER, 640, 360)
        .with_frame_rate(30)
        .with_limit(args.frames);
    let producer = spawn_producer(source, sender).context("spawning frame producer")?;
    compositor.attach_source(id, receiver)?;

    let params = compositor
        .params(id)
        .ok_or_else(|| anyhow!("session {id} vanished"))?;
    let mut softened = false;
    let mut interval = tokio::time::interval(config.refresh_interval());

    loop {
        interval.tick().await;
        for event in compositor.tick() {
            match event {
                SessionEvent::FirstFrame(first) => info!(
                    session = %first.session,
                    width = first.width,
                    height = first.height,
                    "Keyed output live"
                ),
                SessionEvent::Failed { session, error } => {
                    compositor.teardown(session);
                    return Err(error).context("session failed");
                }
            }
        }

        let Some(session) = compositor.session(id) else {
            break;
        };
        let stats = session.stats();
        if !softened && stats.rendered_frames >= args.frames / 2 {
            params.update(|p| p.smoothness = (p.smoothness * 2.0).min(1.0));
            softened = true;
            info!("Softened the matte edge");
        }
        if session.source_ended() {
            break;
        }
    }

    if let Some(session) = compositor.session(id) {
        let stats = session.stats();
        info!(
            refreshes = stats.refreshes,
            uploaded = stats.uploaded_frames,
            rendered = stats.rendered_frames,
            presented = stats.presented_frames,
            skipped = stats.skipped_frames,
            reallocations = stats.reallocations,
            "Session finished"
        );

        if let Some(path) = &args.dump {
            let keyed = session.backend().snapshot()?;
            let image = image::RgbaImage::from_raw(keyed.width, keyed.height, keyed.data)
                .ok_or_else(|| anyhow!("snapshot size does not match its dimensions"))?;
            image
                .save(path)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "Wrote keyed frame");
        }
    }

    compositor.teardown(id);
    let pushed = producer
        .join()
        .map_err(|_| anyhow!("frame producer panicked"))?;
    info!(pushed, "Greenroom finished");
    Ok(())
}
