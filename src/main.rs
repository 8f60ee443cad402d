use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use spectex::{BarKind, Config, ConfigOverrides, TextureLayout, Visualizer, HALF_FFT_SIZE};

#[derive(Parser, Debug)]
#[command(name = "spectex")]
#[command(author, version, about = "Render live analysis buffers into spectrum textures")]
struct Args {
    /// Config file path (defaults to ~/.config/spectex/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Texture layout
    #[arg(short, long)]
    layout: Option<TextureLayout>,

    /// First visualised frequency bin
    #[arg(long, allow_negative_numbers = true)]
    min_bin: Option<i32>,

    /// Last visualised frequency bin (exclusive)
    #[arg(long, allow_negative_numbers = true)]
    max_bin: Option<i32>,

    /// Rebuild ticks per second
    #[arg(long)]
    fps: Option<u32>,

    /// Make the test signal fail every Nth fetch
    #[arg(long)]
    dropout_every: Option<u32>,

    /// Seconds to run before shutting down
    #[arg(short, long, default_value = "5")]
    duration: f64,

    /// Write the last rendered frame to this .bmp file
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Write a commented default config and exit
    #[arg(long)]
    init_config: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            layout: self.layout,
            min_frequency_bin: self.min_bin,
            max_frequency_bin: self.max_bin,
            fps: self.fps,
            dropout_every: self.dropout_every,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("spectex=info".parse()?),
        )
        .init();

    let args = Args::parse();

    if args.init_config {
        let path = Config::init_default_config()?;
        println!("Wrote default config to {}", path.display());
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_from_default_path().unwrap_or_default(),
    };
    config.merge_overrides(&args.overrides());

    let mut visualizer = Visualizer::new(config.source.build(), &config)?;
    let (width, height) = visualizer.dimensions();
    info!(
        "Rendering {} textures ({}x{}) at {} fps",
        config.texture.layout, width, height, config.driver.fps
    );

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        shutdown_tx.send(true).ok();
    });

    let frames = visualizer.frames();
    visualizer.start()?;

    let deadline = tokio::time::sleep(Duration::from_secs_f64(args.duration.max(0.0)));
    tokio::pin!(deadline);
    let mut report = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = shutdown_rx.changed() => {
                info!("Interrupted, shutting down");
                break;
            }
            _ = report.tick() => {
                let seq = frames.borrow().as_ref().map(|f| f.seq);
                let peak = visualizer
                    .bars(BarKind::Frequency, HALF_FFT_SIZE)
                    .and_then(|bars| {
                        bars.samples()
                            .iter()
                            .enumerate()
                            .max_by(|a, b| a.1.total_cmp(b.1))
                            .map(|(bin, _)| bin)
                    });
                info!(
                    "t={:.2}s frame={:?} peak_bin={:?}",
                    visualizer.elapsed(),
                    seq,
                    peak
                );
            }
        }
    }

    let last = frames.borrow().clone();
    let stats = visualizer.shutdown().await;

    if let Some(path) = &args.dump {
        match last {
            Some(frame) => {
                std::fs::write(path, frame.bitmap.as_bytes())
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("Wrote frame {} to {}", frame.seq, path.display());
            }
            None => warn!("No frame was rendered, nothing written to {}", path.display()),
        }
    }

    println!(
        "{} ticks: {} built, {} unavailable, {} detached, {} busy",
        stats.ticks, stats.built, stats.unavailable, stats.detached, stats.busy
    );

    Ok(())
}
