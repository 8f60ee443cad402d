//! Tick -> fetch -> map -> encode -> publish.
//!
//! The presentation side subscribes to a `watch` channel of encoded frames.
//! A tick that yields no texture leaves the channel untouched, so consumers
//! keep drawing the last good frame (or a placeholder before the first one).

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::analysis::{AnalysisSource, BarKind, BarView, LifecycleState};
use crate::bitmap::{BitmapBlob, BitmapEncoder};
use crate::config::Config;
use crate::driver::{DriverState, FrameDriver, TickReceiver};
use crate::error::{ConfigError, DriverError, FrameError};
use crate::texture::{TextureBuilder, TextureLayout};

/// An encoded texture ready for the image decoder.
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    pub seq: u64,
    /// Driver time of the tick that produced this frame, in seconds.
    pub time: f32,
    pub bitmap: BitmapBlob,
}

/// Per-outcome tick counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub ticks: u64,
    pub built: u64,
    pub unavailable: u64,
    pub detached: u64,
    pub busy: u64,
}

impl FrameStats {
    fn record(&mut self, outcome: &Result<(), FrameError>) {
        match outcome {
            Ok(()) => self.built += 1,
            Err(FrameError::Unavailable(_)) => self.unavailable += 1,
            Err(FrameError::Detached) => self.detached += 1,
            Err(FrameError::Busy) => self.busy += 1,
        }
    }
}

pub type FrameReceiver = watch::Receiver<Option<Arc<RenderedFrame>>>;

/// One visualiser instance: a builder, its driver and the worker between them.
pub struct Visualizer<S: AnalysisSource> {
    builder: Arc<TextureBuilder<S>>,
    driver: FrameDriver,
    frames_tx: watch::Sender<Option<Arc<RenderedFrame>>>,
    frames_rx: FrameReceiver,
    worker: Option<JoinHandle<FrameStats>>,
}

impl<S: AnalysisSource> Visualizer<S> {
    /// Validate the configuration and set everything up without starting.
    pub fn new(source: S, config: &Config) -> Result<Self, ConfigError> {
        let builder = TextureBuilder::from_config(source, &config.texture)?;
        let driver = FrameDriver::from_config(&config.driver)?;
        let (frames_tx, frames_rx) = watch::channel(None);

        Ok(Self {
            builder: Arc::new(builder),
            driver,
            frames_tx,
            frames_rx,
            worker: None,
        })
    }

    pub fn layout(&self) -> TextureLayout {
        self.builder.layout()
    }

    pub fn dimensions(&self) -> (usize, usize) {
        self.builder.dimensions()
    }

    pub fn driver_state(&self) -> DriverState {
        self.driver.state()
    }

    /// Seconds since start, for the shader's time uniform.
    pub fn elapsed(&self) -> f32 {
        self.driver.elapsed()
    }

    /// Subscribe to encoded frames. `None` until the first frame is built.
    pub fn frames(&self) -> FrameReceiver {
        self.frames_rx.clone()
    }

    /// Raw analysis samples for bar-chart widgets.
    pub fn bars(&self, kind: BarKind, count: usize) -> Option<BarView> {
        self.builder.bars(kind, count)
    }

    /// Start the driver and the rebuild worker. Must be called inside a Tokio
    /// runtime.
    pub fn start(&mut self) -> Result<(), DriverError> {
        let ticks = self.driver.start()?;
        let builder = self.builder.clone();
        let frames_tx = self.frames_tx.clone();
        self.worker = Some(tokio::spawn(run_worker(builder, ticks, frames_tx)));
        Ok(())
    }

    /// Stop ticking, let the in-flight tick finish, then release the buffers.
    pub async fn shutdown(mut self) -> FrameStats {
        if self.driver.state() == DriverState::Running {
            if let Err(e) = self.driver.stop() {
                warn!("Failed to stop frame driver: {}", e);
            }
        }
        self.builder.deactivate();

        let stats = match self.worker.take() {
            Some(worker) => match worker.await {
                Ok(stats) => stats,
                Err(e) => {
                    warn!("Frame worker ended abnormally: {}", e);
                    FrameStats::default()
                }
            },
            None => FrameStats::default(),
        };

        self.builder.drain().await;
        debug_assert_eq!(self.builder.state(), LifecycleState::Freed);

        info!(
            "Visualizer shut down: {} ticks, {} built, {} unavailable, {} detached, {} busy",
            stats.ticks, stats.built, stats.unavailable, stats.detached, stats.busy
        );
        stats
    }
}

async fn run_worker<S: AnalysisSource>(
    builder: Arc<TextureBuilder<S>>,
    mut ticks: TickReceiver,
    frames_tx: watch::Sender<Option<Arc<RenderedFrame>>>,
) -> FrameStats {
    let mut stats = FrameStats::default();

    // Each tick is fully handled before the next is received, so fetches
    // never overlap; ticks arriving meanwhile are dropped by the driver.
    while let Some(tick) = ticks.recv().await {
        stats.ticks += 1;

        let outcome = match builder.build().await {
            Ok(pixels) => {
                let bitmap = BitmapEncoder::encode_pixels(&pixels);
                frames_tx.send_replace(Some(Arc::new(RenderedFrame {
                    seq: tick.seq,
                    time: tick.time,
                    bitmap,
                })));
                Ok(())
            }
            Err(e) => {
                debug!(seq = tick.seq, "No texture this tick: {}", e);
                Err(e)
            }
        };
        stats.record(&outcome);
    }

    debug!("Frame worker finished");
    stats
}
