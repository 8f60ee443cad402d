//! Periodic rebuild ticks, independent of the host's own paint cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::config::DriverConfig;
use crate::error::{ConfigError, DriverError};

pub const MAX_FPS: u32 = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
    Stopped,
}

/// One "rebuild now" signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// 1-based tick counter; gaps mean ticks were dropped.
    pub seq: u64,
    /// Seconds since the driver started, for the shader's time uniform.
    pub time: f32,
}

/// Timer that emits [`Tick`]s while running.
///
/// `Idle -> Running` on [`start`](Self::start), `Running -> Stopped` on
/// [`stop`](Self::stop). Nothing else.
pub struct FrameDriver {
    period: Duration,
    state: DriverState,
    started_at: Option<Instant>,
    stopped_after: Option<Duration>,
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl FrameDriver {
    pub fn new(fps: u32) -> Result<Self, ConfigError> {
        if fps == 0 || fps > MAX_FPS {
            return Err(ConfigError::InvalidFrameRate { fps, max: MAX_FPS });
        }
        Ok(Self {
            period: Duration::from_secs_f64(1.0 / fps as f64),
            state: DriverState::Idle,
            started_at: None,
            stopped_after: None,
            running: Arc::new(AtomicBool::new(false)),
            task: None,
        })
    }

    pub fn from_config(config: &DriverConfig) -> Result<Self, ConfigError> {
        Self::new(config.fps)
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start ticking. Must be called inside a Tokio runtime.
    pub fn start(&mut self) -> Result<TickReceiver, DriverError> {
        if self.state != DriverState::Idle {
            return Err(DriverError::InvalidTransition {
                from: self.state,
                action: "start",
            });
        }

        // Capacity 1: a tick that arrives while the consumer is still busy
        // with the previous one is dropped, never queued behind it.
        let (tx, rx) = mpsc::channel(1);
        let started_at = Instant::now();
        let period = self.period;
        let running = self.running.clone();
        running.store(true, Ordering::SeqCst);

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut seq = 0u64;

            loop {
                ticker.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                seq += 1;
                let tick = Tick {
                    seq,
                    time: started_at.elapsed().as_secs_f32(),
                };
                match tx.try_send(tick) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => trace!(seq, "Consumer busy, tick dropped"),
                    Err(TrySendError::Closed(_)) => {
                        debug!("Tick receiver dropped, stopping ticker");
                        break;
                    }
                }
            }
        }));

        self.started_at = Some(started_at);
        self.state = DriverState::Running;
        info!("Frame driver started at {:.1} fps", 1.0 / self.period.as_secs_f64());

        Ok(TickReceiver {
            rx,
            running: self.running.clone(),
        })
    }

    /// Stop ticking. Work already handed out by a tick is not interrupted,
    /// but no further tick is delivered.
    pub fn stop(&mut self) -> Result<(), DriverError> {
        if self.state != DriverState::Running {
            return Err(DriverError::InvalidTransition {
                from: self.state,
                action: "stop",
            });
        }

        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.stopped_after = self.started_at.map(|s| s.elapsed());
        self.state = DriverState::Stopped;
        info!("Frame driver stopped after {:.2}s", self.elapsed());
        Ok(())
    }

    /// Seconds since start; frozen once stopped, 0 before starting.
    pub fn elapsed(&self) -> f32 {
        match self.state {
            DriverState::Idle => 0.0,
            DriverState::Running => self
                .started_at
                .map(|s| s.elapsed().as_secs_f32())
                .unwrap_or(0.0),
            DriverState::Stopped => self
                .stopped_after
                .map(|d| d.as_secs_f32())
                .unwrap_or(0.0),
        }
    }
}

impl Drop for FrameDriver {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Consumer side of a running driver.
pub struct TickReceiver {
    rx: mpsc::Receiver<Tick>,
    running: Arc<AtomicBool>,
}

impl TickReceiver {
    /// Next tick, or `None` once the driver has stopped. A tick queued just
    /// before the stop is swallowed.
    pub async fn recv(&mut self) -> Option<Tick> {
        let tick = self.rx.recv().await?;
        if self.running.load(Ordering::SeqCst) {
            Some(tick)
        } else {
            None
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
