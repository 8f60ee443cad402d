//! Deterministic test-signal analyser.
//!
//! Stands in for a real audio engine: produces plausible magnitude peaks and
//! a matching waveform for a handful of tones, keeps a history for matrix
//! layouts, and can be told to fail every Nth fetch.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f32::consts::PI;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::SourceConfig;

use super::{AnalysisBuffer, AnalysisSource, Fetched, StatusCode, FFT_SIZE, HALF_FFT_SIZE, HISTORY_ROWS};

/// Width (in bins) of the Gaussian peak drawn for each tone.
const PEAK_SIGMA: f32 = 2.0;

/// One sinusoid in the synthetic signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tone {
    /// Centre frequency bin, `0.0..256.0`.
    pub bin: f32,
    /// Peak magnitude, `0.0..=1.0`.
    pub amplitude: f32,
    /// Bins moved per generated frame; wraps around the spectrum.
    #[serde(default)]
    pub drift: f32,
}

impl Tone {
    pub fn new(bin: f32, amplitude: f32) -> Self {
        Self {
            bin,
            amplitude,
            drift: 0.0,
        }
    }

    fn center_at(&self, frame: u64) -> f32 {
        (self.bin + self.drift * frame as f32).rem_euclid(HALF_FFT_SIZE as f32)
    }
}

struct SynthState {
    tones: Vec<Tone>,
    noise_floor: f32,
    dropout_every: u32,
    fetches: u64,
    frames: u64,
    history: VecDeque<Vec<f32>>,
}

impl SynthState {
    fn fill(&mut self, buffer: &mut AnalysisBuffer) -> StatusCode {
        self.fetches += 1;
        if self.dropout_every > 0 && self.fetches % self.dropout_every as u64 == 0 {
            debug!(fetch = self.fetches, "synthetic dropout");
            return StatusCode::Error;
        }

        let row = self.generate_row();
        self.frames += 1;
        self.history.push_front(row);
        self.history.truncate(HISTORY_ROWS);

        for r in 0..buffer.rows() {
            let dest = buffer.row_mut(r);
            match self.history.get(r) {
                Some(src) => dest.copy_from_slice(src),
                None => dest.fill(0.0),
            }
        }

        StatusCode::Ok
    }

    fn generate_row(&self) -> Vec<f32> {
        let mut row = vec![0.0f32; FFT_SIZE];
        let centers: Vec<f32> = self
            .tones
            .iter()
            .map(|t| t.center_at(self.frames))
            .collect();

        for (bin, value) in row[..HALF_FFT_SIZE].iter_mut().enumerate() {
            let peaks: f32 = self
                .tones
                .iter()
                .zip(&centers)
                .map(|(tone, &center)| {
                    let d = bin as f32 - center;
                    tone.amplitude * (-(d * d) / (2.0 * PEAK_SIGMA * PEAK_SIGMA)).exp()
                })
                .sum();
            *value = (self.noise_floor + peaks).clamp(0.0, 1.0);
        }

        let total_amplitude: f32 = self.tones.iter().map(|t| t.amplitude.abs()).sum();
        let phase = self.frames as f32 * 0.1;
        for (i, value) in row[HALF_FFT_SIZE..].iter_mut().enumerate() {
            if total_amplitude <= f32::EPSILON {
                *value = 0.0;
                continue;
            }
            let sum: f32 = self
                .tones
                .iter()
                .zip(&centers)
                .map(|(tone, &center)| {
                    let cycles = center / FFT_SIZE as f32;
                    tone.amplitude * (2.0 * PI * cycles * i as f32 + phase).sin()
                })
                .sum();
            *value = (sum / total_amplitude).clamp(-1.0, 1.0);
        }

        row
    }
}

/// Test-signal [`AnalysisSource`]. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SyntheticSource {
    state: Arc<Mutex<SynthState>>,
}

impl SyntheticSource {
    pub fn new(tones: Vec<Tone>, noise_floor: f32) -> Self {
        Self {
            state: Arc::new(Mutex::new(SynthState {
                tones,
                noise_floor: noise_floor.clamp(0.0, 1.0),
                dropout_every: 0,
                fetches: 0,
                frames: 0,
                history: VecDeque::with_capacity(HISTORY_ROWS),
            })),
        }
    }

    /// Report `StatusCode::Error` on every `n`th fetch (0 disables).
    pub fn with_dropout_every(self, n: u32) -> Self {
        self.state.lock().dropout_every = n;
        self
    }

    /// Total fetches served, failed ones included.
    pub fn fetches(&self) -> u64 {
        self.state.lock().fetches
    }

    /// Frames successfully generated.
    pub fn frames(&self) -> u64 {
        self.state.lock().frames
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        SourceConfig::default().build()
    }
}

impl AnalysisSource for SyntheticSource {
    fn fetch(&self, mut buffer: AnalysisBuffer) -> impl Future<Output = Fetched> + Send {
        let state = self.state.clone();
        let rows = buffer.rows();

        async move {
            let job = tokio::task::spawn_blocking(move || {
                let status = state.lock().fill(&mut buffer);
                (buffer, status)
            });

            match job.await {
                Ok((buffer, status)) => Fetched { buffer, status },
                Err(e) => {
                    warn!("Synthetic analysis worker failed: {}", e);
                    Fetched::failed(AnalysisBuffer::new(rows), StatusCode::Error)
                }
            }
        }
    }
}
