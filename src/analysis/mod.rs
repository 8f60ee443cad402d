mod lifecycle;
mod synthetic;

pub use lifecycle::{FetchGuard, Lifecycle, LifecycleState};
pub use synthetic::{SyntheticSource, Tone};

use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Floats per analysis row: magnitudes first, then waveform.
pub const FFT_SIZE: usize = 512;
/// Offset of the waveform half inside a row, and the number of magnitude bins.
pub const HALF_FFT_SIZE: usize = FFT_SIZE / 2;
/// Rows kept by history (matrix) layouts. Row 0 is the newest frame.
pub const HISTORY_ROWS: usize = 256;

/// Spectral magnitudes and waveform samples for one or more analysis frames.
///
/// Each row is [`FFT_SIZE`] floats: `[0, HALF_FFT_SIZE)` holds magnitudes in
/// `0.0..=1.0`, `[HALF_FFT_SIZE, FFT_SIZE)` holds waveform samples in
/// `-1.0..=1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisBuffer {
    data: Vec<f32>,
    rows: usize,
}

impl AnalysisBuffer {
    pub fn new(rows: usize) -> Self {
        let rows = rows.max(1);
        Self {
            data: vec![0.0; rows * FFT_SIZE],
            rows,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn magnitude(&self, row: usize, bin: usize) -> f32 {
        self.data[row * FFT_SIZE + bin]
    }

    #[inline]
    pub fn waveform(&self, row: usize, index: usize) -> f32 {
        self.data[row * FFT_SIZE + HALF_FFT_SIZE + index]
    }

    pub fn magnitudes(&self, row: usize) -> &[f32] {
        let start = row * FFT_SIZE;
        &self.data[start..start + HALF_FFT_SIZE]
    }

    pub fn waveform_row(&self, row: usize) -> &[f32] {
        let start = row * FFT_SIZE + HALF_FFT_SIZE;
        &self.data[start..start + HALF_FFT_SIZE]
    }

    pub fn row(&self, row: usize) -> &[f32] {
        let start = row * FFT_SIZE;
        &self.data[start..start + FFT_SIZE]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f32] {
        let start = row * FFT_SIZE;
        &mut self.data[start..start + FFT_SIZE]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

/// Result of a fetch as reported by the analysis subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    /// The analyser has no data yet (e.g. nothing is playing).
    NotReady,
    Error,
}

impl StatusCode {
    pub fn is_ok(self) -> bool {
        self == StatusCode::Ok
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Ok => write!(f, "ok"),
            StatusCode::NotReady => write!(f, "not ready"),
            StatusCode::Error => write!(f, "error"),
        }
    }
}

/// A buffer handed back by [`AnalysisSource::fetch`] together with its status.
#[derive(Debug)]
pub struct Fetched {
    pub buffer: AnalysisBuffer,
    pub status: StatusCode,
}

impl Fetched {
    pub fn ok(buffer: AnalysisBuffer) -> Self {
        Self {
            buffer,
            status: StatusCode::Ok,
        }
    }

    pub fn failed(buffer: AnalysisBuffer, status: StatusCode) -> Self {
        Self { buffer, status }
    }
}

/// External audio subsystem that fills analysis buffers on request.
///
/// The buffer is moved into the fetch and returned with the result, so the
/// source never writes memory the texture mapper is reading. Implementations
/// may complete on another worker; the returned future must be `Send`.
pub trait AnalysisSource: Send + Sync + 'static {
    fn fetch(&self, buffer: AnalysisBuffer) -> impl Future<Output = Fetched> + Send;
}

impl<S: AnalysisSource> AnalysisSource for Arc<S> {
    fn fetch(&self, buffer: AnalysisBuffer) -> impl Future<Output = Fetched> + Send {
        S::fetch(self, buffer)
    }
}

/// Which half of the analysis row a bar chart displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BarKind {
    #[default]
    Frequency,
    Waveform,
}

/// Read-only view over the newest analysis row, for bar-chart widgets.
///
/// Holds its own reference to the snapshot, so it stays valid after the
/// builder publishes newer data or is torn down.
#[derive(Debug, Clone)]
pub struct BarView {
    buffer: Arc<AnalysisBuffer>,
    kind: BarKind,
    count: usize,
}

impl BarView {
    pub fn new(buffer: Arc<AnalysisBuffer>, kind: BarKind, count: usize) -> Self {
        Self {
            buffer,
            kind,
            count: count.min(HALF_FFT_SIZE),
        }
    }

    pub fn kind(&self) -> BarKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn samples(&self) -> &[f32] {
        let row = match self.kind {
            BarKind::Frequency => self.buffer.magnitudes(0),
            BarKind::Waveform => self.buffer.waveform_row(0),
        };
        &row[..self.count]
    }

    pub fn buffer(&self) -> &AnalysisBuffer {
        &self.buffer
    }
}
