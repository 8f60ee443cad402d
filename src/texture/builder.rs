use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

use super::{matrix_texture, row_texture, FrequencyRange, PixelBuffer, Sampler, TextureLayout};
use crate::analysis::{
    AnalysisBuffer, AnalysisSource, BarKind, BarView, Fetched, Lifecycle, LifecycleState,
};
use crate::config::TextureConfig;
use crate::error::{ConfigError, FrameError};

/// Front/spare pair. The source only ever writes the spare; mapping and bar
/// views only ever read the front.
struct Buffers {
    front: Option<Arc<AnalysisBuffer>>,
    spare: Option<AnalysisBuffer>,
    fetching: bool,
}

/// Clears `Buffers::fetching` even if the fetch future is dropped mid-await.
struct InFlight<'a> {
    buffers: &'a Mutex<Buffers>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.buffers.lock().fetching = false;
    }
}

/// Fetches analysis snapshots and maps them into intensity textures.
pub struct TextureBuilder<S> {
    source: S,
    layout: TextureLayout,
    range: FrequencyRange,
    lifecycle: Lifecycle,
    buffers: Mutex<Buffers>,
}

impl<S: AnalysisSource> TextureBuilder<S> {
    pub fn new(source: S, layout: TextureLayout, range: FrequencyRange) -> Result<Self, ConfigError> {
        if layout.is_reserved() {
            return Err(ConfigError::ReservedLayout(layout));
        }

        info!(
            "Texture builder: layout {}, bins {}..{} ({} wide)",
            layout,
            range.min(),
            range.max(),
            range.bitmap_range()
        );

        Ok(Self {
            source,
            layout,
            range,
            lifecycle: Lifecycle::new(),
            buffers: Mutex::new(Buffers {
                front: None,
                spare: Some(AnalysisBuffer::new(layout.analysis_rows())),
                fetching: false,
            }),
        })
    }

    pub fn from_config(source: S, config: &TextureConfig) -> Result<Self, ConfigError> {
        let range = FrequencyRange::new(config.min_frequency_bin, config.max_frequency_bin)?;
        Self::new(source, config.layout, range)
    }

    pub fn layout(&self) -> TextureLayout {
        self.layout
    }

    pub fn range(&self) -> FrequencyRange {
        self.range
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Texture dimensions for every successful build.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.range.bitmap_range(), self.layout.height())
    }

    /// Build whatever the configured layout calls for.
    pub async fn build(&self) -> Result<PixelBuffer, FrameError> {
        match self.layout.sampler() {
            Some(sampler) => self.build_matrix_texture(sampler).await,
            None => self.build_row_texture().await,
        }
    }

    /// Fetch a fresh snapshot and map it into a `range x 2` strip.
    pub async fn build_row_texture(&self) -> Result<PixelBuffer, FrameError> {
        let snapshot = self.fetch_snapshot().await?;
        Ok(row_texture(&snapshot, self.range))
    }

    /// Fetch a fresh snapshot and map its history with `sampler`.
    ///
    /// # Panics
    ///
    /// If the builder uses [`TextureLayout::Row`], whose snapshots carry no
    /// history rows.
    pub async fn build_matrix_texture(&self, sampler: Sampler) -> Result<PixelBuffer, FrameError> {
        assert!(
            self.layout != TextureLayout::Row,
            "matrix textures need a matrix layout"
        );
        let snapshot = self.fetch_snapshot().await?;
        Ok(matrix_texture(&snapshot, self.range, sampler))
    }

    /// Latest published snapshot, if any fetch has succeeded.
    pub fn snapshot(&self) -> Option<Arc<AnalysisBuffer>> {
        self.buffers.lock().front.clone()
    }

    /// Bar-chart view over the latest snapshot.
    pub fn bars(&self, kind: BarKind, count: usize) -> Option<BarView> {
        self.snapshot()
            .map(|buffer| BarView::new(buffer, kind, count))
    }

    /// Stop honouring fetches. In-flight results will be discarded.
    pub fn deactivate(&self) -> bool {
        self.lifecycle.deactivate()
    }

    /// Deactivate, wait for in-flight fetches, then release the buffers.
    pub async fn drain(&self) {
        self.lifecycle.drain().await;
        let mut buffers = self.buffers.lock();
        buffers.front = None;
        buffers.spare = None;
        info!("Texture builder released analysis buffers");
    }

    async fn fetch_snapshot(&self) -> Result<Arc<AnalysisBuffer>, FrameError> {
        let guard = self.lifecycle.try_enter().ok_or(FrameError::Detached)?;

        let scratch = {
            let mut buffers = self.buffers.lock();
            if buffers.fetching {
                return Err(FrameError::Busy);
            }
            buffers.fetching = true;
            buffers
                .spare
                .take()
                .unwrap_or_else(|| AnalysisBuffer::new(self.layout.analysis_rows()))
        };
        let in_flight = InFlight {
            buffers: &self.buffers,
        };

        let Fetched { buffer, status } = self.source.fetch(scratch).await;
        drop(in_flight);

        if !guard.still_active() {
            debug!("Discarding analysis fetched after deactivation");
            return Err(FrameError::Detached);
        }

        let mut buffers = self.buffers.lock();
        if !status.is_ok() {
            buffers.spare = Some(buffer);
            return Err(FrameError::Unavailable(status));
        }

        let fresh = Arc::new(buffer);
        if let Some(previous) = buffers.front.replace(fresh.clone()) {
            // A bar view may still hold the old front; then the next fetch
            // allocates instead.
            buffers.spare = Arc::try_unwrap(previous).ok();
        }
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{StatusCode, HALF_FFT_SIZE, HISTORY_ROWS};
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    /// Writes `(fetch number) / 10` into every magnitude and `wave` into every
    /// waveform sample.
    struct StepSource {
        fetches: AtomicUsize,
        wave: f32,
        status: StatusCode,
    }

    impl StepSource {
        fn new(wave: f32) -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                wave,
                status: StatusCode::Ok,
            }
        }

        fn failing(status: StatusCode) -> Self {
            Self {
                status,
                ..Self::new(0.0)
            }
        }
    }

    impl AnalysisSource for StepSource {
        fn fetch(&self, mut buffer: AnalysisBuffer) -> impl Future<Output = Fetched> + Send {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            let (wave, status) = (self.wave, self.status);
            async move {
                if status.is_ok() {
                    for r in 0..buffer.rows() {
                        let row = buffer.row_mut(r);
                        row[..HALF_FFT_SIZE].fill(n as f32 / 10.0);
                        row[HALF_FFT_SIZE..].fill(wave);
                    }
                }
                Fetched::failed(buffer, status)
            }
        }
    }

    /// Holds each fetch open until the test releases it, then writes 1.0
    /// everywhere.
    struct GatedSource {
        started: Mutex<Option<oneshot::Sender<()>>>,
        gate: Mutex<Option<oneshot::Receiver<()>>>,
        completed: AtomicUsize,
    }

    impl GatedSource {
        fn new() -> (Self, oneshot::Receiver<()>, oneshot::Sender<()>) {
            let (started_tx, started_rx) = oneshot::channel();
            let (gate_tx, gate_rx) = oneshot::channel();
            let source = Self {
                started: Mutex::new(Some(started_tx)),
                gate: Mutex::new(Some(gate_rx)),
                completed: AtomicUsize::new(0),
            };
            (source, started_rx, gate_tx)
        }
    }

    impl AnalysisSource for GatedSource {
        fn fetch(&self, mut buffer: AnalysisBuffer) -> impl Future<Output = Fetched> + Send {
            let started = self.started.lock().take();
            let gate = self.gate.lock().take();
            async move {
                if let Some(started) = started {
                    let _ = started.send(());
                }
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                buffer.as_mut_slice().fill(1.0);
                self.completed.fetch_add(1, Ordering::SeqCst);
                Fetched::ok(buffer)
            }
        }
    }

    fn full_range() -> FrequencyRange {
        FrequencyRange::new(0, 255).unwrap()
    }

    #[tokio::test]
    async fn row_build_maps_fresh_snapshot() {
        let builder = TextureBuilder::new(StepSource::new(0.0), TextureLayout::Row, full_range()).unwrap();
        assert!(builder.snapshot().is_none());

        let pixels = builder.build().await.unwrap();
        assert_eq!((pixels.width(), pixels.height()), builder.dimensions());
        assert_eq!(pixels.len(), 255 * 2 * 4);
        // 0.1 * 255 = 25.5 -> 25
        assert!((0..255).all(|c| pixels.get_pixel(c, 0) == (25, 0, 0, 255)));
        assert!((0..255).all(|c| pixels.get_pixel(c, 1) == (64, 0, 0, 255)));
        assert!(builder.snapshot().is_some());
    }

    #[tokio::test]
    async fn matrix_build_uses_layout_sampler() {
        let range = FrequencyRange::new(10, 20).unwrap();
        let builder = TextureBuilder::new(StepSource::new(1.0), TextureLayout::MatrixWave, range).unwrap();

        let pixels = builder.build().await.unwrap();
        assert_eq!(pixels.len(), 10 * HISTORY_ROWS * 4);
        assert!(pixels.as_bytes().chunks(4).all(|px| px == [128, 0, 0, 255]));

        let fft = builder.build_matrix_texture(Sampler::Fft).await.unwrap();
        // second fetch: 0.2 * 255 = 51
        assert_eq!(fft.intensity(9, 255), 51);
    }

    #[tokio::test]
    async fn failed_fetch_is_unavailable_and_publishes_nothing() {
        let builder = TextureBuilder::new(
            StepSource::failing(StatusCode::Error),
            TextureLayout::Row,
            full_range(),
        )
        .unwrap();

        assert_eq!(
            builder.build_row_texture().await,
            Err(FrameError::Unavailable(StatusCode::Error))
        );
        assert!(builder.snapshot().is_none());
        assert!(builder.bars(BarKind::Frequency, 8).is_none());
        assert_eq!(builder.state(), LifecycleState::Active);
    }

    #[test]
    fn reserved_layout_fails_construction() {
        let result = TextureBuilder::new(StepSource::new(0.0), TextureLayout::MatrixBoth, full_range());
        assert!(matches!(
            result,
            Err(ConfigError::ReservedLayout(TextureLayout::MatrixBoth))
        ));
    }

    #[test]
    fn config_range_is_validated() {
        let config = TextureConfig {
            layout: TextureLayout::Row,
            min_frequency_bin: 10,
            max_frequency_bin: 5,
        };
        assert!(matches!(
            TextureBuilder::from_config(StepSource::new(0.0), &config),
            Err(ConfigError::InvalidFrequencyRange { min: 10, max: 5 })
        ));
    }

    #[tokio::test]
    async fn unchanged_analysis_gives_identical_textures() {
        let builder = TextureBuilder::new(StepSource::new(0.25), TextureLayout::Row, full_range()).unwrap();
        let first = builder.build().await.unwrap();
        let snapshot = builder.snapshot().unwrap();

        assert_eq!(first, row_texture(&snapshot, builder.range()));
        assert_eq!(row_texture(&snapshot, builder.range()), row_texture(&snapshot, builder.range()));
    }

    #[tokio::test]
    async fn bar_view_outlives_newer_fetches() {
        let builder = TextureBuilder::new(StepSource::new(-0.5), TextureLayout::Row, full_range()).unwrap();
        builder.build().await.unwrap();
        let bars = builder.bars(BarKind::Frequency, 16).unwrap();

        builder.build().await.unwrap();
        builder.build().await.unwrap();

        assert_eq!(bars.len(), 16);
        assert!(bars.samples().iter().all(|v| (*v - 0.1).abs() < 1e-6));
        let latest = builder.bars(BarKind::Waveform, 4).unwrap();
        assert_eq!(latest.samples(), &[-0.5; 4]);
        assert!((builder.snapshot().unwrap().magnitude(0, 0) - 0.3).abs() < 1e-6);
    }

    #[tokio::test]
    async fn concurrent_build_is_busy() {
        let (source, started, gate) = GatedSource::new();
        let builder = Arc::new(TextureBuilder::new(source, TextureLayout::Row, full_range()).unwrap());

        let first = {
            let builder = builder.clone();
            tokio::spawn(async move { builder.build().await })
        };
        started.await.unwrap();

        assert_eq!(builder.build().await, Err(FrameError::Busy));

        gate.send(()).unwrap();
        assert!(first.await.unwrap().is_ok());
        assert_eq!(builder.source().completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_resolving_after_teardown_is_discarded() {
        let (source, started, gate) = GatedSource::new();
        let builder = Arc::new(TextureBuilder::new(source, TextureLayout::Row, full_range()).unwrap());

        let pending = {
            let builder = builder.clone();
            tokio::spawn(async move { builder.build().await })
        };
        started.await.unwrap();

        assert!(builder.deactivate());
        let draining = {
            let builder = builder.clone();
            tokio::spawn(async move { builder.drain().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!draining.is_finished());
        assert_eq!(builder.state(), LifecycleState::Draining);

        gate.send(()).unwrap();
        assert_eq!(pending.await.unwrap(), Err(FrameError::Detached));
        draining.await.unwrap();

        // The fetch ran to completion but its buffer was never published.
        assert_eq!(builder.source().completed.load(Ordering::SeqCst), 1);
        assert!(builder.snapshot().is_none());
        assert_eq!(builder.state(), LifecycleState::Freed);
        assert_eq!(builder.build().await, Err(FrameError::Detached));
    }
}
