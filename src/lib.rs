//! Live audio analysis to shader-ready textures.
//!
//! An external analyser fills [`AnalysisBuffer`]s of spectral magnitudes and
//! waveform samples. A [`TextureBuilder`] maps them into single-channel RGBA
//! textures, the [`BitmapEncoder`] wraps those in a standard bitmap, and a
//! [`FrameDriver`] paces the whole thing. [`Visualizer`] wires the three
//! together and publishes frames on a watch channel.

pub mod analysis;
pub mod bitmap;
pub mod config;
pub mod driver;
pub mod error;
pub mod pipeline;
pub mod texture;

pub use analysis::{
    AnalysisBuffer, AnalysisSource, BarKind, BarView, Fetched, LifecycleState, StatusCode,
    SyntheticSource, Tone, FFT_SIZE, HALF_FFT_SIZE, HISTORY_ROWS,
};
pub use bitmap::{BitmapBlob, BitmapEncoder};
pub use config::{Config, ConfigOverrides, DriverConfig, SourceConfig, TextureConfig};
pub use driver::{DriverState, FrameDriver, Tick, TickReceiver};
pub use error::{ConfigError, DriverError, FrameError};
pub use pipeline::{FrameReceiver, FrameStats, RenderedFrame, Visualizer};
pub use texture::{FrequencyRange, PixelBuffer, Sampler, TextureBuilder, TextureLayout};
