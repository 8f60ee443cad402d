//! Analysis buffer to intensity texture mapping.
//!
//! Row layout produces a 2-row strip (magnitudes over waveform); matrix
//! layouts produce a [`HISTORY_ROWS`]-row history grid sampled by a single
//! [`Sampler`] chosen at construction.

mod builder;
mod pixel;
mod sampler;

pub use builder::TextureBuilder;
pub use pixel::PixelBuffer;
pub use sampler::{fft_intensity, wave_intensity, Sampler};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analysis::{AnalysisBuffer, HISTORY_ROWS};
use crate::error::ConfigError;

/// Highest exclusive frequency bin a range may end at.
pub const MAX_FREQUENCY_BIN: i32 = 255;

/// Texture shape, fixed for the lifetime of a builder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TextureLayout {
    /// `range x 2`: magnitudes on row 0, waveform on row 1.
    #[default]
    Row,
    /// `range x 256` magnitude history.
    MatrixFft,
    /// `range x 256` waveform history.
    MatrixWave,
    /// Reserved; rejected at construction.
    MatrixBoth,
}

impl TextureLayout {
    pub fn name(&self) -> &'static str {
        match self {
            TextureLayout::Row => "row",
            TextureLayout::MatrixFft => "matrix-fft",
            TextureLayout::MatrixWave => "matrix-wave",
            TextureLayout::MatrixBoth => "matrix-both",
        }
    }

    /// Sampling strategy for matrix layouts; `None` for the row strip.
    pub fn sampler(&self) -> Option<Sampler> {
        match self {
            TextureLayout::MatrixFft => Some(Sampler::Fft),
            TextureLayout::MatrixWave => Some(Sampler::Wave),
            TextureLayout::Row | TextureLayout::MatrixBoth => None,
        }
    }

    pub fn is_reserved(&self) -> bool {
        *self == TextureLayout::MatrixBoth
    }

    /// Analysis rows a fetch must fill for this layout.
    pub fn analysis_rows(&self) -> usize {
        match self {
            TextureLayout::Row => 1,
            _ => HISTORY_ROWS,
        }
    }

    /// Texture height in pixels.
    pub fn height(&self) -> usize {
        match self {
            TextureLayout::Row => 2,
            _ => HISTORY_ROWS,
        }
    }
}

impl fmt::Display for TextureLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Validated half-open bin range `[min, max)` within `[0, 255]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyRange {
    min: usize,
    max: usize,
}

impl FrequencyRange {
    pub fn new(min: i32, max: i32) -> Result<Self, ConfigError> {
        if min < 0 || min >= max || max > MAX_FREQUENCY_BIN {
            return Err(ConfigError::InvalidFrequencyRange { min, max });
        }
        Ok(Self {
            min: min as usize,
            max: max as usize,
        })
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Number of visualised bins, which is also the texture width.
    pub fn bitmap_range(&self) -> usize {
        self.max - self.min
    }
}

impl Default for FrequencyRange {
    fn default() -> Self {
        Self {
            min: 0,
            max: MAX_FREQUENCY_BIN as usize,
        }
    }
}

/// Map the newest analysis row into a `range x 2` strip.
pub fn row_texture(buffer: &AnalysisBuffer, range: FrequencyRange) -> PixelBuffer {
    let width = range.bitmap_range();
    let mut pixels = PixelBuffer::new(width, 2);
    for col in 0..width {
        let bin = range.min() + col;
        pixels.put_intensity(col, 0, fft_intensity(buffer.magnitude(0, bin)));
        pixels.put_intensity(col, 1, wave_intensity(buffer.waveform(0, bin)));
    }
    pixels
}

/// Map the full history into a `range x HISTORY_ROWS` grid.
pub fn matrix_texture(buffer: &AnalysisBuffer, range: FrequencyRange, sampler: Sampler) -> PixelBuffer {
    assert!(
        buffer.rows() >= HISTORY_ROWS,
        "matrix texture needs {} analysis rows, buffer has {}",
        HISTORY_ROWS,
        buffer.rows()
    );

    let width = range.bitmap_range();
    let mut pixels = PixelBuffer::new(width, HISTORY_ROWS);
    for row in 0..HISTORY_ROWS {
        for col in 0..width {
            pixels.put_intensity(col, row, sampler.sample(buffer, row, range.min() + col));
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::HALF_FFT_SIZE;

    fn uniform_buffer(rows: usize, magnitude: f32, wave: f32) -> AnalysisBuffer {
        let mut buffer = AnalysisBuffer::new(rows);
        for r in 0..rows {
            let row = buffer.row_mut(r);
            row[..HALF_FFT_SIZE].fill(magnitude);
            row[HALF_FFT_SIZE..].fill(wave);
        }
        buffer
    }

    #[test]
    fn valid_ranges_report_width() {
        for (min, max) in [(0, 1), (0, 255), (10, 20), (254, 255), (100, 101)] {
            let range = FrequencyRange::new(min, max).unwrap();
            assert_eq!(range.bitmap_range(), (max - min) as usize);
        }
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        for (min, max) in [(10, 5), (-1, 10), (0, 256), (7, 7), (255, 255)] {
            assert_eq!(
                FrequencyRange::new(min, max),
                Err(ConfigError::InvalidFrequencyRange { min, max })
            );
        }
    }

    #[test]
    fn full_magnitude_fills_row_zero() {
        let buffer = uniform_buffer(1, 1.0, 0.0);
        let range = FrequencyRange::new(3, 40).unwrap();
        let pixels = row_texture(&buffer, range);

        assert_eq!(pixels.width(), 37);
        assert_eq!(pixels.height(), 2);
        for col in 0..pixels.width() {
            assert_eq!(pixels.get_pixel(col, 0), (255, 0, 0, 255));
            assert_eq!(pixels.get_pixel(col, 1), (64, 0, 0, 255));
        }
    }

    #[test]
    fn waveform_boundaries_are_not_clamped_further() {
        let range = FrequencyRange::new(0, 8).unwrap();

        let low = row_texture(&uniform_buffer(1, 0.0, -1.0), range);
        let high = row_texture(&uniform_buffer(1, 0.0, 1.0), range);

        assert!((0..8).all(|c| low.intensity(c, 1) == 0));
        assert!((0..8).all(|c| high.intensity(c, 1) == 128));
    }

    #[test]
    fn row_texture_is_offset_by_min_bin() {
        let mut buffer = AnalysisBuffer::new(1);
        buffer.row_mut(0)[20] = 1.0;
        buffer.row_mut(0)[HALF_FFT_SIZE + 20] = 1.0;
        let range = FrequencyRange::new(20, 30).unwrap();

        let pixels = row_texture(&buffer, range);
        assert_eq!(pixels.intensity(0, 0), 255);
        assert_eq!(pixels.intensity(1, 0), 0);
        assert_eq!(pixels.intensity(0, 1), 128);
        assert_eq!(pixels.intensity(1, 1), 64);
    }

    #[test]
    fn buffer_lengths_follow_layout() {
        let range = FrequencyRange::new(5, 105).unwrap();
        let history = uniform_buffer(HISTORY_ROWS, 0.5, 0.0);

        let row = row_texture(&history, range);
        assert_eq!(row.len(), 100 * 2 * 4);

        for sampler in [Sampler::Fft, Sampler::Wave] {
            let matrix = matrix_texture(&history, range, sampler);
            assert_eq!(matrix.len(), 100 * 256 * 4);
            assert_eq!(matrix.height(), TextureLayout::MatrixFft.height());
        }
    }

    #[test]
    fn matrix_cells_follow_history_rows() {
        let mut buffer = AnalysisBuffer::new(HISTORY_ROWS);
        buffer.row_mut(0)[2] = 1.0;
        buffer.row_mut(255)[3] = 0.5;
        buffer.row_mut(7)[HALF_FFT_SIZE + 2] = 1.0;
        let range = FrequencyRange::new(2, 4).unwrap();

        let fft = matrix_texture(&buffer, range, Sampler::Fft);
        assert_eq!(fft.intensity(0, 0), 255);
        assert_eq!(fft.intensity(1, 255), 127);
        assert_eq!(fft.intensity(1, 0), 0);

        let wave = matrix_texture(&buffer, range, Sampler::Wave);
        assert_eq!(wave.intensity(0, 7), 128);
        assert_eq!(wave.intensity(0, 8), 64);
    }

    #[test]
    fn unchanged_buffer_gives_identical_textures() {
        let mut buffer = uniform_buffer(HISTORY_ROWS, 0.3, -0.2);
        buffer.row_mut(9)[17] = 0.77;
        let range = FrequencyRange::default();

        assert_eq!(row_texture(&buffer, range), row_texture(&buffer, range));
        assert_eq!(
            matrix_texture(&buffer, range, Sampler::Fft).as_bytes(),
            matrix_texture(&buffer, range, Sampler::Fft).as_bytes()
        );
    }

    #[test]
    fn layout_metadata() {
        assert_eq!(TextureLayout::Row.sampler(), None);
        assert_eq!(TextureLayout::MatrixWave.sampler(), Some(Sampler::Wave));
        assert_eq!(TextureLayout::Row.analysis_rows(), 1);
        assert_eq!(TextureLayout::MatrixFft.analysis_rows(), HISTORY_ROWS);
        assert!(TextureLayout::MatrixBoth.is_reserved());
        assert_eq!(TextureLayout::MatrixFft.to_string(), "matrix-fft");
    }
}
