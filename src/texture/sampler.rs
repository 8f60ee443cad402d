use crate::analysis::AnalysisBuffer;

/// Magnitude `0.0..=1.0` to an 8-bit intensity.
///
/// Truncates toward zero rather than rounding. The cast saturates, so values
/// outside the nominal range land on 0 or 255 and NaN maps to 0.
#[inline]
pub fn fft_intensity(magnitude: f32) -> u8 {
    (magnitude * 255.0) as u8
}

/// Waveform sample `-1.0..=1.0` to an 8-bit intensity in `0..=128`.
///
/// Silence maps to 64. Truncates toward zero like [`fft_intensity`].
#[inline]
pub fn wave_intensity(sample: f32) -> u8 {
    (((sample + 1.0) / 2.0) * 128.0) as u8
}

/// Per-pixel sampling strategy for matrix textures, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampler {
    /// Magnitude history: `fft_intensity(buffer[row][col])`.
    Fft,
    /// Waveform history: `wave_intensity(buffer[row][HALF_FFT_SIZE + col])`.
    Wave,
}

impl Sampler {
    #[inline]
    pub fn sample(&self, buffer: &AnalysisBuffer, row: usize, col: usize) -> u8 {
        match self {
            Sampler::Fft => fft_intensity(buffer.magnitude(row, col)),
            Sampler::Wave => wave_intensity(buffer.waveform(row, col)),
        }
    }
}
