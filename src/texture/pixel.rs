/// Owned RGBA pixel buffer holding a single-channel intensity texture.
///
/// Internal format is 4 bytes per pixel in **RGBA** order, row-major, row 0
/// first. Intensity lives in the red channel; green and blue stay 0 and alpha
/// is always 255.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl PixelBuffer {
    /// A black, fully opaque buffer.
    pub fn new(width: usize, height: usize) -> Self {
        let mut data = vec![0u8; width * height * 4];
        for px in data.chunks_exact_mut(4) {
            px[3] = 255;
        }
        Self {
            data,
            width,
            height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Write an intensity at (x, y).
    #[inline]
    pub fn put_intensity(&mut self, x: usize, y: usize, value: u8) {
        let idx = (y * self.width + x) * 4;
        self.data[idx] = value;
    }

    /// Red channel at (x, y).
    #[inline]
    pub fn intensity(&self, x: usize, y: usize) -> u8 {
        self.data[(y * self.width + x) * 4]
    }

    /// Read the RGBA values at (x, y).
    #[inline]
    pub fn get_pixel(&self, x: usize, y: usize) -> (u8, u8, u8, u8) {
        let idx = (y * self.width + x) * 4;
        (
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        )
    }

    /// One row of raw RGBA bytes.
    pub fn row(&self, y: usize) -> &[u8] {
        let stride = self.width * 4;
        &self.data[y * stride..(y + 1) * stride]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
