//! Minimal 32-bit BMP serialisation for intensity textures.
//!
//! Layout: 14-byte file header, 108-byte BITMAPV4HEADER with `BI_BITFIELDS`
//! masks chosen so each pixel is stored as the same `R G B A` bytes the
//! [`PixelBuffer`] holds, then uncompressed rows. Rows are stored bottom-up:
//! the last texture row comes first in the file, so a decoder presents
//! texture row 0 as the top of the image.

use crate::texture::PixelBuffer;

const FILE_HEADER_SIZE: u32 = 14;
const INFO_HEADER_SIZE: u32 = 108;
const PIXEL_OFFSET: u32 = FILE_HEADER_SIZE + INFO_HEADER_SIZE;
const BITS_PER_PIXEL: u16 = 32;
const BI_BITFIELDS: u32 = 3;
/// 72 DPI.
const PIXELS_PER_METER: i32 = 2835;
/// `LCS_sRGB` ('sRGB' as a little-endian u32).
const LCS_SRGB: u32 = 0x7352_4742;

const RED_MASK: u32 = 0x0000_00FF;
const GREEN_MASK: u32 = 0x0000_FF00;
const BLUE_MASK: u32 = 0x00FF_0000;
const ALPHA_MASK: u32 = 0xFF00_0000;

/// Encoded bitmap file bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitmapBlob {
    bytes: Vec<u8>,
    width: usize,
    height: usize,
}

impl BitmapBlob {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

pub struct BitmapEncoder;

impl BitmapEncoder {
    /// Bytes per stored row. 32 bpp rows never need padding.
    pub fn row_size(width: usize) -> usize {
        width * 4
    }

    /// Total file size for a `width x height` image.
    pub fn file_size(width: usize, height: usize) -> usize {
        PIXEL_OFFSET as usize + Self::row_size(width) * height
    }

    pub fn encode_pixels(pixels: &PixelBuffer) -> BitmapBlob {
        Self::encode(pixels.as_bytes(), pixels.width(), pixels.height())
    }

    /// Serialise raw RGBA rows (row 0 first) into a bitmap file.
    ///
    /// # Panics
    ///
    /// If `pixels.len() != width * height * 4`. The builder always produces
    /// matching buffers, so a mismatch is a bug, not a runtime condition.
    pub fn encode(pixels: &[u8], width: usize, height: usize) -> BitmapBlob {
        assert_eq!(
            pixels.len(),
            width * height * 4,
            "pixel buffer does not match {}x{} RGBA",
            width,
            height
        );

        let row_size = Self::row_size(width);
        let image_size = row_size * height;
        let file_size = Self::file_size(width, height);
        let mut out = Vec::with_capacity(file_size);

        // BITMAPFILEHEADER
        out.extend_from_slice(b"BM");
        out.extend_from_slice(&(file_size as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&PIXEL_OFFSET.to_le_bytes());

        // BITMAPV4HEADER
        out.extend_from_slice(&INFO_HEADER_SIZE.to_le_bytes());
        out.extend_from_slice(&(width as i32).to_le_bytes());
        out.extend_from_slice(&(height as i32).to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&BITS_PER_PIXEL.to_le_bytes());
        out.extend_from_slice(&BI_BITFIELDS.to_le_bytes());
        out.extend_from_slice(&(image_size as u32).to_le_bytes());
        out.extend_from_slice(&PIXELS_PER_METER.to_le_bytes());
        out.extend_from_slice(&PIXELS_PER_METER.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // palette colours
        out.extend_from_slice(&0u32.to_le_bytes()); // important colours
        for mask in [RED_MASK, GREEN_MASK, BLUE_MASK, ALPHA_MASK] {
            out.extend_from_slice(&mask.to_le_bytes());
        }
        out.extend_from_slice(&LCS_SRGB.to_le_bytes());
        out.extend_from_slice(&[0u8; 36]); // CIEXYZTRIPLE endpoints
        out.extend_from_slice(&[0u8; 12]); // gamma red/green/blue

        debug_assert_eq!(out.len(), PIXEL_OFFSET as usize);

        if row_size > 0 {
            for row in pixels.chunks_exact(row_size).rev() {
                out.extend_from_slice(row);
            }
        }

        BitmapBlob {
            bytes: out,
            width,
            height,
        }
    }
}
