//! RGBA pixel buffers and the per-call OKLab working planes.

use crate::color::{linear_srgb_to_oklab, oklab_to_srgb8, srgb8_to_linear};
use crate::error::{LookError, Result};

/// Pixels with alpha below this are treated as fully transparent.
pub const OPAQUE_ALPHA: u8 = 128;

/// A decoded image: row-major RGBA, 8-bit sRGB-encoded channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wraps an RGBA byte buffer, validating its size.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = Self::expected_len(width, height)?;
        if data.len() != expected {
            return Err(LookError::BufferSizeMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Copies an RGBA byte slice into a new buffer.
    pub fn from_rgba(width: u32, height: u32, data: &[u8]) -> Result<Self> {
        Self::new(width, height, data.to_vec())
    }

    /// Creates a buffer where every pixel has the same RGBA value.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let len = Self::expected_len(width, height)?;
        let data = rgba.iter().copied().cycle().take(len).collect();
        Self::new(width, height, data)
    }

    /// Decodes an encoded image (JPEG or PNG) into RGBA.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = decoded.dimensions();
        Self::new(width, height, decoded.into_raw())
    }

    fn expected_len(width: u32, height: u32) -> Result<usize> {
        if width == 0 || height == 0 {
            return Err(LookError::EmptyImage);
        }
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| {
                LookError::InvalidDimensions(format!("{width}x{height} overflows the buffer size"))
            })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// A buffer of the same dimensions holding `data`, which must have the
    /// same length as the current pixel data.
    pub(crate) fn with_data(&self, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), self.data.len());
        Self {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// RGBA value at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }
}

/// Working planes for one grading call: OKLab channels, opacity mask and
/// the untouched alpha channel.
///
/// Transparent pixels hold `L = a = b = 0` and `mask = 0`; every statistic
/// skips them by consulting `mask`.
#[derive(Debug, Clone)]
pub struct Planes {
    pub width: usize,
    pub height: usize,
    pub l: Vec<f32>,
    pub a: Vec<f32>,
    pub b: Vec<f32>,
    /// 1.0 for opaque pixels, 0.0 otherwise
    pub mask: Vec<f32>,
    pub alpha: Vec<u8>,
}

impl Planes {
    /// Converts an RGBA buffer to OKLab planes.
    pub fn from_buffer(buffer: &PixelBuffer) -> Self {
        let linear: [f32; 256] = std::array::from_fn(|v| srgb8_to_linear(v as u8));
        let n = buffer.pixel_count();
        let mut planes = Self {
            width: buffer.width() as usize,
            height: buffer.height() as usize,
            l: vec![0.0; n],
            a: vec![0.0; n],
            b: vec![0.0; n],
            mask: vec![0.0; n],
            alpha: vec![0; n],
        };

        for (i, px) in buffer.data().chunks_exact(4).enumerate() {
            planes.alpha[i] = px[3];
            if px[3] < OPAQUE_ALPHA {
                continue;
            }
            let (l, a, b) = linear_srgb_to_oklab(
                linear[px[0] as usize],
                linear[px[1] as usize],
                linear[px[2] as usize],
            );
            planes.l[i] = l;
            planes.a[i] = a;
            planes.b[i] = b;
            planes.mask[i] = 1.0;
        }
        planes
    }

    pub fn len(&self) -> usize {
        self.l.len()
    }

    pub fn is_empty(&self) -> bool {
        self.l.is_empty()
    }

    #[inline]
    pub fn is_opaque(&self, i: usize) -> bool {
        self.mask[i] > 0.0
    }

    pub fn opaque_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m > 0.0).count()
    }

    /// Lightness of opaque pixels only.
    pub fn opaque_lightness(&self) -> Vec<f32> {
        self.l
            .iter()
            .zip(&self.mask)
            .filter(|(_, m)| **m > 0.0)
            .map(|(l, _)| *l)
            .collect()
    }

    /// Encodes the planes back to RGBA. Transparent pixels get zero RGB and
    /// keep their original alpha.
    pub fn to_buffer(&self) -> PixelBuffer {
        let mut data = vec![0u8; self.len() * 4];
        for (i, px) in data.chunks_exact_mut(4).enumerate() {
            px[3] = self.alpha[i];
            if !self.is_opaque(i) {
                continue;
            }
            let (r, g, b) = oklab_to_srgb8(self.l[i], self.a[i], self.b[i]);
            px[0] = r;
            px[1] = g;
            px[2] = b;
        }
        PixelBuffer {
            width: self.width as u32,
            height: self.height as u32,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_wrong_size() {
        let result = PixelBuffer::new(2, 2, vec![0u8; 15]);
        assert!(matches!(
            result,
            Err(LookError::BufferSizeMismatch {
                expected: 16,
                actual: 15,
                ..
            })
        ));
    }

    #[test]
    fn test_new_rejects_zero_pixels() {
        assert!(matches!(
            PixelBuffer::new(0, 4, vec![]),
            Err(LookError::EmptyImage)
        ));
    }

    #[test]
    fn test_filled_and_pixel_access() {
        let buf = PixelBuffer::filled(3, 2, [10, 20, 30, 255]).unwrap();
        assert_eq!(buf.data().len(), 24);
        assert_eq!(buf.pixel(2, 1), [10, 20, 30, 255]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            PixelBuffer::decode(&[0x00, 0x01, 0x02]),
            Err(LookError::Decode(_))
        ));
    }

    #[test]
    fn test_planes_mask_and_transparent_zeroing() {
        let data = vec![200, 100, 50, 255, 200, 100, 50, 10];
        let buf = PixelBuffer::new(2, 1, data).unwrap();
        let planes = Planes::from_buffer(&buf);
        assert_eq!(planes.opaque_count(), 1);
        assert_eq!(planes.opaque_lightness().len(), 1);

        let out = planes.to_buffer();
        let px0 = out.pixel(0, 0);
        assert!((i16::from(px0[0]) - 200).abs() <= 1);
        assert_eq!(px0[3], 255);
        assert_eq!(out.pixel(1, 0), [0, 0, 0, 10]);
    }
}
