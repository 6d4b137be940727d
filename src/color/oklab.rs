//! OKLab forward and inverse transforms.
//!
//! Reference: Björn Ottosson, "A perceptual color space for image
//! processing" (2020). Both directions use the published matrices so that
//! `oklab_to_srgb8(srgb8_to_oklab(c)) == c` up to 8-bit rounding.

use super::transfer::{linear_to_srgb8, srgb8_to_linear};

/// Linear sRGB to LMS cone response.
#[rustfmt::skip]
pub const LINEAR_SRGB_TO_LMS: [[f32; 3]; 3] = [
    [0.412_221_470_8, 0.536_332_536_3, 0.051_445_992_9],
    [0.211_903_498_2, 0.680_699_545_1, 0.107_396_956_6],
    [0.088_302_461_9, 0.281_718_837_6, 0.629_978_700_5],
];

/// Non-linear LMS to OKLab.
#[rustfmt::skip]
pub const LMS_TO_OKLAB: [[f32; 3]; 3] = [
    [0.210_454_255_3,  0.793_617_785_0, -0.004_072_046_8],
    [1.977_998_495_1, -2.428_592_205_0,  0.450_593_709_9],
    [0.025_904_037_1,  0.782_771_766_2, -0.808_675_766_0],
];

/// OKLab to non-linear LMS.
#[rustfmt::skip]
pub const OKLAB_TO_LMS: [[f32; 3]; 3] = [
    [1.0,  0.396_337_777_4,  0.215_803_757_3],
    [1.0, -0.105_561_345_8, -0.063_854_172_8],
    [1.0, -0.089_484_177_5, -1.291_485_548_0],
];

/// LMS cone response to linear sRGB.
#[rustfmt::skip]
pub const LMS_TO_LINEAR_SRGB: [[f32; 3]; 3] = [
    [ 4.076_741_662_1, -3.307_711_591_3,  0.230_969_929_2],
    [-1.268_438_004_6,  2.609_757_401_1, -0.341_319_396_5],
    [-0.004_196_086_3, -0.703_418_614_7,  1.707_614_701_0],
];

/// Applies a 3x3 matrix to a color triple.
#[inline]
pub fn apply_matrix(x: f32, y: f32, z: f32, matrix: &[[f32; 3]; 3]) -> (f32, f32, f32) {
    (
        matrix[0][0] * x + matrix[0][1] * y + matrix[0][2] * z,
        matrix[1][0] * x + matrix[1][1] * y + matrix[1][2] * z,
        matrix[2][0] * x + matrix[2][1] * y + matrix[2][2] * z,
    )
}

/// Converts linear sRGB to OKLab.
#[inline]
pub fn linear_srgb_to_oklab(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let (l, m, s) = apply_matrix(r, g, b, &LINEAR_SRGB_TO_LMS);
    apply_matrix(l.cbrt(), m.cbrt(), s.cbrt(), &LMS_TO_OKLAB)
}

/// Converts OKLab to linear sRGB. Out-of-gamut results are not clamped.
#[inline]
pub fn oklab_to_linear_srgb(l: f32, a: f32, b: f32) -> (f32, f32, f32) {
    let (l_, m_, s_) = apply_matrix(l, a, b, &OKLAB_TO_LMS);
    apply_matrix(l_ * l_ * l_, m_ * m_ * m_, s_ * s_ * s_, &LMS_TO_LINEAR_SRGB)
}

/// Converts an 8-bit sRGB pixel to OKLab `(L, a, b)`.
#[inline]
pub fn srgb8_to_oklab(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    linear_srgb_to_oklab(srgb8_to_linear(r), srgb8_to_linear(g), srgb8_to_linear(b))
}

/// Converts OKLab `(L, a, b)` to an 8-bit sRGB pixel, clamping to gamut.
#[inline]
pub fn oklab_to_srgb8(l: f32, a: f32, b: f32) -> (u8, u8, u8) {
    let (r, g, bl) = oklab_to_linear_srgb(l, a, b);
    (linear_to_srgb8(r), linear_to_srgb8(g), linear_to_srgb8(bl))
}

/// Chroma (distance from the neutral axis).
#[inline]
pub fn chroma(a: f32, b: f32) -> f32 {
    (a * a + b * b).sqrt()
}
