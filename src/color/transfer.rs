//! sRGB transfer functions.

/// sRGB transfer function threshold.
const SRGB_THRESHOLD: f32 = 0.04045;
const SRGB_LINEAR_THRESHOLD: f32 = 0.0031308;
const SRGB_LINEAR_SCALE: f32 = 12.92;
const SRGB_GAMMA: f32 = 2.4;
const SRGB_A: f32 = 0.055;

/// Applies the sRGB OETF - linear to sRGB.
#[inline]
pub fn srgb_oetf(linear: f32) -> f32 {
    if linear <= SRGB_LINEAR_THRESHOLD {
        linear * SRGB_LINEAR_SCALE
    } else {
        (1.0 + SRGB_A) * linear.powf(1.0 / SRGB_GAMMA) - SRGB_A
    }
}

/// Applies the inverse sRGB OETF - sRGB to linear.
#[inline]
pub fn srgb_inverse_oetf(srgb: f32) -> f32 {
    if srgb <= SRGB_THRESHOLD {
        srgb / SRGB_LINEAR_SCALE
    } else {
        ((srgb + SRGB_A) / (1.0 + SRGB_A)).powf(SRGB_GAMMA)
    }
}

/// Decodes an 8-bit sRGB channel to linear light.
#[inline]
pub fn srgb8_to_linear(v: u8) -> f32 {
    srgb_inverse_oetf(f32::from(v) / 255.0)
}

/// Encodes linear light to an 8-bit sRGB channel, rounding and clamping.
#[inline]
pub fn linear_to_srgb8(linear: f32) -> u8 {
    let encoded = srgb_oetf(linear.clamp(0.0, 1.0));
    (encoded * 255.0).round().clamp(0.0, 255.0) as u8
}
