//! Lightness band kernels.
//!
//! Two band systems are used: five fixed anchors for literal band-to-band
//! color matching and manual overrides, and N equal-width bands for the
//! smoother fitted tint and saturation curves.

use crate::types::BAND_COUNT;

/// Centers of the five color-matching bands.
pub const BAND_ANCHORS: [f32; BAND_COUNT] = [0.08, 0.25, 0.5, 0.7, 0.9];

/// Number of equal-width bands in the fitted tint/saturation curves.
pub const CURVE_BANDS: usize = 16;

/// Triangular weights of `l` over the five fixed anchors.
///
/// Each weight falls off linearly from its anchor and reaches zero at the
/// neighbouring anchor; below the first and above the last anchor the end
/// band takes full weight. Weights are non-negative and sum to one.
pub fn band_weights(l: f32) -> [f32; BAND_COUNT] {
    let l = if l.is_finite() { l.clamp(0.0, 1.0) } else { 0.5 };
    let mut weights = [0.0; BAND_COUNT];

    if l <= BAND_ANCHORS[0] {
        weights[0] = 1.0;
        return weights;
    }
    if l >= BAND_ANCHORS[BAND_COUNT - 1] {
        weights[BAND_COUNT - 1] = 1.0;
        return weights;
    }
    for k in 0..BAND_COUNT - 1 {
        let (lo, hi) = (BAND_ANCHORS[k], BAND_ANCHORS[k + 1]);
        if l <= hi {
            let t = (l - lo) / (hi - lo);
            weights[k] = 1.0 - t;
            weights[k + 1] = t;
            break;
        }
    }
    weights
}

/// Weighted sum of per-band values at lightness `l`.
#[inline]
pub fn blend_bands(l: f32, values: &[f32; BAND_COUNT]) -> f32 {
    band_weights(l)
        .iter()
        .zip(values)
        .map(|(w, v)| w * v)
        .sum()
}

/// Index of the equal-width band containing `l`.
#[inline]
pub fn band_index(l: f32, count: usize) -> usize {
    ((l.max(0.0) * count as f32) as usize).min(count - 1)
}

/// Center lightness of equal-width band `index`.
#[inline]
pub fn band_center(index: usize, count: usize) -> f32 {
    (index as f32 + 0.5) / count as f32
}

/// Narrow triangular weight centered on `center` with the given half-width.
#[inline]
pub fn narrow_weight(l: f32, center: f32, half_width: f32) -> f32 {
    (1.0 - (l - center).abs() / half_width).max(0.0)
}

/// Piecewise-linear interpolation through `(x, y)` points sorted by `x`,
/// holding the end values outside the covered range.
pub fn piecewise_linear(x: f32, points: &[(f32, f32)]) -> f32 {
    let Some(&(first_x, first_y)) = points.first() else {
        return x;
    };
    if x <= first_x {
        return first_y;
    }
    for pair in points.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if x <= x1 {
            let span = x1 - x0;
            if span <= 1e-9 {
                return y1;
            }
            return y0 + (y1 - y0) * (x - x0) / span;
        }
    }
    points[points.len() - 1].1
}
