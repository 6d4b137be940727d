//! Highlight bloom ("halation"): softens and warms the brightest, most
//! specular highlights.
//!
//! Detection runs on a box-downscaled lightness grid. Cells above the 95th
//! percentile (and never below 0.85) are candidates; their 3×3 local
//! variance measures how specular they are. The resulting weight map is
//! upsampled back to full resolution and only pixels that are themselves
//! above the threshold are touched.

use tracing::{debug, trace};

use crate::buffer::{PixelBuffer, Planes};
use crate::color::oklab_to_srgb8;
use crate::types::HighlightFill;

use super::filter::{bilinear_upsample, box_downscale, downscale_factor, local_variance_3x3};
use super::stats::{percentile_sorted, sort_values};

/// Lowest lightness ever treated as a highlight.
const MIN_HIGHLIGHT: f32 = 0.85;
/// Weight of a flat (non-specular) highlight.
const BASE_WEIGHT: f32 = 0.3;
const CHROMA_COLLAPSE: f32 = 0.4;
const WARM_A: f32 = 0.02;
const WARM_B: f32 = 0.025;
const LIGHTNESS_LIFT: f32 = 0.04;

/// Applies the highlight bloom. Returns the input unchanged when the
/// strength is zero or nothing qualifies as a highlight.
pub fn apply_halation(image: &PixelBuffer, fill: &HighlightFill) -> PixelBuffer {
    let fill = fill.clamped();
    if !fill.is_active() {
        return image.clone();
    }
    let planes = Planes::from_buffer(image);
    let (width, height) = (planes.width, planes.height);

    let factor = downscale_factor(width, height);
    let small = box_downscale(&planes.l, &planes.mask, width, height, factor);
    let mut cells: Vec<f32> = small
        .values
        .iter()
        .zip(&small.mask)
        .filter(|(_, m)| **m > 0.0)
        .map(|(v, _)| *v)
        .collect();
    if cells.is_empty() {
        return image.clone();
    }
    sort_values(&mut cells);
    let threshold = percentile_sorted(&cells, 95.0).max(MIN_HIGHLIGHT);
    if !cells.iter().any(|&v| v > threshold) {
        debug!(threshold, "no highlights above threshold");
        return image.clone();
    }

    let variance = local_variance_3x3(&small.values, &small.mask, small.width, small.height);
    let max_variance = variance
        .iter()
        .zip(&small.values)
        .filter(|(_, v)| **v > threshold)
        .map(|(var, _)| *var)
        .fold(0.0f32, f32::max);
    let weights: Vec<f32> = variance
        .iter()
        .zip(&small.values)
        .map(|(&var, &v)| {
            if v <= threshold {
                return 0.0;
            }
            let specular = if max_variance < 1e-9 { 0.0 } else { (var / max_variance).min(1.0) };
            BASE_WEIGHT + (1.0 - BASE_WEIGHT) * specular
        })
        .collect();
    let weights = bilinear_upsample(&small, &weights, width, height, factor);
    debug!(factor, threshold, max_variance, strength = fill.strength, "halation");

    let mut data = image.data().to_vec();
    let mut touched = 0usize;
    for (i, px) in data.chunks_exact_mut(4).enumerate() {
        if !planes.is_opaque(i) || planes.l[i] <= threshold {
            continue;
        }
        let effect = fill.strength * weights[i];
        let collapse = 1.0 - CHROMA_COLLAPSE * effect;
        let l = (planes.l[i] + LIGHTNESS_LIFT * effect).min(1.0);
        let a = planes.a[i] * collapse + WARM_A * fill.warmth * effect;
        let b = planes.b[i] * collapse + WARM_B * fill.warmth * effect;
        let (r, g, bl) = oklab_to_srgb8(l, a, b);
        px[0] = r;
        px[1] = g;
        px[2] = bl;
        touched += 1;
    }
    trace!(touched, "highlight pixels bloomed");
    image.with_data(data)
}
