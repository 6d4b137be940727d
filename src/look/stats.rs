//! Percentiles, band statistics and per-image summaries.

use crate::buffer::{PixelBuffer, Planes};
use crate::color::chroma;
use crate::types::{BandColor, ChromaDistribution, ExposureLevel, ImageStats, BAND_COUNT};

use super::bands::band_weights;

/// Weights below this mark a band as empty.
pub const EMPTY_BAND_WEIGHT: f32 = 1e-6;

/// Sorts lightness values ascending; NaN sorts last.
pub fn sort_values(values: &mut [f32]) {
    values.sort_unstable_by(f32::total_cmp);
}

/// Percentile `p` (0–100) of an ascending slice, nearest-rank by rounding.
pub fn percentile_sorted(sorted: &[f32], p: f32) -> f32 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f32).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

/// Percentile of the opaque lightness values in `planes`.
pub fn lightness_percentile(planes: &Planes, p: f32) -> f32 {
    let mut values = planes.opaque_lightness();
    sort_values(&mut values);
    percentile_sorted(&values, p)
}

/// Triangular-kernel weighted color of one fixed band.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandStat {
    pub mean_a: f32,
    pub mean_b: f32,
    pub mean_c: f32,
    pub weight: f32,
}

impl BandStat {
    pub fn is_empty(&self) -> bool {
        self.weight < EMPTY_BAND_WEIGHT
    }

    pub fn color(&self) -> BandColor {
        BandColor {
            mean_a: self.mean_a,
            mean_b: self.mean_b,
            mean_c: self.mean_c,
        }
    }
}

/// Five-band weighted means of `(a, b, C)` over opaque pixels.
pub fn band_stats(planes: &Planes) -> [BandStat; BAND_COUNT] {
    let mut sums = [[0.0f64; 4]; BAND_COUNT];
    for i in 0..planes.len() {
        if !planes.is_opaque(i) {
            continue;
        }
        let (a, b) = (planes.a[i], planes.b[i]);
        let c = chroma(a, b);
        for (k, w) in band_weights(planes.l[i]).into_iter().enumerate() {
            if w <= 0.0 {
                continue;
            }
            let w = f64::from(w);
            sums[k][0] += w * f64::from(a);
            sums[k][1] += w * f64::from(b);
            sums[k][2] += w * f64::from(c);
            sums[k][3] += w;
        }
    }

    sums.map(|[sa, sb, sc, sw]| {
        if sw < f64::from(EMPTY_BAND_WEIGHT) {
            BandStat::default()
        } else {
            BandStat {
                mean_a: (sa / sw) as f32,
                mean_b: (sb / sw) as f32,
                mean_c: (sc / sw) as f32,
                weight: sw as f32,
            }
        }
    })
}

/// Median chroma of opaque pixels.
pub fn median_chroma(planes: &Planes) -> f32 {
    let mut values: Vec<f32> = (0..planes.len())
        .filter(|&i| planes.is_opaque(i))
        .map(|i| chroma(planes.a[i], planes.b[i]))
        .collect();
    sort_values(&mut values);
    percentile_sorted(&values, 50.0)
}

/// Exposure and chroma summary of already converted planes; `None` when no
/// pixel is opaque.
pub fn stats_from_planes(planes: &Planes) -> Option<ImageStats> {
    let mut lightness = planes.opaque_lightness();
    if lightness.is_empty() {
        return None;
    }
    sort_values(&mut lightness);

    let (mut sum_a, mut sum_b, mut sum_c) = (0.0f64, 0.0f64, 0.0f64);
    for i in 0..planes.len() {
        if planes.is_opaque(i) {
            sum_a += f64::from(planes.a[i]);
            sum_b += f64::from(planes.b[i]);
            sum_c += f64::from(chroma(planes.a[i], planes.b[i]));
        }
    }
    let n = lightness.len() as f64;

    Some(ImageStats {
        exposure_level: ExposureLevel {
            median_l: percentile_sorted(&lightness, 50.0),
            p05_l: percentile_sorted(&lightness, 5.0),
            p95_l: percentile_sorted(&lightness, 95.0),
        },
        chroma_distribution: ChromaDistribution {
            mean_a: (sum_a / n) as f32,
            mean_b: (sum_b / n) as f32,
            mean_c: (sum_c / n) as f32,
            bands: band_stats(planes).map(|s| s.color()),
        },
    })
}

/// Computes exposure and chroma statistics of an image.
pub fn compute_image_stats(image: &PixelBuffer) -> Option<ImageStats> {
    stats_from_planes(&Planes::from_buffer(image))
}
