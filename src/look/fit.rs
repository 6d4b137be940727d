//! Reference fitting: derives a `LookParams` model from one image.
//!
//! The reference is analysed in OKLab. Lightness percentiles drive the
//! tone model and black-point heuristics, coarse lightness bins drive the
//! shadow/highlight saturation shape, and 16-band and 5-band statistics
//! drive the tint curve and the literal band-matching targets.

use tracing::{debug, trace};

use crate::buffer::{PixelBuffer, Planes};
use crate::color::chroma;
use crate::heuristics::{adjust_selected, HeuristicsContext, LearnedHeuristics};
use crate::limits;
use crate::types::{
    AbOffset, BandColor, CurvePoint, LookParams, MatchParams, SaturationAnchor, TintAnchor, Tone,
    BAND_COUNT,
};

use super::bands::{band_center, band_index, CURVE_BANDS};
use super::filter::midtone_micro_contrast;
use super::stats::{band_stats, percentile_sorted, sort_values, stats_from_planes};

/// Above this p95 the reference counts as blown out.
const BLOWN_HIGHLIGHT_P95: f32 = 0.92;
/// Tone-curve output ceiling used for blown-out references.
const BLOWN_HIGHLIGHT_CEILING: f32 = 0.95;

/// Input anchors of the fitted tone curve and the reference percentiles
/// they map to. Shadows are sampled more densely.
const CURVE_INPUTS: [f32; 8] = [0.0, 0.02, 0.05, 0.10, 0.25, 0.50, 0.75, 1.0];
const CURVE_PERCENTILES: [f32; 8] = [0.5, 2.0, 5.0, 10.0, 25.0, 50.0, 75.0, 99.5];

const LIGHTNESS_BINS: usize = 10;
/// Bands with fewer samples fall back to neutral.
const MIN_BAND_SAMPLES: usize = 8;

/// A global cast beyond this magnitude counts as clearly warm/cool or
/// clearly green/magenta.
const CLEAR_CAST: f32 = 0.012;
/// Damping of a band deviation that would flip a clear cast on the b axis.
const FLIP_DAMPING_B: f32 = 0.25;
/// Damping of a band deviation that would flip a clear cast on the a axis.
const FLIP_DAMPING_A: f32 = 0.4;
const MAX_TINT_DEVIATION: f32 = 0.06;
const TINT_SCALE: f32 = 0.8;
const SATURATION_CURVE_SOFTNESS: f32 = 0.75;

/// Chroma of a "normally saturated" image.
pub const NEUTRAL_CHROMA: f32 = 0.10;
/// References with a `refSaturation` below this count as muted.
pub const MUTED_REFERENCE_SATURATION: f32 = 0.6;

/// Opaque pixel samples of the reference.
struct Samples {
    l: Vec<f32>,
    a: Vec<f32>,
    b: Vec<f32>,
    c: Vec<f32>,
}

impl Samples {
    fn collect(planes: &Planes) -> Self {
        let n = planes.opaque_count();
        let mut samples = Self {
            l: Vec::with_capacity(n),
            a: Vec::with_capacity(n),
            b: Vec::with_capacity(n),
            c: Vec::with_capacity(n),
        };
        for i in 0..planes.len() {
            if !planes.is_opaque(i) {
                continue;
            }
            samples.l.push(planes.l[i]);
            samples.a.push(planes.a[i]);
            samples.b.push(planes.b[i]);
            samples.c.push(chroma(planes.a[i], planes.b[i]));
        }
        samples
    }

    fn len(&self) -> usize {
        self.l.len()
    }

    fn is_empty(&self) -> bool {
        self.l.is_empty()
    }

    fn mean(values: &[f32]) -> f32 {
        if values.is_empty() {
            return 0.0;
        }
        (values.iter().map(|&v| f64::from(v)).sum::<f64>() / values.len() as f64) as f32
    }
}

/// Running sums for one lightness bin or band.
#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    l: f64,
    a: f64,
    b: f64,
    c: f64,
    count: usize,
}

impl Accumulator {
    fn add(&mut self, l: f32, a: f32, b: f32, c: f32) {
        self.l += f64::from(l);
        self.a += f64::from(a);
        self.b += f64::from(b);
        self.c += f64::from(c);
        self.count += 1;
    }

    fn mean_l(&self) -> f32 {
        self.mean(self.l)
    }

    fn mean_a(&self) -> f32 {
        self.mean(self.a)
    }

    fn mean_b(&self) -> f32 {
        self.mean(self.b)
    }

    fn mean_c(&self) -> f32 {
        self.mean(self.c)
    }

    fn mean(&self, sum: f64) -> f32 {
        if self.count == 0 {
            0.0
        } else {
            (sum / self.count as f64) as f32
        }
    }
}

/// Shadow/highlight saturation and density ratios against the mid band.
#[derive(Debug, Clone, Copy)]
struct RolloffFit {
    shadow_saturation: f32,
    highlight_saturation: f32,
    shadow_density: f32,
    highlight_density: f32,
    mid_chroma: f32,
}

/// Fits a look model to a reference image.
///
/// Images without opaque pixels yield the neutral default model. When a
/// learned-heuristics table is supplied, only the black-point strength and
/// range are adjusted here; the remaining match parameters are adapted at
/// apply time once the source is known.
pub fn fit_reference(reference: &PixelBuffer, heuristics: Option<&LearnedHeuristics>) -> LookParams {
    let planes = Planes::from_buffer(reference);
    let samples = Samples::collect(&planes);
    if samples.is_empty() {
        debug!("reference has no opaque pixels, using neutral look");
        return LookParams::default();
    }

    let mut sorted_l = samples.l.clone();
    sort_values(&mut sorted_l);
    let pct = |p: f32| percentile_sorted(&sorted_l, p);
    let (p2, p5, p25, p50, p95) = (pct(2.0), pct(5.0), pct(25.0), pct(50.0), pct(95.0));
    let black = p2.min(p5);
    let ceiling = if p95 > BLOWN_HIGHLIGHT_P95 {
        BLOWN_HIGHLIGHT_CEILING
    } else {
        1.0
    };
    debug!(p2, p5, p25, p50, p75 = pct(75.0), p95, black, ceiling, "reference lightness percentiles");

    let global_a = Samples::mean(&samples.a);
    let global_b = Samples::mean(&samples.b);
    let rolloff = fit_rolloff(&samples, pct(30.0), pct(70.0));
    let (shadow_tint, highlight_tint) = fit_split_tint(&samples, global_a, global_b);

    let ref_saturation = limits::REF_SATURATION.clamp(pct_of(&samples.c, 50.0) / NEUTRAL_CHROMA);
    let micro_contrast = midtone_micro_contrast(&planes.l, &planes.mask, planes.width, planes.height);
    let (black_strength, black_range) = black_regime(black, p25);

    let mut match_params = MatchParams {
        black_strength,
        black_range,
        ..MatchParams::default()
    };
    if let Some(table) = heuristics {
        let stats = stats_from_planes(&planes);
        let context = HeuristicsContext::from_stats(None, stats.as_ref(), None);
        match_params = adjust_selected(&match_params, Some(table), &context, &["blackStrength", "blackRange"]);
        debug!(
            black_strength = match_params.black_strength,
            black_range = match_params.black_range,
            "black heuristics adjusted from learned table"
        );
    }

    LookParams {
        tone: fit_tone(black, p50, p95),
        shadow_contrast: fit_shadow_contrast(black, p25, p50),
        warmth: limits::GLOBAL_TINT.clamp(global_b),
        tint: limits::GLOBAL_TINT.clamp(global_a),
        shadow_tint,
        highlight_tint,
        shadow_saturation: rolloff.shadow_saturation,
        highlight_saturation: rolloff.highlight_saturation,
        shadow_density: rolloff.shadow_density,
        highlight_density: rolloff.highlight_density,
        tone_curve: Some(fit_tone_curve(&sorted_l, ceiling)),
        tint_by_l: Some(fit_tint_curve(&samples, global_a, global_b)),
        saturation_by_l: Some(fit_saturation_curve(&samples, rolloff.mid_chroma)),
        color_match_bands: Some(fit_match_bands(&planes, &samples, global_a, global_b)),
        ref_saturation: Some(ref_saturation),
        micro_contrast_mid: micro_contrast.map(|v| limits::MICRO_CONTRAST.clamp(v)),
        ref_mid_l: Some(p50),
        ref_black_l: Some(black),
        match_params,
        ..LookParams::default()
    }
    .sanitized()
}

fn pct_of(values: &[f32], p: f32) -> f32 {
    let mut sorted = values.to_vec();
    sort_values(&mut sorted);
    percentile_sorted(&sorted, p)
}

/// Lift from the black anchor, gain from p95 and gamma that maps 0.5 onto
/// the reference median.
fn fit_tone(black: f32, p50: f32, p95: f32) -> Tone {
    let lift = limits::LIFT.clamp((black - 0.02) * 0.6);
    let gain = limits::GAIN.clamp(p95 / 0.95);
    let target = ((p50 - lift) / (gain - lift).max(1e-3)).clamp(0.05, 0.95);
    let gamma = limits::GAMMA.clamp(0.5f32.ln() / target.ln());
    Tone { lift, gamma, gain }
}

/// Toe power: compressed shadows (small p25 spread) steepen the toe.
fn fit_shadow_contrast(black: f32, p25: f32, p50: f32) -> f32 {
    let ratio = (p25 - black) / (p50 - black).max(1e-3);
    limits::SHADOW_CONTRAST.clamp(1.0 + (0.45 - ratio) * 1.2)
}

fn fit_rolloff(samples: &Samples, p30: f32, p70: f32) -> RolloffFit {
    let mut bins = [Accumulator::default(); LIGHTNESS_BINS];
    let mut mid = Accumulator::default();
    for i in 0..samples.len() {
        let (l, a, b, c) = (samples.l[i], samples.a[i], samples.b[i], samples.c[i]);
        bins[band_index(l, LIGHTNESS_BINS)].add(l, a, b, c);
        if l >= p30 && l <= p70 {
            mid.add(l, a, b, c);
        }
    }

    let mid_c = mid.mean_c();
    let density = |acc: &Accumulator| acc.mean_c() / acc.mean_l().max(0.02);
    let mid_density = density(&mid);

    let saturation_ratio = |acc: &Accumulator| {
        if acc.count == 0 || mid_c < 1e-4 {
            1.0
        } else {
            limits::SATURATION_ROLLOFF.clamp(acc.mean_c() / mid_c)
        }
    };
    let density_ratio = |acc: &Accumulator| {
        if acc.count == 0 || mid_density < 1e-4 {
            1.0
        } else {
            limits::DENSITY_RATIO.clamp(density(acc) / mid_density)
        }
    };

    let fit = RolloffFit {
        shadow_saturation: saturation_ratio(&bins[0]),
        highlight_saturation: saturation_ratio(&bins[LIGHTNESS_BINS - 1]),
        shadow_density: density_ratio(&bins[0]),
        highlight_density: density_ratio(&bins[LIGHTNESS_BINS - 1]),
        mid_chroma: mid_c,
    };
    trace!(?fit, "saturation rolloff");
    fit
}

/// Mean cast of shadows (L < 0.3) and highlights (L > 0.7) relative to the
/// global cast.
fn fit_split_tint(samples: &Samples, global_a: f32, global_b: f32) -> (AbOffset, AbOffset) {
    let mut shadows = Accumulator::default();
    let mut highlights = Accumulator::default();
    for i in 0..samples.len() {
        let (l, a, b, c) = (samples.l[i], samples.a[i], samples.b[i], samples.c[i]);
        if l < 0.3 {
            shadows.add(l, a, b, c);
        } else if l > 0.7 {
            highlights.add(l, a, b, c);
        }
    }
    let offset = |acc: &Accumulator| {
        if acc.count < MIN_BAND_SAMPLES {
            AbOffset::default()
        } else {
            AbOffset {
                a: limits::SPLIT_TINT.clamp(acc.mean_a() - global_a),
                b: limits::SPLIT_TINT.clamp(acc.mean_b() - global_b),
            }
        }
    };
    (offset(&shadows), offset(&highlights))
}

/// Samples reference percentiles at fixed input anchors, capped at the
/// highlight ceiling and forced non-decreasing.
fn fit_tone_curve(sorted_l: &[f32], ceiling: f32) -> Vec<CurvePoint> {
    let mut last = 0.0f32;
    CURVE_INPUTS
        .iter()
        .zip(CURVE_PERCENTILES)
        .map(|(&x, p)| {
            let y = percentile_sorted(sorted_l, p).clamp(0.0, ceiling).max(last);
            last = y;
            CurvePoint(x, y)
        })
        .collect()
}

/// Damps a band deviation that would flip the sign of a clear global cast.
fn damp_flip(global: f32, deviation: f32, damping: f32) -> f32 {
    let flips = (global > CLEAR_CAST && global + deviation < 0.0)
        || (global < -CLEAR_CAST && global + deviation > 0.0);
    if flips {
        deviation * damping
    } else {
        deviation
    }
}

/// 16-band tint curve: each band's deviation from the global cast, with
/// anti-flip damping and a length clamp.
fn fit_tint_curve(samples: &Samples, global_a: f32, global_b: f32) -> Vec<TintAnchor> {
    let mut bands = [Accumulator::default(); CURVE_BANDS];
    for i in 0..samples.len() {
        let l = samples.l[i];
        bands[band_index(l, CURVE_BANDS)].add(l, samples.a[i], samples.b[i], samples.c[i]);
    }

    bands
        .iter()
        .enumerate()
        .map(|(k, acc)| {
            let center = band_center(k, CURVE_BANDS);
            if acc.count < MIN_BAND_SAMPLES {
                return TintAnchor(center, 0.0, 0.0);
            }
            let da = damp_flip(global_a, acc.mean_a() - global_a, FLIP_DAMPING_A);
            let db = damp_flip(global_b, acc.mean_b() - global_b, FLIP_DAMPING_B);
            let len = chroma(da, db);
            let shrink = if len > MAX_TINT_DEVIATION {
                MAX_TINT_DEVIATION / len
            } else {
                1.0
            };
            TintAnchor(center, da * shrink * TINT_SCALE, db * shrink * TINT_SCALE)
        })
        .collect()
}

/// 16-band chroma multipliers normalized against mid-band chroma.
fn fit_saturation_curve(samples: &Samples, mid_chroma: f32) -> Vec<SaturationAnchor> {
    let mut bands = [Accumulator::default(); CURVE_BANDS];
    for i in 0..samples.len() {
        let l = samples.l[i];
        bands[band_index(l, CURVE_BANDS)].add(l, samples.a[i], samples.b[i], samples.c[i]);
    }

    bands
        .iter()
        .enumerate()
        .map(|(k, acc)| {
            let center = band_center(k, CURVE_BANDS);
            if acc.count < MIN_BAND_SAMPLES || mid_chroma < 1e-4 {
                return SaturationAnchor(center, 1.0);
            }
            let ratio = acc.mean_c() / mid_chroma;
            let scale = 1.0 + (ratio - 1.0) * SATURATION_CURVE_SOFTNESS;
            SaturationAnchor(center, limits::SATURATION_BY_L.clamp(scale))
        })
        .collect()
}

/// Five-anchor reference colors; empty bands take the global means.
fn fit_match_bands(planes: &Planes, samples: &Samples, global_a: f32, global_b: f32) -> [BandColor; BAND_COUNT] {
    let global_c = Samples::mean(&samples.c);
    band_stats(planes).map(|stat| {
        if stat.is_empty() {
            BandColor {
                mean_a: global_a,
                mean_b: global_b,
                mean_c: global_c,
            }
        } else {
            stat.color()
        }
    })
}

/// Black-point strength and range from the depth and tightness of the
/// reference shadows.
fn black_regime(depth: f32, p25: f32) -> (f32, f32) {
    let spread = p25 - depth;
    let (strength, range) = if depth < 0.03 && spread < 0.12 {
        // very deep and tight
        (2.4, 0.45)
    } else if depth < 0.06 && spread < 0.2 {
        (1.8, 0.5)
    } else if depth < 0.10 {
        (1.2, 0.55)
    } else if depth < 0.16 {
        (0.8, 0.6)
    } else {
        // lifted
        (0.5, 0.7)
    };
    (
        limits::BLACK_STRENGTH.clamp(strength),
        limits::BLACK_RANGE.clamp(range),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::{BucketDelta, ParamHeuristics};
    use std::collections::BTreeMap;

    /// Horizontal gradient between two colors.
    fn gradient(width: u32, height: u32, from: [u8; 3], to: [u8; 3]) -> PixelBuffer {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..height {
            for x in 0..width {
                let t = x as f32 / (width - 1) as f32;
                for c in 0..3 {
                    let v = f32::from(from[c]) + (f32::from(to[c]) - f32::from(from[c])) * t;
                    data.push(v.round() as u8);
                }
                data.push(255);
            }
        }
        PixelBuffer::new(width, height, data).unwrap()
    }

    #[test]
    fn test_transparent_reference_is_neutral() {
        let img = PixelBuffer::filled(8, 8, [200, 100, 50, 0]).unwrap();
        assert_eq!(fit_reference(&img, None), LookParams::default());
    }

    #[test]
    fn test_warm_reference_fits_positive_warmth() {
        let img = gradient(64, 8, [40, 25, 10], [250, 220, 170]);
        let look = fit_reference(&img, None);
        assert!(look.warmth > 0.01, "warmth {}", look.warmth);
        let bands = look.color_match_bands.unwrap();
        assert!(bands.iter().all(|b| b.mean_b > 0.0));
        assert_eq!(look.tint_by_l.as_ref().unwrap().len(), CURVE_BANDS);
        assert_eq!(look.saturation_by_l.as_ref().unwrap().len(), CURVE_BANDS);
    }

    #[test]
    fn test_tone_curve_is_monotone_with_eight_anchors() {
        let img = gradient(128, 4, [0, 0, 0], [255, 255, 255]);
        let curve = fit_reference(&img, None).tone_curve.unwrap();
        assert_eq!(curve.len(), 8);
        for pair in curve.windows(2) {
            assert!(pair[1].0 > pair[0].0);
            assert!(pair[1].1 >= pair[0].1);
        }
    }

    #[test]
    fn test_blown_reference_caps_curve() {
        let img = PixelBuffer::filled(16, 16, [255, 255, 255, 255]).unwrap();
        let curve = fit_reference(&img, None).tone_curve.unwrap();
        assert!(curve.iter().all(|p| p.1 <= BLOWN_HIGHLIGHT_CEILING + 1e-6));
    }

    #[test]
    fn test_flat_reference_stays_in_range() {
        for color in [[0, 0, 0], [255, 255, 255], [255, 0, 0], [0, 0, 255], [128, 128, 128]] {
            let img = PixelBuffer::filled(8, 8, [color[0], color[1], color[2], 255]).unwrap();
            let look = fit_reference(&img, None);
            assert_eq!(look, look.sanitized(), "fit for {color:?} is out of range");
            let sat = look.ref_saturation.unwrap();
            assert!((0.1..=2.5).contains(&sat));
            assert!(look.tone.gamma.is_finite());
        }
    }

    #[test]
    fn test_damp_flip() {
        assert_eq!(damp_flip(0.03, -0.05, 0.25), -0.05 * 0.25);
        assert_eq!(damp_flip(0.03, -0.01, 0.25), -0.01);
        assert_eq!(damp_flip(0.005, -0.05, 0.25), -0.05);
        assert_eq!(damp_flip(-0.03, 0.05, 0.4), 0.05 * 0.4);
    }

    #[test]
    fn test_black_regimes() {
        assert_eq!(black_regime(0.01, 0.08), (2.4, 0.45));
        assert_eq!(black_regime(0.05, 0.2), (1.8, 0.5));
        assert_eq!(black_regime(0.08, 0.5), (1.2, 0.55));
        assert_eq!(black_regime(0.12, 0.5), (0.8, 0.6));
        assert_eq!(black_regime(0.3, 0.5), (0.5, 0.7));
    }

    #[test]
    fn test_tone_fit_neutral_for_uniform_distribution() {
        let tone = fit_tone(0.02, 0.5, 0.95);
        assert!(tone.lift.abs() < 1e-6);
        assert!((tone.gain - 1.0).abs() < 1e-6);
        assert!((tone.gamma - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_heuristics_only_touch_black_params() {
        let img = gradient(64, 8, [10, 10, 10], [240, 240, 240]);
        let plain = fit_reference(&img, None);

        let mut params = BTreeMap::new();
        for name in ["blackStrength", "lumaStrength"] {
            params.insert(
                name.to_string(),
                ParamHeuristics {
                    global: Some(BucketDelta {
                        mean_delta: 1.0,
                        count: 97,
                    }),
                    buckets: BTreeMap::new(),
                },
            );
        }
        let table = LearnedHeuristics { params };
        let adjusted = fit_reference(&img, Some(&table));

        let expected = plain.match_params.black_strength + 0.97;
        assert!((adjusted.match_params.black_strength - expected).abs() < 1e-4);
        assert_eq!(adjusted.match_params.luma_strength, plain.match_params.luma_strength);
    }
}
