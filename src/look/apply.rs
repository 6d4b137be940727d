//! Applies a fitted look to a source image.
//!
//! Grading runs in two stages on OKLab planes. The luma stage moves
//! exposure, maps tone, aligns blacks and matches mid-tone micro-contrast;
//! the color stage rescales chroma and shifts the opponent axes with the
//! richest color model the look carries, then blends by color strength and
//! layers the manual per-band adjustments on top.

use std::f32::consts::PI;

use tracing::{debug, trace};

use crate::buffer::{PixelBuffer, Planes};
use crate::color::chroma;
use crate::limits;
use crate::types::{BandColor, ColorBandOverrides, LookParams, TintAnchor, Tone, BAND_COUNT};

use super::bands::{band_weights, blend_bands, narrow_weight, piecewise_linear};
use super::filter::{detail_rms, film_blur};
use super::fit::{MUTED_REFERENCE_SATURATION, NEUTRAL_CHROMA};
use super::stats::{band_stats, lightness_percentile, median_chroma, BandStat};

/// Upper end of the shadow toe.
const TOE_PIVOT: f32 = 0.4;
const MAX_EXPOSURE_SHIFT: f32 = 0.6;
const MAX_BLACK_SHIFT: f32 = 0.3;
/// How far below the black anchor the 5th percentile may be pushed.
const BLACK_FLOOR_MARGIN: f32 = 0.03;
/// Black ranges at or above this use a linear falloff.
const LINEAR_BLACK_RANGE: f32 = 0.8;
/// Black anchors below this count as crushed.
const CRUSHED_BLACK: f32 = 0.04;

const MAX_BAND_SHIFT: f32 = 0.16;
const BAND_CAST: f32 = 0.02;
/// Source bands with less mean chroma have no hue to rescale against.
const NEUTRAL_BAND_CHROMA: f32 = 0.02;
const MIN_TARGET_RATIO: f32 = 0.4;
const MAX_TARGET_RATIO: f32 = 2.2;
const MAX_HUE_ROTATION: f32 = PI / 6.0;

/// Tone model selected from the look.
#[derive(Debug, Clone, PartialEq)]
pub enum ToneModel {
    /// Multi-segment curve through `(L_in, L_out)` anchors.
    Curve(Vec<(f32, f32)>),
    /// Lift/gamma/gain with a toe power below `TOE_PIVOT`.
    Parametric { tone: Tone, shadow_contrast: f32 },
}

impl ToneModel {
    pub fn from_look(look: &LookParams) -> Self {
        match &look.tone_curve {
            Some(points) if points.len() >= 2 => {
                Self::Curve(points.iter().map(|p| (p.0, p.1)).collect())
            }
            _ => Self::Parametric {
                tone: look.tone,
                shadow_contrast: look.shadow_contrast,
            },
        }
    }

    /// Maps one lightness value.
    pub fn map(&self, l: f32) -> f32 {
        let x = l.clamp(0.0, 1.0);
        let y = match self {
            Self::Curve(points) => piecewise_linear(x, points),
            Self::Parametric {
                tone,
                shadow_contrast,
            } => {
                let toed = if x < TOE_PIVOT && (shadow_contrast - 1.0).abs() > f32::EPSILON {
                    TOE_PIVOT * (x.max(0.001) / TOE_PIVOT).powf(*shadow_contrast)
                } else {
                    x
                };
                tone.lift + (tone.gain - tone.lift) * toed.max(0.001).powf(1.0 / tone.gamma)
            }
        };
        y.clamp(0.0, 1.0)
    }
}

/// Color model selected from the look, richest first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorModel<'a> {
    /// Literal five-band matching of source band colors onto the reference.
    BandMatch(&'a [BandColor; BAND_COUNT]),
    /// Smooth lightness-dependent tint curve.
    TintCurve(&'a [TintAnchor]),
    /// Global tint plus shadow/highlight split tint.
    Flat,
}

impl<'a> ColorModel<'a> {
    pub fn from_look(look: &'a LookParams) -> Self {
        if let Some(bands) = &look.color_match_bands {
            return Self::BandMatch(bands);
        }
        match look.tint_by_l.as_deref() {
            Some(anchors) if !anchors.is_empty() => Self::TintCurve(anchors),
            _ => Self::Flat,
        }
    }
}

/// Source statistics gathered once per call, before grading.
#[derive(Debug, Clone, Copy)]
struct SourceSummary {
    median_l: f32,
    median_chroma: f32,
}

impl SourceSummary {
    fn from_planes(planes: &Planes) -> Self {
        Self {
            median_l: lightness_percentile(planes, 50.0),
            median_chroma: median_chroma(planes),
        }
    }
}

/// Grades `source` with `look`. The look is sanitized first, so any
/// out-of-range value is clamped rather than rejected.
pub fn apply_look(source: &PixelBuffer, look: &LookParams) -> PixelBuffer {
    let look = look.sanitized();
    let mut planes = Planes::from_buffer(source);
    if planes.opaque_count() == 0 {
        debug!("source has no opaque pixels, nothing to grade");
        return planes.to_buffer();
    }

    let summary = SourceSummary::from_planes(&planes);
    let tone = ToneModel::from_look(&look);
    debug!(
        width = planes.width,
        height = planes.height,
        tone_curve = matches!(tone, ToneModel::Curve(_)),
        "applying look"
    );

    apply_luma(&mut planes, &look, &tone, &summary);
    apply_color(&mut planes, &look, &summary);
    if let Some(overrides) = look.color_band_overrides.filter(|o| !o.is_neutral()) {
        apply_band_overrides(&mut planes, &overrides);
    }
    planes.to_buffer()
}

/// Softens strengths above 1 so overshoot stays gentle.
fn soften_overshoot(strength: f32, factor: f32) -> f32 {
    if strength > 1.0 {
        1.0 + (strength - 1.0) * factor
    } else {
        strength
    }
}

fn apply_luma(planes: &mut Planes, look: &LookParams, tone: &ToneModel, summary: &SourceSummary) {
    let params = &look.match_params;
    let shift = look.ref_mid_l.map_or(0.0, |ref_mid| {
        soften_overshoot(params.exposure_strength, 0.5)
            * (ref_mid - summary.median_l).clamp(-MAX_EXPOSURE_SHIFT, MAX_EXPOSURE_SHIFT)
    });
    let luma = soften_overshoot(params.luma_strength, 0.3);
    trace!(shift, luma, "luma stage");

    for i in 0..planes.len() {
        if !planes.is_opaque(i) {
            continue;
        }
        let exposed = (planes.l[i] + shift).clamp(0.0, 1.0);
        let mapped = tone.map(exposed);
        planes.l[i] = (exposed + luma * (mapped - exposed)).clamp(0.0, 1.0);
    }

    align_blacks(planes, look);
    match_micro_contrast(planes, look);
}

fn black_falloff(l: f32, ceiling: f32, linear: bool) -> f32 {
    if l >= ceiling {
        return 0.0;
    }
    let t = 1.0 - l / ceiling;
    if linear {
        t
    } else {
        t * t
    }
}

/// Pulls the 5th lightness percentile toward the black anchor, fading out
/// at `black_range`, without pushing it more than `BLACK_FLOOR_MARGIN`
/// below the anchor.
fn align_blacks(planes: &mut Planes, look: &LookParams) {
    let params = &look.match_params;
    let Some(target) = params.black_point.or(look.ref_black_l) else {
        return;
    };
    let before = lightness_percentile(planes, 5.0);
    let amount = (params.black_strength * (target - before)).clamp(-MAX_BLACK_SHIFT, MAX_BLACK_SHIFT);
    if amount.abs() < 1e-4 {
        return;
    }

    let mut ceiling = params.black_range;
    if target < CRUSHED_BLACK && amount < 0.0 {
        ceiling = (ceiling * 1.25).min(1.0);
    }
    if ceiling <= 1e-4 {
        return;
    }
    let linear = params.black_range >= LINEAR_BLACK_RANGE;

    let original = planes.l.clone();
    for i in 0..planes.len() {
        if planes.is_opaque(i) {
            let l = original[i];
            planes.l[i] = (l + amount * black_falloff(l, ceiling, linear)).clamp(0.0, 1.0);
        }
    }

    // The pull is monotone, so rescaling it moves the p5 pixel exactly onto
    // the floor.
    let floor = (target - BLACK_FLOOR_MARGIN).max(0.0);
    let after = lightness_percentile(planes, 5.0);
    if after < floor {
        let t = if before <= floor {
            0.0
        } else {
            ((before - floor) / (before - after)).clamp(0.0, 1.0)
        };
        for i in 0..planes.len() {
            if planes.is_opaque(i) {
                planes.l[i] = original[i] + t * (planes.l[i] - original[i]);
            }
        }
        trace!(floor, t, "black pull renormalized");
    }
    trace!(target, before, amount, ceiling, "blacks aligned");
}

/// Scales mid-tone detail so its RMS matches the reference.
fn match_micro_contrast(planes: &mut Planes, look: &LookParams) {
    let Some(reference) = look.micro_contrast_mid else {
        return;
    };
    let blurred = film_blur(&planes.l, &planes.mask, planes.width, planes.height);
    let Some(current) = detail_rms(&planes.l, &blurred, &planes.mask, 0.25, 0.75) else {
        return;
    };
    if current < 1e-4 {
        return;
    }
    let ratio = (reference / current).clamp(0.5, 2.0);
    trace!(reference, current, ratio, "micro-contrast");
    for i in 0..planes.len() {
        if planes.is_opaque(i) {
            planes.l[i] = (blurred[i] + ratio * (planes.l[i] - blurred[i])).clamp(0.0, 1.0);
        }
    }
}

#[inline]
fn shadow_weight(l: f32, edge: f32) -> f32 {
    let t = ((edge - l) / edge).clamp(0.0, 1.0);
    t * t
}

#[inline]
fn highlight_weight(l: f32, edge: f32) -> f32 {
    let t = ((l - edge) / (1.0 - edge)).clamp(0.0, 1.0);
    t * t
}

/// Lightness-dependent chroma multiplier used by the curve and flat models.
struct ChromaScale<'a> {
    look: &'a LookParams,
    reference_ratio: f32,
    cap_curve: bool,
}

impl<'a> ChromaScale<'a> {
    fn new(look: &'a LookParams, summary: &SourceSummary) -> Self {
        let reference_ratio = look.ref_saturation.map_or(1.0, |reference| {
            let source = limits::REF_SATURATION.clamp(summary.median_chroma / NEUTRAL_CHROMA);
            (reference / source).clamp(0.5, 2.0)
        });
        Self {
            look,
            reference_ratio,
            // a muted reference must never boost chroma through the curve
            cap_curve: look
                .ref_saturation
                .is_some_and(|r| r < MUTED_REFERENCE_SATURATION),
        }
    }

    fn factor(&self, l: f32) -> f32 {
        let look = self.look;
        let ws = shadow_weight(l, 0.3);
        let wh = highlight_weight(l, 0.7);
        let rolloff = 1.0 + ws * (look.shadow_saturation - 1.0) + wh * (look.highlight_saturation - 1.0);
        let density = 1.0 + ws * (look.shadow_density - 1.0) + wh * (look.highlight_density - 1.0);

        let mut curve = look.saturation_by_l.as_deref().map_or(1.0, |anchors| {
            let points: Vec<(f32, f32)> = anchors.iter().map(|s| (s.0, s.1)).collect();
            piecewise_linear(l, &points)
        });
        if self.cap_curve {
            curve = curve.min(1.0);
        }
        rolloff * curve * self.reference_ratio * density * look.match_params.color_density
    }
}

/// Per-band correction moving one source band onto its reference band.
#[derive(Debug, Clone, Copy, PartialEq)]
struct BandShift {
    da: f32,
    db: f32,
    /// Reference-to-source chroma ratio; `None` for a neutral source band
    ratio: Option<f32>,
}

impl BandShift {
    const NEUTRAL: Self = Self {
        da: 0.0,
        db: 0.0,
        ratio: None,
    };

    fn between(reference: &BandColor, source: &BandStat) -> Self {
        if source.is_empty() {
            return Self::NEUTRAL;
        }
        let da = reference.mean_a - source.mean_a;
        let mut db = reference.mean_b - source.mean_b;
        // Keep warm-on-warm and cool-on-cool from cancelling out.
        if (reference.mean_b > BAND_CAST && source.mean_b > BAND_CAST && db < 0.0)
            || (reference.mean_b < -BAND_CAST && source.mean_b < -BAND_CAST && db > 0.0)
        {
            db *= 0.5;
        }
        let len = chroma(da, db);
        let shrink = if len > MAX_BAND_SHIFT {
            MAX_BAND_SHIFT / len
        } else {
            1.0
        };
        let ratio = (source.mean_c >= NEUTRAL_BAND_CHROMA)
            .then(|| (reference.mean_c / source.mean_c).clamp(0.5, 1.8));
        Self {
            da: da * shrink,
            db: db * shrink,
            ratio,
        }
    }
}

fn band_shifts(reference: &[BandColor; BAND_COUNT], source: &[BandStat; BAND_COUNT]) -> [BandShift; BAND_COUNT] {
    std::array::from_fn(|k| BandShift::between(&reference[k], &source[k]))
}

/// Shifts one pixel's `(a, b)` by the blended band deltas, then rescales
/// its chroma along the new hue onto the blended target chroma.
///
/// `weights` already carry the per-band strengths. Neutral source bands
/// have no chroma ratio; their share of the pixel keeps the shifted chroma.
fn match_band_pixel(a: f32, b: f32, weights: &[f32; BAND_COUNT], shifts: &[BandShift; BAND_COUNT]) -> (f32, f32) {
    let (mut da, mut db, mut dr) = (0.0f32, 0.0f32, 0.0f32);
    let (mut total, mut rated) = (0.0f32, 0.0f32);
    for (&w, shift) in weights.iter().zip(shifts) {
        da += w * shift.da;
        db += w * shift.db;
        total += w;
        if let Some(ratio) = shift.ratio {
            dr += w * (ratio - 1.0);
            rated += w;
        }
    }

    let (sa, sb) = (a + da, b + db);
    let shifted = chroma(sa, sb);
    if shifted < 1e-6 || rated <= 0.0 {
        return (sa, sb);
    }
    let ratio = (1.0 + dr).clamp(MIN_TARGET_RATIO, MAX_TARGET_RATIO);
    let share = (rated / total).min(1.0);
    let target = share * chroma(a, b) * ratio + (1.0 - share) * shifted;
    let rescale = target / shifted;
    (sa * rescale, sb * rescale)
}

/// Normalized narrow-kernel tint at `l`, falling back to the nearest anchor
/// when no kernel covers it.
fn tint_at(anchors: &[TintAnchor], l: f32) -> (f32, f32) {
    let half_width = 0.65 / anchors.len() as f32;
    let (mut ta, mut tb, mut total) = (0.0, 0.0, 0.0);
    for anchor in anchors {
        let w = narrow_weight(l, anchor.0, half_width);
        ta += w * anchor.1;
        tb += w * anchor.2;
        total += w;
    }
    if total > 1e-6 {
        return (ta / total, tb / total);
    }
    anchors
        .iter()
        .min_by(|x, y| (x.0 - l).abs().total_cmp(&(y.0 - l).abs()))
        .map_or((0.0, 0.0), |nearest| (nearest.1, nearest.2))
}

fn apply_color(planes: &mut Planes, look: &LookParams, summary: &SourceSummary) {
    let source_a = planes.a.clone();
    let source_b = planes.b.clone();
    let model = ColorModel::from_look(look);
    let scale = ChromaScale::new(look, summary);

    match model {
        ColorModel::BandMatch(reference) => {
            // measured on the final lightness the band weights below use
            let shifts = band_shifts(reference, &band_stats(planes));
            trace!(?shifts, "band match");
            for i in 0..planes.len() {
                if !planes.is_opaque(i) {
                    continue;
                }
                let l = planes.l[i];
                let factor = scale.factor(l);
                let mut weights = band_weights(l);
                for (w, strength) in weights.iter_mut().zip(look.color_band_strengths) {
                    *w *= strength;
                }
                let (a, b) = match_band_pixel(planes.a[i] * factor, planes.b[i] * factor, &weights, &shifts);
                planes.a[i] = a + 0.25 * look.tint;
                planes.b[i] = b + 0.25 * look.warmth;
            }
        }
        ColorModel::TintCurve(anchors) => {
            let blurred = film_blur(&planes.l, &planes.mask, planes.width, planes.height);
            for i in 0..planes.len() {
                if !planes.is_opaque(i) {
                    continue;
                }
                let l = planes.l[i];
                let factor = scale.factor(l);
                let (ta, tb) = tint_at(anchors, l);
                let band = blend_bands(l, &look.color_band_strengths);
                let local = 1.0 - ((l - blurred[i]).abs() * 4.0).clamp(0.0, 0.3);
                let fade = 1.0 - 0.5 * ((l - 0.85) / 0.15).clamp(0.0, 1.0);
                let boost = 1.0 + 0.25 * ((0.2 - l) / 0.2).clamp(0.0, 1.0);
                let k = band * local * fade * boost;
                planes.a[i] = planes.a[i] * factor + ta * k + 0.35 * look.tint;
                planes.b[i] = planes.b[i] * factor + tb * k + 0.35 * look.warmth;
            }
        }
        ColorModel::Flat => {
            for i in 0..planes.len() {
                if !planes.is_opaque(i) {
                    continue;
                }
                let l = planes.l[i];
                let factor = scale.factor(l);
                let ws = shadow_weight(l, 0.5);
                let wh = highlight_weight(l, 0.5);
                planes.a[i] = planes.a[i] * factor
                    + look.tint
                    + ws * look.shadow_tint.a
                    + wh * look.highlight_tint.a;
                planes.b[i] = planes.b[i] * factor
                    + look.warmth
                    + ws * look.shadow_tint.b
                    + wh * look.highlight_tint.b;
            }
        }
    }

    let strength = look.match_params.color_strength;
    for i in 0..planes.len() {
        if planes.is_opaque(i) {
            planes.a[i] = source_a[i] + strength * (planes.a[i] - source_a[i]);
            planes.b[i] = source_b[i] + strength * (planes.b[i] - source_b[i]);
        }
    }
}

/// Manual hue rotation, chroma scale and lightness offset per band.
fn apply_band_overrides(planes: &mut Planes, overrides: &ColorBandOverrides) {
    for i in 0..planes.len() {
        if !planes.is_opaque(i) {
            continue;
        }
        let l = planes.l[i];
        let hue = blend_bands(l, &overrides.hue) * MAX_HUE_ROTATION;
        let saturation = limits::BAND_SATURATION_APPLIED.clamp(blend_bands(l, &overrides.saturation));
        let luma = limits::BAND_LUMA_APPLIED.clamp(blend_bands(l, &overrides.luma));

        let (sin, cos) = hue.sin_cos();
        let (a, b) = (planes.a[i], planes.b[i]);
        planes.a[i] = (a * cos - b * sin) * saturation;
        planes.b[i] = (a * sin + b * cos) * saturation;
        planes.l[i] = (l + luma).clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::srgb8_to_oklab;
    use crate::look::bands::CURVE_BANDS;
    use crate::look::fit::fit_reference;
    use crate::look::stats::compute_image_stats;
    use crate::types::{CurvePoint, MatchParams, SaturationAnchor};

    fn gray_gradient(width: u32, height: u32, from: u8, to: u8) -> PixelBuffer {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..height {
            for x in 0..width {
                let v = f32::from(from) + (f32::from(to) - f32::from(from)) * x as f32 / (width - 1) as f32;
                let v = v.round() as u8;
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        PixelBuffer::new(width, height, data).unwrap()
    }

    fn warm_reference() -> PixelBuffer {
        let mut data = Vec::new();
        for _ in 0..8 {
            for x in 0..64u32 {
                let t = x as f32 / 63.0;
                let lerp = |a: f32, b: f32| (a + (b - a) * t).round() as u8;
                data.extend_from_slice(&[lerp(40.0, 250.0), lerp(25.0, 220.0), lerp(10.0, 170.0), 255]);
            }
        }
        PixelBuffer::new(64, 8, data).unwrap()
    }

    /// Red-to-green across, increasingly blue downwards.
    fn colorful(size: u32) -> PixelBuffer {
        let mut data = Vec::new();
        for y in 0..size {
            for x in 0..size {
                let r = (x * 255 / (size - 1)) as u8;
                data.extend_from_slice(&[r, 255 - r, (y * 255 / (size - 1)) as u8, 255]);
            }
        }
        PixelBuffer::new(size, size, data).unwrap()
    }

    fn black_look(target: f32, strength: f32, range: f32) -> LookParams {
        LookParams {
            ref_black_l: Some(target),
            match_params: MatchParams {
                black_strength: strength,
                black_range: range,
                ..MatchParams::default()
            },
            ..LookParams::default()
        }
    }

    fn color_grid() -> PixelBuffer {
        let mut data = Vec::new();
        for r in (0..=255u32).step_by(51) {
            for g in (0..=255u32).step_by(51) {
                for b in (0..=255u32).step_by(51) {
                    data.extend_from_slice(&[r as u8, g as u8, b as u8, 255]);
                }
            }
        }
        PixelBuffer::new(36, 6, data).unwrap()
    }

    #[test]
    fn test_default_look_is_identity() {
        let src = color_grid();
        let out = apply_look(&src, &LookParams::default());
        for (i, (a, b)) in src.data().iter().zip(out.data()).enumerate() {
            assert!(
                (i16::from(*a) - i16::from(*b)).abs() <= 1,
                "byte {i}: {a} -> {b}"
            );
        }
    }

    #[test]
    fn test_fully_transparent_source() {
        let src = PixelBuffer::filled(4, 4, [200, 100, 50, 0]).unwrap();
        let look = LookParams {
            warmth: 0.05,
            ..LookParams::default()
        };
        let out = apply_look(&src, &look);
        assert!(out.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_transparent_pixels_keep_alpha() {
        let data = vec![120, 120, 120, 255, 90, 200, 10, 40];
        let src = PixelBuffer::new(2, 1, data).unwrap();
        let out = apply_look(&src, &LookParams::default());
        assert_eq!(out.pixel(1, 0), [0, 0, 0, 40]);
    }

    #[test]
    fn test_black_pull_lands_on_floor() {
        let mut planes = Planes::from_buffer(&gray_gradient(64, 8, 30, 230));
        let before = lightness_percentile(&planes, 5.0);
        align_blacks(&mut planes, &black_look(0.10, 8.0, 1.0));
        let after = lightness_percentile(&planes, 5.0);

        let floor = 0.10 - BLACK_FLOOR_MARGIN;
        assert!(after < before - 0.05, "blacks did not move: {before} -> {after}");
        assert!(after >= floor - 1e-4, "p5 {after} sank below the floor {floor}");
        assert!((after - floor).abs() < 1e-3, "overshoot not renormalized: {after}");
    }

    #[test]
    fn test_crushed_black_widens_quadratic_pull() {
        let mut planes = Planes::from_buffer(&gray_gradient(64, 8, 30, 230));
        let original = planes.l.clone();
        let before = lightness_percentile(&planes, 5.0);
        align_blacks(&mut planes, &black_look(0.02, 8.0, 0.5));
        let after = lightness_percentile(&planes, 5.0);

        // full pull of -0.3 under a quadratic falloff up to 0.5 * 1.25
        let ceiling = 0.625;
        let expected = before - MAX_BLACK_SHIFT * (1.0 - before / ceiling).powi(2);
        assert!((after - expected).abs() < 1e-4, "p5 {after}, expected {expected}");
        assert!(after >= 0.0);

        for (old, new) in original.iter().zip(&planes.l) {
            if *old > 0.52 && *old < 0.6 {
                assert!(new < old, "{old} inside the widened range was not pulled");
            } else if *old >= ceiling {
                assert_eq!(new, old);
            }
        }
    }

    #[test]
    fn test_warm_reference_warms_neutral_source() {
        let reference = warm_reference();
        let source = gray_gradient(64, 8, 30, 220);
        let look = fit_reference(&reference, None);
        let out = apply_look(&source, &look);

        let before = compute_image_stats(&source).unwrap().chroma_distribution.mean_b;
        let after = compute_image_stats(&out).unwrap().chroma_distribution.mean_b;
        assert!(after > before + 0.015, "mean b {before} -> {after}");
    }

    #[test]
    fn test_warm_reference_on_uniform_gray() {
        let mut look = fit_reference(&warm_reference(), None);
        look.match_params.exposure_strength = 0.0;
        look.match_params.black_strength = 0.0;
        let source = PixelBuffer::filled(16, 16, [128, 128, 128, 255]).unwrap();
        let out = apply_look(&source, &look);

        let (l_in, _, b_in) = srgb8_to_oklab(128, 128, 128);
        let px = out.pixel(8, 8);
        let (l_out, _, b_out) = srgb8_to_oklab(px[0], px[1], px[2]);
        let mapped = ToneModel::from_look(&look).map(l_in);
        assert!((l_out - mapped).abs() < 0.01, "L {l_out}, curve gives {mapped}");
        assert!(b_out > b_in + 0.01, "b {b_in} -> {b_out}");
        assert_eq!(out.pixel(0, 0), px);
    }

    #[test]
    fn test_band_match_applies_saturation_model() {
        let source = colorful(16);
        let look = fit_reference(&source, None);
        assert!(look.color_match_bands.is_some());
        let muted = LookParams {
            ref_saturation: Some(0.1),
            saturation_by_l: Some(
                (0..CURVE_BANDS)
                    .map(|k| SaturationAnchor((k as f32 + 0.5) / CURVE_BANDS as f32, 0.3))
                    .collect(),
            ),
            shadow_saturation: 0.3,
            highlight_saturation: 0.3,
            ..look.clone()
        };

        let graded = apply_look(&source, &look);
        let quiet = apply_look(&source, &muted);
        assert_ne!(graded, quiet);
        let chroma_of = |img: &PixelBuffer| compute_image_stats(img).unwrap().chroma_distribution.mean_c;
        assert!(
            chroma_of(&quiet) < 0.7 * chroma_of(&graded),
            "{} vs {}",
            chroma_of(&quiet),
            chroma_of(&graded)
        );
    }

    fn uniform_shifts(da: f32, db: f32, ratio: Option<f32>) -> [BandShift; BAND_COUNT] {
        [BandShift { da, db, ratio }; BAND_COUNT]
    }

    #[test]
    fn test_band_match_rescales_along_new_hue() {
        let weights = [0.0, 0.0, 1.0, 0.0, 0.0];
        let (a, b) = match_band_pixel(0.05, 0.0, &weights, &uniform_shifts(0.0, 0.1, Some(1.0)));
        assert!((chroma(a, b) - 0.05).abs() < 1e-6, "chroma {}", chroma(a, b));
        assert!((b - 2.0 * a).abs() < 1e-6, "hue of the shifted color lost: ({a}, {b})");

        // a neutral source band keeps the shifted chroma
        let (a, b) = match_band_pixel(0.05, 0.0, &weights, &uniform_shifts(0.0, 0.1, None));
        assert!((a - 0.05).abs() < 1e-6 && (b - 0.1).abs() < 1e-6);

        // boosted band strength saturates at the target ratio ceiling
        let strong = [0.0, 0.0, 2.0, 0.0, 0.0];
        let (a, b) = match_band_pixel(0.05, 0.0, &strong, &uniform_shifts(0.0, 0.0, Some(1.8)));
        assert!((a - 0.05 * MAX_TARGET_RATIO).abs() < 1e-6 && b.abs() < 1e-6);
    }

    #[test]
    fn test_out_of_range_look_is_clamped() {
        let src = color_grid();
        let wild = LookParams {
            warmth: 5.0,
            tone: Tone {
                lift: -4.0,
                gamma: 100.0,
                gain: f32::INFINITY,
            },
            ref_saturation: Some(-1.0),
            match_params: MatchParams {
                color_strength: 40.0,
                black_strength: -3.0,
                ..MatchParams::default()
            },
            ..LookParams::default()
        };
        assert_eq!(apply_look(&src, &wild), apply_look(&src, &wild.sanitized()));
    }

    #[test]
    fn test_zero_color_strength_keeps_chroma() {
        let src = color_grid();
        let look = LookParams {
            warmth: 0.08,
            tint: -0.08,
            match_params: MatchParams {
                color_strength: 0.0,
                ..MatchParams::default()
            },
            ..LookParams::default()
        };
        let out = apply_look(&src, &look);
        for (a, b) in src.data().iter().zip(out.data()) {
            assert!((i16::from(*a) - i16::from(*b)).abs() <= 1);
        }
    }

    #[test]
    fn test_band_overrides_brighten() {
        let src = gray_gradient(32, 2, 60, 200);
        let look = LookParams {
            color_band_overrides: Some(ColorBandOverrides {
                luma: [0.5; BAND_COUNT],
                ..ColorBandOverrides::default()
            }),
            ..LookParams::default()
        };
        let before = compute_image_stats(&src).unwrap().exposure_level.median_l;
        let after = compute_image_stats(&apply_look(&src, &look)).unwrap().exposure_level.median_l;
        assert!((after - before - 0.2).abs() < 0.02, "{before} -> {after}");
    }

    #[test]
    fn test_tone_model_precedence() {
        let mut look = LookParams::default();
        assert!(matches!(ToneModel::from_look(&look), ToneModel::Parametric { .. }));
        look.tone_curve = Some(vec![CurvePoint(0.0, 0.1), CurvePoint(1.0, 0.9)]);
        let model = ToneModel::from_look(&look);
        assert!(matches!(model, ToneModel::Curve(_)));
        assert!((model.map(0.5) - 0.5).abs() < 1e-6);
        assert!((model.map(0.0) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_parametric_tone_identity_and_toe() {
        let identity = ToneModel::from_look(&LookParams::default());
        for i in 0..=20 {
            let x = i as f32 / 20.0;
            assert!((identity.map(x) - x).abs() < 1e-3);
        }
        let toe = ToneModel::Parametric {
            tone: Tone::default(),
            shadow_contrast: 1.5,
        };
        assert!(toe.map(0.2) < 0.2);
        assert!((toe.map(0.6) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_color_model_precedence() {
        let mut look = LookParams::default();
        assert_eq!(ColorModel::from_look(&look), ColorModel::Flat);
        look.tint_by_l = Some(vec![TintAnchor(0.5, 0.01, 0.0)]);
        assert!(matches!(ColorModel::from_look(&look), ColorModel::TintCurve(_)));
        look.color_match_bands = Some([BandColor::default(); BAND_COUNT]);
        assert!(matches!(ColorModel::from_look(&look), ColorModel::BandMatch(_)));
    }

    #[test]
    fn test_band_shift_damping_and_clamp() {
        let source = BandStat {
            mean_a: 0.0,
            mean_b: 0.08,
            mean_c: 0.08,
            weight: 1.0,
        };
        let reference = BandColor {
            mean_a: 0.0,
            mean_b: 0.04,
            mean_c: 0.04,
        };
        let shift = BandShift::between(&reference, &source);
        assert!((shift.db + 0.02).abs() < 1e-6);
        assert!((shift.ratio.unwrap() - 0.5).abs() < 1e-6);

        let far = BandColor {
            mean_a: 0.3,
            mean_b: -0.3,
            mean_c: 0.4,
        };
        let shift = BandShift::between(&far, &BandStat { weight: 1.0, ..BandStat::default() });
        assert!(chroma(shift.da, shift.db) <= MAX_BAND_SHIFT + 1e-6);
        assert_eq!(BandShift::between(&far, &BandStat::default()), BandShift::NEUTRAL);
    }

    #[test]
    fn test_tint_at_falls_back_to_nearest() {
        let anchors = [TintAnchor(0.1, 0.01, 0.02), TintAnchor(0.9, -0.01, -0.02)];
        assert_eq!(tint_at(&anchors, 0.45), (0.01, 0.02));
        let (a, _) = tint_at(&anchors, 0.9);
        assert!((a + 0.01).abs() < 1e-6);
    }
}
