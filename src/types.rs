//! Shared types: the fitted look model, match strengths and image statistics.
//!
//! Everything here serializes to camelCase JSON. Optional fields are
//! skipped when absent so older payloads keep deserializing, and the
//! applier picks a simpler model whenever a field is missing.

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::error::{LookError, Result};
use crate::limits::{self, Limit};

/// Number of fixed color-matching bands.
pub const BAND_COUNT: usize = 5;

/// Lift/gamma/gain tone model, used when no multi-segment curve is present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Tone {
    pub lift: f32,
    pub gamma: f32,
    pub gain: f32,
}

impl Default for Tone {
    fn default() -> Self {
        Self {
            lift: 0.0,
            gamma: 1.0,
            gain: 1.0,
        }
    }
}

/// Tone curve anchor `(L_in, L_out)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint(pub f32, pub f32);

/// Tint anchor `(L, a, b)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TintAnchor(pub f32, pub f32, pub f32);

/// Chroma multiplier anchor `(L, scale)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SaturationAnchor(pub f32, pub f32);

/// Mean color of one lightness band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BandColor {
    pub mean_a: f32,
    pub mean_b: f32,
    pub mean_c: f32,
}

/// Offset on the OKLab opponent axes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbOffset {
    pub a: f32,
    pub b: f32,
}

/// Highlight bloom (halation) settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[wasm_bindgen]
pub struct HighlightFill {
    /// Effect strength in [0, 1]; 0 disables the stage
    pub strength: f32,
    /// Warm (positive) or cool (negative) bias of the bloom, in [-1, 1]
    pub warmth: f32,
}

#[wasm_bindgen]
impl HighlightFill {
    #[wasm_bindgen(constructor)]
    pub fn new(strength: f32, warmth: f32) -> Self {
        Self { strength, warmth }
    }
}

impl HighlightFill {
    pub fn clamped(&self) -> Self {
        Self {
            strength: limits::HIGHLIGHT_STRENGTH.clamp(self.strength),
            warmth: limits::HIGHLIGHT_WARMTH.clamp(self.warmth),
        }
    }

    pub fn is_active(&self) -> bool {
        self.strength > 0.0
    }
}

/// Manual per-band hue/saturation/luma adjustments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorBandOverrides {
    /// Hue rotation per band in [-1, 1], mapped to ±30°
    pub hue: [f32; BAND_COUNT],
    /// Chroma multiplier per band in [0, 2]
    pub saturation: [f32; BAND_COUNT],
    /// Lightness offset per band in [-0.5, 0.5]
    pub luma: [f32; BAND_COUNT],
}

impl Default for ColorBandOverrides {
    fn default() -> Self {
        Self {
            hue: [0.0; BAND_COUNT],
            saturation: [1.0; BAND_COUNT],
            luma: [0.0; BAND_COUNT],
        }
    }
}

impl ColorBandOverrides {
    pub fn clamped(&self) -> Self {
        Self {
            hue: self.hue.map(|v| limits::BAND_HUE.clamp(v)),
            saturation: self.saturation.map(|v| limits::BAND_SATURATION.clamp(v)),
            luma: self.luma.map(|v| limits::BAND_LUMA.clamp(v)),
        }
    }

    /// True when every band is at its neutral value.
    pub fn is_neutral(&self) -> bool {
        self.hue.iter().all(|&v| v == 0.0)
            && self.saturation.iter().all(|&v| v == 1.0)
            && self.luma.iter().all(|&v| v == 0.0)
    }
}

/// Names of the numeric match parameters, as used in learned tables.
pub const MATCH_PARAM_NAMES: [&str; 7] = [
    "lumaStrength",
    "colorStrength",
    "colorDensity",
    "exposureStrength",
    "blackStrength",
    "blackRange",
    "blackPoint",
];

/// UI-facing match strengths. Fully populated and clamped once merged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatchParams {
    /// 0 keeps source luma, 1 takes the reference tone shape
    pub luma_strength: f32,
    /// 0 keeps source color, 1 takes the matched color
    pub color_strength: f32,
    /// Chroma density multiplier
    pub color_density: f32,
    /// How far source mid-tones move toward the reference median
    pub exposure_strength: f32,
    /// Pull strength toward the reference black anchor
    pub black_strength: f32,
    /// Lightness ceiling of the black pull
    pub black_range: f32,
    /// Explicit black target overriding the reference anchor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub black_point: Option<f32>,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            luma_strength: 1.0,
            color_strength: 1.0,
            color_density: 1.0,
            exposure_strength: 1.0,
            black_strength: 0.0,
            black_range: 0.6,
            black_point: None,
        }
    }
}

impl MatchParams {
    /// A gentle match that keeps most of the source's character.
    pub fn subtle() -> Self {
        Self {
            luma_strength: 0.5,
            color_strength: 0.5,
            exposure_strength: 0.5,
            ..Self::default()
        }
    }

    /// A committed match with mild overshoot on tone and color.
    pub fn strong() -> Self {
        Self {
            luma_strength: 1.2,
            color_strength: 1.2,
            color_density: 1.1,
            exposure_strength: 1.0,
            ..Self::default()
        }
    }

    /// Declared range of a named parameter.
    pub fn limit_for(name: &str) -> Option<Limit> {
        Some(match name {
            "lumaStrength" => limits::LUMA_STRENGTH,
            "colorStrength" => limits::COLOR_STRENGTH,
            "colorDensity" => limits::COLOR_DENSITY,
            "exposureStrength" => limits::EXPOSURE_STRENGTH,
            "blackStrength" => limits::BLACK_STRENGTH,
            "blackRange" => limits::BLACK_RANGE,
            "blackPoint" => limits::BLACK_POINT,
            _ => return None,
        })
    }

    /// Reads a parameter by its JSON name.
    pub fn get(&self, name: &str) -> Option<f32> {
        match name {
            "lumaStrength" => Some(self.luma_strength),
            "colorStrength" => Some(self.color_strength),
            "colorDensity" => Some(self.color_density),
            "exposureStrength" => Some(self.exposure_strength),
            "blackStrength" => Some(self.black_strength),
            "blackRange" => Some(self.black_range),
            "blackPoint" => self.black_point,
            _ => None,
        }
    }

    /// Writes a parameter by its JSON name.
    pub fn set(&mut self, name: &str, value: f32) -> Result<()> {
        match name {
            "lumaStrength" => self.luma_strength = value,
            "colorStrength" => self.color_strength = value,
            "colorDensity" => self.color_density = value,
            "exposureStrength" => self.exposure_strength = value,
            "blackStrength" => self.black_strength = value,
            "blackRange" => self.black_range = value,
            "blackPoint" => self.black_point = Some(value),
            _ => {
                return Err(LookError::InvalidParameter(format!(
                    "unknown match parameter '{name}'"
                )))
            }
        }
        Ok(())
    }

    /// Clamps every field into its declared range.
    pub fn clamped(&self) -> Self {
        Self {
            luma_strength: limits::LUMA_STRENGTH.clamp(self.luma_strength),
            color_strength: limits::COLOR_STRENGTH.clamp(self.color_strength),
            color_density: limits::COLOR_DENSITY.clamp(self.color_density),
            exposure_strength: limits::EXPOSURE_STRENGTH.clamp(self.exposure_strength),
            black_strength: limits::BLACK_STRENGTH.clamp(self.black_strength),
            black_range: limits::BLACK_RANGE.clamp(self.black_range),
            black_point: self.black_point.map(|v| limits::BLACK_POINT.clamp(v)),
        }
    }

    /// Merges user overrides onto these (fitted or default) values.
    ///
    /// This is the single configuration-merge step at the boundary of the
    /// core: the result is fully populated and clamped. Density supplied by
    /// the user uses the wide UI range; the automatic path stays within the
    /// narrower internal range.
    pub fn merged(&self, overrides: &MatchOverrides) -> Self {
        let color_density = match overrides.color_density {
            Some(v) => limits::COLOR_DENSITY.clamp(v),
            None => limits::COLOR_DENSITY_INTERNAL.clamp(self.color_density),
        };
        let black_range = match overrides.black_range {
            Some(v) => limits::BLACK_RANGE.clamp(limits::BLACK_RANGE_UI.clamp(v)),
            None => self.black_range,
        };
        Self {
            luma_strength: overrides.luma_strength.unwrap_or(self.luma_strength),
            color_strength: overrides.color_strength.unwrap_or(self.color_strength),
            color_density,
            exposure_strength: overrides
                .exposure_strength
                .unwrap_or(self.exposure_strength),
            black_strength: overrides.black_strength.unwrap_or(self.black_strength),
            black_range,
            black_point: overrides.black_point.or(self.black_point),
        }
        .clamped()
    }
}

/// Partial user input; absent fields keep the fitted value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatchOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub luma_strength: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_strength: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_density: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure_strength: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub black_strength: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub black_range: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub black_point: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_band_strengths: Option<[f32; BAND_COUNT]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_band_overrides: Option<ColorBandOverrides>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_fill: Option<HighlightFill>,
}

impl MatchOverrides {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// True when the user supplied a value for the named match parameter.
    pub fn is_set(&self, name: &str) -> bool {
        match name {
            "lumaStrength" => self.luma_strength.is_some(),
            "colorStrength" => self.color_strength.is_some(),
            "colorDensity" => self.color_density.is_some(),
            "exposureStrength" => self.exposure_strength.is_some(),
            "blackStrength" => self.black_strength.is_some(),
            "blackRange" => self.black_range.is_some(),
            "blackPoint" => self.black_point.is_some(),
            _ => false,
        }
    }
}

/// The parametric grading model fitted from a reference image.
///
/// Optional fields select richer models: `tone_curve` supersedes `tone` and
/// `shadow_contrast`; `color_match_bands` supersedes `tint_by_l`, which in
/// turn supersedes the flat `warmth`/`tint`/split-tint fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LookParams {
    pub tone: Tone,
    /// Toe power applied below L = 0.4 (1 = identity)
    pub shadow_contrast: f32,
    /// Global b (blue/yellow) offset
    pub warmth: f32,
    /// Global a (green/magenta) offset
    pub tint: f32,
    pub shadow_tint: AbOffset,
    pub highlight_tint: AbOffset,
    /// Chroma ratio of the deepest shadows relative to mid-tones
    pub shadow_saturation: f32,
    /// Chroma ratio of the brightest highlights relative to mid-tones
    pub highlight_saturation: f32,
    /// Chroma-per-lightness ratio of shadows relative to mid-tones
    pub shadow_density: f32,
    /// Chroma-per-lightness ratio of highlights relative to mid-tones
    pub highlight_density: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone_curve: Option<Vec<CurvePoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tint_by_l: Option<Vec<TintAnchor>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saturation_by_l: Option<Vec<SaturationAnchor>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_match_bands: Option<[BandColor; BAND_COUNT]>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_saturation: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub micro_contrast_mid: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_mid_l: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_black_l: Option<f32>,

    #[serde(rename = "match")]
    pub match_params: MatchParams,
    pub color_band_strengths: [f32; BAND_COUNT],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_band_overrides: Option<ColorBandOverrides>,
    pub highlight_fill: HighlightFill,
}

impl Default for LookParams {
    fn default() -> Self {
        Self {
            tone: Tone::default(),
            shadow_contrast: 1.0,
            warmth: 0.0,
            tint: 0.0,
            shadow_tint: AbOffset::default(),
            highlight_tint: AbOffset::default(),
            shadow_saturation: 1.0,
            highlight_saturation: 1.0,
            shadow_density: 1.0,
            highlight_density: 1.0,
            tone_curve: None,
            tint_by_l: None,
            saturation_by_l: None,
            color_match_bands: None,
            ref_saturation: None,
            micro_contrast_mid: None,
            ref_mid_l: None,
            ref_black_l: None,
            match_params: MatchParams::default(),
            color_band_strengths: [1.0; BAND_COUNT],
            color_band_overrides: None,
            highlight_fill: HighlightFill::default(),
        }
    }
}

impl LookParams {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Layers user overrides (strengths, band knobs, halation) onto the model.
    pub fn with_overrides(&self, overrides: &MatchOverrides) -> Self {
        let mut look = self.clone();
        look.match_params = self.match_params.merged(overrides);
        if let Some(strengths) = overrides.color_band_strengths {
            look.color_band_strengths = strengths;
        }
        if let Some(band_overrides) = overrides.color_band_overrides {
            look.color_band_overrides = Some(band_overrides);
        }
        if let Some(fill) = overrides.highlight_fill {
            look.highlight_fill = fill;
        }
        look.sanitized()
    }

    /// Returns a copy with every numeric field clamped into its declared
    /// range and malformed curves dropped.
    pub fn sanitized(&self) -> Self {
        Self {
            tone: Tone {
                lift: limits::LIFT.clamp(self.tone.lift),
                gamma: limits::GAMMA.clamp(self.tone.gamma),
                gain: limits::GAIN.clamp(self.tone.gain),
            },
            shadow_contrast: limits::SHADOW_CONTRAST.clamp(self.shadow_contrast),
            warmth: limits::GLOBAL_TINT.clamp(self.warmth),
            tint: limits::GLOBAL_TINT.clamp(self.tint),
            shadow_tint: clamp_offset(self.shadow_tint),
            highlight_tint: clamp_offset(self.highlight_tint),
            shadow_saturation: limits::SATURATION_ROLLOFF.clamp(self.shadow_saturation),
            highlight_saturation: limits::SATURATION_ROLLOFF.clamp(self.highlight_saturation),
            shadow_density: limits::DENSITY_RATIO.clamp(self.shadow_density),
            highlight_density: limits::DENSITY_RATIO.clamp(self.highlight_density),
            tone_curve: self.tone_curve.as_deref().and_then(sanitize_curve),
            tint_by_l: self.tint_by_l.as_deref().and_then(sanitize_tint),
            saturation_by_l: self.saturation_by_l.as_deref().and_then(sanitize_saturation),
            color_match_bands: self.color_match_bands.map(|bands| {
                bands.map(|band| BandColor {
                    mean_a: limits::BAND_AB.clamp(band.mean_a),
                    mean_b: limits::BAND_AB.clamp(band.mean_b),
                    mean_c: limits::BAND_CHROMA.clamp(band.mean_c),
                })
            }),
            ref_saturation: clamp_opt(self.ref_saturation, limits::REF_SATURATION),
            micro_contrast_mid: clamp_opt(self.micro_contrast_mid, limits::MICRO_CONTRAST),
            ref_mid_l: clamp_opt(self.ref_mid_l, limits::LIGHTNESS),
            ref_black_l: clamp_opt(self.ref_black_l, limits::LIGHTNESS),
            match_params: self.match_params.clamped(),
            color_band_strengths: self
                .color_band_strengths
                .map(|v| limits::BAND_STRENGTH.clamp(v)),
            color_band_overrides: self.color_band_overrides.map(|o| o.clamped()),
            highlight_fill: self.highlight_fill.clamped(),
        }
    }
}

fn clamp_opt(value: Option<f32>, limit: Limit) -> Option<f32> {
    value.filter(|v| v.is_finite()).map(|v| limit.clamp(v))
}

fn clamp_offset(offset: AbOffset) -> AbOffset {
    AbOffset {
        a: limits::SPLIT_TINT.clamp(offset.a),
        b: limits::SPLIT_TINT.clamp(offset.b),
    }
}

fn sort_by_lightness<T, F: Fn(&T) -> f32>(items: &mut [T], key: F) {
    items.sort_by(|x, y| key(x).total_cmp(&key(y)));
}

fn sanitize_curve(points: &[CurvePoint]) -> Option<Vec<CurvePoint>> {
    let mut out: Vec<CurvePoint> = points
        .iter()
        .filter(|p| p.0.is_finite() && p.1.is_finite())
        .map(|p| CurvePoint(p.0.clamp(0.0, 1.0), p.1.clamp(0.0, 1.0)))
        .collect();
    if out.len() < 2 {
        return None;
    }
    sort_by_lightness(&mut out, |p| p.0);
    Some(out)
}

fn sanitize_tint(anchors: &[TintAnchor]) -> Option<Vec<TintAnchor>> {
    let mut out: Vec<TintAnchor> = anchors
        .iter()
        .filter(|t| t.0.is_finite())
        .map(|t| {
            TintAnchor(
                t.0.clamp(0.0, 1.0),
                limits::TINT_BY_L.clamp(t.1),
                limits::TINT_BY_L.clamp(t.2),
            )
        })
        .collect();
    if out.is_empty() {
        return None;
    }
    sort_by_lightness(&mut out, |t| t.0);
    Some(out)
}

fn sanitize_saturation(anchors: &[SaturationAnchor]) -> Option<Vec<SaturationAnchor>> {
    let mut out: Vec<SaturationAnchor> = anchors
        .iter()
        .filter(|s| s.0.is_finite())
        .map(|s| SaturationAnchor(s.0.clamp(0.0, 1.0), limits::SATURATION_BY_L.clamp(s.1)))
        .collect();
    if out.is_empty() {
        return None;
    }
    sort_by_lightness(&mut out, |s| s.0);
    Some(out)
}

/// A graded RGBA image returned across the WASM boundary.
#[wasm_bindgen(getter_with_clone)]
#[derive(Debug, Clone, PartialEq)]
pub struct GradedImage {
    /// Row-major RGBA bytes
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Result of a one-shot reference match: the image and the look used.
#[wasm_bindgen(getter_with_clone)]
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub image: GradedImage,
    /// The fitted, merged and adapted look as JSON
    #[wasm_bindgen(js_name = lookJson)]
    pub look_json: String,
}

/// Lightness percentiles of an image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExposureLevel {
    #[serde(rename = "medianL")]
    pub median_l: f32,
    #[serde(rename = "p05L")]
    pub p05_l: f32,
    #[serde(rename = "p95L")]
    pub p95_l: f32,
}

/// Chroma statistics of an image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChromaDistribution {
    pub mean_a: f32,
    pub mean_b: f32,
    pub mean_c: f32,
    pub bands: [BandColor; BAND_COUNT],
}

/// Derived per-image statistics, recomputed for every image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageStats {
    pub exposure_level: ExposureLevel,
    pub chroma_distribution: ChromaDistribution,
}
