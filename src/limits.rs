//! Declared numeric ranges for every externally visible parameter.
//!
//! Values are clamped into range, never rejected. Non-finite input
//! collapses to the parameter's neutral value.

/// Closed range with a neutral fallback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limit {
    pub min: f32,
    pub max: f32,
    pub neutral: f32,
}

impl Limit {
    pub const fn new(min: f32, max: f32, neutral: f32) -> Self {
        Self { min, max, neutral }
    }

    /// Clamps `value` into the range; NaN and infinities map to `neutral`.
    #[inline]
    pub fn clamp(self, value: f32) -> f32 {
        if value.is_finite() {
            value.clamp(self.min, self.max)
        } else {
            self.neutral
        }
    }

    #[inline]
    pub fn contains(self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

// Match strengths (UI-facing)
pub const LUMA_STRENGTH: Limit = Limit::new(0.0, 2.0, 1.0);
pub const COLOR_STRENGTH: Limit = Limit::new(0.0, 2.0, 1.0);
pub const EXPOSURE_STRENGTH: Limit = Limit::new(0.0, 2.0, 1.0);
pub const COLOR_DENSITY: Limit = Limit::new(0.1, 3.0, 1.0);
/// Narrower density range used when no user override is supplied.
pub const COLOR_DENSITY_INTERNAL: Limit = Limit::new(0.5, 2.0, 1.0);
pub const BLACK_STRENGTH: Limit = Limit::new(0.0, 8.0, 0.0);
pub const BLACK_RANGE: Limit = Limit::new(0.0, 1.0, 0.6);
/// Range the UI may present before the internal clamp to `BLACK_RANGE`.
pub const BLACK_RANGE_UI: Limit = Limit::new(0.0, 1.8, 0.6);
pub const BLACK_POINT: Limit = Limit::new(0.0, 0.6, 0.0);

// Per-band knobs
pub const BAND_STRENGTH: Limit = Limit::new(0.0, 3.0, 1.0);
pub const BAND_HUE: Limit = Limit::new(-1.0, 1.0, 0.0);
pub const BAND_SATURATION: Limit = Limit::new(0.0, 2.0, 1.0);
pub const BAND_LUMA: Limit = Limit::new(-0.5, 0.5, 0.0);
/// Aggregated luma offset actually applied to a pixel.
pub const BAND_LUMA_APPLIED: Limit = Limit::new(-0.2, 0.2, 0.0);
/// Aggregated saturation factor actually applied to a pixel.
pub const BAND_SATURATION_APPLIED: Limit = Limit::new(0.2, 2.5, 1.0);

// Halation
pub const HIGHLIGHT_STRENGTH: Limit = Limit::new(0.0, 1.0, 0.0);
pub const HIGHLIGHT_WARMTH: Limit = Limit::new(-1.0, 1.0, 0.0);

// Fitted model
pub const LIFT: Limit = Limit::new(-0.1, 0.2, 0.0);
pub const GAMMA: Limit = Limit::new(0.5, 2.0, 1.0);
pub const GAIN: Limit = Limit::new(0.6, 1.2, 1.0);
pub const SHADOW_CONTRAST: Limit = Limit::new(0.7, 1.5, 1.0);
pub const GLOBAL_TINT: Limit = Limit::new(-0.08, 0.08, 0.0);
pub const SPLIT_TINT: Limit = Limit::new(-0.06, 0.06, 0.0);
pub const SATURATION_ROLLOFF: Limit = Limit::new(0.3, 1.5, 1.0);
pub const DENSITY_RATIO: Limit = Limit::new(0.5, 2.0, 1.0);
pub const SATURATION_BY_L: Limit = Limit::new(0.3, 1.6, 1.0);
pub const TINT_BY_L: Limit = Limit::new(-0.08, 0.08, 0.0);
pub const REF_SATURATION: Limit = Limit::new(0.1, 2.5, 1.0);
pub const MICRO_CONTRAST: Limit = Limit::new(0.0, 0.5, 0.0);
pub const LIGHTNESS: Limit = Limit::new(0.0, 1.0, 0.5);
pub const BAND_AB: Limit = Limit::new(-0.4, 0.4, 0.0);
pub const BAND_CHROMA: Limit = Limit::new(0.0, 0.5, 0.0);
