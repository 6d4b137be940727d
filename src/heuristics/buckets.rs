//! Coarse exposure and color buckets for source and reference images.

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::types::{ChromaDistribution, ExposureLevel, ImageStats};

const UNDER_EXPOSED: f32 = 0.35;
const OVER_EXPOSED: f32 = 0.65;
/// Median lightness span mapped to one unit of exposure score.
const EXPOSURE_SCORE_SPAN: f32 = 0.3;

const NEUTRAL_CHROMA: f32 = 0.03;
const CAST: f32 = 0.012;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExposureBucket {
    Under,
    Normal,
    Over,
    Unknown,
}

impl ExposureBucket {
    /// The known buckets in exposure order.
    pub const ORDERED: [ExposureBucket; 3] = [Self::Under, Self::Normal, Self::Over];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Under => "under",
            Self::Normal => "normal",
            Self::Over => "over",
            Self::Unknown => "unknown",
        }
    }

    /// Position on the exposure-score axis.
    pub fn center(&self) -> Option<f32> {
        match self {
            Self::Under => Some(-1.0),
            Self::Normal => Some(0.0),
            Self::Over => Some(1.0),
            Self::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorBucket {
    Neutral,
    Foliage,
    Brick,
    Warm,
    Cool,
    Unknown,
}

impl ColorBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Foliage => "foliage",
            Self::Brick => "brick",
            Self::Warm => "warm",
            Self::Cool => "cool",
            Self::Unknown => "unknown",
        }
    }
}

pub fn classify_exposure(level: Option<&ExposureLevel>) -> ExposureBucket {
    match level {
        None => ExposureBucket::Unknown,
        Some(level) if !level.median_l.is_finite() => ExposureBucket::Unknown,
        Some(level) if level.median_l < UNDER_EXPOSED => ExposureBucket::Under,
        Some(level) if level.median_l > OVER_EXPOSED => ExposureBucket::Over,
        Some(_) => ExposureBucket::Normal,
    }
}

/// Continuous exposure score in [-2, 2]; bucket boundaries sit at ±0.5.
pub fn exposure_score(level: Option<&ExposureLevel>) -> Option<f32> {
    level
        .map(|level| level.median_l)
        .filter(|m| m.is_finite())
        .map(|m| ((m - 0.5) / EXPOSURE_SCORE_SPAN).clamp(-2.0, 2.0))
}

pub fn classify_color(distribution: Option<&ChromaDistribution>) -> ColorBucket {
    let Some(d) = distribution else {
        return ColorBucket::Unknown;
    };
    if !(d.mean_a.is_finite() && d.mean_b.is_finite() && d.mean_c.is_finite()) {
        return ColorBucket::Unknown;
    }
    if d.mean_c < NEUTRAL_CHROMA {
        ColorBucket::Neutral
    } else if d.mean_a < -CAST && d.mean_b > 0.0 {
        ColorBucket::Foliage
    } else if d.mean_a > 0.03 && d.mean_b > 0.03 && d.mean_c > 0.08 {
        ColorBucket::Brick
    } else if d.mean_b > CAST || d.mean_a > 0.015 {
        ColorBucket::Warm
    } else if d.mean_b < -CAST {
        ColorBucket::Cool
    } else {
        ColorBucket::Neutral
    }
}

/// Bucket summary of one image.
#[wasm_bindgen(getter_with_clone)]
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuckets {
    pub exposure: String,
    pub color: String,
    /// NaN when the image has no opaque pixels
    #[wasm_bindgen(js_name = exposureScore)]
    pub exposure_score: f32,
}

pub fn classify_stats(stats: Option<&ImageStats>) -> ImageBuckets {
    let level = stats.map(|s| &s.exposure_level);
    ImageBuckets {
        exposure: classify_exposure(level).as_str().to_string(),
        color: classify_color(stats.map(|s| &s.chroma_distribution))
            .as_str()
            .to_string(),
        exposure_score: exposure_score(level).unwrap_or(f32::NAN),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(median_l: f32) -> ExposureLevel {
        ExposureLevel {
            median_l,
            ..ExposureLevel::default()
        }
    }

    fn chroma(mean_a: f32, mean_b: f32, mean_c: f32) -> ChromaDistribution {
        ChromaDistribution {
            mean_a,
            mean_b,
            mean_c,
            ..ChromaDistribution::default()
        }
    }

    #[test]
    fn test_exposure_buckets() {
        assert_eq!(classify_exposure(None), ExposureBucket::Unknown);
        assert_eq!(classify_exposure(Some(&level(0.2))), ExposureBucket::Under);
        assert_eq!(classify_exposure(Some(&level(0.35))), ExposureBucket::Normal);
        assert_eq!(classify_exposure(Some(&level(0.65))), ExposureBucket::Normal);
        assert_eq!(classify_exposure(Some(&level(0.8))), ExposureBucket::Over);
    }

    #[test]
    fn test_exposure_score() {
        assert_eq!(exposure_score(None), None);
        assert_eq!(exposure_score(Some(&level(0.5))), Some(0.0));
        assert_eq!(exposure_score(Some(&level(1.5))), Some(2.0));
        let boundary = exposure_score(Some(&level(0.35))).unwrap();
        assert!((boundary + 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_color_buckets() {
        assert_eq!(classify_color(None), ColorBucket::Unknown);
        assert_eq!(classify_color(Some(&chroma(0.0, 0.0, 0.01))), ColorBucket::Neutral);
        assert_eq!(classify_color(Some(&chroma(-0.04, 0.03, 0.06))), ColorBucket::Foliage);
        assert_eq!(classify_color(Some(&chroma(0.05, 0.05, 0.1))), ColorBucket::Brick);
        assert_eq!(classify_color(Some(&chroma(0.0, 0.03, 0.05))), ColorBucket::Warm);
        assert_eq!(classify_color(Some(&chroma(0.0, -0.03, 0.05))), ColorBucket::Cool);
        assert_eq!(classify_color(Some(&chroma(0.0, 0.005, 0.05))), ColorBucket::Neutral);
    }

    #[test]
    fn test_classify_stats_without_pixels() {
        let buckets = classify_stats(None);
        assert_eq!(buckets.exposure, "unknown");
        assert_eq!(buckets.color, "unknown");
        assert!(buckets.exposure_score.is_nan());
    }
}
