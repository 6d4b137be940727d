//! Blends learned per-bucket corrections into match parameters.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::types::{ImageStats, MatchParams, MATCH_PARAM_NAMES};

use super::buckets::{classify_color, classify_exposure, exposure_score, ColorBucket, ExposureBucket};
use super::{LearnedHeuristics, ParamHeuristics};

/// Width of the soft exposure-bucket weights.
const EXPOSURE_SIGMA: f32 = 0.7;

/// Bucket context of one grading call. Fields the caller cannot know yet
/// (e.g. the source at fit time) stay unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HeuristicsContext {
    pub src_exposure: ExposureBucket,
    pub src_exposure_score: Option<f32>,
    pub ref_exposure: ExposureBucket,
    pub ref_exposure_score: Option<f32>,
    /// Free-form source category supplied by the caller, e.g. "portrait".
    pub source_type: Option<String>,
    pub ref_color: ColorBucket,
}

impl Default for HeuristicsContext {
    fn default() -> Self {
        Self {
            src_exposure: ExposureBucket::Unknown,
            src_exposure_score: None,
            ref_exposure: ExposureBucket::Unknown,
            ref_exposure_score: None,
            source_type: None,
            ref_color: ColorBucket::Unknown,
        }
    }
}

impl HeuristicsContext {
    pub fn from_stats(source: Option<&ImageStats>, reference: Option<&ImageStats>, source_type: Option<&str>) -> Self {
        let src_level = source.map(|s| &s.exposure_level);
        let ref_level = reference.map(|s| &s.exposure_level);
        Self {
            src_exposure: classify_exposure(src_level),
            src_exposure_score: exposure_score(src_level),
            ref_exposure: classify_exposure(ref_level),
            ref_exposure_score: exposure_score(ref_level),
            source_type: source_type.map(str::to_string),
            ref_color: classify_color(reference.map(|s| &s.chroma_distribution)),
        }
    }
}

/// Weights of the ordered exposure buckets. Gaussian around the score when
/// there is one, one-hot on the bucket otherwise, uniform as a last resort.
fn exposure_weights(bucket: ExposureBucket, score: Option<f32>) -> [f32; 3] {
    if let Some(score) = score.filter(|s| s.is_finite()) {
        let raw = ExposureBucket::ORDERED.map(|b| {
            let d = score - b.center().unwrap_or(0.0);
            (-(d * d) / (2.0 * EXPOSURE_SIGMA * EXPOSURE_SIGMA)).exp()
        });
        let total: f32 = raw.iter().sum();
        if total > 1e-9 {
            return raw.map(|w| w / total);
        }
    }
    match ExposureBucket::ORDERED.iter().position(|&b| b == bucket) {
        Some(k) => {
            let mut weights = [0.0; 3];
            weights[k] = 1.0;
            weights
        }
        None => [1.0 / 3.0; 3],
    }
}

/// Learned delta for one parameter under `context`.
fn learned_delta(entry: &ParamHeuristics, context: &HeuristicsContext) -> f32 {
    let global_mean = entry.global.map_or(0.0, |g| g.mean_delta);
    let mut delta = entry.global.map_or(0.0, |g| g.regularization() * g.mean_delta);
    let residual = |key: String| {
        entry
            .buckets
            .get(&key)
            .map_or(0.0, |d| d.regularization() * (d.mean_delta - global_mean))
    };

    let axes = [
        ("srcExposure", context.src_exposure, context.src_exposure_score),
        ("refExposure", context.ref_exposure, context.ref_exposure_score),
    ];
    for (axis, bucket, score) in axes {
        let weights = exposure_weights(bucket, score);
        for (b, w) in ExposureBucket::ORDERED.iter().zip(weights) {
            delta += w * residual(format!("{axis}:{}", b.as_str()));
        }
    }
    if let Some(source_type) = &context.source_type {
        delta += residual(format!("srcType:{source_type}"));
    }
    if context.ref_color != ColorBucket::Unknown {
        delta += residual(format!("refColor:{}", context.ref_color.as_str()));
    }

    if delta.is_finite() {
        delta
    } else {
        0.0
    }
}

/// Adjusts every numeric match parameter the table knows about.
pub fn adjust_match_params(
    base: &MatchParams,
    table: Option<&LearnedHeuristics>,
    context: &HeuristicsContext,
) -> MatchParams {
    adjust_selected(base, table, context, &MATCH_PARAM_NAMES)
}

/// Adjusts only the named parameters. Parameters absent from `base` (an
/// unset black point) or from the table are left alone.
pub fn adjust_selected(
    base: &MatchParams,
    table: Option<&LearnedHeuristics>,
    context: &HeuristicsContext,
    names: &[&str],
) -> MatchParams {
    let Some(table) = table else {
        return *base;
    };
    let mut adjusted = *base;
    for &name in names {
        let (Some(value), Some(entry), Some(limit)) =
            (base.get(name), table.get(name), MatchParams::limit_for(name))
        else {
            continue;
        };
        let delta = learned_delta(entry, context);
        trace!(name, value, delta, "learned adjustment");
        if let Err(err) = adjusted.set(name, limit.clamp(value + delta)) {
            trace!(%err, "learned adjustment skipped");
        }
    }
    adjusted
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::heuristics::BucketDelta;

    fn delta(mean_delta: f32, count: u32) -> BucketDelta {
        BucketDelta { mean_delta, count }
    }

    fn table(name: &str, entry: ParamHeuristics) -> LearnedHeuristics {
        LearnedHeuristics {
            params: BTreeMap::from([(name.to_string(), entry)]),
        }
    }

    #[test]
    fn test_no_table_is_noop() {
        let base = MatchParams {
            black_strength: 1.8,
            black_point: Some(0.05),
            ..MatchParams::strong()
        };
        let context = HeuristicsContext::default();
        assert_eq!(adjust_match_params(&base, None, &context), base);
        assert_eq!(
            adjust_match_params(&base, Some(&LearnedHeuristics::default()), &context),
            base
        );
    }

    #[test]
    fn test_global_delta_is_regularized() {
        let learned = table(
            "colorStrength",
            ParamHeuristics {
                global: Some(delta(0.4, 3)),
                buckets: BTreeMap::new(),
            },
        );
        let out = adjust_match_params(&MatchParams::default(), Some(&learned), &HeuristicsContext::default());
        assert_abs_diff_eq!(out.color_strength, 1.2, epsilon = 1e-6);
        assert_eq!(out.luma_strength, 1.0);
    }

    #[test]
    fn test_result_is_clamped() {
        let learned = table(
            "blackRange",
            ParamHeuristics {
                global: Some(delta(50.0, 1000)),
                buckets: BTreeMap::new(),
            },
        );
        let out = adjust_match_params(&MatchParams::default(), Some(&learned), &HeuristicsContext::default());
        assert_eq!(out.black_range, 1.0);
    }

    #[test]
    fn test_unset_black_point_is_not_invented() {
        let learned = table(
            "blackPoint",
            ParamHeuristics {
                global: Some(delta(0.1, 10)),
                buckets: BTreeMap::new(),
            },
        );
        let out = adjust_match_params(&MatchParams::default(), Some(&learned), &HeuristicsContext::default());
        assert_eq!(out.black_point, None);
    }

    #[test]
    fn test_hard_bucket_and_categorical_residuals() {
        let buckets = BTreeMap::from([
            ("srcExposure:under".to_string(), delta(1.0, 3)),
            ("srcType:portrait".to_string(), delta(0.5, 1)),
            ("refColor:warm".to_string(), delta(-0.2, 3)),
        ]);
        let learned = table(
            "lumaStrength",
            ParamHeuristics {
                global: None,
                buckets,
            },
        );
        let context = HeuristicsContext {
            src_exposure: ExposureBucket::Under,
            ref_exposure: ExposureBucket::Normal,
            source_type: Some("portrait".to_string()),
            ref_color: ColorBucket::Warm,
            ..HeuristicsContext::default()
        };
        let base = MatchParams {
            luma_strength: 0.5,
            ..MatchParams::default()
        };
        let out = adjust_match_params(&base, Some(&learned), &context);
        // 0.5 + 0.5·1.0 + 0.25·0.5 + 0.5·(-0.2)
        assert_abs_diff_eq!(out.luma_strength, 1.025, epsilon = 1e-5);
    }

    #[test]
    fn test_exposure_weights() {
        let soft = exposure_weights(ExposureBucket::Unknown, Some(0.0));
        assert_abs_diff_eq!(soft.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        assert!(soft[1] > soft[0] && (soft[0] - soft[2]).abs() < 1e-6);

        assert_eq!(exposure_weights(ExposureBucket::Over, None), [0.0, 0.0, 1.0]);
        assert_eq!(exposure_weights(ExposureBucket::Unknown, None), [1.0 / 3.0; 3]);
    }

    #[test]
    fn test_context_json() {
        let context: HeuristicsContext =
            serde_json::from_str(r#"{"srcExposure":"over","srcExposureScore":0.9,"refColor":"foliage"}"#).unwrap();
        assert_eq!(context.src_exposure, ExposureBucket::Over);
        assert_eq!(context.src_exposure_score, Some(0.9));
        assert_eq!(context.ref_exposure, ExposureBucket::Unknown);
        assert_eq!(context.ref_color, ColorBucket::Foliage);
    }

    #[test]
    fn test_context_from_stats() {
        let stats = ImageStats::default();
        let context = HeuristicsContext::from_stats(Some(&stats), None, Some("landscape"));
        assert_eq!(context.src_exposure, ExposureBucket::Under);
        assert_eq!(context.ref_exposure, ExposureBucket::Unknown);
        assert_eq!(context.ref_color, ColorBucket::Unknown);
        assert_eq!(context.source_type.as_deref(), Some("landscape"));
    }
}
