//! Learned corrections: the bucket classifier and the adapter that blends
//! per-bucket mean deltas back into automatic match parameters.
//!
//! The learned table is an injected, read-only value. It is built offline
//! from recorded user corrections and passed in per call.

pub mod adapter;
pub mod buckets;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use adapter::{adjust_match_params, adjust_selected, HeuristicsContext};
pub use buckets::{
    classify_color, classify_exposure, classify_stats, exposure_score, ColorBucket, ExposureBucket,
    ImageBuckets,
};

/// Mean correction observed for one bucket and how many samples back it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketDelta {
    pub mean_delta: f32,
    pub count: u32,
}

impl BucketDelta {
    /// Shrinks sparse buckets toward zero: `count / (count + 3)`.
    pub fn regularization(&self) -> f32 {
        let n = self.count as f32;
        n / (n + 3.0)
    }
}

/// Learned deltas for one match parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamHeuristics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global: Option<BucketDelta>,
    /// Keyed `axis:bucket`, e.g. `srcExposure:under` or `refColor:warm`.
    pub buckets: BTreeMap<String, BucketDelta>,
}

/// Per-parameter learned deltas, keyed by the parameter's JSON name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LearnedHeuristics {
    pub params: BTreeMap<String, ParamHeuristics>,
}

impl LearnedHeuristics {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ParamHeuristics> {
        self.params.get(name)
    }
}
