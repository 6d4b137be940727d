//! Orchestration: fit → merge → adapt → apply → halation.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buffer::PixelBuffer;
use crate::heuristics::{adjust_selected, HeuristicsContext, LearnedHeuristics};
use crate::look::{apply_halation, apply_look, compute_image_stats, fit_reference};
use crate::types::{LookParams, MatchOverrides, MATCH_PARAM_NAMES};

/// Match parameters already adapted while fitting the reference.
const FIT_TIME_PARAMS: [&str; 2] = ["blackStrength", "blackRange"];

/// Per-call options for a one-shot match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatchOptions {
    /// User overrides layered onto the fitted match parameters
    pub overrides: MatchOverrides,
    /// Optional source category used by the learned table (`srcType:<name>`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
}

impl MatchOptions {
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A graded image together with the look that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub look: LookParams,
    pub image: PixelBuffer,
}

/// Applies a look and, when enabled, its highlight bloom.
pub fn grade(source: &PixelBuffer, look: &LookParams) -> PixelBuffer {
    let look = look.sanitized();
    let graded = apply_look(source, &look);
    if look.highlight_fill.is_active() {
        apply_halation(&graded, &look.highlight_fill)
    } else {
        graded
    }
}

/// Fits `reference`, layers user overrides and learned corrections onto the
/// fitted match parameters, and grades `source` with the result.
///
/// Learned corrections only touch parameters the user left unset, and never
/// the black parameters, which were adapted at fit time.
pub fn match_look(
    source: &PixelBuffer,
    reference: &PixelBuffer,
    options: &MatchOptions,
    heuristics: Option<&LearnedHeuristics>,
) -> MatchOutcome {
    let fitted = fit_reference(reference, heuristics);
    let mut look = fitted.with_overrides(&options.overrides);

    if let Some(table) = heuristics {
        let context = HeuristicsContext::from_stats(
            compute_image_stats(source).as_ref(),
            compute_image_stats(reference).as_ref(),
            options.source_type.as_deref(),
        );
        let names: Vec<&str> = MATCH_PARAM_NAMES
            .iter()
            .copied()
            .filter(|name| !FIT_TIME_PARAMS.contains(name) && !options.overrides.is_set(name))
            .collect();
        look.match_params = adjust_selected(&look.match_params, Some(table), &context, &names);
        debug!(?context, adapted = ?names, "apply-time heuristics");
    }

    let image = grade(source, &look);
    MatchOutcome { look, image }
}
