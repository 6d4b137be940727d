//! Look Transfer WASM Library
//!
//! Reference-based color grading in the OKLab perceptual space, compiled to
//! WebAssembly for client-side media processing and usable natively as a
//! plain Rust library.
//!
//! # Features
//!
//! - **Fitting**: Derive a parametric look (tone curve, tint and saturation
//!   by lightness, band colors, black point, micro-contrast) from a reference
//! - **Applying**: Grade a source image with a fitted or hand-made look
//! - **Halation**: Gated highlight bloom on the brightest specular areas
//! - **Heuristics**: Blend learned per-bucket corrections into match strengths
//!
//! All looks and parameter sets cross the boundary as camelCase JSON so they
//! can be stored and indexed unchanged.
//!
//! # License
//!
//! GPL-2.0-or-later

#![allow(clippy::unused_unit)]

use wasm_bindgen::prelude::*;

pub mod buffer;
pub mod color;
pub mod engine;
pub mod error;
pub mod heuristics;
pub mod limits;
pub mod look;
pub mod types;

pub use buffer::{PixelBuffer, Planes};
pub use engine::{grade, match_look, MatchOptions, MatchOutcome};
pub use error::{LookError, Result};
pub use heuristics::{HeuristicsContext, ImageBuckets, LearnedHeuristics};
pub use look::{apply_halation, apply_look, compute_image_stats, fit_reference};

/// Initializes the WASM module.
///
/// This should be called before using any other functions.
#[wasm_bindgen(start)]
pub fn init() {
    // Module initialization - no subscriber is installed; hosts choose their own
}

fn js_error(e: LookError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn parse_heuristics(json: Option<String>) -> Result<Option<LearnedHeuristics>> {
    json.filter(|s| !s.trim().is_empty())
        .map(|s| LearnedHeuristics::from_json(&s))
        .transpose()
}

impl From<PixelBuffer> for GradedImage {
    fn from(image: PixelBuffer) -> Self {
        let (width, height) = (image.width(), image.height());
        Self {
            pixels: image.into_data(),
            width,
            height,
        }
    }
}

/// Fits a look to a reference image.
///
/// # Arguments
/// * `pixels` - Reference RGBA bytes, row-major
/// * `width`, `height` - Reference dimensions
/// * `heuristics` - Optional learned-heuristics table as JSON
///
/// # Returns
/// The fitted `LookParams` as JSON.
///
/// # Errors
/// Returns an error if the buffer size doesn't match the dimensions or the
/// heuristics JSON is malformed.
///
/// # Example (JavaScript)
/// ```js
/// const { data, width, height } = ctx.getImageData(0, 0, w, h);
/// const lookJson = fitReference(new Uint8Array(data.buffer), width, height);
/// ```
#[wasm_bindgen(js_name = fitReference)]
pub fn fit_reference_js(
    pixels: &[u8],
    width: u32,
    height: u32,
    heuristics: Option<String>,
) -> std::result::Result<String, JsValue> {
    fit_reference_json(pixels, width, height, heuristics).map_err(js_error)
}

fn fit_reference_json(pixels: &[u8], width: u32, height: u32, heuristics: Option<String>) -> Result<String> {
    let reference = PixelBuffer::from_rgba(width, height, pixels)?;
    let table = parse_heuristics(heuristics)?;
    fit_reference(&reference, table.as_ref()).to_json()
}

/// Applies a look (without halation) to a source image.
///
/// # Errors
/// Returns an error if the buffer size doesn't match the dimensions or the
/// look JSON is malformed.
#[wasm_bindgen(js_name = applyLook)]
pub fn apply_look_js(
    pixels: &[u8],
    width: u32,
    height: u32,
    look: &str,
) -> std::result::Result<GradedImage, JsValue> {
    let apply = || -> Result<GradedImage> {
        let source = PixelBuffer::from_rgba(width, height, pixels)?;
        let look = types::LookParams::from_json(look)?;
        Ok(apply_look(&source, &look).into())
    };
    apply().map_err(js_error)
}

/// Applies only the highlight bloom.
///
/// # Errors
/// Returns an error if the buffer size doesn't match the dimensions.
#[wasm_bindgen(js_name = applyHalation)]
pub fn apply_halation_js(
    pixels: &[u8],
    width: u32,
    height: u32,
    fill: &HighlightFill,
) -> std::result::Result<GradedImage, JsValue> {
    let image = PixelBuffer::from_rgba(width, height, pixels).map_err(js_error)?;
    Ok(apply_halation(&image, fill).into())
}

/// Grades a source image with a stored look, optionally layering user
/// overrides (strengths, band knobs, highlight fill) on top.
///
/// # Errors
/// Returns an error if the buffer size doesn't match the dimensions or any
/// JSON argument is malformed.
///
/// # Example (JavaScript)
/// ```js
/// const graded = gradeImage(pixels, width, height, lookJson,
///     JSON.stringify({ colorStrength: 0.7, highlightFill: { strength: 0.4, warmth: 0.2 } }));
/// ctx.putImageData(new ImageData(new Uint8ClampedArray(graded.pixels), graded.width), 0, 0);
/// ```
#[wasm_bindgen(js_name = gradeImage)]
pub fn grade_image(
    pixels: &[u8],
    width: u32,
    height: u32,
    look: &str,
    overrides: Option<String>,
) -> std::result::Result<GradedImage, JsValue> {
    grade_image_inner(pixels, width, height, look, overrides).map_err(js_error)
}

fn grade_image_inner(
    pixels: &[u8],
    width: u32,
    height: u32,
    look: &str,
    overrides: Option<String>,
) -> Result<GradedImage> {
    let source = PixelBuffer::from_rgba(width, height, pixels)?;
    let mut look = types::LookParams::from_json(look)?;
    if let Some(json) = overrides.filter(|s| !s.trim().is_empty()) {
        look = look.with_overrides(&MatchOverrides::from_json(&json)?);
    }
    Ok(grade(&source, &look).into())
}

/// One-shot match: fits the reference and grades the source with it.
///
/// # Arguments
/// * `source`, `source_width`, `source_height` - Image to grade
/// * `reference`, `reference_width`, `reference_height` - Look reference
/// * `options` - Optional `MatchOptions` JSON (`overrides`, `sourceType`)
/// * `heuristics` - Optional learned-heuristics table as JSON
///
/// # Errors
/// Returns an error if either buffer is malformed or any JSON argument is
/// invalid.
#[wasm_bindgen(js_name = matchLook)]
pub fn match_look_js(
    source: &[u8],
    source_width: u32,
    source_height: u32,
    reference: &[u8],
    reference_width: u32,
    reference_height: u32,
    options: Option<String>,
    heuristics: Option<String>,
) -> std::result::Result<MatchResult, JsValue> {
    let run = || -> Result<MatchResult> {
        let source = PixelBuffer::from_rgba(source_width, source_height, source)?;
        let reference = PixelBuffer::from_rgba(reference_width, reference_height, reference)?;
        let options = match options.filter(|s| !s.trim().is_empty()) {
            Some(json) => MatchOptions::from_json(&json)?,
            None => MatchOptions::default(),
        };
        let table = parse_heuristics(heuristics)?;
        let outcome = match_look(&source, &reference, &options, table.as_ref());
        Ok(MatchResult {
            look_json: outcome.look.to_json()?,
            image: outcome.image.into(),
        })
    };
    run().map_err(js_error)
}

/// Blends learned corrections into a set of match parameters.
///
/// # Arguments
/// * `base` - `MatchParams` JSON
/// * `heuristics` - Optional learned table JSON; absent means no change
/// * `context` - Optional `HeuristicsContext` JSON (buckets and scores)
///
/// # Returns
/// The adjusted `MatchParams` as JSON.
#[wasm_bindgen(js_name = adjustMatchParams)]
pub fn adjust_match_params_js(
    base: &str,
    heuristics: Option<String>,
    context: Option<String>,
) -> std::result::Result<String, JsValue> {
    let run = || -> Result<String> {
        let base: MatchParams = serde_json::from_str(base)?;
        let table = parse_heuristics(heuristics)?;
        let context = match context.filter(|s| !s.trim().is_empty()) {
            Some(json) => serde_json::from_str(&json)?,
            None => HeuristicsContext::default(),
        };
        let adjusted = heuristics::adjust_match_params(&base, table.as_ref(), &context);
        Ok(serde_json::to_string(&adjusted)?)
    };
    run().map_err(js_error)
}

/// Classifies an image into exposure and color buckets.
///
/// # Errors
/// Returns an error if the buffer size doesn't match the dimensions.
#[wasm_bindgen(js_name = classifyImage)]
pub fn classify_image(pixels: &[u8], width: u32, height: u32) -> std::result::Result<ImageBuckets, JsValue> {
    let image = PixelBuffer::from_rgba(width, height, pixels).map_err(js_error)?;
    Ok(heuristics::classify_stats(compute_image_stats(&image).as_ref()))
}

/// Exposure and chroma statistics of an image as JSON, or `undefined` when
/// no pixel is opaque.
///
/// # Errors
/// Returns an error if the buffer size doesn't match the dimensions.
#[wasm_bindgen(js_name = imageStats)]
pub fn image_stats(pixels: &[u8], width: u32, height: u32) -> std::result::Result<Option<String>, JsValue> {
    let run = || -> Result<Option<String>> {
        let image = PixelBuffer::from_rgba(width, height, pixels)?;
        compute_image_stats(&image)
            .map(|stats| serde_json::to_string(&stats).map_err(LookError::from))
            .transpose()
    };
    run().map_err(js_error)
}

/// Converts one sRGB color to OKLab `[L, a, b]`.
#[wasm_bindgen(js_name = toPerceptual)]
pub fn to_perceptual(r: u8, g: u8, b: u8) -> Vec<f32> {
    let (l, a, b) = color::srgb8_to_oklab(r, g, b);
    vec![l, a, b]
}

/// Converts one OKLab color to sRGB `[r, g, b]`, rounded and clamped.
#[wasm_bindgen(js_name = toSrgb)]
pub fn to_srgb(l: f32, a: f32, b: f32) -> Vec<u8> {
    let (r, g, b) = color::oklab_to_srgb8(l, a, b);
    vec![r, g, b]
}

/// Decodes a JPEG or PNG file into RGBA pixels.
///
/// # Errors
/// Returns an error if the bytes are not a supported image.
#[wasm_bindgen(js_name = decodeImage)]
pub fn decode_image(bytes: &[u8]) -> std::result::Result<GradedImage, JsValue> {
    PixelBuffer::decode(bytes).map(GradedImage::from).map_err(js_error)
}

/// Creates the neutral look (identity grade) as JSON.
#[wasm_bindgen(js_name = createDefaultLook)]
pub fn create_default_look() -> String {
    serde_json::to_string(&types::LookParams::default()).unwrap_or_default()
}

/// Creates default match strengths as JSON:
/// - lumaStrength, colorStrength, colorDensity, exposureStrength: 1.0
/// - blackStrength: 0.0
/// - blackRange: 0.6
#[wasm_bindgen(js_name = createDefaultMatchParams)]
pub fn create_default_match_params() -> String {
    serde_json::to_string(&MatchParams::default()).unwrap_or_default()
}

/// Creates gentle match strengths (luma, color and exposure at 0.5) as JSON.
#[wasm_bindgen(js_name = createSubtleMatchParams)]
pub fn create_subtle_match_params() -> String {
    serde_json::to_string(&MatchParams::subtle()).unwrap_or_default()
}

/// Creates committed match strengths (luma and color at 1.2, density 1.1)
/// as JSON.
#[wasm_bindgen(js_name = createStrongMatchParams)]
pub fn create_strong_match_params() -> String {
    serde_json::to_string(&MatchParams::strong()).unwrap_or_default()
}

// Re-export types for use in WASM
pub use types::{
    GradedImage, HighlightFill, LookParams, MatchOverrides, MatchParams, MatchResult,
};
