//! Error types for look fitting and grading.

use thiserror::Error;

/// Errors that can occur while fitting or applying a look.
///
/// Degenerate image content (no opaque pixels, empty bands) is never an
/// error; it falls back to neutral parameters. Only buffers that cannot be
/// graded at all are reported here.
#[derive(Error, Debug)]
pub enum LookError {
    /// Zero-area image or dimensions that overflow the address space
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// Byte buffer length does not match width x height x 4
    #[error("Buffer size mismatch: expected {expected} bytes for {width}x{height} RGBA, got {actual}")]
    BufferSizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// The image holds no pixels to grade
    #[error("Cannot grade an empty image")]
    EmptyImage,

    /// Encoded image could not be decoded
    #[error("Image decoding error: {0}")]
    Decode(String),

    /// JSON (de)serialization of parameters or heuristics failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A parameter could not be interpreted (unknown name, malformed value)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type alias for look operations.
pub type Result<T> = std::result::Result<T, LookError>;

impl From<serde_json::Error> for LookError {
    fn from(err: serde_json::Error) -> Self {
        LookError::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for LookError {
    fn from(err: image::ImageError) -> Self {
        LookError::Decode(err.to_string())
    }
}
