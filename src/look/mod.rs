//! The grading core: reference fitting, look application and halation.

pub mod apply;
pub mod bands;
pub mod filter;
pub mod fit;
pub mod halation;
pub mod stats;

pub use apply::{apply_look, ColorModel, ToneModel};
pub use fit::fit_reference;
pub use halation::apply_halation;
pub use stats::compute_image_stats;
