//! Color-space conversion between 8-bit sRGB and OKLab.
//!
//! All grading math runs on OKLab lightness `L` in [0, 1] and the two
//! opponent axes `a` (green/magenta) and `b` (blue/yellow).

pub mod oklab;
pub mod transfer;

pub use oklab::*;
pub use transfer::*;
