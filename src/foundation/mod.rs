//! Shared primitives: geometry, frame rate, colors and the crate error type.

/// Geometry, canvas, frame rate and colors.
pub mod core;
/// Crate-wide error type.
pub mod error;
