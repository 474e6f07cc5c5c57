//! Scene rendering: drawing surfaces and the per-frame scene painter.

/// `vello_cpu` raster surface.
pub mod cpu;
/// Captured frame pixels.
pub mod frame;
/// Scene painter and word wrap.
pub mod scene;
/// Surface contract and the headless display-list surface.
pub mod surface;
/// Font discovery and Parley text shaping.
pub mod text;
/// Scene theme (colors, metrics, caption).
pub mod theme;
