use crate::foundation::core::Rgba8;
use serde::{Deserialize, Serialize};

/// Colors, metrics and caption used by the scene renderer.
///
/// Colors are written as `#RRGGBB` / `#RRGGBBAA` strings in config files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub background: Rgba8,
    pub progress: Rgba8,
    pub title: Rgba8,
    pub body: Rgba8,
    pub caption_band: Rgba8,
    pub caption_text: Rgba8,

    /// Left/right inset; the content width is `width - 2 * inset`.
    pub inset: f64,
    pub bar_top: f64,
    pub bar_height: f64,

    pub title_size: f32,
    pub title_baseline: f64,

    pub body_size: f32,
    pub body_top: f64,
    pub line_height: f64,

    pub caption: String,
    pub caption_size: f32,
    /// Distance of the caption band's top edge from the bottom of the surface.
    pub caption_band_offset: f64,
    pub caption_band_height: f64,
    /// Horizontal offset of the caption text inside the band.
    pub caption_indent: f64,
    /// Distance of the caption baseline from the bottom of the surface.
    pub caption_baseline_offset: f64,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Rgba8::rgb(0x0b, 0x10, 0x20),
            progress: Rgba8::rgb(0x38, 0xbd, 0xf8),
            title: Rgba8::rgb(0xe2, 0xe8, 0xf0),
            body: Rgba8::rgb(0xcb, 0xd5, 0xf5),
            // rgba(56, 189, 248, 0.2)
            caption_band: Rgba8::rgba(56, 189, 248, 51),
            caption_text: Rgba8::rgb(0xe2, 0xe8, 0xf0),
            inset: 40.0,
            bar_top: 40.0,
            bar_height: 8.0,
            title_size: 28.0,
            title_baseline: 100.0,
            body_size: 20.0,
            body_top: 150.0,
            line_height: 28.0,
            caption: "AI Walkthrough Video".to_owned(),
            caption_size: 16.0,
            caption_band_offset: 80.0,
            caption_band_height: 40.0,
            caption_indent: 10.0,
            caption_baseline_offset: 53.0,
        }
    }
}

impl Theme {
    /// Usable text/bar width for a surface of `width` pixels.
    pub fn content_width(&self, width: u32) -> f64 {
        (f64::from(width) - 2.0 * self.inset).max(0.0)
    }
}
