use crate::foundation::core::{Canvas, Point, Rect, Rgba8};
use crate::foundation::error::WalkthroughResult;
use crate::render::frame::FrameRGBA;

/// Font selection for text drawing and measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FontSpec {
    /// Font size in pixels.
    pub size_px: f32,
    /// Request a bold weight.
    pub bold: bool,
}

impl FontSpec {
    pub const fn regular(size_px: f32) -> Self {
        Self {
            size_px,
            bold: false,
        }
    }

    pub const fn bold(size_px: f32) -> Self {
        Self {
            size_px,
            bold: true,
        }
    }
}

/// 2D drawing surface the scene renderer paints onto.
///
/// Text origins are baseline positions, as with a canvas `fillText`.
pub trait Surface {
    /// Surface width in pixels.
    fn width(&self) -> u32;
    /// Surface height in pixels.
    fn height(&self) -> u32;
    /// Discard everything drawn so far and reset to transparent.
    fn clear(&mut self);
    /// Fill an axis-aligned rectangle.
    fn fill_rect(&mut self, rect: Rect, color: Rgba8);
    /// Draw a single line of text with its baseline starting at `origin`.
    fn fill_text(&mut self, text: &str, origin: Point, font: FontSpec, color: Rgba8);
    /// Advance width of `text` in pixels.
    fn measure_text(&mut self, text: &str, font: FontSpec) -> f64;
    /// Rasterize what has been drawn and read back the frame.
    fn read_frame(&mut self) -> WalkthroughResult<FrameRGBA>;
}

/// One recorded drawing operation.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    Clear,
    FillRect {
        rect: Rect,
        color: Rgba8,
    },
    FillText {
        text: String,
        origin: Point,
        font: FontSpec,
        color: Rgba8,
    },
}

/// Headless surface that records draw operations.
///
/// Text metrics are deterministic: every `char` advances `size_px * advance_ratio`. Rectangles are
/// rasterized on read-back; text is not.
#[derive(Clone, Debug)]
pub struct DisplayListSurface {
    canvas: Canvas,
    advance_ratio: f64,
    ops: Vec<DrawOp>,
}

impl DisplayListSurface {
    pub fn new(canvas: Canvas) -> Self {
        Self {
            canvas,
            advance_ratio: 0.5,
            ops: Vec::new(),
        }
    }

    pub fn with_advance_ratio(mut self, ratio: f64) -> Self {
        self.advance_ratio = ratio;
        self
    }

    /// Operations recorded since the last [`Surface::clear`] (the clear itself included).
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Text drawn since the last clear, in draw order.
    pub fn texts(&self) -> impl Iterator<Item = (&str, Point, FontSpec)> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::FillText {
                text, origin, font, ..
            } => Some((text.as_str(), *origin, *font)),
            _ => None,
        })
    }

    fn text_width(&self, text: &str, font: FontSpec) -> f64 {
        text.chars().count() as f64 * f64::from(font.size_px) * self.advance_ratio
    }
}

impl Surface for DisplayListSurface {
    fn width(&self) -> u32 {
        self.canvas.width
    }

    fn height(&self) -> u32 {
        self.canvas.height
    }

    fn clear(&mut self) {
        self.ops.clear();
        self.ops.push(DrawOp::Clear);
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba8) {
        self.ops.push(DrawOp::FillRect { rect, color });
    }

    fn fill_text(&mut self, text: &str, origin: Point, font: FontSpec, color: Rgba8) {
        self.ops.push(DrawOp::FillText {
            text: text.to_owned(),
            origin,
            font,
            color,
        });
    }

    fn measure_text(&mut self, text: &str, font: FontSpec) -> f64 {
        self.text_width(text, font)
    }

    fn read_frame(&mut self) -> WalkthroughResult<FrameRGBA> {
        let mut frame = FrameRGBA::blank(self.canvas.width, self.canvas.height);
        for op in &self.ops {
            if let DrawOp::FillRect { rect, color } = op {
                fill_rect_premul(&mut frame, *rect, color.premultiplied());
            }
        }
        Ok(frame)
    }
}

/// Source-over fill of a premultiplied color, snapped to whole pixels.
fn fill_rect_premul(frame: &mut FrameRGBA, rect: Rect, src: [u8; 4]) {
    let w = f64::from(frame.width);
    let h = f64::from(frame.height);
    let x0 = rect.x0.clamp(0.0, w).round() as usize;
    let x1 = rect.x1.clamp(0.0, w).round() as usize;
    let y0 = rect.y0.clamp(0.0, h).round() as usize;
    let y1 = rect.y1.clamp(0.0, h).round() as usize;
    let stride = frame.width as usize * 4;
    let inv = 255u16 - u16::from(src[3]);

    for y in y0..y1 {
        let row = &mut frame.data[y * stride..(y + 1) * stride];
        for px in row[x0 * 4..x1 * 4].chunks_exact_mut(4) {
            for c in 0..4 {
                let d = u16::from(px[c]);
                px[c] = (u16::from(src[c]) + (d * inv + 127) / 255).min(255) as u8;
            }
        }
    }
}
