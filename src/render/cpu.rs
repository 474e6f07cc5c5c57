use crate::foundation::core::{Canvas, Point, Rect, Rgba8};
use crate::foundation::error::{WalkthroughError, WalkthroughResult};
use crate::render::frame::FrameRGBA;
use crate::render::surface::{FontSpec, Surface};
use crate::render::text::{TextBrushRgba8, TextLayoutEngine};
use std::path::Path;

/// Advance estimate used for text metrics when no font is loaded.
const FALLBACK_ADVANCE_RATIO: f64 = 0.55;

/// Raster surface backed by `vello_cpu`, with Parley text shaping.
///
/// Without a font, text is measured with a fixed per-character advance and not drawn.
pub struct CpuSurface {
    width: u16,
    height: u16,
    ctx: vello_cpu::RenderContext,
    pixmap: vello_cpu::Pixmap,
    text: Option<TextLayoutEngine>,
}

impl CpuSurface {
    /// Create a surface; `font_path` of `None` disables glyph drawing.
    pub fn new(canvas: Canvas, font_path: Option<&Path>) -> WalkthroughResult<Self> {
        canvas.validate()?;
        let width = u16::try_from(canvas.width)
            .map_err(|_| WalkthroughError::validation("surface width exceeds u16"))?;
        let height = u16::try_from(canvas.height)
            .map_err(|_| WalkthroughError::validation("surface height exceeds u16"))?;

        let text = match font_path {
            Some(p) => Some(TextLayoutEngine::from_path(p)?),
            None => {
                tracing::warn!("no font available; scene text will be measured but not drawn");
                None
            }
        };

        Ok(Self {
            width,
            height,
            ctx: vello_cpu::RenderContext::new(width, height),
            pixmap: vello_cpu::Pixmap::new(width, height),
            text,
        })
    }

    /// Whether glyphs are actually drawn.
    pub fn has_font(&self) -> bool {
        self.text.is_some()
    }

    fn draw_text(
        &mut self,
        text: &str,
        origin: Point,
        font: FontSpec,
        color: Rgba8,
    ) -> WalkthroughResult<()> {
        let Some(engine) = self.text.as_mut() else {
            return Ok(());
        };
        if text.is_empty() {
            return Ok(());
        }
        let brush = TextBrushRgba8 {
            r: color.r,
            g: color.g,
            b: color.b,
            a: color.a,
        };
        let layout = engine.layout_line(text, font, brush)?;
        let baseline = layout
            .lines()
            .next()
            .map(|l| f64::from(l.metrics().baseline))
            .unwrap_or(0.0);

        self.ctx.set_transform(vello_cpu::kurbo::Affine::translate((
            origin.x,
            origin.y - baseline,
        )));
        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let brush = run.style().brush;
                self.ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    brush.r, brush.g, brush.b, brush.a,
                ));
                let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                self.ctx
                    .glyph_run(run.run().font())
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
        self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        Ok(())
    }
}

impl Surface for CpuSurface {
    fn width(&self) -> u32 {
        u32::from(self.width)
    }

    fn height(&self) -> u32 {
        u32::from(self.height)
    }

    fn clear(&mut self) {
        self.ctx.reset();
        self.pixmap.data_as_u8_slice_mut().fill(0);
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba8) {
        self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
            color.r, color.g, color.b, color.a,
        ));
        self.ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            rect.x0, rect.y0, rect.x1, rect.y1,
        ));
    }

    fn fill_text(&mut self, text: &str, origin: Point, font: FontSpec, color: Rgba8) {
        if let Err(e) = self.draw_text(text, origin, font, color) {
            tracing::debug!(error = %e, "text draw skipped");
        }
    }

    fn measure_text(&mut self, text: &str, font: FontSpec) -> f64 {
        match self.text.as_mut() {
            Some(engine) => engine.measure(text, font).unwrap_or_else(|e| {
                tracing::debug!(error = %e, "text measure fell back to estimate");
                estimate_width(text, font)
            }),
            None => estimate_width(text, font),
        }
    }

    fn read_frame(&mut self) -> WalkthroughResult<FrameRGBA> {
        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut self.pixmap);
        Ok(FrameRGBA {
            width: u32::from(self.width),
            height: u32::from(self.height),
            data: self.pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }
}

fn estimate_width(text: &str, font: FontSpec) -> f64 {
    text.chars().count() as f64 * f64::from(font.size_px) * FALLBACK_ADVANCE_RATIO
}
