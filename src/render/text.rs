use crate::foundation::error::{WalkthroughError, WalkthroughResult};
use crate::render::surface::FontSpec;
use std::path::{Path, PathBuf};

/// Brush color carried through Parley layouts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct TextBrushRgba8 {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: u8,
}

/// Environment variable naming a TTF/OTF file used for text rendering.
pub const FONT_ENV: &str = "WALKTHROUGH_FONT";

const FONT_CANDIDATES: &[&str] = &[
    "assets/fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Locate a font file: the configured path, then `WALKTHROUGH_FONT`, then well-known locations.
pub fn discover_font(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = configured
        && p.is_file()
    {
        return Some(p.to_path_buf());
    }
    if let Ok(p) = std::env::var(FONT_ENV) {
        let p = PathBuf::from(p);
        if p.is_file() {
            return Some(p);
        }
    }
    FONT_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
}

/// Bold face shipped next to a regular font file, e.g. `DejaVuSans-Bold.ttf` beside
/// `DejaVuSans.ttf` or `LiberationSans-Bold.ttf` beside `LiberationSans-Regular.ttf`.
pub(crate) fn bold_sibling(path: &Path) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    let ext = path.extension().and_then(|e| e.to_str());
    let base = stem.strip_suffix("-Regular").unwrap_or(stem);
    let name = match ext {
        Some(ext) => format!("{base}-Bold.{ext}"),
        None => format!("{base}-Bold"),
    };
    let candidate = path.with_file_name(name);
    candidate.is_file().then_some(candidate)
}

/// Stateful helper for shaping single-line text with one registered family.
///
/// The family may carry a bold face; Parley picks it for bold runs and each run reports the face
/// it resolved to.
pub(crate) struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    family_name: String,
}

impl TextLayoutEngine {
    /// Register `font_bytes` and prepare contexts for shaping with it.
    pub(crate) fn from_font_bytes(font_bytes: Vec<u8>) -> WalkthroughResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            WalkthroughError::validation("no font families registered from font bytes")
        })?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| WalkthroughError::validation("registered font family has no name"))?
            .to_string();

        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
        })
    }

    /// Load a regular face and, when present, its bold sibling.
    pub(crate) fn from_path(path: &Path) -> WalkthroughResult<Self> {
        let mut engine = Self::from_font_bytes(read_font(path)?)?;
        if let Some(bold) = bold_sibling(path) {
            match read_font(&bold) {
                Ok(bytes) => engine.register_face(bytes),
                Err(e) => tracing::warn!(error = %e, "bold face skipped"),
            }
        }
        Ok(engine)
    }

    /// Add another face to the collection; faces of the same family become weight variants.
    pub(crate) fn register_face(&mut self, font_bytes: Vec<u8>) {
        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes), None);
        let same_family = families.iter().any(|(id, _)| {
            self.font_ctx.collection.family_name(*id) == Some(self.family_name.as_str())
        });
        if !same_family {
            tracing::warn!(family = %self.family_name, "extra face is not in the text family");
        }
    }

    /// Shape `text` as one unbroken line.
    pub(crate) fn layout_line(
        &mut self,
        text: &str,
        spec: FontSpec,
        brush: TextBrushRgba8,
    ) -> WalkthroughResult<parley::Layout<TextBrushRgba8>> {
        if !spec.size_px.is_finite() || spec.size_px <= 0.0 {
            return Err(WalkthroughError::validation(
                "text size_px must be finite and > 0",
            ));
        }

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(self.family_name.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(spec.size_px));
        if spec.bold {
            builder.push_default(parley::style::StyleProperty::FontWeight(
                parley::style::FontWeight::BOLD,
            ));
        }
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }

    /// Advance width of `text` in pixels.
    pub(crate) fn measure(&mut self, text: &str, spec: FontSpec) -> WalkthroughResult<f64> {
        if text.is_empty() {
            return Ok(0.0);
        }
        let layout = self.layout_line(text, spec, TextBrushRgba8::default())?;
        Ok(f64::from(layout.width()))
    }
}

fn read_font(path: &Path) -> WalkthroughResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        WalkthroughError::validation(format!("failed to read font '{}': {e}", path.display()))
    })
}
