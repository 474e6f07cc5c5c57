use crate::foundation::core::{Point, Rect};
use crate::guide::model::Scene;
use crate::render::surface::{FontSpec, Surface};
use crate::render::theme::Theme;

/// Paint one frame of `scene` at `progress` (clamped to `[0, 1]`).
///
/// Drawing is a pure function of `(surface size, theme, scene, progress)`; calling it twice with
/// the same input produces the same draw sequence. Returns the wrapped body lines.
pub fn render_scene(
    surface: &mut dyn Surface,
    theme: &Theme,
    scene: &Scene,
    progress: f64,
) -> Vec<String> {
    let width = f64::from(surface.width());
    let height = f64::from(surface.height());
    let content_w = theme.content_width(surface.width());
    let progress = if progress.is_finite() {
        progress.clamp(0.0, 1.0)
    } else {
        0.0
    };

    surface.clear();
    surface.fill_rect(Rect::new(0.0, 0.0, width, height), theme.background);

    let bar_w = (content_w * progress).max(0.0);
    if bar_w > 0.0 {
        surface.fill_rect(
            Rect::new(
                theme.inset,
                theme.bar_top,
                theme.inset + bar_w,
                theme.bar_top + theme.bar_height,
            ),
            theme.progress,
        );
    }

    surface.fill_text(
        scene.title(),
        Point::new(theme.inset, theme.title_baseline),
        FontSpec::bold(theme.title_size),
        theme.title,
    );

    let body_font = FontSpec::regular(theme.body_size);
    let lines = wrap_words(scene.display_text(), content_w, |s| {
        surface.measure_text(s, body_font)
    });
    for (i, line) in lines.iter().enumerate() {
        let y = theme.body_top + theme.line_height * i as f64;
        surface.fill_text(line, Point::new(theme.inset, y), body_font, theme.body);
    }

    let band_top = height - theme.caption_band_offset;
    surface.fill_rect(
        Rect::new(
            theme.inset,
            band_top,
            theme.inset + content_w,
            band_top + theme.caption_band_height,
        ),
        theme.caption_band,
    );
    surface.fill_text(
        &theme.caption,
        Point::new(
            theme.inset + theme.caption_indent,
            height - theme.caption_baseline_offset,
        ),
        FontSpec::regular(theme.caption_size),
        theme.caption_text,
    );

    lines
}

/// Greedy word wrap.
///
/// Words are packed into a line while the measured width of the line stays `<= max_width`. A word
/// that alone is wider than `max_width` is broken at character boundaries, so no returned line is
/// wider than `max_width` unless a single character already is.
pub fn wrap_words(text: &str, max_width: f64, mut measure: impl FnMut(&str) -> f64) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        let candidate = if line.is_empty() {
            word.to_owned()
        } else {
            format!("{line} {word}")
        };
        if measure(&candidate) <= max_width {
            line = candidate;
            continue;
        }

        if !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }
        if measure(word) <= max_width {
            line = word.to_owned();
            continue;
        }

        let mut piece = String::new();
        for ch in word.chars() {
            piece.push(ch);
            if measure(&piece) <= max_width {
                continue;
            }
            piece.pop();
            if !piece.is_empty() {
                lines.push(std::mem::take(&mut piece));
            }
            piece.push(ch);
            if measure(&piece) > max_width {
                lines.push(std::mem::take(&mut piece));
            }
        }
        line = piece;
    }

    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
#[path = "../../tests/unit/render/scene.rs"]
mod tests;
