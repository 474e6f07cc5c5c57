use super::*;
use crate::foundation::core::{Canvas, Rgba8};
use crate::render::surface::{DisplayListSurface, DrawOp};

fn char_measure(s: &str) -> f64 {
    s.chars().count() as f64
}

fn surface() -> DisplayListSurface {
    DisplayListSurface::new(Canvas::default())
}

#[test]
fn wrap_packs_greedily() {
    let lines = wrap_words("aa bb cc dd", 5.0, char_measure);
    assert_eq!(lines, vec!["aa bb", "cc dd"]);

    let lines = wrap_words("aa bb cc", 4.0, char_measure);
    assert_eq!(lines, vec!["aa", "bb", "cc"]);
}

#[test]
fn wrap_flushes_final_partial_line_and_collapses_whitespace() {
    let lines = wrap_words("  one   two\nthree ", 100.0, char_measure);
    assert_eq!(lines, vec!["one two three"]);
    assert!(wrap_words("", 10.0, char_measure).is_empty());
    assert!(wrap_words("   ", 10.0, char_measure).is_empty());
}

#[test]
fn wrap_breaks_overlong_words() {
    let lines = wrap_words("ab abcdefghij cd", 4.0, char_measure);
    assert_eq!(lines, vec!["ab", "abcd", "efgh", "ij", "cd"]);
    for line in &lines {
        assert!(char_measure(line) <= 4.0, "line {line:?} overflows");
    }
}

#[test]
fn wrap_never_exceeds_width_over_many_inputs() {
    let text = "The quick brown fox jumps over the lazy dog while \
                supercalifragilisticexpialidocious words stretch the layout";
    for max in 1..40 {
        let max = f64::from(max);
        for line in wrap_words(text, max, char_measure) {
            assert!(char_measure(&line) <= max, "{line:?} wider than {max}");
        }
    }
}

#[test]
fn render_draws_background_bar_title_body_caption_in_order() {
    let theme = Theme::default();
    let scene = Scene::new("Intro", "spoken", Some("Look at the loop".into()));
    let mut s = surface();
    let lines = render_scene(&mut s, &theme, &scene, 0.5);
    assert_eq!(lines, vec!["Look at the loop"]);

    let ops = s.ops();
    assert_eq!(ops[0], DrawOp::Clear);
    assert_eq!(
        ops[1],
        DrawOp::FillRect {
            rect: Rect::new(0.0, 0.0, 960.0, 540.0),
            color: theme.background,
        }
    );
    assert_eq!(
        ops[2],
        DrawOp::FillRect {
            rect: Rect::new(40.0, 40.0, 40.0 + 440.0, 48.0),
            color: theme.progress,
        }
    );

    let texts: Vec<_> = s.texts().collect();
    assert_eq!(texts[0].0, "Intro");
    assert_eq!(texts[0].1, Point::new(40.0, 100.0));
    assert!(texts[0].2.bold);
    assert_eq!(texts[1].0, "Look at the loop");
    assert_eq!(texts[1].1, Point::new(40.0, 150.0));
    assert_eq!(texts[2].0, "AI Walkthrough Video");
    assert_eq!(texts[2].1, Point::new(50.0, 540.0 - 53.0));

    let band = ops
        .iter()
        .rev()
        .find_map(|op| match op {
            DrawOp::FillRect { rect, color } => Some((*rect, *color)),
            _ => None,
        })
        .unwrap();
    assert_eq!(band.0, Rect::new(40.0, 460.0, 920.0, 500.0));
    assert_eq!(band.1, Rgba8::rgba(56, 189, 248, 51));
}

#[test]
fn render_without_progress_skips_bar_and_clamps() {
    let theme = Theme::default();
    let scene = Scene::default();
    let mut s = surface();
    render_scene(&mut s, &theme, &scene, -3.0);
    let rects = s
        .ops()
        .iter()
        .filter(|op| matches!(op, DrawOp::FillRect { .. }))
        .count();
    // Background + caption band only.
    assert_eq!(rects, 2);

    render_scene(&mut s, &theme, &scene, 7.0);
    assert!(s.ops().contains(&DrawOp::FillRect {
        rect: Rect::new(40.0, 40.0, 920.0, 48.0),
        color: theme.progress,
    }));
}

#[test]
fn missing_text_degrades_to_empty() {
    let theme = Theme::default();
    let mut s = surface();
    let lines = render_scene(&mut s, &theme, &Scene::default(), 0.0);
    assert!(lines.is_empty());
    let texts: Vec<_> = s.texts().map(|(t, _, _)| t.to_owned()).collect();
    assert_eq!(texts, vec!["".to_owned(), "AI Walkthrough Video".to_owned()]);
}

#[test]
fn body_lines_fit_content_width_and_advance_by_line_height() {
    let theme = Theme::default();
    let text = "word ".repeat(200);
    let scene = Scene::new("Long", text, None);
    let mut s = surface();
    let lines = render_scene(&mut s, &theme, &scene, 0.25);
    assert!(lines.len() > 1);

    let body = FontSpec::regular(theme.body_size);
    let texts: Vec<_> = s
        .texts()
        .filter(|(_, _, f)| *f == body)
        .map(|(t, p, _)| (t.to_owned(), p))
        .collect();
    assert_eq!(texts.len(), lines.len());
    for (i, (t, p)) in texts.iter().enumerate() {
        assert!(s.clone().measure_text(t, body) <= theme.content_width(960));
        assert_eq!(p.y, 150.0 + 28.0 * i as f64);
    }
}

#[test]
fn rendering_is_idempotent() {
    let theme = Theme::default();
    let scene = Scene::new("Same", "same input same output", None);
    let mut a = surface();
    let mut b = surface();
    let la = render_scene(&mut a, &theme, &scene, 0.3);
    render_scene(&mut b, &theme, &scene, 0.9);
    let lb = render_scene(&mut b, &theme, &scene, 0.3);
    assert_eq!(la, lb);
    assert_eq!(a.ops(), b.ops());
    assert_eq!(a.read_frame().unwrap(), b.read_frame().unwrap());
}
