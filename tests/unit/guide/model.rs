use super::*;
use serde_json::json;

#[test]
fn durations_default_and_sanitize() {
    let d = Durations::new([Some(2.0), None, Some(0.0), Some(-1.0), Some(f64::NAN), Some(3.5)]);
    assert_eq!(d.secs(0), 2.0);
    assert_eq!(d.secs(1), DEFAULT_STEP_SECS);
    assert_eq!(d.secs(2), DEFAULT_STEP_SECS);
    assert_eq!(d.secs(3), DEFAULT_STEP_SECS);
    assert_eq!(d.secs(4), DEFAULT_STEP_SECS);
    assert_eq!(d.secs(5), 3.5);
    // Shorter than the list: default applies.
    assert_eq!(d.secs(42), DEFAULT_STEP_SECS);
    assert_eq!(d.get(0), Duration::from_secs(2));
}

#[test]
fn oversized_durations_are_clamped() {
    let d = Durations::from_secs(&[1e20, f64::MAX, MAX_STEP_SECS + 1.0]);
    for i in 0..3 {
        assert_eq!(d.secs(i), MAX_STEP_SECS);
        assert_eq!(d.get(i), Duration::from_secs(3600));
    }
    let g = Guide::from_reader(json!({"steps": ["a"], "durations": [1e20]}).to_string().as_bytes())
        .unwrap();
    assert_eq!(g.durations().get(0), Duration::from_secs(3600));
    assert!(Durations::default().with_fallback_secs(1e20).is_err());
}

#[test]
fn durations_total_and_fallback_override() {
    let d = Durations::from_secs(&[1.0, 2.0]).with_fallback_secs(0.5).unwrap();
    assert_eq!(d.total(3), Duration::from_secs_f64(3.5));
    assert!(Durations::default().with_fallback_secs(0.0).is_err());
}

#[test]
fn scene_text_fallbacks() {
    let s = Scene {
        title: None,
        narration: Some("say this".into()),
        on_screen: None,
    };
    assert_eq!(s.title(), "");
    assert_eq!(s.display_text(), "say this");
    assert_eq!(s.spoken_text(), "say this");

    let s = Scene {
        title: Some("T".into()),
        narration: Some(String::new()),
        on_screen: Some("shown".into()),
    };
    assert_eq!(s.display_text(), "shown");
    assert_eq!(s.spoken_text(), "shown");

    assert_eq!(Scene::default().display_text(), "");
}

#[test]
fn scene_accepts_camel_case_on_screen() {
    let s: Scene = serde_json::from_value(json!({"onScreen": "x"})).unwrap();
    assert_eq!(s.display_text(), "x");
    let s: Scene = serde_json::from_value(json!({"on_screen": "y"})).unwrap();
    assert_eq!(s.display_text(), "y");
}

#[test]
fn guide_requires_steps_or_scenes() {
    assert!(Guide::new("t", vec![], None, Durations::default()).is_err());
    let empty_video = VideoScript {
        title: None,
        scenes: vec![],
    };
    assert!(Guide::new("t", vec![], Some(empty_video), Durations::default()).is_err());
}

#[test]
fn scenes_take_precedence_over_steps() {
    let video = VideoScript {
        title: Some("v".into()),
        scenes: vec![Scene::new("a", "b", None)],
    };
    let g = Guide::new(
        "t",
        vec![Step("one".into()), Step("two".into())],
        Some(video),
        Durations::default(),
    )
    .unwrap();
    assert_eq!(g.authority(), Authority::Scenes);
    assert_eq!(g.len(), 1);

    let g = Guide::from_steps("t", ["one", "two"], Durations::default()).unwrap();
    assert_eq!(g.authority(), Authority::Steps);
    assert_eq!(g.len(), 2);
}

#[test]
fn steps_only_guide_synthesizes_scenes() {
    let g = Guide::from_steps("", ["open the file", "fix the loop"], Durations::default()).unwrap();
    assert_eq!(g.title(), "Walkthrough");
    let scenes = g.render_scenes();
    assert_eq!(scenes.len(), 2);
    assert_eq!(scenes[1].title(), "Step 2");
    assert_eq!(scenes[1].display_text(), "fix the loop");
}

#[test]
fn guide_document_parses() {
    let doc = json!({
        "title": "Fix Steps",
        "steps": ["a", "b"],
        "durations": [2, null, 4],
        "video": {"title": "Video", "scenes": [{"title": "S1", "narration": "n1", "on_screen": "o1"}]},
        "ui_steps": ["click"],
        "video_notice": "",
    });
    let g = Guide::from_reader(doc.to_string().as_bytes()).unwrap();
    assert_eq!(g.title(), "Fix Steps");
    assert_eq!(g.authority(), Authority::Scenes);
    assert_eq!(g.durations().secs(1), DEFAULT_STEP_SECS);
    assert_eq!(g.durations().secs(2), 4.0);
    assert_eq!(g.ui_steps(), ["click".to_string()]);
    assert_eq!(g.video_notice(), None);

    let again = g.to_doc().into_guide().unwrap();
    assert_eq!(again, g);
}
