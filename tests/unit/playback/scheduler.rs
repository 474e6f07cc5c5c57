use super::*;
use crate::guide::timeline::TimelineEntry;
use crate::playback::narrator::ScriptedNarrator;

fn timeline(n: usize) -> Timeline {
    (0..n)
        .map(|i| TimelineEntry {
            narration: format!("say {i}"),
            on_screen: format!("show {i}"),
        })
        .collect()
}

fn scheduler(narrator: Option<ScriptedNarrator>, fallback: FallbackTimer) -> PlaybackScheduler {
    PlaybackScheduler::new(
        narrator.map(|n| Arc::new(n) as Arc<dyn Narrator>),
        PlaybackOpts { fallback },
    )
}

fn drain(rx: &mut broadcast::Receiver<PlaybackEvent>) -> Vec<PlaybackEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

fn advances(events: &[PlaybackEvent]) -> Vec<(u64, usize, TriggerSource)> {
    events
        .iter()
        .filter_map(|e| match *e {
            PlaybackEvent::Advanced {
                session,
                index,
                source,
            } => Some((session, index, source)),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn narration_finishing_first_advances_exactly_once() {
    let narrator = ScriptedNarrator::new(Duration::from_millis(100));
    let mut s = scheduler(Some(narrator.clone()), FallbackTimer::Race);
    let start = Instant::now();
    let mut h = s.play(timeline(2), Durations::from_secs(&[8.0, 8.0]));

    let done = h.settled().await;
    assert_eq!(done.status, PlaybackStatus::Finished);
    assert_eq!(start.elapsed(), Duration::from_millis(200));

    // Let every losing timer deadline pass.
    tokio::time::sleep(Duration::from_secs(30)).await;
    let events = drain(h.events());
    assert_eq!(
        advances(&events),
        vec![
            (1, 0, TriggerSource::Narration),
            (1, 1, TriggerSource::Narration)
        ]
    );
    assert_eq!(
        events.last(),
        Some(&PlaybackEvent::Finished { session: 1 })
    );
    assert_eq!(s.snapshot(), done);
    assert_eq!(narrator.log().spoken, vec!["say 0", "say 1"]);
}

#[tokio::test(start_paused = true)]
async fn timer_alone_drives_playback_without_narrator() {
    let mut s = scheduler(None, FallbackTimer::default());
    let start = Instant::now();
    let mut h = s.play(timeline(3), Durations::from_secs(&[2.0, 2.0, 2.0]));
    assert_eq!(h.snapshot().message, "Playing (narration unavailable)");

    let done = h.settled().await;
    assert_eq!(start.elapsed(), Duration::from_secs(6));
    assert_eq!(done.status, PlaybackStatus::Finished);
    assert_eq!(done.message, "Finished");
    assert_eq!(done.progress_percent, 100);
    assert_eq!(done.active, None);

    let sources: Vec<_> = advances(&drain(h.events()))
        .into_iter()
        .map(|(_, _, src)| src)
        .collect();
    assert_eq!(sources, vec![TriggerSource::Timer; 3]);
}

#[tokio::test(start_paused = true)]
async fn unavailable_narrator_degrades_to_timer() {
    let mut s = scheduler(Some(ScriptedNarrator::unavailable()), FallbackTimer::default());
    let start = Instant::now();
    let mut h = s.play(timeline(2), Durations::from_secs(&[1.0]));
    assert_eq!(h.snapshot().message, "Playing (narration unavailable)");
    h.settled().await;
    // Second entry uses the 8s default.
    assert_eq!(start.elapsed(), Duration::from_secs(9));
}

#[tokio::test(start_paused = true)]
async fn failed_utterance_leaves_advancing_to_the_timer() {
    let mut s = scheduler(
        Some(ScriptedNarrator::new(Duration::ZERO).failing()),
        FallbackTimer::default(),
    );
    let start = Instant::now();
    let mut h = s.play(timeline(2), Durations::from_secs(&[1.0, 1.0]));
    let done = h.settled().await;
    assert_eq!(done.status, PlaybackStatus::Finished);
    assert_eq!(start.elapsed(), Duration::from_secs(2));
    assert!(
        advances(&drain(h.events()))
            .iter()
            .all(|(_, _, src)| *src == TriggerSource::Timer)
    );
}

#[tokio::test(start_paused = true)]
async fn watchdog_lets_long_narration_finish() {
    let narrator = ScriptedNarrator::new(Duration::from_millis(1500));
    let mut s = scheduler(Some(narrator), FallbackTimer::Watchdog { factor: 2.0 });
    let start = Instant::now();
    let mut h = s.play(timeline(1), Durations::from_secs(&[1.0]));
    h.settled().await;
    assert_eq!(start.elapsed(), Duration::from_millis(1500));
    assert_eq!(
        advances(&drain(h.events())),
        vec![(1, 0, TriggerSource::Narration)]
    );
}

#[tokio::test(start_paused = true)]
async fn race_timer_cuts_long_narration() {
    let narrator = ScriptedNarrator::new(Duration::from_millis(1500));
    let mut s = scheduler(Some(narrator.clone()), FallbackTimer::Race);
    let start = Instant::now();
    let mut h = s.play(timeline(1), Durations::from_secs(&[1.0]));
    h.settled().await;
    assert_eq!(start.elapsed(), Duration::from_secs(1));
    assert_eq!(
        advances(&drain(h.events())),
        vec![(1, 0, TriggerSource::Timer)]
    );
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(narrator.log().completed, 0);
}

#[tokio::test(start_paused = true)]
async fn simultaneous_narration_and_timer_advance_each_entry_once() {
    let narrator = ScriptedNarrator::new(Duration::from_secs(2));
    let mut s = scheduler(Some(narrator), FallbackTimer::Race);
    let start = Instant::now();
    let mut h = s.play(timeline(3), Durations::from_secs(&[2.0, 2.0, 2.0]));
    let done = h.settled().await;
    assert_eq!(done.status, PlaybackStatus::Finished);
    assert_eq!(start.elapsed(), Duration::from_secs(6));

    tokio::time::sleep(Duration::from_secs(10)).await;
    let indices: Vec<usize> = advances(&drain(h.events()))
        .into_iter()
        .map(|(_, index, _)| index)
        .collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[tokio::test(start_paused = true)]
async fn absurd_duration_is_capped_and_playback_still_finishes() {
    let mut s = scheduler(None, FallbackTimer::Race);
    let start = Instant::now();
    let mut h = s.play(timeline(2), Durations::from_secs(&[1e20, 1.0]));
    let done = h.settled().await;
    assert_eq!(done.status, PlaybackStatus::Finished);
    assert_eq!(start.elapsed(), Duration::from_secs(3601));
}

#[tokio::test(start_paused = true)]
async fn progress_and_highlight_follow_the_cursor() {
    let mut s = scheduler(None, FallbackTimer::default());
    let mut h = s.play(timeline(4), Durations::from_secs(&[1.0; 4]));

    let mut seen = Vec::new();
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let snap = s.snapshot();
        seen.push((snap.active, snap.progress_percent));
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    assert_eq!(
        seen,
        vec![(Some(0), 25), (Some(1), 50), (Some(2), 75), (Some(3), 100)]
    );

    // Exactly one active entry at a time: activations and advances alternate.
    h.settled().await;
    let mut active: Option<usize> = None;
    for ev in drain(h.events()) {
        match ev {
            PlaybackEvent::Activated { index, .. } => {
                assert!(active.is_none(), "two active entries");
                active = Some(index);
            }
            PlaybackEvent::Advanced { index, .. } => {
                assert_eq!(active, Some(index));
                active = None;
            }
            _ => {}
        }
    }
}

#[tokio::test(start_paused = true)]
async fn replaying_discards_the_previous_session() {
    let narrator = ScriptedNarrator::new(Duration::from_secs(10));
    let mut s = scheduler(Some(narrator.clone()), FallbackTimer::default());
    let mut first = s.play(timeline(3), Durations::from_secs(&[5.0, 5.0, 5.0]));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(s.snapshot().active, Some(0));

    let mut second = s.play(timeline(2), Durations::from_secs(&[1.0, 1.0]));
    assert_eq!(second.session(), 2);
    let snap = s.snapshot();
    assert_eq!(snap.session, 2);
    assert_eq!(snap.active, None);
    assert_eq!(snap.progress_percent, 0);

    let superseded = first.settled().await;
    assert_eq!(superseded.session, 2);

    let done = second.settled().await;
    assert_eq!(done.status, PlaybackStatus::Finished);
    tokio::time::sleep(Duration::from_secs(60)).await;

    let events = drain(second.events());
    assert!(!events.is_empty());
    assert!(events.iter().all(|e| e.session() == 2), "{events:?}");
    assert_eq!(s.snapshot(), done);
    assert_eq!(narrator.log().completed, 0);
    assert_eq!(narrator.log().spoken, vec!["say 0", "say 0", "say 1"]);
}

#[tokio::test(start_paused = true)]
async fn stop_clears_highlight_and_silences_timers() {
    let narrator = ScriptedNarrator::new(Duration::from_secs(10));
    let mut s = scheduler(Some(narrator.clone()), FallbackTimer::Race);
    let mut h = s.play(timeline(3), Durations::from_secs(&[2.0, 2.0, 2.0]));
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(s.snapshot().active, Some(1));

    let cancels_before = narrator.log().cancels;
    s.stop();
    let snap = h.settled().await;
    assert_eq!(snap.status, PlaybackStatus::Stopped);
    assert_eq!(snap.active, None);
    assert!(!snap.speaking);
    assert!(narrator.log().cancels > cancels_before);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(s.snapshot(), snap);
    assert_eq!(
        drain(h.events()).last(),
        Some(&PlaybackEvent::Stopped { session: 1 })
    );
    // Idempotent.
    s.stop();
    assert_eq!(s.snapshot(), snap);
}

#[tokio::test(start_paused = true)]
async fn empty_timeline_finishes_immediately() {
    let mut s = scheduler(None, FallbackTimer::default());
    let start = Instant::now();
    let mut h = s.play(Timeline::default(), Durations::default());
    let done = h.settled().await;
    assert_eq!(done.status, PlaybackStatus::Finished);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn each_new_utterance_cancels_the_previous_one() {
    let narrator = ScriptedNarrator::new(Duration::from_millis(50));
    let mut s = scheduler(Some(narrator.clone()), FallbackTimer::default());
    let mut h = s.play(timeline(3), Durations::default());
    h.settled().await;
    // One cancel before each utterance plus one when the session ends.
    assert_eq!(narrator.log().cancels, 4);
    assert_eq!(narrator.log().completed, 3);
}

#[test]
fn fallback_timeouts() {
    let d = Duration::from_secs(4);
    assert_eq!(FallbackTimer::Race.timeout(d, true), d);
    let w = FallbackTimer::Watchdog { factor: 2.0 };
    assert_eq!(w.timeout(d, true), Duration::from_secs(8));
    assert_eq!(w.timeout(d, false), d);
    // Factors below 1 never shorten the entry.
    assert_eq!(FallbackTimer::Watchdog { factor: 0.5 }.timeout(d, true), d);
    // Huge factors saturate at a day instead of overflowing.
    let day = Duration::from_secs(24 * 60 * 60);
    assert_eq!(FallbackTimer::Watchdog { factor: 1e300 }.timeout(d, true), day);
    assert_eq!(
        FallbackTimer::Watchdog { factor: 1e6 }.timeout(Duration::from_secs(3600), true),
        day
    );
}

#[test]
fn fallback_json_shape() {
    let race: FallbackTimer = serde_json::from_str(r#"{"mode":"race"}"#).unwrap();
    assert_eq!(race, FallbackTimer::Race);
    let opts: PlaybackOpts = serde_json::from_str("{}").unwrap();
    assert_eq!(opts.fallback, FallbackTimer::Watchdog { factor: 2.0 });
}
