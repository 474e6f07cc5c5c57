use super::*;
use crate::encode::memory::InMemoryHost;
use crate::encode::pacer::IntervalPacer;
use crate::render::surface::DisplayListSurface;
use async_trait::async_trait;

fn small_opts() -> EncodeOpts {
    EncodeOpts {
        canvas: Canvas {
            width: 96,
            height: 54,
        },
        finalize_timeout_secs: 2.0,
        ..EncodeOpts::default()
    }
}

fn scenes(n: usize) -> Vec<Scene> {
    (0..n)
        .map(|i| Scene::new(format!("Scene {i}"), format!("narration {i}"), None))
        .collect()
}

struct Rig {
    host: InMemoryHost,
    pipeline: EncodePipeline,
    surface: DisplayListSurface,
    pacer: IntervalPacer,
}

fn rig(host: InMemoryHost) -> Rig {
    let opts = small_opts();
    Rig {
        surface: DisplayListSurface::new(opts.canvas),
        pacer: IntervalPacer::new(opts.fps),
        pipeline: EncodePipeline::new(Box::new(host.clone()), opts, Theme::default()),
        host,
    }
}

impl Rig {
    async fn encode(
        &mut self,
        scenes: &[Scene],
        durations: &Durations,
    ) -> WalkthroughResult<crate::encode::resource::ObjectUrl> {
        self.pipeline
            .encode(
                scenes,
                durations,
                &mut self.surface,
                &mut self.pacer,
                &CancelFlag::new(),
            )
            .await
            .map(|r| r.url().clone())
    }
}

/// Cancels after a fixed number of frames.
struct CancellingPacer {
    inner: IntervalPacer,
    flag: CancelFlag,
    after: usize,
    seen: usize,
}

#[async_trait]
impl FramePacer for CancellingPacer {
    async fn next_frame(&mut self) {
        self.seen += 1;
        if self.seen >= self.after {
            self.flag.cancel();
        }
        self.inner.next_frame().await;
    }
}

#[tokio::test(start_paused = true)]
async fn encodes_every_scene_in_real_time() {
    let mut r = rig(InMemoryHost::new());
    let start = Instant::now();
    let url = r
        .encode(&scenes(2), &Durations::from_secs(&[1.0, 1.0]))
        .await
        .unwrap();
    let elapsed = start.elapsed().as_secs_f64();
    assert!((2.0..2.2).contains(&elapsed), "elapsed {elapsed}");

    let stats = r.host.stats();
    assert_eq!(stats.started, 1);
    assert_eq!(stats.stopped, 1);
    assert!((55..=70).contains(&stats.frames), "frames {}", stats.frames);
    assert!(
        stats
            .last_indices
            .windows(2)
            .all(|w| w[0].0 + 1 == w[1].0)
    );

    let status = r.pipeline.status();
    assert_eq!(status.phase, EncodePhase::Succeeded);
    assert_eq!(status.message, "Video ready");
    assert!(status.fallback.is_none());

    let current = r.pipeline.current().and_then(VideoSource::as_local).unwrap();
    assert_eq!(current.url(), &url);
    assert_eq!(current.mime(), "video/webm");
    // One chunk per frame plus the trailer.
    assert_eq!(current.len() as u64, stats.frames * 8 + 3);
    assert!(current.bytes().ends_with(b"end"));
}

#[tokio::test(start_paused = true)]
async fn missing_durations_use_the_default() {
    let mut r = rig(InMemoryHost::new());
    let start = Instant::now();
    r.encode(&scenes(1), &Durations::default()).await.unwrap();
    let elapsed = start.elapsed().as_secs_f64();
    assert!((8.0..8.2).contains(&elapsed), "elapsed {elapsed}");
}

#[tokio::test(start_paused = true)]
async fn unsupported_host_renders_nothing_and_keeps_previous_video() {
    let mut r = rig(InMemoryHost::new());
    let first = r
        .encode(&scenes(1), &Durations::from_secs(&[0.2]))
        .await
        .unwrap();

    let host = InMemoryHost::unsupported();
    r.pipeline.host = Box::new(host.clone());
    let err = r
        .encode(&scenes(1), &Durations::from_secs(&[0.2]))
        .await
        .unwrap_err();
    assert!(matches!(err, WalkthroughError::Unsupported(_)));
    assert_eq!(host.stats().started, 0);
    assert_eq!(host.stats().frames, 0);

    let status = r.pipeline.status();
    assert_eq!(status.phase, EncodePhase::Failed(FailureReason::Unsupported));
    assert_eq!(status.message, "Video generation not supported");
    assert!(status.fallback.unwrap().contains("step list"));

    assert!(r.pipeline.registry().is_live(&first));
    assert_eq!(r.pipeline.current().unwrap().url(), first.as_str());
}

#[tokio::test(start_paused = true)]
async fn encoder_start_failure_aborts_before_capture() {
    let mut r = rig(InMemoryHost::new().failing_start());
    let err = r
        .encode(&scenes(2), &Durations::from_secs(&[1.0, 1.0]))
        .await
        .unwrap_err();
    assert!(matches!(err, WalkthroughError::EncoderInitFailed(_)));
    assert_eq!(r.host.stats().frames, 0);
    assert!(r.surface.ops().is_empty());
    assert_eq!(
        r.pipeline.phase(),
        EncodePhase::Failed(FailureReason::EncoderInitFailed)
    );
    assert_eq!(r.pipeline.status().message, "Unable to start video recording");
    assert!(r.pipeline.current().is_none());
}

#[tokio::test(start_paused = true)]
async fn silent_encoder_yields_empty_output() {
    let mut r = rig(InMemoryHost::new().silent());
    let err = r
        .encode(&scenes(1), &Durations::from_secs(&[0.5]))
        .await
        .unwrap_err();
    assert!(matches!(err, WalkthroughError::EmptyOutput));
    assert!(r.host.stats().frames > 0);
    assert_eq!(
        r.pipeline.phase(),
        EncodePhase::Failed(FailureReason::EmptyOutput)
    );
    assert!(r.pipeline.current().is_none());
    assert_eq!(r.pipeline.registry().live_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_stop_signal_times_out() {
    let mut r = rig(InMemoryHost::new().never_stops());
    let start = Instant::now();
    let err = r
        .encode(&scenes(1), &Durations::from_secs(&[0.5]))
        .await
        .unwrap_err();
    assert!(matches!(err, WalkthroughError::FinalizeTimeout));
    let elapsed = start.elapsed().as_secs_f64();
    assert!((2.5..2.7).contains(&elapsed), "elapsed {elapsed}");
    assert_eq!(
        r.pipeline.phase(),
        EncodePhase::Failed(FailureReason::FinalizeTimeout)
    );
}

#[tokio::test(start_paused = true)]
async fn reencoding_revokes_previous_video_exactly_once() {
    let mut r = rig(InMemoryHost::new());
    let d = Durations::from_secs(&[0.3]);
    let first = r.encode(&scenes(1), &d).await.unwrap();
    let second = r.encode(&scenes(1), &d).await.unwrap();
    assert_ne!(first, second);

    let reg = r.pipeline.registry().clone();
    assert_eq!(reg.revocation_count(&first), 1);
    assert_eq!(reg.revocation_count(&second), 0);
    assert_eq!(reg.live_count(), 1);

    r.pipeline.reset().unwrap();
    assert_eq!(reg.revocation_count(&second), 1);
    assert_eq!(reg.live_count(), 0);
    assert_eq!(r.pipeline.phase(), EncodePhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_the_recorder() {
    let mut r = rig(InMemoryHost::new());
    let flag = CancelFlag::new();
    let mut pacer = CancellingPacer {
        inner: IntervalPacer::new(Fps::default()),
        flag: flag.clone(),
        after: 5,
        seen: 0,
    };
    let err = r
        .pipeline
        .encode(
            &scenes(2),
            &Durations::from_secs(&[2.0, 2.0]),
            &mut r.surface,
            &mut pacer,
            &flag,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WalkthroughError::Cancelled));
    let stats = r.host.stats();
    assert_eq!(stats.frames, 5);
    assert_eq!(stats.stopped, 1);
    assert_eq!(
        r.pipeline.phase(),
        EncodePhase::Failed(FailureReason::Cancelled)
    );
    assert!(r.pipeline.current().is_none());
}

#[tokio::test(start_paused = true)]
async fn empty_scene_list_is_rejected_without_state_change() {
    let mut r = rig(InMemoryHost::new());
    let err = r.encode(&[], &Durations::default()).await.unwrap_err();
    assert!(matches!(err, WalkthroughError::Validation(_)));
    assert_eq!(r.pipeline.phase(), EncodePhase::Idle);
    assert_eq!(r.host.stats().started, 0);
}

#[tokio::test(start_paused = true)]
async fn surface_size_must_match_canvas() {
    let mut r = rig(InMemoryHost::new());
    r.surface = DisplayListSurface::new(Canvas::default());
    let err = r
        .encode(&scenes(1), &Durations::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WalkthroughError::Validation(_)));
}

#[tokio::test(start_paused = true)]
async fn first_supported_profile_is_used_and_blob_carries_container_type() {
    let mut r = rig(InMemoryHost::new().with_supported_mimes(["video/webm;codecs=vp8"]));
    r.encode(&scenes(1), &Durations::from_secs(&[0.1]))
        .await
        .unwrap();
    assert_eq!(r.host.stats().profiles, vec![EncodingProfile::webm_vp8()]);

    let mut r = rig(InMemoryHost::new().with_supported_mimes(Vec::<String>::new()));
    r.encode(&scenes(1), &Durations::from_secs(&[0.1]))
        .await
        .unwrap();
    assert_eq!(
        r.host.stats().profiles,
        vec![EncodingProfile::platform_default()]
    );
    let local = r.pipeline.current().and_then(VideoSource::as_local).unwrap();
    assert_eq!(local.mime(), "video/webm");
}

#[tokio::test(start_paused = true)]
async fn remote_video_replaces_local_one() {
    let mut r = rig(InMemoryHost::new());
    let url = r
        .encode(&scenes(1), &Durations::from_secs(&[0.1]))
        .await
        .unwrap();
    r.pipeline.install_remote("https://cdn.example/guide.mp4");
    assert_eq!(r.pipeline.registry().revocation_count(&url), 1);
    assert_eq!(
        r.pipeline.current().unwrap().url(),
        "https://cdn.example/guide.mp4"
    );
}

#[tokio::test(start_paused = true)]
async fn status_watchers_observe_recording_progress() {
    let mut r = rig(InMemoryHost::new());
    let mut rx = r.pipeline.subscribe();
    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let s = rx.borrow_and_update().clone();
            let settled = s.phase.is_settled();
            seen.push(s);
            if settled {
                break;
            }
        }
        seen
    });
    r.encode(&scenes(3), &Durations::from_secs(&[0.2, 0.2, 0.2]))
        .await
        .unwrap();
    let seen = watcher.await.unwrap();

    let messages: Vec<_> = seen.iter().map(|s| s.message.as_str()).collect();
    assert!(messages.contains(&"Recording scene 1/3"), "{messages:?}");
    assert!(messages.contains(&"Recording scene 3/3"), "{messages:?}");
    assert_eq!(seen.last().unwrap().phase, EncodePhase::Succeeded);
}

#[test]
fn transition_table() {
    use EncodePhase::*;
    assert!(Idle.can_advance_to(&Initializing));
    assert!(!Idle.can_advance_to(&Recording));
    assert!(!Initializing.can_advance_to(&Finalizing));
    assert!(!Recording.can_advance_to(&Succeeded));
    assert!(Finalizing.can_advance_to(&Failed(FailureReason::EmptyOutput)));
    assert!(Failed(FailureReason::Encode).can_advance_to(&Initializing));
    assert!(!Failed(FailureReason::Encode).can_advance_to(&Recording));
    assert!(Succeeded.can_advance_to(&Idle));
}

#[test]
fn opts_validation() {
    assert!(EncodeOpts::default().validate().is_ok());
    let bad = EncodeOpts {
        finalize_timeout_secs: 0.0,
        ..EncodeOpts::default()
    };
    assert!(bad.validate().is_err());
}

#[test]
fn oversized_finalize_timeout_is_rejected_not_panicking() {
    let huge = EncodeOpts {
        finalize_timeout_secs: 1e20,
        ..EncodeOpts::default()
    };
    assert!(huge.validate().is_err());
    assert_eq!(huge.finalize_timeout(), Duration::from_secs(30));
    assert_eq!(small_opts().finalize_timeout(), Duration::from_secs(2));
}
