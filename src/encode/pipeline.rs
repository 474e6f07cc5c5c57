use crate::encode::pacer::FramePacer;
use crate::encode::profile::{EncodingProfile, select_profile};
use crate::encode::recorder::{EncoderHost, Recorder, RecorderConfig, RecorderEvent};
use crate::encode::resource::{Blob, BlobRegistry, VideoResource, VideoSource};
use crate::foundation::core::{Canvas, Fps, FrameIndex};
use crate::foundation::error::{WalkthroughError, WalkthroughResult};
use crate::guide::model::{Durations, Scene};
use crate::render::scene::render_scene;
use crate::render::surface::Surface;
use crate::render::theme::Theme;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, error::TryRecvError};
use tokio::sync::watch;
use tokio::time::Instant;

const MSG_GENERATING: &str = "Generating video...";
const MSG_FINALIZING: &str = "Finalizing video...";
const MSG_READY: &str = "Video ready";
const HINT_STEP_LIST: &str = "Use the step list instead.";
const MAX_FINALIZE_TIMEOUT_SECS: f64 = 3600.0;

/// Encoding parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOpts {
    pub canvas: Canvas,
    /// Nominal capture rate; actual cadence comes from the [`FramePacer`].
    pub fps: Fps,
    /// Encoding preferences, most preferred first.
    pub profiles: Vec<EncodingProfile>,
    /// How long to wait for the recorder's `Stopped` after `stop`.
    pub finalize_timeout_secs: f64,
}

impl Default for EncodeOpts {
    fn default() -> Self {
        Self {
            canvas: Canvas::default(),
            fps: Fps::default(),
            profiles: EncodingProfile::default_preferences(),
            finalize_timeout_secs: 30.0,
        }
    }
}

impl EncodeOpts {
    pub fn validate(&self) -> WalkthroughResult<()> {
        self.canvas.validate()?;
        Fps::new(self.fps.num, self.fps.den)?;
        if !self.finalize_timeout_secs.is_finite()
            || self.finalize_timeout_secs <= 0.0
            || self.finalize_timeout_secs > MAX_FINALIZE_TIMEOUT_SECS
        {
            return Err(WalkthroughError::validation(format!(
                "finalize_timeout_secs must be in (0, {MAX_FINALIZE_TIMEOUT_SECS}]"
            )));
        }
        Ok(())
    }

    /// Out-of-range values fall back to the default 30 s.
    pub fn finalize_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.finalize_timeout_secs)
            .ok()
            .filter(|d| !d.is_zero() && d.as_secs_f64() <= MAX_FINALIZE_TIMEOUT_SECS)
            .unwrap_or(Duration::from_secs(30))
    }
}

/// Why an encode ended in `Failed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureReason {
    Unsupported,
    EncoderInitFailed,
    EmptyOutput,
    FinalizeTimeout,
    Cancelled,
    /// Recording or finalizing failed for another reason.
    Encode,
}

impl FailureReason {
    pub fn of(err: &WalkthroughError) -> Self {
        match err {
            WalkthroughError::Unsupported(_) => Self::Unsupported,
            WalkthroughError::EncoderInitFailed(_) => Self::EncoderInitFailed,
            WalkthroughError::EmptyOutput => Self::EmptyOutput,
            WalkthroughError::FinalizeTimeout => Self::FinalizeTimeout,
            WalkthroughError::Cancelled => Self::Cancelled,
            _ => Self::Encode,
        }
    }

    /// Status line and fallback hint shown for this failure.
    pub fn messages(self) -> (&'static str, String) {
        let (status, detail) = match self {
            Self::Unsupported => (
                "Video generation not supported",
                "Video encoding is not available on this host.",
            ),
            Self::EncoderInitFailed => (
                "Unable to start video recording",
                "Video recording failed to initialize.",
            ),
            Self::EmptyOutput => ("Video generation failed", "No video data was produced."),
            Self::FinalizeTimeout => (
                "Video generation failed",
                "The encoder did not finish in time.",
            ),
            Self::Cancelled => ("Video generation cancelled", "Video generation was stopped."),
            Self::Encode => ("Video generation failed", "Video encoding failed."),
        };
        (status, format!("{detail} {HINT_STEP_LIST}"))
    }
}

/// Encode state machine.
///
/// `Idle -> Initializing -> Recording -> Finalizing -> Succeeded | Failed`. Any in-flight phase may
/// fail. A settled pipeline re-enters `Initializing` on the next encode or returns to `Idle` on
/// reset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EncodePhase {
    Idle,
    Initializing,
    Recording,
    Finalizing,
    Succeeded,
    Failed(FailureReason),
}

impl EncodePhase {
    pub fn can_advance_to(&self, next: &EncodePhase) -> bool {
        use EncodePhase::*;
        matches!(
            (self, next),
            (Idle | Succeeded | Failed(_), Initializing)
                | (Succeeded | Failed(_), Idle)
                | (Initializing, Recording)
                | (Recording, Finalizing)
                | (Finalizing, Succeeded)
                | (Initializing | Recording | Finalizing, Failed(_))
        )
    }

    /// No encode is running.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Idle | Self::Succeeded | Self::Failed(_))
    }
}

/// Caller-visible encode status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodeStatus {
    pub phase: EncodePhase,
    pub message: String,
    /// Hint shown in place of the video, if any.
    pub fallback: Option<String>,
}

impl Default for EncodeStatus {
    fn default() -> Self {
        Self {
            phase: EncodePhase::Idle,
            message: String::new(),
            fallback: None,
        }
    }
}

/// Cooperative cancellation for a running encode, checked once per frame.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Renders scenes in real time into an encoder and owns the resulting video.
///
/// At most one video is held; installing a new one releases the previous one first.
pub struct EncodePipeline {
    host: Box<dyn EncoderHost>,
    registry: BlobRegistry,
    opts: EncodeOpts,
    theme: Theme,
    current: Option<VideoSource>,
    status: watch::Sender<EncodeStatus>,
}

impl EncodePipeline {
    pub fn new(host: Box<dyn EncoderHost>, opts: EncodeOpts, theme: Theme) -> Self {
        let (status, _) = watch::channel(EncodeStatus::default());
        Self {
            host,
            registry: BlobRegistry::new(),
            opts,
            theme,
            current: None,
            status,
        }
    }

    /// Use a shared registry instead of a private one.
    pub fn with_registry(mut self, registry: BlobRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn opts(&self) -> &EncodeOpts {
        &self.opts
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn registry(&self) -> &BlobRegistry {
        &self.registry
    }

    pub fn status(&self) -> EncodeStatus {
        self.status.borrow().clone()
    }

    pub fn phase(&self) -> EncodePhase {
        self.status.borrow().phase.clone()
    }

    /// Watch status changes.
    pub fn subscribe(&self) -> watch::Receiver<EncodeStatus> {
        self.status.subscribe()
    }

    /// Video currently exposed, local or remote.
    pub fn current(&self) -> Option<&VideoSource> {
        self.current.as_ref()
    }

    /// Expose a pre-rendered remote video, releasing any local one.
    pub fn install_remote(&mut self, url: impl Into<String>) {
        let url = url.into();
        tracing::info!(%url, "using remote video");
        self.release_current();
        self.current = Some(VideoSource::Remote(url));
    }

    /// Release the current video and return to `Idle`.
    pub fn reset(&mut self) -> WalkthroughResult<()> {
        self.release_current();
        if self.phase() != EncodePhase::Idle {
            self.transition(EncodePhase::Idle, "", None)?;
        }
        Ok(())
    }

    fn release_current(&mut self) {
        if let Some(prev) = self.current.take() {
            prev.release();
        }
    }

    /// Render every scene in real time into a recorder and install the result.
    ///
    /// Each scene is drawn at `progress = elapsed / duration` until its duration has elapsed,
    /// suspending on `pacer` between frames. On success the new video replaces the previous one.
    /// Hosts without capture support fail with `Unsupported` before anything is released.
    #[tracing::instrument(skip_all, fields(host = self.host.name(), scenes = scenes.len()))]
    pub async fn encode(
        &mut self,
        scenes: &[Scene],
        durations: &Durations,
        surface: &mut dyn Surface,
        pacer: &mut dyn FramePacer,
        cancel: &CancelFlag,
    ) -> WalkthroughResult<&VideoResource> {
        if scenes.is_empty() {
            return Err(WalkthroughError::validation(
                "encode requires at least one scene",
            ));
        }
        self.opts.validate()?;
        if surface.width() != self.opts.canvas.width || surface.height() != self.opts.canvas.height
        {
            return Err(WalkthroughError::validation(format!(
                "surface is {}x{}, encoder expects {}x{}",
                surface.width(),
                surface.height(),
                self.opts.canvas.width,
                self.opts.canvas.height
            )));
        }

        self.transition(EncodePhase::Initializing, MSG_GENERATING, None)?;
        if !self.host.supports_capture().await {
            let err = WalkthroughError::unsupported(format!(
                "{} host cannot capture frames",
                self.host.name()
            ));
            return Err(self.fail(err));
        }
        self.release_current();

        let host = &mut self.host;
        let profile = select_profile(&self.opts.profiles, |p| host.is_type_supported(p));
        tracing::debug!(mime = %profile.mime, "selected encoding profile");

        let (events_tx, mut events) = tokio::sync::mpsc::unbounded_channel();
        let cfg = RecorderConfig {
            canvas: self.opts.canvas,
            fps: self.opts.fps,
            profile: profile.clone(),
        };
        let mut recorder = match self.host.start(cfg, events_tx) {
            Ok(r) => r,
            Err(e) => {
                let err = match e {
                    WalkthroughError::EncoderInitFailed(_) => e,
                    other => WalkthroughError::encoder_init(other.to_string()),
                };
                return Err(self.fail(err));
            }
        };

        self.transition(
            EncodePhase::Recording,
            format!("Recording scene 1/{}", scenes.len()),
            None,
        )?;
        let mut chunks = Vec::new();
        let recorded = self
            .record(
                scenes,
                durations,
                surface,
                pacer,
                cancel,
                recorder.as_mut(),
                &mut events,
                &mut chunks,
            )
            .await;
        let frames = match recorded {
            Ok(frames) => frames,
            Err(e) => {
                if let Err(stop_err) = recorder.stop() {
                    tracing::debug!(error = %stop_err, "recorder stop after failure");
                }
                drop(recorder);
                return Err(self.fail(e));
            }
        };

        self.transition(EncodePhase::Finalizing, MSG_FINALIZING, None)?;
        if let Err(e) = recorder.stop() {
            return Err(self.fail(e));
        }
        let flushed = tokio::time::timeout(
            self.opts.finalize_timeout(),
            wait_stopped(&mut events, &mut chunks),
        )
        .await;
        if flushed.is_err() {
            return Err(self.fail(WalkthroughError::FinalizeTimeout));
        }
        if let Err(e) = recorder.finish() {
            return Err(self.fail(e));
        }
        drop(recorder);

        let blob = Blob::from_chunks(chunks, profile.container_mime());
        if blob.is_empty() {
            return Err(self.fail(WalkthroughError::EmptyOutput));
        }
        tracing::info!(frames, bytes = blob.len(), mime = blob.mime(), "video encoded");

        let resource = self.registry.create_object_url(blob);
        self.current = Some(VideoSource::Local(resource));
        self.transition(EncodePhase::Succeeded, MSG_READY, None)?;
        self.current
            .as_ref()
            .and_then(VideoSource::as_local)
            .ok_or_else(|| WalkthroughError::encode("encoded video was not installed"))
    }

    #[allow(clippy::too_many_arguments)]
    async fn record(
        &self,
        scenes: &[Scene],
        durations: &Durations,
        surface: &mut dyn Surface,
        pacer: &mut dyn FramePacer,
        cancel: &CancelFlag,
        recorder: &mut dyn Recorder,
        events: &mut UnboundedReceiver<RecorderEvent>,
        chunks: &mut Vec<Vec<u8>>,
    ) -> WalkthroughResult<u64> {
        let total = scenes.len();
        let mut next_idx = 0u64;

        for (i, scene) in scenes.iter().enumerate() {
            if i > 0 {
                self.status.send_modify(|s| {
                    s.message = format!("Recording scene {}/{total}", i + 1);
                });
            }
            let duration = durations.secs(i);
            let start = Instant::now();
            loop {
                if cancel.is_cancelled() {
                    return Err(WalkthroughError::Cancelled);
                }
                let elapsed = start.elapsed().as_secs_f64();
                if elapsed >= duration {
                    break;
                }
                render_scene(surface, &self.theme, scene, (elapsed / duration).min(1.0));
                let frame = surface.read_frame()?;
                recorder.push_frame(FrameIndex(next_idx), &frame)?;
                next_idx += 1;
                drain_ready(events, chunks)?;
                pacer.next_frame().await;
            }
            tracing::trace!(scene = i, frames = next_idx, "scene recorded");
        }
        Ok(next_idx)
    }

    fn transition(
        &self,
        next: EncodePhase,
        message: impl Into<String>,
        fallback: Option<String>,
    ) -> WalkthroughResult<()> {
        let current = self.status.borrow().phase.clone();
        if !current.can_advance_to(&next) {
            return Err(WalkthroughError::validation(format!(
                "illegal encode transition {current:?} -> {next:?}"
            )));
        }
        tracing::info!(from = ?current, to = ?next, "encode phase");
        self.status.send_replace(EncodeStatus {
            phase: next,
            message: message.into(),
            fallback,
        });
        Ok(())
    }

    fn fail(&self, err: WalkthroughError) -> WalkthroughError {
        let reason = FailureReason::of(&err);
        let (message, fallback) = reason.messages();
        tracing::warn!(?reason, error = %err, "video encode failed");
        if let Err(e) = self.transition(EncodePhase::Failed(reason), message, Some(fallback)) {
            tracing::error!(error = %e, "encode failure not recorded");
        }
        err
    }
}

fn push_chunk(chunks: &mut Vec<Vec<u8>>, bytes: Vec<u8>) {
    if !bytes.is_empty() {
        chunks.push(bytes);
    }
}

fn drain_ready(
    events: &mut UnboundedReceiver<RecorderEvent>,
    chunks: &mut Vec<Vec<u8>>,
) -> WalkthroughResult<()> {
    loop {
        match events.try_recv() {
            Ok(RecorderEvent::Data(bytes)) => push_chunk(chunks, bytes),
            Ok(RecorderEvent::Stopped) | Err(TryRecvError::Disconnected) => {
                return Err(WalkthroughError::encode(
                    "encoder stopped before recording finished",
                ));
            }
            Err(TryRecvError::Empty) => return Ok(()),
        }
    }
}

/// Collect remaining chunks until `Stopped`. A closed channel counts as stopped.
async fn wait_stopped(events: &mut UnboundedReceiver<RecorderEvent>, chunks: &mut Vec<Vec<u8>>) {
    while let Some(event) = events.recv().await {
        match event {
            RecorderEvent::Data(bytes) => push_chunk(chunks, bytes),
            RecorderEvent::Stopped => return,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/pipeline.rs"]
mod tests;
