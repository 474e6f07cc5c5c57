use crate::encode::profile::EncodingProfile;
use crate::encode::recorder::{EncoderHost, Recorder, RecorderConfig, RecorderEvent, RecorderEvents};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{WalkthroughError, WalkthroughResult};
use crate::render::frame::FrameRGBA;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

/// What an [`InMemoryHost`] observed, shared with the caller.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStats {
    /// Number of recorders started.
    pub started: usize,
    /// Frames pushed across all recorders.
    pub frames: u64,
    /// Number of `stop` calls.
    pub stopped: usize,
    /// Profiles recorders were started with, in order.
    pub profiles: Vec<EncodingProfile>,
    /// Frame indices pushed to the most recent recorder.
    pub last_indices: Vec<FrameIndex>,
}

/// Deterministic encoder host for tests and debugging.
///
/// Each captured frame becomes one `Data` chunk holding the little-endian frame index; `stop`
/// appends a short trailer and then sends `Stopped`. Frame pixels are not kept.
#[derive(Clone, Debug)]
pub struct InMemoryHost {
    capture: bool,
    supported: Option<Vec<String>>,
    fail_start: bool,
    silent: bool,
    never_stops: bool,
    stats: Arc<Mutex<InMemoryStats>>,
}

impl Default for InMemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHost {
    /// A capable host that supports every profile.
    pub fn new() -> Self {
        Self {
            capture: true,
            supported: None,
            fail_start: false,
            silent: false,
            never_stops: false,
            stats: Arc::new(Mutex::new(InMemoryStats::default())),
        }
    }

    /// A host with no capture capability.
    pub fn unsupported() -> Self {
        Self {
            capture: false,
            ..Self::new()
        }
    }

    /// Restrict profile support to the given MIME types.
    pub fn with_supported_mimes<I, S>(mut self, mimes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported = Some(mimes.into_iter().map(Into::into).collect());
        self
    }

    /// Make `start` fail.
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Produce no data at all, like an environment that records silently.
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Never report `Stopped`.
    pub fn never_stops(mut self) -> Self {
        self.never_stops = true;
        self
    }

    /// Snapshot of what has been recorded so far.
    pub fn stats(&self) -> InMemoryStats {
        lock(&self.stats).clone()
    }
}

#[async_trait]
impl EncoderHost for InMemoryHost {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn supports_capture(&mut self) -> bool {
        self.capture
    }

    fn is_type_supported(&mut self, profile: &EncodingProfile) -> bool {
        match &self.supported {
            Some(mimes) => mimes.iter().any(|m| *m == profile.mime),
            None => true,
        }
    }

    fn start(
        &mut self,
        cfg: RecorderConfig,
        events: RecorderEvents,
    ) -> WalkthroughResult<Box<dyn Recorder>> {
        if self.fail_start {
            return Err(WalkthroughError::encoder_init(format!(
                "memory host refused to start {}",
                cfg.profile.mime
            )));
        }
        {
            let mut stats = lock(&self.stats);
            stats.started += 1;
            stats.profiles.push(cfg.profile.clone());
            stats.last_indices.clear();
        }
        Ok(Box::new(InMemoryRecorder {
            events: Some(events),
            silent: self.silent,
            never_stops: self.never_stops,
            last_idx: None,
            stats: Arc::clone(&self.stats),
        }))
    }
}

struct InMemoryRecorder {
    events: Option<RecorderEvents>,
    silent: bool,
    never_stops: bool,
    last_idx: Option<FrameIndex>,
    stats: Arc<Mutex<InMemoryStats>>,
}

impl InMemoryRecorder {
    fn emit(&self, event: RecorderEvent) {
        if let Some(tx) = &self.events {
            // The pipeline may already have given up on this recording.
            let _ = tx.send(event);
        }
    }
}

impl Recorder for InMemoryRecorder {
    fn push_frame(&mut self, idx: FrameIndex, _frame: &FrameRGBA) -> WalkthroughResult<()> {
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(WalkthroughError::encode(
                "memory recorder received out-of-order frame index",
            ));
        }
        self.last_idx = Some(idx);
        {
            let mut stats = lock(&self.stats);
            stats.frames += 1;
            stats.last_indices.push(idx);
        }
        if !self.silent {
            self.emit(RecorderEvent::Data(idx.0.to_le_bytes().to_vec()));
        }
        Ok(())
    }

    fn stop(&mut self) -> WalkthroughResult<()> {
        lock(&self.stats).stopped += 1;
        if !self.silent {
            self.emit(RecorderEvent::Data(b"end".to_vec()));
        }
        if !self.never_stops {
            self.emit(RecorderEvent::Stopped);
            self.events = None;
        }
        Ok(())
    }
}

fn lock(stats: &Mutex<InMemoryStats>) -> MutexGuard<'_, InMemoryStats> {
    stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
