use crate::guide::model::Durations;
use crate::guide::timeline::Timeline;
use crate::playback::narrator::Narrator;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;

const MSG_PLAYING: &str = "Playing...";
const MSG_PLAYING_SILENT: &str = "Playing (narration unavailable)";
const MSG_FINISHED: &str = "Finished";
const MSG_STOPPED: &str = "Stopped";
const EVENT_CAPACITY: usize = 64;

/// Upper bound on any single fallback wait.
const MAX_FALLBACK_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// How long the fallback timer waits before advancing past an entry.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FallbackTimer {
    /// The timer always fires after the entry's duration, racing the utterance.
    Race,
    /// While narrating, the timer is a watchdog at `duration * factor` so long utterances finish.
    /// Without narration it fires after the plain duration.
    Watchdog { factor: f64 },
}

impl Default for FallbackTimer {
    fn default() -> Self {
        Self::Watchdog { factor: 2.0 }
    }
}

impl FallbackTimer {
    /// Fallback wait for an entry of `duration`, never more than a day.
    pub fn timeout(&self, duration: Duration, narrating: bool) -> Duration {
        let wait = match *self {
            Self::Watchdog { factor } if narrating && factor.is_finite() && factor >= 1.0 => {
                Duration::try_from_secs_f64(duration.as_secs_f64() * factor)
                    .unwrap_or(MAX_FALLBACK_WAIT)
            }
            _ => duration,
        };
        wait.min(MAX_FALLBACK_WAIT)
    }
}

/// Playback options.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackOpts {
    pub fallback: FallbackTimer,
}

/// Which signal ended an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TriggerSource {
    Narration,
    Timer,
}

/// An advance request for one entry of one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Trigger {
    pub session: u64,
    pub index: usize,
    pub source: TriggerSource,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackStatus {
    Idle,
    Playing,
    Finished,
    Stopped,
}

/// Observable playback state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    pub status: PlaybackStatus,
    pub message: String,
    pub progress_percent: u8,
    /// The single highlighted entry, if any.
    pub active: Option<usize>,
    pub speaking: bool,
    /// Session that last wrote this snapshot; 0 before the first `play`.
    pub session: u64,
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self {
            status: PlaybackStatus::Idle,
            message: String::new(),
            progress_percent: 0,
            active: None,
            speaking: false,
            session: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlaybackEvent {
    Started { session: u64, len: usize },
    /// Entry `index` became the active one.
    Activated { session: u64, index: usize },
    /// Entry `index` completed; `source` won the race.
    Advanced {
        session: u64,
        index: usize,
        source: TriggerSource,
    },
    Finished { session: u64 },
    Stopped { session: u64 },
}

impl PlaybackEvent {
    pub fn session(&self) -> u64 {
        match *self {
            Self::Started { session, .. }
            | Self::Activated { session, .. }
            | Self::Advanced { session, .. }
            | Self::Finished { session }
            | Self::Stopped { session } => session,
        }
    }
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Narrates a timeline entry by entry while advancing the visible cursor.
///
/// Each entry races its utterance against a fallback timer; the first trigger for the live
/// `(session, index)` advances the cursor and every other trigger is dropped. A new `play` aborts
/// the previous session before resetting state.
pub struct PlaybackScheduler {
    narrator: Option<Arc<dyn Narrator>>,
    opts: PlaybackOpts,
    generation: u64,
    live: Option<AbortOnDrop>,
    state: Arc<watch::Sender<PlaybackSnapshot>>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl PlaybackScheduler {
    pub fn new(narrator: Option<Arc<dyn Narrator>>, opts: PlaybackOpts) -> Self {
        let (state, _) = watch::channel(PlaybackSnapshot::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            narrator,
            opts,
            generation: 0,
            live: None,
            state: Arc::new(state),
            events,
        }
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.state.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Whether a session is still running.
    pub fn is_playing(&self) -> bool {
        self.state.borrow().status == PlaybackStatus::Playing
    }

    /// Start a fresh session at entry 0, cancelling any session in flight.
    ///
    /// Must be called inside a tokio runtime.
    #[tracing::instrument(skip_all, fields(entries = timeline.len()))]
    pub fn play(&mut self, timeline: Timeline, durations: Durations) -> PlaybackHandle {
        self.abort_live();

        self.generation += 1;
        let session = self.generation;
        let narrator = self
            .narrator
            .clone()
            .filter(|n| n.is_available());
        if narrator.is_none() {
            tracing::warn!(session, "no narrator; playback is timer-driven");
        }
        let message = if narrator.is_some() {
            MSG_PLAYING
        } else {
            MSG_PLAYING_SILENT
        };

        // Subscribe before the driver can emit anything.
        let handle = PlaybackHandle {
            session,
            state: self.state.subscribe(),
            events: self.events.subscribe(),
        };
        self.state.send_replace(PlaybackSnapshot {
            status: PlaybackStatus::Playing,
            message: message.to_owned(),
            progress_percent: 0,
            active: None,
            speaking: false,
            session,
        });
        let _ = self.events.send(PlaybackEvent::Started {
            session,
            len: timeline.len(),
        });
        tracing::info!(session, "playback started");

        let ctx = SessionCtx {
            session,
            state: Arc::clone(&self.state),
            events: self.events.clone(),
            narrator,
            fallback: self.opts.fallback,
        };
        self.live = Some(AbortOnDrop(tokio::spawn(drive(ctx, timeline, durations))));
        handle
    }

    /// Cancel the running session, if any, and clear the highlight.
    pub fn stop(&mut self) {
        let Some(live) = self.live.take() else {
            return;
        };
        drop(live);
        if let Some(n) = &self.narrator {
            n.cancel();
        }
        let session = self.generation;
        let stopped = self.state.send_if_modified(|s| {
            if s.session != session || s.status != PlaybackStatus::Playing {
                return false;
            }
            s.status = PlaybackStatus::Stopped;
            s.message = MSG_STOPPED.to_owned();
            s.active = None;
            s.speaking = false;
            true
        });
        if stopped {
            tracing::info!(session, "playback stopped");
            let _ = self.events.send(PlaybackEvent::Stopped { session });
        }
    }

    fn abort_live(&mut self) {
        if let Some(live) = self.live.take() {
            drop(live);
            if let Some(n) = &self.narrator {
                n.cancel();
            }
            tracing::debug!(session = self.generation, "previous playback aborted");
        }
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.abort_live();
    }
}

/// Caller's view of one session.
#[derive(Debug)]
pub struct PlaybackHandle {
    session: u64,
    state: watch::Receiver<PlaybackSnapshot>,
    events: broadcast::Receiver<PlaybackEvent>,
}

impl PlaybackHandle {
    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.state.borrow().clone()
    }

    /// Events from every session, starting at this session's `Started`.
    pub fn events(&mut self) -> &mut broadcast::Receiver<PlaybackEvent> {
        &mut self.events
    }

    /// Wait until this session finishes, is stopped or is superseded; returns the last snapshot.
    pub async fn settled(&mut self) -> PlaybackSnapshot {
        let session = self.session;
        if let Ok(s) = self
            .state
            .wait_for(|s| s.session != session || s.status != PlaybackStatus::Playing)
            .await
        {
            return s.clone();
        }
        self.state.borrow().clone()
    }
}

#[derive(Clone)]
struct SessionCtx {
    session: u64,
    state: Arc<watch::Sender<PlaybackSnapshot>>,
    events: broadcast::Sender<PlaybackEvent>,
    narrator: Option<Arc<dyn Narrator>>,
    fallback: FallbackTimer,
}

impl SessionCtx {
    /// Apply `f` only while this session still owns the snapshot.
    fn update(&self, f: impl FnOnce(&mut PlaybackSnapshot)) -> bool {
        let session = self.session;
        self.state.send_if_modified(|s| {
            if s.session != session || s.status != PlaybackStatus::Playing {
                return false;
            }
            f(s);
            true
        })
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.events.send(event);
    }
}

async fn drive(ctx: SessionCtx, timeline: Timeline, durations: Durations) {
    let session = ctx.session;
    let (tx, mut rx) = mpsc::unbounded_channel::<Trigger>();

    for (index, entry) in timeline.entries().iter().enumerate() {
        let narrating = ctx.narrator.is_some();
        let percent = timeline.progress_percent(index);
        if !ctx.update(|s| {
            s.active = Some(index);
            s.progress_percent = percent;
            s.speaking = narrating;
        }) {
            return;
        }
        ctx.emit(PlaybackEvent::Activated { session, index });

        // Dropped at the end of the iteration, aborting whichever producer lost.
        let mut producers = JoinSet::new();
        let duration = durations.get(index);
        if let Some(narrator) = ctx.narrator.clone() {
            narrator.cancel();
            let text = entry.narration.clone();
            let tx = tx.clone();
            let started = Instant::now();
            producers.spawn(async move {
                let source = match narrator.speak(&text).await {
                    Ok(()) => TriggerSource::Narration,
                    Err(e) => {
                        // A failed utterance falls back to the plain duration.
                        tracing::warn!(session, index, error = %e, "narration failed");
                        tokio::time::sleep_until(started + duration).await;
                        TriggerSource::Timer
                    }
                };
                let _ = tx.send(Trigger {
                    session,
                    index,
                    source,
                });
            });
        }
        let wait = ctx.fallback.timeout(duration, narrating);
        let timer_tx = tx.clone();
        producers.spawn(async move {
            tokio::time::sleep(wait).await;
            let _ = timer_tx.send(Trigger {
                session,
                index,
                source: TriggerSource::Timer,
            });
        });

        let source = loop {
            // `tx` is held here, so the channel never closes while driving.
            let Some(trigger) = rx.recv().await else {
                return;
            };
            if trigger.session == session && trigger.index == index {
                break trigger.source;
            }
            tracing::trace!(?trigger, live = index, "stale trigger ignored");
        };
        drop(producers);
        tracing::debug!(session, index, ?source, "entry advanced");

        if !ctx.update(|s| s.speaking = false) {
            return;
        }
        ctx.emit(PlaybackEvent::Advanced {
            session,
            index,
            source,
        });
    }

    if let Some(n) = &ctx.narrator {
        n.cancel();
    }
    let finished = ctx.state.send_if_modified(|s| {
        if s.session != session || s.status != PlaybackStatus::Playing {
            return false;
        }
        s.status = PlaybackStatus::Finished;
        s.message = MSG_FINISHED.to_owned();
        s.progress_percent = 100;
        s.active = None;
        s.speaking = false;
        true
    });
    if finished {
        tracing::info!(session, "playback finished");
        ctx.emit(PlaybackEvent::Finished { session });
    }
}

#[cfg(test)]
#[path = "../../tests/unit/playback/scheduler.rs"]
mod tests;
