use crate::foundation::error::{WalkthroughError, WalkthroughResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;

/// Text-to-speech backend.
///
/// At most one utterance speaks at a time: callers `cancel` before starting the next one.
#[async_trait]
pub trait Narrator: Send + Sync {
    /// Whether speech is possible on this host.
    fn is_available(&self) -> bool;

    /// Speak `text`, resolving when the utterance ends. Dropping the future cuts the utterance.
    async fn speak(&self, text: &str) -> WalkthroughResult<()>;

    /// Cut any utterance in progress.
    fn cancel(&self);
}

/// Options for [`CommandNarrator`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarratorOpts {
    pub enabled: bool,
    /// TTS program; the text is passed as the last argument.
    pub program: PathBuf,
    /// Extra arguments placed before the text.
    pub args: Vec<String>,
}

impl Default for NarratorOpts {
    fn default() -> Self {
        Self {
            enabled: true,
            program: PathBuf::from("espeak-ng"),
            args: Vec::new(),
        }
    }
}

/// Speaks by running a TTS program once per utterance.
pub struct CommandNarrator {
    opts: NarratorOpts,
    available: bool,
    cancel_gen: watch::Sender<u64>,
}

impl CommandNarrator {
    /// Run `program --version` once and remember the result.
    pub async fn new(opts: NarratorOpts) -> Self {
        let available = opts.enabled
            && tokio::process::Command::new(&opts.program)
                .arg("--version")
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .status()
                .await
                .is_ok_and(|s| s.success());
        if opts.enabled && !available {
            tracing::warn!(
                program = %opts.program.display(),
                "tts program not available; narration disabled"
            );
        }
        let (cancel_gen, _) = watch::channel(0);
        Self {
            opts,
            available,
            cancel_gen,
        }
    }

    /// Build a narrator from options, or `None` when narration is disabled.
    pub async fn from_opts(opts: &NarratorOpts) -> Option<Arc<dyn Narrator>> {
        if !opts.enabled {
            return None;
        }
        Some(Arc::new(Self::new(opts.clone()).await) as Arc<dyn Narrator>)
    }
}

#[async_trait]
impl Narrator for CommandNarrator {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn speak(&self, text: &str) -> WalkthroughResult<()> {
        if !self.available {
            return Err(WalkthroughError::NoNarrator);
        }
        let mut cancelled = self.cancel_gen.subscribe();
        let mut child = tokio::process::Command::new(&self.opts.program)
            .args(&self.opts.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                WalkthroughError::narration(format!(
                    "failed to spawn '{}': {e}",
                    self.opts.program.display()
                ))
            })?;

        let finished = tokio::select! {
            status = child.wait() => Some(status),
            _ = cancelled.changed() => None,
        };
        let Some(status) = finished else {
            let _ = child.kill().await;
            return Err(WalkthroughError::Cancelled);
        };
        let status =
            status.map_err(|e| WalkthroughError::narration(format!("tts wait failed: {e}")))?;
        if status.success() {
            Ok(())
        } else {
            Err(WalkthroughError::narration(format!(
                "tts exited with status {status}"
            )))
        }
    }

    fn cancel(&self) {
        self.cancel_gen.send_modify(|g| *g += 1);
    }
}

/// Scripted narrator for tests and dry runs: every utterance takes a fixed time.
///
/// Spoken texts and `cancel` calls are recorded.
#[derive(Clone)]
pub struct ScriptedNarrator {
    available: bool,
    per_utterance: Duration,
    overrides: Arc<Mutex<Vec<Option<Duration>>>>,
    fail: bool,
    log: Arc<Mutex<ScriptLog>>,
}

/// What a [`ScriptedNarrator`] was asked to do.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScriptLog {
    /// Texts passed to `speak`, in call order.
    pub spoken: Vec<String>,
    /// Number of utterances that ran to completion.
    pub completed: usize,
    pub cancels: usize,
}

impl ScriptedNarrator {
    pub fn new(per_utterance: Duration) -> Self {
        Self {
            available: true,
            per_utterance,
            overrides: Arc::new(Mutex::new(Vec::new())),
            fail: false,
            log: Arc::new(Mutex::new(ScriptLog::default())),
        }
    }

    /// A narrator reporting no speech capability.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(Duration::ZERO)
        }
    }

    /// Use per-call durations, in call order; calls past the end use the default.
    pub fn with_script(self, durations: impl IntoIterator<Item = Duration>) -> Self {
        *lock(&self.overrides) = durations.into_iter().map(Some).collect();
        self
    }

    /// Every utterance fails immediately.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn log(&self) -> ScriptLog {
        lock(&self.log).clone()
    }
}

#[async_trait]
impl Narrator for ScriptedNarrator {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn speak(&self, text: &str) -> WalkthroughResult<()> {
        if !self.available {
            return Err(WalkthroughError::NoNarrator);
        }
        let call = {
            let mut log = lock(&self.log);
            log.spoken.push(text.to_owned());
            log.spoken.len() - 1
        };
        if self.fail {
            return Err(WalkthroughError::narration("scripted failure"));
        }
        let d = lock(&self.overrides)
            .get(call)
            .copied()
            .flatten()
            .unwrap_or(self.per_utterance);
        tokio::time::sleep(d).await;
        lock(&self.log).completed += 1;
        Ok(())
    }

    fn cancel(&self) {
        lock(&self.log).cancels += 1;
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
