use crate::client::BackendOpts;
use crate::encode::ffmpeg::FfmpegOpts;
use crate::encode::pipeline::EncodeOpts;
use crate::foundation::error::{WalkthroughError, WalkthroughResult};
use crate::playback::narrator::NarratorOpts;
use crate::playback::scheduler::PlaybackOpts;
use crate::render::text::FONT_ENV;
use crate::render::theme::Theme;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

pub const API_BASE_ENV: &str = "WALKTHROUGH_API_BASE";
pub const FFMPEG_ENV: &str = "WALKTHROUGH_FFMPEG";
pub const TTS_ENV: &str = "WALKTHROUGH_TTS";

/// Everything tunable, with defaults for every field.
///
/// Loaded from JSON, then overridden from the environment.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkthroughConfig {
    pub encode: EncodeOpts,
    pub theme: Theme,
    /// TTF/OTF used for scene text; discovered when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_path: Option<PathBuf>,
    pub ffmpeg: FfmpegOpts,
    pub narrator: NarratorOpts,
    pub playback: PlaybackOpts,
    pub backend: BackendOpts,
}

impl WalkthroughConfig {
    pub fn from_reader<R: std::io::Read>(r: R) -> WalkthroughResult<Self> {
        let cfg: Self = serde_json::from_reader(r)
            .map_err(|e| WalkthroughError::validation(format!("parse config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> WalkthroughResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            WalkthroughError::validation(format!("open config '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Config file if given, else defaults; then environment overrides.
    pub fn load(path: Option<&Path>) -> WalkthroughResult<Self> {
        let mut cfg = match path {
            Some(p) => Self::from_path(p)?,
            None => Self::default(),
        };
        cfg.apply_env(|k| std::env::var(k).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        if let Some(v) = get(API_BASE_ENV) {
            self.backend.base_url = v;
        }
        if let Some(v) = get(FONT_ENV) {
            self.font_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get(FFMPEG_ENV) {
            self.ffmpeg.program = PathBuf::from(v);
        }
        if let Some(v) = get(TTS_ENV) {
            self.narrator.program = PathBuf::from(v);
        }
    }

    pub fn validate(&self) -> WalkthroughResult<()> {
        self.encode.validate()?;
        if self.backend.timeout_secs == 0 {
            return Err(WalkthroughError::validation(
                "backend.timeout_secs must be > 0",
            ));
        }
        Ok(())
    }
}
