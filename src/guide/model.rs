use crate::foundation::error::{WalkthroughError, WalkthroughResult};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

/// Seconds used for an index whose duration is absent or invalid.
pub const DEFAULT_STEP_SECS: f64 = 8.0;

/// Longest duration a single index may have; longer entries are clamped to it.
pub const MAX_STEP_SECS: f64 = 3600.0;

/// One plain guidance line. Its identity is its position in the guide.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Step(pub String);

impl Step {
    pub fn text(&self) -> &str {
        &self.0
    }
}

/// A titled unit of guidance with narration and on-screen text.
///
/// Every field is optional on the wire; accessors degrade to `""` instead of failing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
    #[serde(
        default,
        alias = "onScreen",
        skip_serializing_if = "Option::is_none"
    )]
    pub on_screen: Option<String>,
}

impl Scene {
    pub fn new(
        title: impl Into<String>,
        narration: impl Into<String>,
        on_screen: Option<String>,
    ) -> Self {
        Self {
            title: Some(title.into()),
            narration: Some(narration.into()),
            on_screen,
        }
    }

    pub fn title(&self) -> &str {
        non_empty(&self.title).unwrap_or("")
    }

    /// Text rendered on screen: `on_screen`, falling back to `narration`.
    pub fn display_text(&self) -> &str {
        non_empty(&self.on_screen)
            .or_else(|| non_empty(&self.narration))
            .unwrap_or("")
    }

    /// Text spoken aloud: `narration`, falling back to `on_screen`.
    pub fn spoken_text(&self) -> &str {
        non_empty(&self.narration)
            .or_else(|| non_empty(&self.on_screen))
            .unwrap_or("")
    }
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

/// Per-index durations with a fixed fallback.
///
/// Entries that are missing, non-finite or not strictly positive are stored as absent, and entries
/// above [`MAX_STEP_SECS`] are clamped, so every value returned by [`Durations::get`] is strictly
/// positive and representable.
#[derive(Clone, Debug, PartialEq)]
pub struct Durations {
    secs: Vec<Option<f64>>,
    fallback_secs: f64,
}

impl Default for Durations {
    fn default() -> Self {
        Self {
            secs: Vec::new(),
            fallback_secs: DEFAULT_STEP_SECS,
        }
    }
}

impl Durations {
    /// Build from raw entries, dropping invalid values.
    pub fn new(entries: impl IntoIterator<Item = Option<f64>>) -> Self {
        Self {
            secs: entries
                .into_iter()
                .map(|v| {
                    v.filter(|s| s.is_finite() && *s > 0.0)
                        .map(|s| s.min(MAX_STEP_SECS))
                })
                .collect(),
            fallback_secs: DEFAULT_STEP_SECS,
        }
    }

    /// Build from plain seconds.
    pub fn from_secs(secs: &[f64]) -> Self {
        Self::new(secs.iter().copied().map(Some))
    }

    /// Override the fallback used for absent entries.
    pub fn with_fallback_secs(mut self, secs: f64) -> WalkthroughResult<Self> {
        if !secs.is_finite() || secs <= 0.0 || secs > MAX_STEP_SECS {
            return Err(WalkthroughError::validation(format!(
                "fallback duration must be in (0, {MAX_STEP_SECS}] seconds"
            )));
        }
        self.fallback_secs = secs;
        Ok(self)
    }

    /// Duration for index `i` in seconds.
    pub fn secs(&self, i: usize) -> f64 {
        self.secs
            .get(i)
            .copied()
            .flatten()
            .unwrap_or(self.fallback_secs)
    }

    /// Duration for index `i`.
    pub fn get(&self, i: usize) -> Duration {
        Duration::try_from_secs_f64(self.secs(i))
            .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_STEP_SECS))
    }

    /// Number of explicit entries (including absent ones).
    pub fn len(&self) -> usize {
        self.secs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secs.is_empty()
    }

    /// Total duration for `n` indices.
    pub fn total(&self, n: usize) -> Duration {
        (0..n).map(|i| self.get(i)).sum()
    }
}

/// Titled scene list attached to a guide.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoScript {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub scenes: Vec<Scene>,
}

/// Which list drives rendering and playback for a guide.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Authority {
    Scenes,
    Steps,
}

/// Immutable guide aggregate.
///
/// A guide is built once per fetch and replaced wholesale when a new one arrives; it is never
/// mutated field by field.
#[derive(Clone, Debug, PartialEq)]
pub struct Guide {
    title: String,
    steps: Vec<Step>,
    video: Option<VideoScript>,
    durations: Durations,
    ui_steps: Vec<String>,
    video_notice: Option<String>,
    video_url: Option<String>,
}

impl Guide {
    /// Build a guide. At least one of `steps` / `video.scenes` must be non-empty.
    pub fn new(
        title: impl Into<String>,
        steps: Vec<Step>,
        video: Option<VideoScript>,
        durations: Durations,
    ) -> WalkthroughResult<Self> {
        let video = video.filter(|v| !v.scenes.is_empty());
        if steps.is_empty() && video.is_none() {
            return Err(WalkthroughError::validation(
                "guide must contain at least one step or scene",
            ));
        }
        let title = title.into();
        Ok(Self {
            title: if title.is_empty() {
                "Walkthrough".to_owned()
            } else {
                title
            },
            steps,
            video,
            durations,
            ui_steps: Vec::new(),
            video_notice: None,
            video_url: None,
        })
    }

    /// Convenience constructor for a steps-only guide.
    pub fn from_steps(
        title: impl Into<String>,
        steps: impl IntoIterator<Item = impl Into<String>>,
        durations: Durations,
    ) -> WalkthroughResult<Self> {
        let steps = steps.into_iter().map(|s| Step(s.into())).collect();
        Self::new(title, steps, None, durations)
    }

    /// Convenience constructor for a scene guide.
    pub fn from_scenes(
        title: impl Into<String>,
        scenes: Vec<Scene>,
        durations: Durations,
    ) -> WalkthroughResult<Self> {
        let title = title.into();
        let video = VideoScript {
            title: Some(title.clone()),
            scenes,
        };
        Self::new(title, Vec::new(), Some(video), durations)
    }

    pub fn with_ui_steps(mut self, ui_steps: Vec<String>) -> Self {
        self.ui_steps = ui_steps;
        self
    }

    pub fn with_video_notice(mut self, notice: Option<String>) -> Self {
        self.video_notice = notice.filter(|n| !n.is_empty());
        self
    }

    pub fn with_video_url(mut self, url: Option<String>) -> Self {
        self.video_url = url.filter(|u| !u.is_empty());
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn video(&self) -> Option<&VideoScript> {
        self.video.as_ref()
    }

    /// Scenes, when present (never an empty slice wrapped in `Some`).
    pub fn scenes(&self) -> Option<&[Scene]> {
        self.video.as_ref().map(|v| v.scenes.as_slice())
    }

    pub fn durations(&self) -> &Durations {
        &self.durations
    }

    pub fn ui_steps(&self) -> &[String] {
        &self.ui_steps
    }

    pub fn video_notice(&self) -> Option<&str> {
        self.video_notice.as_deref()
    }

    /// Pre-rendered video URL supplied by the backend, if any.
    pub fn video_url(&self) -> Option<&str> {
        self.video_url.as_deref()
    }

    /// Scenes take precedence over steps.
    pub fn authority(&self) -> Authority {
        if self.video.is_some() {
            Authority::Scenes
        } else {
            Authority::Steps
        }
    }

    /// Number of entries in the authoritative list.
    pub fn len(&self) -> usize {
        match self.authority() {
            Authority::Scenes => self.scenes().map_or(0, <[Scene]>::len),
            Authority::Steps => self.steps.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scenes to encode. Steps-only guides synthesize one scene per step.
    pub fn render_scenes(&self) -> Vec<Scene> {
        match self.scenes() {
            Some(scenes) => scenes.to_vec(),
            None => self
                .steps
                .iter()
                .enumerate()
                .map(|(i, s)| Scene::new(format!("Step {}", i + 1), s.text(), None))
                .collect(),
        }
    }

    /// Parse a guide document from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> WalkthroughResult<Self> {
        let doc: GuideDoc = serde_json::from_reader(r)
            .map_err(|e| WalkthroughError::validation(format!("parse guide JSON: {e}")))?;
        doc.into_guide()
    }

    /// Parse a guide document from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> WalkthroughResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            WalkthroughError::validation(format!("open guide JSON '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Serializable document form (the same shape [`Guide::from_reader`] accepts).
    pub fn to_doc(&self) -> GuideDoc {
        GuideDoc {
            title: Some(self.title.clone()),
            steps: self.steps.iter().map(|s| s.0.clone()).collect(),
            durations: self.durations.secs.clone(),
            video: self.video.clone(),
            ui_steps: self.ui_steps.clone(),
            video_notice: self.video_notice.clone(),
            video_url: self.video_url.clone(),
        }
    }
}

/// On-disk guide document; also the shape the backend embeds in its guidance payloads.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GuideDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub durations: Vec<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoScript>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ui_steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_notice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

impl GuideDoc {
    pub fn into_guide(self) -> WalkthroughResult<Guide> {
        let steps = self.steps.into_iter().map(Step).collect();
        Ok(Guide::new(
            self.title.unwrap_or_default(),
            steps,
            self.video,
            Durations::new(self.durations),
        )?
        .with_ui_steps(self.ui_steps)
        .with_video_notice(self.video_notice)
        .with_video_url(self.video_url))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/guide/model.rs"]
mod tests;
