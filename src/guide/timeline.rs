use crate::guide::model::{Authority, Guide, Scene, Step};

/// One narrated entry of a playback timeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimelineEntry {
    pub narration: String,
    pub on_screen: String,
}

/// Ordered entries driving a playback session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn from_scenes(scenes: &[Scene]) -> Self {
        Self {
            entries: scenes
                .iter()
                .map(|s| TimelineEntry {
                    narration: s.spoken_text().to_owned(),
                    on_screen: s.display_text().to_owned(),
                })
                .collect(),
        }
    }

    pub fn from_steps(steps: &[Step]) -> Self {
        Self {
            entries: steps
                .iter()
                .map(|s| TimelineEntry {
                    narration: s.text().to_owned(),
                    on_screen: s.text().to_owned(),
                })
                .collect(),
        }
    }

    /// Scenes when the guide has them, otherwise its steps.
    pub fn from_guide(guide: &Guide) -> Self {
        match (guide.authority(), guide.scenes()) {
            (Authority::Scenes, Some(scenes)) => Self::from_scenes(scenes),
            _ => Self::from_steps(guide.steps()),
        }
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn get(&self, i: usize) -> Option<&TimelineEntry> {
        self.entries.get(i)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Percent shown while entry `i` is active: `round(100 * (i + 1) / len)`, capped at 100.
    pub fn progress_percent(&self, i: usize) -> u8 {
        if self.entries.is_empty() {
            return 100;
        }
        let pct = (100.0 * (i as f64 + 1.0) / self.entries.len() as f64).round();
        pct.clamp(0.0, 100.0) as u8
    }
}

impl FromIterator<TimelineEntry> for Timeline {
    fn from_iter<T: IntoIterator<Item = TimelineEntry>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
