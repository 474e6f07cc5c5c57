//! Narrated playback of a guide timeline.

/// Text-to-speech backends.
pub mod narrator;
/// Narration/timer race scheduler.
pub mod scheduler;
