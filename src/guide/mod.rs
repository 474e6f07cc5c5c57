//! Guide model: steps, scenes, durations and the playback timeline derived from them.

/// Immutable guide aggregate and its document form.
pub mod model;
/// Ordered narration timeline used by playback.
pub mod timeline;
/// Backend request/response payloads.
pub mod wire;
