//! Video encoding: recorder hosts, frame pacing and the scene-to-video pipeline.
//!
//! The pipeline draws scenes in real time, streams frames into a recorder and installs the
//! finished bytes as a revocable [`resource::VideoResource`].

/// `ffmpeg`-backed encoder host.
pub mod ffmpeg;
/// Deterministic in-memory encoder host.
pub mod memory;
/// Frame pacing.
pub mod pacer;
/// Scene-to-video pipeline and its state machine.
pub mod pipeline;
/// Encoding profiles and selection.
pub mod profile;
/// Encoder host and recorder contracts.
pub mod recorder;
/// Blob registry and video resources.
pub mod resource;
