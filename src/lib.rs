//! Narrated walkthrough guides.
//!
//! A [`Guide`] arrives from the guidance backend as either a plain step list or a titled list of
//! scenes. Scenes are painted by [`render::scene::render_scene`], recorded in real time into a
//! video by [`EncodePipeline`], and narrated step by step by [`PlaybackScheduler`], where the
//! narrator and a duration timer race to advance each entry exactly once.
//!
//! [`GuideSession`] ties the three together for a single viewer.
#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod encode;
pub mod foundation;
pub mod guide;
pub mod playback;
pub mod render;
pub mod session;

pub use client::{BackendOpts, GuidanceClient};
pub use config::WalkthroughConfig;
pub use encode::ffmpeg::{FfmpegHost, FfmpegOpts};
pub use encode::memory::InMemoryHost;
pub use encode::pacer::{FramePacer, IntervalPacer};
pub use encode::pipeline::{
    CancelFlag, EncodeOpts, EncodePhase, EncodePipeline, EncodeStatus, FailureReason,
};
pub use encode::profile::{Container, EncodingProfile};
pub use encode::recorder::{EncoderHost, Recorder, RecorderEvent};
pub use encode::resource::{BlobRegistry, ObjectUrl, VideoResource, VideoSource};
pub use foundation::core::{Canvas, Fps, FrameIndex, Point, Rect, Rgba8};
pub use foundation::error::{WalkthroughError, WalkthroughResult};
pub use guide::model::{Authority, Durations, Guide, Scene, Step};
pub use guide::timeline::{Timeline, TimelineEntry};
pub use playback::narrator::{CommandNarrator, Narrator, NarratorOpts, ScriptedNarrator};
pub use playback::scheduler::{
    FallbackTimer, PlaybackEvent, PlaybackHandle, PlaybackOpts, PlaybackScheduler,
    PlaybackSnapshot, PlaybackStatus, TriggerSource,
};
pub use render::cpu::CpuSurface;
pub use render::frame::FrameRGBA;
pub use render::surface::{DisplayListSurface, Surface};
pub use render::theme::Theme;
pub use session::GuideSession;
