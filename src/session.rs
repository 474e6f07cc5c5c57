use crate::client::GuidanceClient;
use crate::config::WalkthroughConfig;
use crate::encode::ffmpeg::FfmpegHost;
use crate::encode::pacer::FramePacer;
use crate::encode::pipeline::{CancelFlag, EncodePipeline};
use crate::encode::resource::VideoResource;
use crate::foundation::error::{WalkthroughError, WalkthroughResult};
use crate::guide::model::Guide;
use crate::guide::timeline::Timeline;
use crate::playback::narrator::CommandNarrator;
use crate::playback::scheduler::{PlaybackHandle, PlaybackScheduler};
use crate::render::surface::Surface;
use std::sync::Arc;

const MSG_NO_GUIDE: &str = "Generate a walkthrough video first";

/// One viewer's walkthrough state: the current guide, its video and its playback.
///
/// Replacing the guide stops playback and releases the previous video before the new guide is
/// visible, so nothing from the old guide leaks into the new one.
pub struct GuideSession {
    guide: Option<Arc<Guide>>,
    pipeline: EncodePipeline,
    scheduler: PlaybackScheduler,
}

impl GuideSession {
    pub fn new(pipeline: EncodePipeline, scheduler: PlaybackScheduler) -> Self {
        Self {
            guide: None,
            pipeline,
            scheduler,
        }
    }

    /// `ffmpeg` encoding and command-line narration, as configured.
    ///
    /// Checks the TTS program once; `ffmpeg` support is checked on the first encode.
    pub async fn from_config(cfg: &WalkthroughConfig) -> Self {
        let host = FfmpegHost::new(cfg.ffmpeg.clone());
        let pipeline =
            EncodePipeline::new(Box::new(host), cfg.encode.clone(), cfg.theme.clone());
        let scheduler = PlaybackScheduler::new(
            CommandNarrator::from_opts(&cfg.narrator).await,
            cfg.playback.clone(),
        );
        Self::new(pipeline, scheduler)
    }

    pub fn guide(&self) -> Option<&Arc<Guide>> {
        self.guide.as_ref()
    }

    pub fn pipeline(&self) -> &EncodePipeline {
        &self.pipeline
    }

    pub fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }

    /// Install a new guide, tearing down everything tied to the old one.
    pub fn replace_guide(&mut self, guide: Guide) -> WalkthroughResult<Arc<Guide>> {
        self.scheduler.stop();
        self.pipeline.reset()?;
        let guide = Arc::new(guide);
        if let Some(url) = guide.video_url() {
            self.pipeline.install_remote(url);
        }
        tracing::info!(
            title = guide.title(),
            entries = guide.len(),
            authority = ?guide.authority(),
            "guide replaced"
        );
        self.guide = Some(Arc::clone(&guide));
        Ok(guide)
    }

    /// Ask the backend for a guide and install it.
    pub async fn fetch_guide(
        &mut self,
        client: &GuidanceClient,
        player_id: u64,
        answer: &str,
    ) -> WalkthroughResult<Arc<Guide>> {
        let guide = client.guidance(player_id, answer).await?.into_guide()?;
        self.replace_guide(guide)
    }

    /// Encode the guide into a local video.
    ///
    /// Steps-only guides are recorded as one synthesized "Step N" scene per step. Returns `None`
    /// when the guide already points at a remote video.
    pub async fn encode_video(
        &mut self,
        surface: &mut dyn Surface,
        pacer: &mut dyn FramePacer,
        cancel: &CancelFlag,
    ) -> WalkthroughResult<Option<&VideoResource>> {
        let guide = self
            .guide
            .clone()
            .ok_or_else(|| WalkthroughError::validation(MSG_NO_GUIDE))?;
        if guide.video_url().is_some() {
            return Ok(None);
        }
        let scenes = guide.render_scenes();
        let resource = self
            .pipeline
            .encode(&scenes, guide.durations(), surface, pacer, cancel)
            .await?;
        Ok(Some(resource))
    }

    /// Narrate the current guide from the start, replacing any running playback.
    pub fn play(&mut self) -> WalkthroughResult<PlaybackHandle> {
        let guide = self
            .guide
            .as_ref()
            .ok_or_else(|| WalkthroughError::validation(MSG_NO_GUIDE))?;
        let timeline = Timeline::from_guide(guide);
        let durations = guide.durations().clone();
        Ok(self.scheduler.play(timeline, durations))
    }

    pub fn stop(&mut self) {
        self.scheduler.stop();
    }
}
