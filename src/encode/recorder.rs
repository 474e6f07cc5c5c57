use crate::encode::profile::EncodingProfile;
use crate::foundation::core::{Canvas, Fps, FrameIndex};
use crate::foundation::error::WalkthroughResult;
use crate::render::frame::FrameRGBA;
use async_trait::async_trait;

/// Configuration handed to an [`EncoderHost`] when a recording starts.
#[derive(Clone, Debug)]
pub struct RecorderConfig {
    pub canvas: Canvas,
    pub fps: Fps,
    /// Profile chosen by [`crate::encode::profile::select_profile`].
    pub profile: EncodingProfile,
}

/// Asynchronous output of a running recorder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecorderEvent {
    /// A chunk of encoded container bytes, in output order.
    Data(Vec<u8>),
    /// The recorder flushed its last chunk. Sent at most once.
    Stopped,
}

/// Sending half given to recorders for their events.
pub type RecorderEvents = tokio::sync::mpsc::UnboundedSender<RecorderEvent>;

/// A streaming media encoder available on this host.
#[async_trait]
pub trait EncoderHost: Send {
    /// Short host name for logs.
    fn name(&self) -> &'static str;

    /// Whether this host can capture frames and encode at all.
    ///
    /// Called before any profile is checked; hosts may cache what they learn here.
    async fn supports_capture(&mut self) -> bool;

    /// Whether `profile` can be encoded here.
    fn is_type_supported(&mut self, profile: &EncodingProfile) -> bool;

    /// Start a recorder. Encoded output is delivered on `events`.
    fn start(
        &mut self,
        cfg: RecorderConfig,
        events: RecorderEvents,
    ) -> WalkthroughResult<Box<dyn Recorder>>;
}

/// A running recording.
///
/// Ordering contract: `push_frame` is called with strictly increasing `FrameIndex`. After `stop`
/// the recorder flushes, emits its remaining `Data` and then exactly one `Stopped`.
pub trait Recorder: Send {
    /// Capture one frame.
    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> WalkthroughResult<()>;

    /// Request end of stream. Returns once the request is issued, not once output is flushed.
    fn stop(&mut self) -> WalkthroughResult<()>;

    /// Release host resources after `Stopped` was observed; reports late failures.
    fn finish(&mut self) -> WalkthroughResult<()> {
        Ok(())
    }
}
