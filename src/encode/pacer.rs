use crate::foundation::core::Fps;
use async_trait::async_trait;
use tokio::time::{Interval, MissedTickBehavior};

/// Source of frame-paint opportunities.
///
/// The render loop suspends on `next_frame` once per iteration; elapsed scene time is measured
/// separately, so a slow pacer lowers the frame count but never stretches a scene.
#[async_trait]
pub trait FramePacer: Send {
    async fn next_frame(&mut self);
}

/// Paces frames with a tokio interval at the capture rate.
pub struct IntervalPacer {
    period: std::time::Duration,
    interval: Option<Interval>,
}

impl IntervalPacer {
    pub fn new(fps: Fps) -> Self {
        Self {
            period: fps.frame_duration(),
            interval: None,
        }
    }
}

#[async_trait]
impl FramePacer for IntervalPacer {
    async fn next_frame(&mut self) {
        // Created lazily: an interval needs a running runtime.
        let interval = self.interval.get_or_insert_with(|| {
            let mut i = tokio::time::interval(self.period);
            i.set_missed_tick_behavior(MissedTickBehavior::Delay);
            i
        });
        interval.tick().await;
    }
}
