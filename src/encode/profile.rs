use serde::{Deserialize, Serialize};

/// Output container format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Webm,
    Mp4,
}

impl Container {
    /// MIME type used to tag finished blobs.
    pub fn mime(self) -> &'static str {
        match self {
            Self::Webm => "video/webm",
            Self::Mp4 => "video/mp4",
        }
    }

    /// `ffmpeg -f` muxer name.
    pub fn ffmpeg_format(self) -> &'static str {
        match self {
            Self::Webm => "webm",
            Self::Mp4 => "mp4",
        }
    }
}

/// One candidate encoding: a MIME type with an optional explicit codec.
///
/// `codec` is an encoder name as understood by the host (for `ffmpeg`, e.g. `libvpx-vp9`).
/// `None` means "container default".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingProfile {
    pub mime: String,
    pub container: Container,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
}

impl EncodingProfile {
    pub fn webm_vp9() -> Self {
        Self {
            mime: "video/webm;codecs=vp9".to_owned(),
            container: Container::Webm,
            codec: Some("libvpx-vp9".to_owned()),
        }
    }

    pub fn webm_vp8() -> Self {
        Self {
            mime: "video/webm;codecs=vp8".to_owned(),
            container: Container::Webm,
            codec: Some("libvpx".to_owned()),
        }
    }

    pub fn mp4_h264() -> Self {
        Self {
            mime: "video/mp4;codecs=avc1".to_owned(),
            container: Container::Mp4,
            codec: Some("libx264".to_owned()),
        }
    }

    /// Platform default: webm with whatever codec the muxer picks.
    pub fn platform_default() -> Self {
        Self {
            mime: "video/webm".to_owned(),
            container: Container::Webm,
            codec: None,
        }
    }

    /// Default preference order, most preferred first.
    pub fn default_preferences() -> Vec<Self> {
        vec![Self::webm_vp9(), Self::webm_vp8()]
    }

    /// MIME of the container, without codec parameters.
    pub fn container_mime(&self) -> &'static str {
        self.container.mime()
    }
}

/// Pick the first profile `supported` accepts, else [`EncodingProfile::platform_default`].
pub fn select_profile(
    preferences: &[EncodingProfile],
    mut supported: impl FnMut(&EncodingProfile) -> bool,
) -> EncodingProfile {
    preferences
        .iter()
        .find(|p| supported(p))
        .cloned()
        .unwrap_or_else(EncodingProfile::platform_default)
}
