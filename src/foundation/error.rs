/// Crate-wide result alias.
pub type WalkthroughResult<T> = Result<T, WalkthroughError>;

/// Errors produced by guide loading, rendering, encoding, playback and the backend client.
#[derive(thiserror::Error, Debug)]
pub enum WalkthroughError {
    /// Caller supplied invalid input (empty guide, bad config value, ...).
    #[error("validation error: {0}")]
    Validation(String),

    /// The host lacks frame capture / encoding capability.
    #[error("video encoding unsupported: {0}")]
    Unsupported(String),

    /// No encoding profile could be started.
    #[error("encoder failed to initialize: {0}")]
    EncoderInitFailed(String),

    /// Encoding completed but produced no bytes.
    #[error("encoder produced no output")]
    EmptyOutput,

    /// The encoder failed while recording or finalizing.
    #[error("encode error: {0}")]
    Encode(String),

    /// The encoder did not signal completion within the finalize timeout.
    #[error("encoder did not finish within the finalize timeout")]
    FinalizeTimeout,

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// Text-to-speech is not available on this host.
    #[error("no narrator available")]
    NoNarrator,

    /// A single utterance failed.
    #[error("narration error: {0}")]
    Narration(String),

    /// The guidance backend could not be reached or answered with an HTTP error.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The guidance backend answered but declined the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WalkthroughError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn encoder_init(msg: impl Into<String>) -> Self {
        Self::EncoderInitFailed(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn narration(msg: impl Into<String>) -> Self {
        Self::Narration(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}
