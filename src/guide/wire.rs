//! Payloads exchanged with the guidance backend.

use crate::foundation::error::{WalkthroughError, WalkthroughResult};
use crate::guide::model::{Guide, GuideDoc};
use serde::{Deserialize, Serialize};

/// Body of `POST /player/{id}/guidance`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GuidanceRequest {
    pub answer: String,
}

/// Response of `POST /player/{id}/guidance`. Also embedded in chat replies.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GuidanceResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub guide: GuideDoc,
}

impl GuidanceResponse {
    /// Convert into a fresh [`Guide`]; unsuccessful responses become [`WalkthroughError::Rejected`].
    pub fn into_guide(self) -> WalkthroughResult<Guide> {
        if !self.success {
            let msg = self
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "Unable to generate".to_owned());
            return Err(WalkthroughError::rejected(msg));
        }
        self.guide.into_guide()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

/// Body of `POST /player/{id}/chat`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<ChatTurn>,
}

/// Response of `POST /player/{id}/chat`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance: Option<GuidanceResponse>,
}

impl ChatResponse {
    /// `reply`, then `message`, then a fixed placeholder.
    pub fn reply_text(&self) -> &str {
        self.reply
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.message.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or("No response")
    }

    /// A new guide carried by this reply, if the embedded guidance succeeded.
    pub fn guide(&self) -> Option<WalkthroughResult<Guide>> {
        self.guidance
            .as_ref()
            .filter(|g| g.success)
            .map(|g| g.clone().into_guide())
    }
}

/// Client-side chat transcript sent along with every chat message.
#[derive(Clone, Debug, Default)]
pub struct ChatHistory {
    turns: Vec<ChatTurn>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: ChatRole, content: impl Into<String>) {
        self.turns.push(ChatTurn {
            role,
            content: content.into(),
        });
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }
}
