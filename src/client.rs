use crate::foundation::error::{WalkthroughError, WalkthroughResult};
use crate::guide::wire::{ChatHistory, ChatRequest, ChatResponse, GuidanceRequest, GuidanceResponse};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the guidance backend lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendOpts {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for BackendOpts {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_owned(),
            timeout_secs: 30,
        }
    }
}

/// HTTP client for the guidance and chat endpoints.
///
/// Transport failures and non-2xx statuses map to [`WalkthroughError::UpstreamUnavailable`]; a
/// body that does not parse maps to [`WalkthroughError::Serde`]. Nothing is retried.
#[derive(Clone, Debug)]
pub struct GuidanceClient {
    client: reqwest::Client,
    base_url: String,
}

impl GuidanceClient {
    pub fn new(opts: &BackendOpts) -> WalkthroughResult<Self> {
        if opts.base_url.trim().is_empty() {
            return Err(WalkthroughError::validation("backend base_url is empty"));
        }
        if opts.timeout_secs == 0 {
            return Err(WalkthroughError::validation(
                "backend timeout_secs must be > 0",
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| WalkthroughError::upstream(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            base_url: opts.base_url.trim_end_matches('/').to_owned(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST {base}/player/{id}/guidance`.
    #[tracing::instrument(skip(self, answer), fields(answer_len = answer.len()))]
    pub async fn guidance(
        &self,
        player_id: u64,
        answer: &str,
    ) -> WalkthroughResult<GuidanceResponse> {
        let url = format!("{}/player/{player_id}/guidance", self.base_url);
        let body = GuidanceRequest {
            answer: answer.to_owned(),
        };
        self.post_json(&url, &body).await
    }

    /// `POST {base}/player/{id}/chat` with the transcript so far.
    #[tracing::instrument(skip(self, message, history), fields(turns = history.turns().len()))]
    pub async fn chat(
        &self,
        player_id: u64,
        message: &str,
        history: &ChatHistory,
    ) -> WalkthroughResult<ChatResponse> {
        let url = format!("{}/player/{player_id}/chat", self.base_url);
        let body = ChatRequest {
            message: message.to_owned(),
            history: history.turns().to_vec(),
        };
        self.post_json(&url, &body).await
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> WalkthroughResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        tracing::debug!(%url, "posting to guidance backend");
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| WalkthroughError::upstream(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| WalkthroughError::upstream(format!("reading {url} failed: {e}")))?;
        if !status.is_success() {
            tracing::warn!(%status, %url, "guidance backend error");
            return Err(WalkthroughError::upstream(format!(
                "HTTP {status}: {}",
                text.trim()
            )));
        }
        serde_json::from_str(&text)
            .map_err(|e| WalkthroughError::serde(format!("invalid response from {url}: {e}")))
    }
}
