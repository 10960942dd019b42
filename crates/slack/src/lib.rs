pub mod events;

use analyser_core::config::SlackConfig;
use async_trait::async_trait;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum SlackError {
    #[error("Slack request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Slack API error in {method}: {error}")]
    Api { method: &'static str, error: String },
    #[error("invalid Slack API URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Posts replies back to the chat.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Post `text` in `channel`, threaded under the message `thread_ts`.
    async fn post_reply(&self, channel: &str, thread_ts: &str, text: &str)
    -> Result<(), SlackError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    pub user_id: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
}

/// Slack Web API client.
#[derive(Clone)]
pub struct SlackClient {
    client: reqwest::Client,
    api_url: Url,
    token: String,
}

impl SlackClient {
    pub fn new(config: &SlackConfig) -> Result<Self, SlackError> {
        let client = reqwest::Client::builder().user_agent("repo-analyser").build()?;
        Ok(Self { client, api_url: config.api_url.clone(), token: config.token.clone() })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        body: serde_json::Value,
    ) -> Result<T, SlackError> {
        let url = self.api_url.join(method)?;
        let response: serde_json::Value = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if response.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            let error = response
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown_error")
                .to_string();
            return Err(SlackError::Api { method, error });
        }
        serde_json::from_value(response)
            .map_err(|e| SlackError::Api { method, error: format!("invalid response: {e}") })
    }

    /// Identity of the token's bot user.
    pub async fn auth_test(&self) -> Result<Identity, SlackError> {
        let identity: Identity = self.call("auth.test", json!({})).await?;
        tracing::info!(
            "Logged in as {} ({})",
            identity.user.as_deref().unwrap_or("[unknown]"),
            identity.user_id
        );
        Ok(identity)
    }
}

#[async_trait]
impl ChatClient for SlackClient {
    async fn post_reply(
        &self,
        channel: &str,
        thread_ts: &str,
        text: &str,
    ) -> Result<(), SlackError> {
        let body = json!({ "channel": channel, "thread_ts": thread_ts, "text": text });
        self.call::<serde_json::Value>("chat.postMessage", body).await?;
        Ok(())
    }
}
