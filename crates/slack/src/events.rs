use std::fmt::Display;

use analyser_core::models::ChatEvent;
use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

/// Outer payload of a Slack Events API request.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        #[serde(default)]
        event_id: Option<String>,
        event: MessageEvent,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessageEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub channel: Option<String>,
    pub user: Option<String>,
    pub text: Option<String>,
    pub ts: Option<String>,
    pub bot_id: Option<String>,
    pub subtype: Option<String>,
}

impl MessageEvent {
    /// Channel messages only. The message timestamp identifies the event, since
    /// Slack retries and edits reuse it.
    pub fn to_chat_event(&self) -> Option<ChatEvent> {
        if self.kind != "message" {
            return None;
        }
        Some(ChatEvent {
            event_id: self.ts.clone()?,
            sender: self.user.clone(),
            channel: self.channel.clone()?,
            text: self.text.clone().unwrap_or_default(),
            from_bot: self.bot_id.is_some() || self.subtype.is_some(),
        })
    }
}

/// Extract a Slack Events API payload.
#[derive(Debug, Clone)]
#[must_use]
pub struct SlackEvent {
    pub envelope: Envelope,
}

impl<S> FromRequest<S> for SlackEvent
where S: Send + Sync
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        fn err(m: impl Display) -> Response {
            tracing::error!("{m}");
            (StatusCode::BAD_REQUEST, m.to_string()).into_response()
        }
        let body = Bytes::from_request(req, state).await.map_err(|_| err("error reading body"))?;
        let envelope =
            serde_json::from_slice(&body).map_err(|e| err(format!("error parsing body: {e}")))?;
        Ok(SlackEvent { envelope })
    }
}
