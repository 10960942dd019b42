use analyser_slack::events::{Envelope, SlackEvent};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::AppState;

/// Slack Events API endpoint. Jobs run in the background; Slack only gets an ack.
pub async fn events(
    State(state): State<AppState>,
    SlackEvent { envelope }: SlackEvent,
) -> Response {
    match envelope {
        Envelope::UrlVerification { challenge } => {
            tracing::info!("Answering URL verification");
            challenge.into_response()
        }
        Envelope::EventCallback { event_id, event } => {
            match event.to_chat_event() {
                Some(chat_event) => {
                    tracing::debug!(
                        "Received message {} in {} (event {})",
                        chat_event.event_id,
                        chat_event.channel,
                        event_id.as_deref().unwrap_or("[none]")
                    );
                    state.runner.submit(chat_event);
                }
                None => tracing::debug!("Ignoring {} event", event.kind),
            }
            StatusCode::OK.into_response()
        }
        Envelope::Other => StatusCode::OK.into_response(),
    }
}
