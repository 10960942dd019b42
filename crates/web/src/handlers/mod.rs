use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

mod jobs;
mod slack;

pub fn build_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/slack/events", post(slack::events))
        .route("/api/jobs/{client}", get(jobs::get_job))
}

async fn health() -> &'static str { "OK" }
