use analyser_core::AppError;
use analyser_jobs::JobStore;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::AppState;

/// Last job recorded for a client.
pub async fn get_job(
    State(state): State<AppState>,
    Path(client): Path<String>,
) -> Result<Response, AppError> {
    let Some(record) = state.runner.context().store.get(&client).await else {
        return Err(AppError::Status(StatusCode::NOT_FOUND));
    };
    Ok(Json(record).into_response())
}
