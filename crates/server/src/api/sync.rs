//! Sync run API handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use super::commands;
use super::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    pub running: bool,
}

/// Start a manual run. 409 if one is already active.
pub async fn trigger_sync(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<SyncStatusResponse>), ApiError> {
    commands::start_sync(&state)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SyncStatusResponse { running: true }),
    ))
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<SyncStatusResponse> {
    Json(SyncStatusResponse {
        running: state.scheduler().is_running(),
    })
}
