use axum::{extract::State, Json};
use std::sync::Arc;
use archivist_core::{Settings, SettingsUpdate};

use super::commands;
use super::error::ApiError;
use crate::state::AppState;

pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<Settings> {
    Json(state.settings().get().await)
}

pub async fn save_settings(
    State(state): State<Arc<AppState>>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<Settings>, ApiError> {
    let settings = commands::save_settings(&state, update).await?;
    Ok(Json(settings))
}
