//! Channel API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use archivist_core::{Channel, ChannelUpdate, RegistryError};

use super::commands;
use super::error::ApiError;
use crate::state::AppState;

/// Request body for pausing or resuming a channel
#[derive(Debug, Deserialize)]
pub struct PauseBody {
    pub paused: bool,
}

pub async fn list_channels(State(state): State<Arc<AppState>>) -> Json<Vec<Channel>> {
    Json(state.registry().list().await)
}

/// Create a channel with default settings
pub async fn create_channel(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<Channel>), ApiError> {
    let channel = commands::add_channel(&state).await?;
    Ok((StatusCode::CREATED, Json(channel)))
}

pub async fn get_channel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<Channel>, ApiError> {
    state
        .registry()
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| RegistryError::NotFound(id).into())
}

/// Save the editable fields of a channel.
///
/// The body uses the channel record field names; the id comes from the path.
pub async fn update_channel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(mut body): Json<Value>,
) -> Result<Json<Channel>, ApiError> {
    let Some(fields) = body.as_object_mut() else {
        return Err(ApiError::bad_request("Expected a JSON object"));
    };
    fields.insert("Id".to_string(), Value::from(id));

    let update: ChannelUpdate = serde_json::from_value(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid channel update: {}", e)))?;
    let channel = commands::save_channel(&state, &update).await?;
    Ok(Json(channel))
}

pub async fn delete_channel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<Channel>, ApiError> {
    let removed = commands::remove_channel(&state, id).await?;
    Ok(Json(removed))
}

pub async fn pause_channel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(body): Json<PauseBody>,
) -> Result<Json<Channel>, ApiError> {
    let channel = commands::pause_channel(&state, id, body.paused).await?;
    Ok(Json(channel))
}
