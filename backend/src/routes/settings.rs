// backend/src/routes/settings.rs

use axum::{extract::State, http::StatusCode, Json};

use crate::settings::EngineSettings;
use crate::AppState;
use super::assignment_error;

pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<EngineSettings>, (StatusCode, String)> {
    let s = state.service.settings().await.map_err(assignment_error)?;
    Ok(Json(s))
}

/// Replaces the engine settings. Omitted keys reset to their defaults.
pub async fn put_settings(
    State(state): State<AppState>,
    Json(b): Json<EngineSettings>,
) -> Result<Json<EngineSettings>, (StatusCode, String)> {
    let s = state.service.update_settings(b).await.map_err(assignment_error)?;
    Ok(Json(s))
}
