// backend/src/routes/decisions.rs

use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use serde::Deserialize;

use crate::assignment::FeedbackPayload;
use crate::models::{Decision, DecisionStats};
use crate::AppState;
use super::assignment_error;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Deserialize)]
pub struct ListDecisionsQuery {
    pub ticket_id: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_decisions(
    State(state): State<AppState>,
    Query(q): Query<ListDecisionsQuery>,
) -> Result<Json<Vec<Decision>>, (StatusCode, String)> {
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let rows = state.service.list_decisions(q.ticket_id, limit).await.map_err(assignment_error)?;
    Ok(Json(rows))
}

pub async fn get_decision(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Decision>, (StatusCode, String)> {
    let row = state.service.get_decision(id).await.map_err(assignment_error)?;
    Ok(Json(row))
}

pub async fn record_feedback(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(b): Json<FeedbackPayload>,
) -> Result<Json<Decision>, (StatusCode, String)> {
    let row = state.service.record_feedback(id, b).await.map_err(assignment_error)?;
    Ok(Json(row))
}

pub async fn decision_stats(
    State(state): State<AppState>,
) -> Result<Json<DecisionStats>, (StatusCode, String)> {
    let stats = state.service.decision_stats().await.map_err(assignment_error)?;
    Ok(Json(stats))
}
