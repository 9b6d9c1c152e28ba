// backend/src/routes/agents.rs

use axum::{body::Bytes, extract::{Path, State}, http::StatusCode, Json};
use serde::Deserialize;

use crate::engine::{OpenTicket, WorkloadSummary};
use crate::models::Agent;
use crate::store::AgentPatch;
use crate::AppState;
use super::{assignment_error, optional_json};

pub async fn list_agents(
    State(state): State<AppState>,
) -> Result<Json<Vec<Agent>>, (StatusCode, String)> {
    let rows = state.service.list_agents().await.map_err(assignment_error)?;
    Ok(Json(rows))
}

pub async fn patch_agent(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(b): Json<AgentPatch>,
) -> Result<Json<Agent>, (StatusCode, String)> {
    let row = state.service.update_agent(id, b).await.map_err(assignment_error)?;
    Ok(Json(row))
}

#[derive(Deserialize, Default)]
pub struct RecalculateBody {
    /// Open tickets to use instead of asking the ticketing system.
    pub tickets: Option<Vec<OpenTicket>>,
}

pub async fn recalculate_workload(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<WorkloadSummary>, (StatusCode, String)> {
    let tickets = optional_json::<RecalculateBody>(&body)?.tickets;
    let summary = state.service.recalculate_workload(id, tickets).await.map_err(assignment_error)?;
    Ok(Json(summary))
}
