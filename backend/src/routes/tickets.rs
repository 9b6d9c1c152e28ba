// backend/src/routes/tickets.rs

use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::assignment::{AssignmentRequest, AssignmentResult};
use crate::AppState;
use super::optional_json;

/// Answers with an `AssignmentResult` once the body is accepted; system
/// failures come back as a FAILED result carrying `error_kind`.
pub async fn assign_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<i64>,
    body: Bytes,
) -> Result<Json<AssignmentResult>, (StatusCode, String)> {
    let started = Instant::now();
    let req: AssignmentRequest = optional_json(&body)?;
    Ok(match state.service.assign(ticket_id, req).await {
        Ok(result) => Json(result),
        Err(e) => Json(AssignmentResult::from_error(ticket_id, &e, started.elapsed())),
    })
}
