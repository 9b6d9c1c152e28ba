// backend/src/routes/mod.rs

use axum::{body::Bytes, http::StatusCode};
use serde::de::DeserializeOwned;
use tracing::error;

use crate::error::{AssignmentError, ErrorKind};

pub mod agents;
pub mod decisions;
pub mod health;
pub mod settings;
pub mod tickets;

// Common error mapper
pub fn assignment_error(e: AssignmentError) -> (StatusCode, String) {
    let status = match e.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Upstream | ErrorKind::ExternalAssignment => StatusCode::BAD_GATEWAY,
        ErrorKind::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(error = %e, "request failed");
    }
    (status, e.to_string())
}

/// Decodes an optional JSON body. Only an empty body means "none"; anything
/// else must parse, with the same 400/422 split axum's `Json` extractor uses.
pub fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, (StatusCode, String)> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        let status = if e.is_data() { StatusCode::UNPROCESSABLE_ENTITY } else { StatusCode::BAD_REQUEST };
        (status, format!("invalid JSON body: {e}"))
    })
}
