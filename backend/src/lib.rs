// backend/src/lib.rs

use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod assignment;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod routes;
pub mod settings;
pub mod store;
pub mod ticketing;

use assignment::AssignmentService;

#[derive(Clone)]
pub struct AppState {
    pub service: AssignmentService,
}

/// Full API router with middleware attached.
pub fn app(state: AppState) -> Router {
    // Very permissive CORS for local dev (tighten for prod)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // health
        .route("/health", get(routes::health::health))
        // assignment
        .route(
            "/api/v1/tickets/:ticket_id/assign",
            post(routes::tickets::assign_ticket),
        )
        // decisions & feedback
        .route("/api/v1/decisions", get(routes::decisions::list_decisions))
        .route("/api/v1/decisions/stats", get(routes::decisions::decision_stats))
        .route("/api/v1/decisions/:id", get(routes::decisions::get_decision))
        .route(
            "/api/v1/decisions/:id/feedback",
            post(routes::decisions::record_feedback),
        )
        // agents
        .route("/api/v1/agents", get(routes::agents::list_agents))
        .route("/api/v1/agents/:id", patch(routes::agents::patch_agent))
        .route(
            "/api/v1/agents/:id/workload",
            post(routes::agents::recalculate_workload),
        )
        // settings
        .route(
            "/api/v1/settings",
            get(routes::settings::get_settings).put(routes::settings::put_settings),
        )
        // state & middleware
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
