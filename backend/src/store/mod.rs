// backend/src/store/mod.rs

//! Persistence boundary for agents, reference data, settings and decisions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Agent, Category, Decision, DecisionStats, DecisionType, Feedback, Location, NewDecision, OverrideInfo};
use crate::settings::{EngineSettings, SettingsError};

pub mod memory;
pub mod pg;

pub use memory::InMemoryStore;
pub use pg::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("{entity} {id} is corrupt: {reason}")]
    Corrupt { entity: &'static str, id: i64, reason: String },
    #[error("feedback already recorded for decision {0}")]
    FeedbackAlreadyRecorded(i64),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Operator-editable agent fields. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentPatch {
    pub manually_deactivated: Option<bool>,
    pub skills: Option<Vec<String>>,
    pub max_concurrent_tickets: Option<i32>,
    pub is_remote: Option<bool>,
    pub on_leave: Option<bool>,
}

/// The single post-creation mutation a decision may receive.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackUpdate {
    pub feedback: Feedback,
    pub override_info: Option<OverrideInfo>,
    pub decision_type: DecisionType,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Every agent with its location resolved. Rows that fail to parse are
    /// skipped with a warning.
    async fn list_agents(&self) -> Result<Vec<Agent>, StoreError>;

    async fn get_agent(&self, agent_id: i64) -> Result<Agent, StoreError>;

    async fn update_agent(&self, agent_id: i64, patch: AgentPatch) -> Result<Agent, StoreError>;

    /// Atomically bumps the raw open-ticket count (and lifetime assignments)
    /// and returns the new raw count. A stored weighted count grows by
    /// `weight`; an unset one stays unset so the raw count keeps applying.
    async fn increment_agent_load(&self, agent_id: i64, weight: f64) -> Result<i32, StoreError>;

    async fn set_agent_workload(&self, agent_id: i64, raw_count: i32, weighted: f64) -> Result<(), StoreError>;

    async fn get_category(&self, category_id: i64) -> Result<Option<Category>, StoreError>;

    async fn get_location(&self, location_id: i64) -> Result<Option<Location>, StoreError>;

    async fn load_settings(&self) -> Result<EngineSettings, StoreError>;

    async fn save_settings(&self, settings: &EngineSettings) -> Result<(), StoreError>;

    async fn insert_decision(&self, decision: NewDecision) -> Result<Decision, StoreError>;

    async fn get_decision(&self, decision_id: i64) -> Result<Decision, StoreError>;

    /// Newest first.
    async fn list_decisions(&self, ticket_id: Option<i64>, limit: i64) -> Result<Vec<Decision>, StoreError>;

    /// Fails with `FeedbackAlreadyRecorded` if the decision already has feedback.
    async fn record_feedback(&self, decision_id: i64, update: FeedbackUpdate) -> Result<Decision, StoreError>;

    async fn decision_stats(&self) -> Result<DecisionStats, StoreError>;
}
