// backend/src/store/pg.rs

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{query, query_as, query_scalar, FromRow, Pool, Postgres};
use tracing::{debug, warn};

use super::{AgentPatch, AssignmentStore, FeedbackUpdate, StoreError};
use crate::models::{Agent, AgentRow, Category, Decision, DecisionRow, DecisionStats, Location, NewDecision};
use crate::settings::EngineSettings;

const AGENT_COLUMNS: &str = r#"
    agent_id, name, email, skills, category_skills, auto_detected_skills, metadata,
    level, is_available, manually_deactivated, location_id, is_remote,
    current_ticket_count, weighted_ticket_count, max_concurrent_tickets,
    total_assignments, satisfaction_score, average_resolution_time, on_leave, category_ids
"#;

const DECISION_COLUMNS: &str = r#"
    decision_id, ticket_id, ticket_subject, agent_id, decision_type, score, confidence,
    breakdown, alternatives, external_sync, external_error, overridden_by, override_reason,
    override_agent_id, feedback_score, feedback_comments, feedback_accepted, created_at, feedback_at
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn locations_by_id(&self) -> Result<HashMap<i64, Location>, StoreError> {
        let rows = query_as::<_, Location>(
            r#"SELECT location_id, name, timezone, support_types FROM public.locations"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|l| (l.location_id, l)).collect())
    }

    async fn agent_with_location(&self, row: AgentRow) -> Result<Agent, StoreError> {
        let location = match row.location_id {
            Some(id) => self.get_location(id).await?,
            None => None,
        };
        let id = row.agent_id;
        Agent::from_row(row, location).map_err(|reason| StoreError::Corrupt { entity: "agent", id, reason })
    }
}

fn into_decision(row: DecisionRow) -> Result<Decision, StoreError> {
    let id = row.decision_id;
    Decision::try_from(row).map_err(|reason| StoreError::Corrupt { entity: "decision", id, reason })
}

#[derive(FromRow)]
struct StatsRow {
    total: i64,
    auto_assigned: i64,
    suggested: i64,
    manual_override: i64,
    reassigned: i64,
    with_feedback: i64,
    accepted_rate: Option<f64>,
    average_feedback_score: Option<f64>,
}

#[async_trait]
impl AssignmentStore for PgStore {
    async fn list_agents(&self) -> Result<Vec<Agent>, StoreError> {
        let rows = query_as::<_, AgentRow>(&format!(
            "SELECT {AGENT_COLUMNS} FROM public.agents ORDER BY agent_id"
        ))
        .fetch_all(&self.pool)
        .await?;
        let locations = self.locations_by_id().await?;

        let mut agents = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.agent_id;
            let location = row.location_id.and_then(|l| locations.get(&l).cloned());
            match Agent::from_row(row, location) {
                Ok(agent) => agents.push(agent),
                Err(reason) => warn!(agent_id = id, %reason, "skipping agent"),
            }
        }
        debug!(count = agents.len(), "loaded agent pool");
        Ok(agents)
    }

    async fn get_agent(&self, agent_id: i64) -> Result<Agent, StoreError> {
        let row = query_as::<_, AgentRow>(&format!(
            "SELECT {AGENT_COLUMNS} FROM public.agents WHERE agent_id = $1"
        ))
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound { entity: "agent", id: agent_id })?;
        self.agent_with_location(row).await
    }

    async fn update_agent(&self, agent_id: i64, patch: AgentPatch) -> Result<Agent, StoreError> {
        let row = query_as::<_, AgentRow>(&format!(
            r#"
            UPDATE public.agents SET
              manually_deactivated = COALESCE($2, manually_deactivated),
              skills = COALESCE($3, skills),
              max_concurrent_tickets = COALESCE($4, max_concurrent_tickets),
              is_remote = COALESCE($5, is_remote),
              on_leave = COALESCE($6, on_leave),
              updated_at = now()
            WHERE agent_id = $1
            RETURNING {AGENT_COLUMNS}
            "#
        ))
        .bind(agent_id)
        .bind(patch.manually_deactivated)
        .bind(patch.skills)
        .bind(patch.max_concurrent_tickets)
        .bind(patch.is_remote)
        .bind(patch.on_leave)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound { entity: "agent", id: agent_id })?;
        self.agent_with_location(row).await
    }

    async fn increment_agent_load(&self, agent_id: i64, weight: f64) -> Result<i32, StoreError> {
        query_scalar::<_, i32>(
            r#"
            UPDATE public.agents
            SET current_ticket_count = current_ticket_count + 1,
                weighted_ticket_count = weighted_ticket_count + $2,
                total_assignments = total_assignments + 1,
                updated_at = now()
            WHERE agent_id = $1
            RETURNING current_ticket_count
            "#,
        )
        .bind(agent_id)
        .bind(weight)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound { entity: "agent", id: agent_id })
    }

    async fn set_agent_workload(&self, agent_id: i64, raw_count: i32, weighted: f64) -> Result<(), StoreError> {
        let res = query(
            r#"
            UPDATE public.agents
            SET current_ticket_count = $2, weighted_ticket_count = $3, updated_at = now()
            WHERE agent_id = $1
            "#,
        )
        .bind(agent_id)
        .bind(raw_count)
        .bind(weighted)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "agent", id: agent_id });
        }
        Ok(())
    }

    async fn get_category(&self, category_id: i64) -> Result<Option<Category>, StoreError> {
        let row = query_as::<_, Category>(
            r#"
            SELECT category_id, name, required_skills, priority_level, average_resolution_time,
                   requires_onsite, requires_specialization
            FROM public.categories WHERE category_id = $1
            "#,
        )
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_location(&self, location_id: i64) -> Result<Option<Location>, StoreError> {
        let row = query_as::<_, Location>(
            r#"SELECT location_id, name, timezone, support_types FROM public.locations WHERE location_id = $1"#,
        )
        .bind(location_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn load_settings(&self) -> Result<EngineSettings, StoreError> {
        let rows = query_as::<_, (String, Json<Value>)>(
            r#"SELECT key, value FROM public.assignment_settings"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(EngineSettings::from_entries(rows.into_iter().map(|(k, v)| (k, v.0)))?)
    }

    async fn save_settings(&self, settings: &EngineSettings) -> Result<(), StoreError> {
        settings.validate()?;
        let entries = settings.to_entries()?;

        let mut tx = self.pool.begin().await?;
        for (key, value) in entries {
            query(
                r#"
                INSERT INTO public.assignment_settings(key, value, updated_at)
                VALUES ($1, $2, now())
                ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()
                "#,
            )
            .bind(key)
            .bind(Json(value))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn insert_decision(&self, d: NewDecision) -> Result<Decision, StoreError> {
        let row = query_as::<_, DecisionRow>(&format!(
            r#"
            INSERT INTO public.decisions(
              ticket_id, ticket_subject, agent_id, decision_type, score, confidence,
              breakdown, alternatives, external_sync, external_error)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
            RETURNING {DECISION_COLUMNS}
            "#
        ))
        .bind(d.ticket_id)
        .bind(d.ticket_subject)
        .bind(d.agent_id)
        .bind(d.decision_type.as_str())
        .bind(d.score)
        .bind(d.confidence)
        .bind(d.breakdown.map(Json))
        .bind(Json(d.alternatives))
        .bind(d.external_sync.as_str())
        .bind(d.external_error)
        .fetch_one(&self.pool)
        .await?;
        into_decision(row)
    }

    async fn get_decision(&self, decision_id: i64) -> Result<Decision, StoreError> {
        let row = query_as::<_, DecisionRow>(&format!(
            "SELECT {DECISION_COLUMNS} FROM public.decisions WHERE decision_id = $1"
        ))
        .bind(decision_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound { entity: "decision", id: decision_id })?;
        into_decision(row)
    }

    async fn list_decisions(&self, ticket_id: Option<i64>, limit: i64) -> Result<Vec<Decision>, StoreError> {
        let rows = query_as::<_, DecisionRow>(&format!(
            r#"
            SELECT {DECISION_COLUMNS} FROM public.decisions
            WHERE ($1::bigint IS NULL OR ticket_id = $1)
            ORDER BY decision_id DESC
            LIMIT $2
            "#
        ))
        .bind(ticket_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(into_decision).collect()
    }

    async fn record_feedback(&self, decision_id: i64, u: FeedbackUpdate) -> Result<Decision, StoreError> {
        let (overridden_by, override_reason, override_agent_id) = match u.override_info {
            Some(o) => (Some(o.overridden_by), o.reason, o.agent_id),
            None => (None, None, None),
        };
        let row = query_as::<_, DecisionRow>(&format!(
            r#"
            UPDATE public.decisions SET
              decision_type = $2,
              feedback_score = $3,
              feedback_comments = $4,
              feedback_accepted = $5,
              overridden_by = $6,
              override_reason = $7,
              override_agent_id = $8,
              feedback_at = $9
            WHERE decision_id = $1 AND feedback_at IS NULL
            RETURNING {DECISION_COLUMNS}
            "#
        ))
        .bind(decision_id)
        .bind(u.decision_type.as_str())
        .bind(u.feedback.score)
        .bind(u.feedback.comments)
        .bind(u.feedback.accepted)
        .bind(overridden_by)
        .bind(override_reason)
        .bind(override_agent_id)
        .bind(u.at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => into_decision(row),
            None => {
                let exists = query_scalar::<_, bool>(
                    r#"SELECT EXISTS(SELECT 1 FROM public.decisions WHERE decision_id = $1)"#,
                )
                .bind(decision_id)
                .fetch_one(&self.pool)
                .await?;
                if exists {
                    Err(StoreError::FeedbackAlreadyRecorded(decision_id))
                } else {
                    Err(StoreError::NotFound { entity: "decision", id: decision_id })
                }
            }
        }
    }

    async fn decision_stats(&self) -> Result<DecisionStats, StoreError> {
        let s = query_as::<_, StatsRow>(
            r#"
            SELECT
              COUNT(*) AS total,
              COUNT(*) FILTER (WHERE decision_type = 'AUTO_ASSIGNED') AS auto_assigned,
              COUNT(*) FILTER (WHERE decision_type = 'SUGGESTED') AS suggested,
              COUNT(*) FILTER (WHERE decision_type = 'MANUAL_OVERRIDE') AS manual_override,
              COUNT(*) FILTER (WHERE decision_type = 'REASSIGNED') AS reassigned,
              COUNT(feedback_score) AS with_feedback,
              (AVG(CASE WHEN feedback_accepted THEN 1.0 ELSE 0.0 END)
                 FILTER (WHERE feedback_accepted IS NOT NULL))::float8 AS accepted_rate,
              AVG(feedback_score)::float8 AS average_feedback_score
            FROM public.decisions
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let override_rate = (s.total > 0).then(|| s.manual_override as f64 / s.total as f64);
        Ok(DecisionStats {
            total: s.total,
            auto_assigned: s.auto_assigned,
            suggested: s.suggested,
            manual_override: s.manual_override,
            reassigned: s.reassigned,
            with_feedback: s.with_feedback,
            accepted_rate: s.accepted_rate,
            override_rate,
            average_feedback_score: s.average_feedback_score,
        })
    }
}
