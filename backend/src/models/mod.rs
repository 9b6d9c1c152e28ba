// backend/src/models/mod.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::engine::scoring::ScoreBreakdown;
use crate::engine::skills::SkillSet;

// ───────────────────────────────────────
// Levels & priorities
// ───────────────────────────────────────

/// Agent experience level, ordered L1 < L2 < L3 < MANAGER.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentLevel {
    L1,
    L2,
    L3,
    Manager,
}

impl AgentLevel {
    /// Position on the 4-point ordinal scale (1..=4).
    pub fn rank(self) -> i32 {
        match self {
            AgentLevel::L1 => 1,
            AgentLevel::L2 => 2,
            AgentLevel::L3 => 3,
            AgentLevel::Manager => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgentLevel::L1 => "L1",
            AgentLevel::L2 => "L2",
            AgentLevel::L3 => "L3",
            AgentLevel::Manager => "MANAGER",
        }
    }
}

impl fmt::Display for AgentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L1" => Ok(AgentLevel::L1),
            "L2" => Ok(AgentLevel::L2),
            "L3" => Ok(AgentLevel::L3),
            "MANAGER" => Ok(AgentLevel::Manager),
            other => Err(format!("unknown agent level '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Maps the ticketing system's 1..=4 scale; anything out of range is clamped.
    pub fn from_level(level: i32) -> Self {
        match level {
            i32::MIN..=1 => Priority::Low,
            2 => Priority::Medium,
            3 => Priority::High,
            _ => Priority::Urgent,
        }
    }
}

// ───────────────────────────────────────
// Reference data: locations & categories
// ───────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Location {
    pub location_id: i64,
    pub name: String,
    pub timezone: Option<String>,
    pub support_types: Vec<String>, // text[]
}

impl Location {
    pub fn supports_onsite(&self) -> bool {
        self.support_types
            .iter()
            .any(|t| t.trim().eq_ignore_ascii_case("onsite"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub category_id: i64,
    pub name: String,
    pub required_skills: Vec<String>,           // text[]
    pub priority_level: Option<String>,         // L1 | L2 | L3 | MANAGER
    pub average_resolution_time: Option<f64>,  // hours
    pub requires_onsite: bool,
    pub requires_specialization: bool,
}

impl Category {
    pub fn required_level(&self) -> Option<AgentLevel> {
        self.priority_level.as_deref().and_then(|s| s.parse().ok())
    }
}

// ───────────────────────────────────────
// Agents
// ───────────────────────────────────────

/// Agent row as synced from the ticketing system.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AgentRow {
    pub agent_id: i64,
    pub name: String,
    pub email: Option<String>,
    pub skills: Vec<String>,               // text[]
    pub category_skills: Vec<String>,      // text[]
    pub auto_detected_skills: Vec<String>, // text[]
    pub metadata: Json<serde_json::Value>, // jsonb
    pub level: String,
    pub is_available: bool,
    pub manually_deactivated: bool,
    pub location_id: Option<i64>,
    pub is_remote: bool,
    pub current_ticket_count: i32,
    pub weighted_ticket_count: Option<f64>,
    pub max_concurrent_tickets: i32,
    pub total_assignments: i32,
    pub satisfaction_score: Option<f64>,
    pub average_resolution_time: Option<f64>,
    pub on_leave: bool,
    pub category_ids: Vec<i64>, // bigint[]
}

/// Agent as seen by the engine: skills normalized once, location resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: i64,
    pub name: String,
    pub email: Option<String>,
    pub skills: SkillSet,
    pub level: AgentLevel,
    pub is_available: bool,
    pub manually_deactivated: bool,
    pub location: Option<Location>,
    pub is_remote: bool,
    pub current_ticket_count: i32,
    pub weighted_ticket_count: Option<f64>,
    pub max_concurrent_tickets: i32,
    pub total_assignments: i32,
    pub satisfaction_score: Option<f64>,
    pub average_resolution_time: Option<f64>,
    pub on_leave: bool,
    pub category_ids: Vec<i64>,
}

impl Agent {
    pub fn from_row(row: AgentRow, location: Option<Location>) -> Result<Self, String> {
        let level: AgentLevel = row.level.parse()?;
        let skills = SkillSet::from_sources(
            &row.skills,
            &row.category_skills,
            &row.auto_detected_skills,
            &row.metadata.0,
        );
        Ok(Self {
            agent_id: row.agent_id,
            name: row.name,
            email: row.email,
            skills,
            level,
            is_available: row.is_available,
            manually_deactivated: row.manually_deactivated,
            location,
            is_remote: row.is_remote,
            current_ticket_count: row.current_ticket_count,
            weighted_ticket_count: row.weighted_ticket_count,
            max_concurrent_tickets: row.max_concurrent_tickets,
            total_assignments: row.total_assignments,
            satisfaction_score: row.satisfaction_score,
            average_resolution_time: row.average_resolution_time,
            on_leave: row.on_leave,
            category_ids: row.category_ids,
        })
    }

    /// Manual deactivation always wins over the synced availability flag.
    pub fn is_effectively_available(&self) -> bool {
        self.is_available && !self.manually_deactivated
    }

    /// Weighted count when the sync has produced one, raw count otherwise.
    pub fn effective_load(&self) -> f64 {
        self.weighted_ticket_count
            .unwrap_or(self.current_ticket_count as f64)
    }

    pub fn location_id(&self) -> Option<i64> {
        self.location.as_ref().map(|l| l.location_id)
    }

    pub fn summary(&self) -> AgentSummary {
        AgentSummary {
            agent_id: self.agent_id,
            name: self.name.clone(),
            email: self.email.clone(),
            level: self.level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub agent_id: i64,
    pub name: String,
    pub email: Option<String>,
    pub level: AgentLevel,
}

// ───────────────────────────────────────
// Decisions
// ───────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionType {
    AutoAssigned,
    Suggested,
    ManualOverride,
    Reassigned,
}

impl DecisionType {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionType::AutoAssigned => "AUTO_ASSIGNED",
            DecisionType::Suggested => "SUGGESTED",
            DecisionType::ManualOverride => "MANUAL_OVERRIDE",
            DecisionType::Reassigned => "REASSIGNED",
        }
    }
}

impl FromStr for DecisionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AUTO_ASSIGNED" => Ok(DecisionType::AutoAssigned),
            "SUGGESTED" => Ok(DecisionType::Suggested),
            "MANUAL_OVERRIDE" => Ok(DecisionType::ManualOverride),
            "REASSIGNED" => Ok(DecisionType::Reassigned),
            other => Err(format!("unknown decision type '{other}'")),
        }
    }
}

/// Whether the ticketing system acknowledged the assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalSync {
    NotAttempted,
    Confirmed,
    Failed,
}

impl ExternalSync {
    pub fn as_str(self) -> &'static str {
        match self {
            ExternalSync::NotAttempted => "not_attempted",
            ExternalSync::Confirmed => "confirmed",
            ExternalSync::Failed => "failed",
        }
    }
}

impl FromStr for ExternalSync {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_attempted" => Ok(ExternalSync::NotAttempted),
            "confirmed" => Ok(ExternalSync::Confirmed),
            "failed" => Ok(ExternalSync::Failed),
            other => Err(format!("unknown external sync status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeCandidate {
    pub agent_id: i64,
    pub name: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideInfo {
    pub overridden_by: String,
    pub reason: Option<String>,
    pub agent_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub score: f64,
    pub comments: Option<String>,
    pub accepted: Option<bool>,
}

/// Everything needed to write a new decision; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDecision {
    pub ticket_id: i64,
    pub ticket_subject: String,
    pub agent_id: Option<i64>,
    pub decision_type: DecisionType,
    pub score: Option<f64>,
    pub confidence: Option<f64>,
    pub breakdown: Option<ScoreBreakdown>,
    pub alternatives: Vec<AlternativeCandidate>,
    pub external_sync: ExternalSync,
    pub external_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decision_id: i64,
    pub ticket_id: i64,
    pub ticket_subject: String,
    pub agent_id: Option<i64>,
    pub decision_type: DecisionType,
    pub score: Option<f64>,
    pub confidence: Option<f64>,
    pub breakdown: Option<ScoreBreakdown>,
    pub alternatives: Vec<AlternativeCandidate>,
    pub external_sync: ExternalSync,
    pub external_error: Option<String>,
    pub override_info: Option<OverrideInfo>,
    pub feedback: Option<Feedback>,
    pub created_at: DateTime<Utc>,
    pub feedback_at: Option<DateTime<Utc>>,
}

impl Decision {
    pub fn from_new(decision_id: i64, new: NewDecision, created_at: DateTime<Utc>) -> Self {
        Self {
            decision_id,
            ticket_id: new.ticket_id,
            ticket_subject: new.ticket_subject,
            agent_id: new.agent_id,
            decision_type: new.decision_type,
            score: new.score,
            confidence: new.confidence,
            breakdown: new.breakdown,
            alternatives: new.alternatives,
            external_sync: new.external_sync,
            external_error: new.external_error,
            override_info: None,
            feedback: None,
            created_at,
            feedback_at: None,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct DecisionRow {
    pub decision_id: i64,
    pub ticket_id: i64,
    pub ticket_subject: String,
    pub agent_id: Option<i64>,
    pub decision_type: String,
    pub score: Option<f64>,
    pub confidence: Option<f64>,
    pub breakdown: Option<Json<ScoreBreakdown>>,
    pub alternatives: Json<Vec<AlternativeCandidate>>,
    pub external_sync: String,
    pub external_error: Option<String>,
    pub overridden_by: Option<String>,
    pub override_reason: Option<String>,
    pub override_agent_id: Option<i64>,
    pub feedback_score: Option<f64>,
    pub feedback_comments: Option<String>,
    pub feedback_accepted: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub feedback_at: Option<DateTime<Utc>>,
}

impl TryFrom<DecisionRow> for Decision {
    type Error = String;

    fn try_from(r: DecisionRow) -> Result<Self, Self::Error> {
        let override_info = r.overridden_by.map(|by| OverrideInfo {
            overridden_by: by,
            reason: r.override_reason,
            agent_id: r.override_agent_id,
        });
        let feedback = r.feedback_score.map(|score| Feedback {
            score,
            comments: r.feedback_comments,
            accepted: r.feedback_accepted,
        });
        Ok(Decision {
            decision_id: r.decision_id,
            ticket_id: r.ticket_id,
            ticket_subject: r.ticket_subject,
            agent_id: r.agent_id,
            decision_type: r.decision_type.parse()?,
            score: r.score,
            confidence: r.confidence,
            breakdown: r.breakdown.map(|b| b.0),
            alternatives: r.alternatives.0,
            external_sync: r.external_sync.parse()?,
            external_error: r.external_error,
            override_info,
            feedback,
            created_at: r.created_at,
            feedback_at: r.feedback_at,
        })
    }
}

// ───────────────────────────────────────
// DTOs helpful for endpoints
// ───────────────────────────────────────
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionStats {
    pub total: i64,
    pub auto_assigned: i64,
    pub suggested: i64,
    pub manual_override: i64,
    pub reassigned: i64,
    pub with_feedback: i64,
    pub accepted_rate: Option<f64>,
    pub override_rate: Option<f64>,
    pub average_feedback_score: Option<f64>,
}

impl DecisionStats {
    pub fn from_decisions<'a>(decisions: impl IntoIterator<Item = &'a Decision>) -> Self {
        let mut stats = DecisionStats::default();
        let mut accepted = 0i64;
        let mut answered = 0i64;
        let mut score_sum = 0.0;

        for d in decisions {
            stats.total += 1;
            match d.decision_type {
                DecisionType::AutoAssigned => stats.auto_assigned += 1,
                DecisionType::Suggested => stats.suggested += 1,
                DecisionType::ManualOverride => stats.manual_override += 1,
                DecisionType::Reassigned => stats.reassigned += 1,
            }
            if let Some(fb) = &d.feedback {
                stats.with_feedback += 1;
                score_sum += fb.score;
                if let Some(a) = fb.accepted {
                    answered += 1;
                    if a {
                        accepted += 1;
                    }
                }
            }
        }

        if answered > 0 {
            stats.accepted_rate = Some(accepted as f64 / answered as f64);
        }
        if stats.total > 0 {
            stats.override_rate = Some(stats.manual_override as f64 / stats.total as f64);
        }
        if stats.with_feedback > 0 {
            stats.average_feedback_score = Some(score_sum / stats.with_feedback as f64);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_order_follows_seniority() {
        assert!(AgentLevel::L1 < AgentLevel::L2);
        assert!(AgentLevel::L3 < AgentLevel::Manager);
        assert_eq!("manager".parse::<AgentLevel>(), Ok(AgentLevel::Manager));
        assert!("L9".parse::<AgentLevel>().is_err());
    }

    #[test]
    fn priority_clamps_out_of_range_levels() {
        assert_eq!(Priority::from_level(0), Priority::Low);
        assert_eq!(Priority::from_level(2), Priority::Medium);
        assert_eq!(Priority::from_level(7), Priority::Urgent);
    }

    #[test]
    fn decision_type_serializes_screaming_case() {
        let json = serde_json::to_string(&DecisionType::ManualOverride).unwrap();
        assert_eq!(json, "\"MANUAL_OVERRIDE\"");
        assert_eq!("REASSIGNED".parse::<DecisionType>(), Ok(DecisionType::Reassigned));
    }
}
