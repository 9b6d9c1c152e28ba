// backend/src/assignment/result.rs

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::eligibility::FilterFlags;
use crate::engine::scoring::ScoringResult;
use crate::error::{AssignmentError, ErrorKind};
use crate::models::{AgentSummary, OverrideInfo};
use crate::ticketing::TicketPayload;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentRequest {
    /// Ticket data supplied by the caller (e.g. a webhook body). Fetched when absent.
    pub ticket: Option<TicketPayload>,
    /// Never auto-assign, even when enabled in settings.
    pub suggest_only: bool,
    pub flags: FilterFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentMode {
    AutoAssigned,
    Suggested,
    Failed,
}

/// Pipeline stages, in order. Used as a log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentStage {
    BuildContext,
    FilterEligible,
    Score,
    Threshold,
    Decide,
}

impl fmt::Display for AssignmentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AssignmentStage::BuildContext => "build_context",
            AssignmentStage::FilterEligible => "filter_eligible",
            AssignmentStage::Score => "score",
            AssignmentStage::Threshold => "threshold",
            AssignmentStage::Decide => "decide",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub success: bool,
    pub mode: AssignmentMode,
    pub ticket_id: i64,
    pub assigned_agent: Option<AgentSummary>,
    pub suggestions: Vec<ScoringResult>,
    pub confidence: Option<f64>,
    pub decision_id: Option<i64>,
    pub message: String,
    pub processing_time_ms: u64,
    pub metadata: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl AssignmentResult {
    /// Expected business outcome: nobody could take the ticket.
    pub fn failed(ticket_id: i64, message: impl Into<String>, elapsed: Duration, metadata: Value) -> Self {
        Self {
            success: false,
            mode: AssignmentMode::Failed,
            ticket_id,
            assigned_agent: None,
            suggestions: Vec::new(),
            confidence: None,
            decision_id: None,
            message: message.into(),
            processing_time_ms: elapsed.as_millis() as u64,
            metadata,
            error_kind: None,
        }
    }

    /// FAILED result for a system error, so transport callers always get a
    /// structured answer.
    pub fn from_error(ticket_id: i64, err: &AssignmentError, elapsed: Duration) -> Self {
        let mut result = Self::failed(ticket_id, err.to_string(), elapsed, Value::Null);
        result.decision_id = err.decision_id();
        result.error_kind = Some(err.kind());
        result
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackPayload {
    /// 1 (poor) to 5 (excellent).
    pub score: f64,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub accepted: Option<bool>,
    #[serde(default, rename = "override")]
    pub override_info: Option<OverrideInfo>,
}
