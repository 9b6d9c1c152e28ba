// backend/src/assignment/mod.rs

//! Assignment orchestration: context → eligibility → scoring → threshold →
//! decision, plus the feedback loop and workload recalculation.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

use crate::engine::{
    filter_eligible, EligibilityResult, FilterConfig, ScoringEngine, ScoringResult, TicketContext,
    WorkloadCalculator, WorkloadSummary,
};
use crate::engine::workload::OpenTicket;
use crate::error::AssignmentError;
use crate::models::{
    Agent, AlternativeCandidate, Decision, DecisionStats, DecisionType, ExternalSync, Feedback, NewDecision,
};
use crate::settings::EngineSettings;
use crate::store::{AgentPatch, AssignmentStore, FeedbackUpdate};
use crate::ticketing::{TicketPayload, TicketingApi};

pub mod explain;
pub mod result;

pub use explain::{assignment_note, assignment_reason, confidence};
pub use result::{AssignmentMode, AssignmentRequest, AssignmentResult, AssignmentStage, FeedbackPayload};

pub const NO_ELIGIBLE_AGENTS: &str = "No eligible agents found";
pub const BELOW_THRESHOLD: &str = "No agents met the minimum score threshold";

const FEEDBACK_MIN: f64 = 1.0;
const FEEDBACK_MAX: f64 = 5.0;

#[derive(Clone)]
pub struct AssignmentService {
    store: Arc<dyn AssignmentStore>,
    ticketing: Arc<dyn TicketingApi>,
}

/// Everything the decide stage needs from the earlier stages.
struct Ranked {
    ctx: TicketContext,
    eligibility: EligibilityResult,
    top: Vec<ScoringResult>,
    confidence: f64,
}

impl AssignmentService {
    pub fn new(store: Arc<dyn AssignmentStore>, ticketing: Arc<dyn TicketingApi>) -> Self {
        Self { store, ticketing }
    }

    /// Runs one assignment attempt for `ticket_id`.
    ///
    /// Business no-match outcomes are `Ok` with `success == false`; `Err` is
    /// reserved for system failures.
    #[instrument(skip(self, req), fields(suggest_only = req.suggest_only))]
    pub async fn assign(&self, ticket_id: i64, req: AssignmentRequest) -> Result<AssignmentResult, AssignmentError> {
        let started = Instant::now();
        let settings = self.store.load_settings().await?;

        debug!(stage = %AssignmentStage::BuildContext, "building ticket context");
        let ctx = self.build_context(ticket_id, req.ticket).await?;

        debug!(stage = %AssignmentStage::FilterEligible, "filtering agent pool");
        let agents = self.store.list_agents().await?;
        let eligibility = filter_eligible(&agents, FilterConfig::new(&ctx, &settings, &req.flags));
        if eligibility.candidates.is_empty() {
            info!(total = eligibility.total_agents, "no eligible agents");
            return Ok(AssignmentResult::failed(
                ticket_id,
                NO_ELIGIBLE_AGENTS,
                started.elapsed(),
                json!({ "eligibility": eligibility.diagnostics() }),
            ));
        }

        debug!(stage = %AssignmentStage::Score, candidates = eligibility.candidates.len(), "scoring candidates");
        let engine = ScoringEngine::new(settings.scoring_weights);
        let scored = engine.score_multiple_agents(&eligibility.candidates, &ctx);
        let best_score = scored.first().map(|r| r.score);

        debug!(stage = %AssignmentStage::Threshold, threshold = settings.min_score_threshold, "applying score threshold");
        let passing: Vec<ScoringResult> = scored
            .into_iter()
            .filter(|r| r.score >= settings.min_score_threshold)
            .collect();
        if passing.is_empty() {
            info!(?best_score, "no candidate met the threshold");
            return Ok(AssignmentResult::failed(
                ticket_id,
                BELOW_THRESHOLD,
                started.elapsed(),
                json!({
                    "eligibility": eligibility.diagnostics(),
                    "best_score": best_score,
                    "min_score_threshold": settings.min_score_threshold,
                }),
            ));
        }

        debug!(stage = %AssignmentStage::Decide, passing = passing.len(), "deciding");
        let confidence = confidence(passing[0].score, passing.get(1).map(|r| r.score));
        let top: Vec<ScoringResult> = passing.into_iter().take(settings.max_suggestions_count).collect();
        let ranked = Ranked { ctx, eligibility, top, confidence };

        // Dry runs never touch the ticketing system or the load counters.
        let live = settings.auto_assign_enabled && !req.suggest_only && !req.flags.test_scenario;
        if settings.auto_assign_enabled && req.flags.test_scenario {
            info!(ticket_id, "test scenario, returning suggestions instead of assigning");
        }
        let mut result = if live {
            self.auto_assign(ranked, &settings).await?
        } else {
            self.suggest(ranked, &settings).await?
        };
        result.processing_time_ms = started.elapsed().as_millis() as u64;
        Ok(result)
    }

    async fn build_context(&self, ticket_id: i64, supplied: Option<TicketPayload>) -> Result<TicketContext, AssignmentError> {
        let mut ticket = match supplied {
            Some(t) => t,
            None => match self.ticketing.fetch_ticket(ticket_id).await {
                Ok(t) => t,
                Err(e) => {
                    warn!(ticket_id, error = %e, "ticket fetch failed, continuing with stub");
                    TicketPayload::stub(ticket_id)
                }
            },
        };
        ticket.id = ticket_id;

        let category = match ticket.category_id {
            Some(id) => self.store.get_category(id).await?,
            None => None,
        };
        let location = match ticket.requester_location_id() {
            Some(id) => self.store.get_location(id).await?,
            None => None,
        };
        Ok(TicketContext::build(&ticket, category.as_ref(), location, Utc::now()))
    }

    async fn suggest(&self, ranked: Ranked, settings: &EngineSettings) -> Result<AssignmentResult, AssignmentError> {
        let Ranked { ctx, eligibility, top, confidence } = ranked;
        let decision = self
            .store
            .insert_decision(new_decision(&ctx, &top, DecisionType::Suggested, confidence, ExternalSync::NotAttempted, None))
            .await?;

        info!(
            ticket_id = ctx.ticket_id,
            decision_id = decision.decision_id,
            suggestions = top.len(),
            confidence,
            "suggestions recorded"
        );
        Ok(AssignmentResult {
            success: true,
            mode: AssignmentMode::Suggested,
            ticket_id: ctx.ticket_id,
            assigned_agent: None,
            message: format!("Found {} suggested agent(s)", top.len()),
            suggestions: top,
            confidence: Some(confidence),
            decision_id: Some(decision.decision_id),
            processing_time_ms: 0,
            metadata: decide_metadata(&eligibility, settings),
            error_kind: None,
        })
    }

    async fn auto_assign(&self, ranked: Ranked, settings: &EngineSettings) -> Result<AssignmentResult, AssignmentError> {
        let Ranked { ctx, eligibility, top, confidence } = ranked;
        let winner = &top[0];
        let agent_id = winner.agent.agent_id;
        let decision_type = match ctx.current_responder_id {
            Some(previous) if previous != agent_id => DecisionType::Reassigned,
            _ => DecisionType::AutoAssigned,
        };

        if let Err(e) = self.ticketing.assign_ticket(ctx.ticket_id, agent_id).await {
            warn!(ticket_id = ctx.ticket_id, agent_id, error = %e, "external assignment failed");
            let failed = new_decision(&ctx, &top, decision_type, confidence, ExternalSync::Failed, Some(e.to_string()));
            let decision_id = match self.store.insert_decision(failed).await {
                Ok(d) => Some(d.decision_id),
                Err(store_err) => {
                    error!(ticket_id = ctx.ticket_id, error = %store_err, "could not record failed assignment");
                    None
                }
            };
            return Err(AssignmentError::ExternalAssignment { decision_id, source: e });
        }

        let decision = self
            .store
            .insert_decision(new_decision(&ctx, &top, decision_type, confidence, ExternalSync::Confirmed, None))
            .await?;

        // The ticket is already assigned upstream; a failed counter update only
        // leaves the load stale until the next recalculation.
        let new_load = match self
            .store
            .increment_agent_load(agent_id, settings.ticket_age_weights.fresh)
            .await {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(agent_id, error = %e, "load increment failed");
                None
            }
        };

        let note = assignment_note(winner, &top[1..], confidence);
        if let Err(e) = self.ticketing.add_note(ctx.ticket_id, &note).await {
            warn!(ticket_id = ctx.ticket_id, error = %e, "assignment note not posted");
        }

        info!(
            ticket_id = ctx.ticket_id,
            agent_id,
            decision_id = decision.decision_id,
            score = winner.score,
            confidence,
            decision_type = decision_type.as_str(),
            "ticket auto-assigned"
        );

        let mut metadata = decide_metadata(&eligibility, settings);
        metadata["new_load"] = json!(new_load);
        metadata["decision_type"] = json!(decision_type);
        let assigned = winner.agent.clone();
        Ok(AssignmentResult {
            success: true,
            mode: AssignmentMode::AutoAssigned,
            ticket_id: ctx.ticket_id,
            message: format!("Assigned to {}", assigned.name),
            assigned_agent: Some(assigned),
            suggestions: top,
            confidence: Some(confidence),
            decision_id: Some(decision.decision_id),
            processing_time_ms: 0,
            metadata,
            error_kind: None,
        })
    }

    /// Records the one allowed feedback event on a decision. An override flips
    /// the decision to MANUAL_OVERRIDE.
    #[instrument(skip(self, payload))]
    pub async fn record_feedback(&self, decision_id: i64, payload: FeedbackPayload) -> Result<Decision, AssignmentError> {
        if !payload.score.is_finite() || !(FEEDBACK_MIN..=FEEDBACK_MAX).contains(&payload.score) {
            return Err(AssignmentError::InvalidInput(format!(
                "score {} is outside [{FEEDBACK_MIN}, {FEEDBACK_MAX}]",
                payload.score
            )));
        }
        if let Some(o) = &payload.override_info {
            if o.overridden_by.trim().is_empty() {
                return Err(AssignmentError::InvalidInput("override requires overridden_by".into()));
            }
        }

        let current = self.store.get_decision(decision_id).await?;
        let decision_type = if payload.override_info.is_some() {
            DecisionType::ManualOverride
        } else {
            current.decision_type
        };
        let update = FeedbackUpdate {
            feedback: Feedback {
                score: payload.score,
                comments: payload.comments,
                accepted: payload.accepted,
            },
            override_info: payload.override_info,
            decision_type,
            at: Utc::now(),
        };

        let decision = self.store.record_feedback(decision_id, update).await?;
        info!(decision_id, decision_type = decision.decision_type.as_str(), "feedback recorded");
        Ok(decision)
    }

    /// Recomputes an agent's weighted load from their open tickets (fetched
    /// from the ticketing system unless supplied) and stores it.
    #[instrument(skip(self, tickets))]
    pub async fn recalculate_workload(
        &self,
        agent_id: i64,
        tickets: Option<Vec<OpenTicket>>,
    ) -> Result<WorkloadSummary, AssignmentError> {
        let settings = self.store.load_settings().await?;
        self.store.get_agent(agent_id).await?;

        let tickets = match tickets {
            Some(t) => t,
            None => self.ticketing.list_open_tickets(agent_id).await?,
        };
        let summary = WorkloadCalculator::new(settings.ticket_age_weights).calculate(agent_id, &tickets, Utc::now());

        let raw = i32::try_from(summary.raw_count).unwrap_or(i32::MAX);
        self.store.set_agent_workload(agent_id, raw, summary.weighted_count).await?;
        debug!(agent_id, raw, weighted = summary.weighted_count, "workload updated");
        Ok(summary)
    }

    pub async fn decision_stats(&self) -> Result<DecisionStats, AssignmentError> {
        Ok(self.store.decision_stats().await?)
    }

    pub async fn get_decision(&self, decision_id: i64) -> Result<Decision, AssignmentError> {
        Ok(self.store.get_decision(decision_id).await?)
    }

    pub async fn list_decisions(&self, ticket_id: Option<i64>, limit: i64) -> Result<Vec<Decision>, AssignmentError> {
        Ok(self.store.list_decisions(ticket_id, limit).await?)
    }

    pub async fn list_agents(&self) -> Result<Vec<Agent>, AssignmentError> {
        Ok(self.store.list_agents().await?)
    }

    pub async fn update_agent(&self, agent_id: i64, patch: AgentPatch) -> Result<Agent, AssignmentError> {
        if patch.max_concurrent_tickets.is_some_and(|m| m < 0) {
            return Err(AssignmentError::InvalidInput("max_concurrent_tickets must be non-negative".into()));
        }
        Ok(self.store.update_agent(agent_id, patch).await?)
    }

    pub async fn settings(&self) -> Result<EngineSettings, AssignmentError> {
        Ok(self.store.load_settings().await?)
    }

    pub async fn update_settings(&self, settings: EngineSettings) -> Result<EngineSettings, AssignmentError> {
        settings.validate()?;
        self.store.save_settings(&settings).await?;
        info!(auto_assign = settings.auto_assign_enabled, "assignment settings updated");
        Ok(settings)
    }
}

fn new_decision(
    ctx: &TicketContext,
    top: &[ScoringResult],
    decision_type: DecisionType,
    confidence: f64,
    external_sync: ExternalSync,
    external_error: Option<String>,
) -> NewDecision {
    let winner = top.first();
    NewDecision {
        ticket_id: ctx.ticket_id,
        ticket_subject: ctx.subject.clone(),
        agent_id: winner.map(|w| w.agent.agent_id),
        decision_type,
        score: winner.map(|w| w.score),
        confidence: Some(confidence),
        breakdown: winner.map(|w| w.breakdown),
        alternatives: top
            .iter()
            .skip(1)
            .map(|r| AlternativeCandidate {
                agent_id: r.agent.agent_id,
                name: r.agent.name.clone(),
                score: r.score,
            })
            .collect(),
        external_sync,
        external_error,
    }
}

fn decide_metadata(eligibility: &EligibilityResult, settings: &EngineSettings) -> serde_json::Value {
    json!({
        "eligibility": eligibility.diagnostics(),
        "auto_assign_enabled": settings.auto_assign_enabled,
        "min_score_threshold": settings.min_score_threshold,
        "max_suggestions_count": settings.max_suggestions_count,
    })
}
