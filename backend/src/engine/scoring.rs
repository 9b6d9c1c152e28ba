// backend/src/engine/scoring.rs

//! Multi-factor fitness score for eligible agents.
//!
//! Every function here is pure over `(agent, context, weights)`; scoring a
//! batch never shares mutable state between agents.

use std::collections::HashSet;

use chrono::{DateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::engine::context::TicketContext;
use crate::engine::skills::{normalize, related, SkillSet};
use crate::engine::workload::round2;
use crate::models::{Agent, AgentLevel, AgentSummary};
use crate::settings::ScoringWeights;

/// Fraction of `max_concurrent_tickets` treated as a comfortable full load.
const LOAD_HEADROOM: f64 = 0.8;
const SKILL_BONUS_PER_SKILL: f64 = 0.05;
const SKILL_BONUS_CAP: f64 = 0.20;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub skill: f64,
    pub level: f64,
    pub load: f64,
    pub location: f64,
    pub vip: f64,
}

impl ScoreBreakdown {
    pub fn weighted_total(&self, w: &ScoringWeights) -> f64 {
        self.skill * w.skill
            + self.level * w.level
            + self.load * w.load
            + self.location * w.location
            + self.vip * w.vip
    }

    fn rounded(self) -> Self {
        Self {
            skill: round2(self.skill),
            level: round2(self.level),
            load: round2(self.load),
            location: round2(self.location),
            vip: round2(self.vip),
        }
    }
}

/// Informational restatement of eligibility; not a second filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityFlags {
    pub is_available: bool,
    pub has_capacity: bool,
    pub meets_location: bool,
    pub meets_level: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub agent: AgentSummary,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub eligibility: EligibilityFlags,
}

#[derive(Debug, Clone, Copy)]
pub struct ScoringEngine {
    weights: ScoringWeights,
}

impl ScoringEngine {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn score_agent(&self, agent: &Agent, ctx: &TicketContext) -> ScoringResult {
        let breakdown = ScoreBreakdown {
            skill: skill_score(&agent.skills, &ctx.required_skills),
            level: level_score(agent.level, ctx.required_level),
            load: load_score(agent.effective_load(), agent.max_concurrent_tickets),
            location: location_score(agent, ctx),
            vip: vip_score(agent, ctx.is_vip),
        };
        let total = breakdown.weighted_total(&self.weights).clamp(0.0, 1.0);

        ScoringResult {
            agent: agent.summary(),
            score: round2(total),
            breakdown: breakdown.rounded(),
            eligibility: EligibilityFlags {
                is_available: agent.is_effectively_available(),
                has_capacity: agent.effective_load() < agent.max_concurrent_tickets as f64,
                meets_location: breakdown.location >= 0.5,
                meets_level: ctx.required_level.map_or(true, |min| agent.level >= min),
            },
        }
    }

    /// Scores every candidate independently, best first. Equal scores keep
    /// their input order.
    pub fn score_multiple_agents(&self, agents: &[Agent], ctx: &TicketContext) -> Vec<ScoringResult> {
        let mut results: Vec<ScoringResult> = agents.iter().map(|a| self.score_agent(a, ctx)).collect();
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results
    }
}

/// Share of required skills covered, plus 0.05 for each further related skill
/// (capped at 0.20). No requirement means a perfect match.
///
/// Each covered requirement claims one agent skill (the exact name when held,
/// otherwise the first related one); claimed skills earn no bonus.
pub fn skill_score(skills: &SkillSet, required: &[String]) -> f64 {
    if required.is_empty() {
        return 1.0;
    }
    let required: Vec<String> = required.iter().map(|r| normalize(r)).collect();
    let claimed: HashSet<&str> = required
        .iter()
        .filter_map(|r| {
            skills
                .names()
                .find(|s| *s == r.as_str())
                .or_else(|| skills.names().find(|s| related(s, r)))
        })
        .collect();
    let matched = required.iter().filter(|r| skills.satisfies(r)).count();
    let base = matched as f64 / required.len() as f64;

    let extra = skills
        .names()
        .filter(|s| !claimed.contains(s))
        .filter(|s| !required.iter().any(|r| r.as_str() == *s))
        .filter(|s| required.iter().any(|r| related(s, r)))
        .count();
    let bonus = (extra as f64 * SKILL_BONUS_PER_SKILL).min(SKILL_BONUS_CAP);

    (base + bonus).min(1.0)
}

pub fn level_score(agent: AgentLevel, required: Option<AgentLevel>) -> f64 {
    let Some(required) = required else {
        return 1.0;
    };
    match (agent.rank() - required.rank()).abs() {
        0 => 1.0,
        1 => 0.8,
        2 => 0.5,
        _ => 0.2,
    }
}

/// Banded inverse of load relative to 80% of the agent's maximum.
pub fn load_score(load: f64, max_concurrent_tickets: i32) -> f64 {
    if max_concurrent_tickets <= 0 {
        return 0.0;
    }
    let ratio = load.max(0.0) / (max_concurrent_tickets as f64 * LOAD_HEADROOM);
    match ratio {
        r if r >= 1.2 => 0.0,
        r if r >= 1.0 => 0.1,
        r if r >= 0.85 => 0.2,
        r if r >= 0.7 => 0.4,
        r if r >= 0.5 => 0.6,
        r if r >= 0.3 => 0.8,
        r if r >= 0.15 => 0.9,
        _ => 1.0,
    }
}

pub fn location_score(agent: &Agent, ctx: &TicketContext) -> f64 {
    if !ctx.requires_onsite {
        return if agent.is_remote { 1.0 } else { 0.9 };
    }
    let Some(agent_location) = agent.location.as_ref() else {
        return 0.0;
    };
    if !agent_location.supports_onsite() {
        return 0.1;
    }
    let Some(ticket_location) = ctx.location.as_ref() else {
        return 0.3;
    };
    if agent_location.location_id == ticket_location.location_id {
        return 1.0;
    }
    match (agent_location.timezone.as_deref(), ticket_location.timezone.as_deref()) {
        (Some(a), Some(b)) if a.eq_ignore_ascii_case(b) => 0.7,
        (Some(a), Some(b)) => timezone_proximity(a, b, ctx.evaluated_at).unwrap_or(0.3),
        _ => 0.3,
    }
}

/// Maps the UTC-offset gap between two IANA zones onto [0.2, 0.5]; a 12h or
/// larger gap scores 0.2. `None` when either zone is unknown.
pub fn timezone_proximity(a: &str, b: &str, at: DateTime<Utc>) -> Option<f64> {
    let a: Tz = a.parse().ok()?;
    let b: Tz = b.parse().ok()?;
    let offset = |tz: Tz| tz.offset_from_utc_datetime(&at.naive_utc()).fix().local_minus_utc();
    let gap_hours = (offset(a) - offset(b)).abs() as f64 / 3600.0;
    Some(0.5 - 0.3 * (gap_hours / 12.0).min(1.0))
}

pub fn vip_score(agent: &Agent, is_vip: bool) -> f64 {
    if !is_vip {
        return 1.0;
    }
    let mut score: f64 = 0.5;

    match agent.satisfaction_score {
        Some(s) if s >= 4.5 => score += 0.2,
        Some(s) if s >= 4.0 => score += 0.1,
        _ => {}
    }
    if agent.total_assignments >= 100 {
        score += 0.2;
    } else if agent.total_assignments >= 50 {
        score += 0.1;
    }
    if matches!(agent.average_resolution_time, Some(h) if h > 0.0 && h <= 4.0) {
        score += 0.1;
    }
    score.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Location, Priority};

    fn agent(id: i64, skills: &[&str], level: AgentLevel) -> Agent {
        Agent {
            agent_id: id,
            name: format!("agent-{id}"),
            email: None,
            skills: skills.iter().collect::<SkillSet>(),
            level,
            is_available: true,
            manually_deactivated: false,
            location: None,
            is_remote: false,
            current_ticket_count: 0,
            weighted_ticket_count: None,
            max_concurrent_tickets: 10,
            total_assignments: 0,
            satisfaction_score: None,
            average_resolution_time: None,
            on_leave: false,
            category_ids: vec![],
        }
    }

    fn ctx(skills: &[&str], level: Option<AgentLevel>) -> TicketContext {
        TicketContext {
            ticket_id: 1,
            subject: "VPN".into(),
            description: String::new(),
            category_id: None,
            required_skills: skills.iter().map(|s| s.to_string()).collect(),
            required_level: level,
            average_resolution_time: None,
            requires_specialization: false,
            location: None,
            is_vip: false,
            priority: Priority::Medium,
            requires_onsite: false,
            current_responder_id: None,
            evaluated_at: Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap(),
        }
    }

    fn site(id: i64, tz: &str, onsite: bool) -> Location {
        Location {
            location_id: id,
            name: format!("site-{id}"),
            timezone: Some(tz.into()),
            support_types: if onsite { vec!["onsite".into()] } else { vec![] },
        }
    }

    #[test]
    fn empty_requirement_is_a_perfect_skill_match() {
        for skills in [&[][..], &["vpn"][..], &["excel", "sap"][..]] {
            let set: SkillSet = skills.iter().collect();
            assert_eq!(skill_score(&set, &[]), 1.0);
        }
    }

    #[test]
    fn skill_score_counts_matches_and_related_bonus() {
        let set: SkillSet = ["vpn", "vpn-client", "excel"].iter().collect();
        let required = vec!["vpn".to_string(), "database".to_string()];
        // 1/2 matched + one related extra skill
        assert!((skill_score(&set, &required) - 0.55).abs() < 1e-9);

        let plain: SkillSet = ["excel"].iter().collect();
        assert_eq!(skill_score(&plain, &required), 0.0);
    }

    #[test]
    fn matching_skill_earns_no_extra_bonus() {
        let set: SkillSet = ["networking"].iter().collect();
        let required = vec!["network".to_string(), "database".to_string()];
        assert_eq!(skill_score(&set, &required), 0.5);

        // a second related skill still counts as extra
        let set: SkillSet = ["network-admin", "networking"].iter().collect();
        assert!((skill_score(&set, &required) - 0.55).abs() < 1e-9);
    }

    #[test]
    fn skill_bonus_is_capped() {
        let set: SkillSet = ["db", "db-a", "db-b", "db-c", "db-d", "db-e", "db-f"].iter().collect();
        let required = vec!["db".to_string(), "network".to_string()];
        assert!((skill_score(&set, &required) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn level_score_by_distance() {
        assert_eq!(level_score(AgentLevel::L2, Some(AgentLevel::L2)), 1.0);
        assert_eq!(level_score(AgentLevel::L3, Some(AgentLevel::L2)), 0.8);
        assert_eq!(level_score(AgentLevel::L1, Some(AgentLevel::L3)), 0.5);
        assert_eq!(level_score(AgentLevel::Manager, Some(AgentLevel::L1)), 0.2);
        assert_eq!(level_score(AgentLevel::L1, None), 1.0);
    }

    #[test]
    fn load_score_bands() {
        // max 10 -> denominator 8
        assert_eq!(load_score(0.0, 10), 1.0);
        assert_eq!(load_score(1.6, 10), 0.9);
        assert_eq!(load_score(3.2, 10), 0.8);
        assert_eq!(load_score(4.4, 10), 0.6);
        assert_eq!(load_score(6.0, 10), 0.4);
        assert_eq!(load_score(7.2, 10), 0.2);
        assert_eq!(load_score(8.8, 10), 0.1);
        assert_eq!(load_score(10.4, 10), 0.0);
        assert_eq!(load_score(1.0, 0), 0.0);
    }

    #[test]
    fn load_score_is_non_increasing() {
        let mut previous = f64::MAX;
        for step in 0..200 {
            let s = load_score(step as f64 * 0.1, 6);
            assert!(s <= previous, "load score rose at {step}");
            previous = s;
        }
    }

    #[test]
    fn location_score_without_onsite() {
        let c = ctx(&[], None);
        let mut a = agent(1, &[], AgentLevel::L1);
        assert_eq!(location_score(&a, &c), 0.9);
        a.is_remote = true;
        assert_eq!(location_score(&a, &c), 1.0);
    }

    #[test]
    fn location_score_for_onsite_tickets() {
        let mut c = ctx(&[], None);
        c.requires_onsite = true;
        let mut a = agent(1, &[], AgentLevel::L1);
        assert_eq!(location_score(&a, &c), 0.0);

        a.location = Some(site(1, "Europe/Berlin", false));
        assert_eq!(location_score(&a, &c), 0.1);

        a.location = Some(site(1, "Europe/Berlin", true));
        assert_eq!(location_score(&a, &c), 0.3);

        c.location = Some(site(1, "Europe/Berlin", true));
        assert_eq!(location_score(&a, &c), 1.0);

        c.location = Some(site(2, "Europe/Berlin", true));
        assert_eq!(location_score(&a, &c), 0.7);

        // Berlin (UTC+1 in January) vs New York (UTC-5): 6h gap
        c.location = Some(site(3, "America/New_York", true));
        assert!((location_score(&a, &c) - 0.35).abs() < 1e-9);

        c.location = Some(site(4, "Mars/Olympus", true));
        assert_eq!(location_score(&a, &c), 0.3);
    }

    #[test]
    fn timezone_proximity_stays_in_range() {
        let at = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(timezone_proximity("Europe/Paris", "Europe/Berlin", at), Some(0.5));
        let far = timezone_proximity("Pacific/Kiritimati", "Pacific/Pago_Pago", at).unwrap();
        assert!((0.2..=0.5).contains(&far));
        assert_eq!(far, 0.2);
    }

    #[test]
    fn vip_score_rewards_track_record() {
        let mut a = agent(1, &[], AgentLevel::L3);
        assert_eq!(vip_score(&a, false), 1.0);
        assert_eq!(vip_score(&a, true), 0.5);

        a.satisfaction_score = Some(4.2);
        a.total_assignments = 60;
        assert!((vip_score(&a, true) - 0.7).abs() < 1e-9);

        a.satisfaction_score = Some(4.8);
        a.total_assignments = 150;
        a.average_resolution_time = Some(3.0);
        assert_eq!(vip_score(&a, true), 1.0);

        a.average_resolution_time = Some(0.0);
        assert!((vip_score(&a, true) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn composite_uses_default_weights_and_rounds() {
        let engine = ScoringEngine::new(ScoringWeights::default());
        let a = agent(1, &["vpn"], AgentLevel::L3);
        let r = engine.score_agent(&a, &ctx(&["vpn"], Some(AgentLevel::L2)));

        assert_eq!(r.breakdown, ScoreBreakdown { skill: 1.0, level: 0.8, load: 1.0, location: 0.9, vip: 1.0 });
        assert_eq!(r.score, 0.94);
        assert!(r.eligibility.meets_level);
        assert!(r.eligibility.has_capacity);
    }

    #[test]
    fn scores_are_bounded() {
        let engine = ScoringEngine::new(ScoringWeights::default());
        let mut c = ctx(&["vpn", "sql"], Some(AgentLevel::Manager));
        c.is_vip = true;
        c.requires_onsite = true;
        for load in [0, 3, 9, 40] {
            let mut a = agent(1, &["vpn"], AgentLevel::L1);
            a.current_ticket_count = load;
            let r = engine.score_agent(&a, &c);
            assert!((0.0..=1.0).contains(&r.score));
            for sub in [r.breakdown.skill, r.breakdown.level, r.breakdown.load, r.breakdown.location, r.breakdown.vip] {
                assert!((0.0..=1.0).contains(&sub));
            }
        }
    }

    #[test]
    fn scoring_is_idempotent() {
        let engine = ScoringEngine::new(ScoringWeights::default());
        let agents = vec![agent(1, &["vpn"], AgentLevel::L2), agent(2, &["sql"], AgentLevel::L1)];
        let c = ctx(&["vpn"], Some(AgentLevel::L2));
        assert_eq!(engine.score_multiple_agents(&agents, &c), engine.score_multiple_agents(&agents, &c));
    }

    #[test]
    fn lightly_loaded_senior_outranks_busy_exact_level_agent() {
        let engine = ScoringEngine::new(ScoringWeights::default());
        let mut busy_l2 = agent(2, &["vpn"], AgentLevel::L2);
        busy_l2.current_ticket_count = 8;
        let mut light_l3 = agent(3, &["vpn"], AgentLevel::L3);
        light_l3.current_ticket_count = 2;

        let ranked = engine.score_multiple_agents(&[busy_l2, light_l3], &ctx(&["vpn"], Some(AgentLevel::L2)));
        assert_eq!(ranked[0].agent.agent_id, 3);
        assert!(ranked[0].breakdown.level < ranked[1].breakdown.level);
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn ties_keep_input_order() {
        let engine = ScoringEngine::new(ScoringWeights::default());
        let agents: Vec<_> = (1..=4).map(|id| agent(id, &["vpn"], AgentLevel::L2)).collect();
        let ranked = engine.score_multiple_agents(&agents, &ctx(&["vpn"], Some(AgentLevel::L2)));
        let ids: Vec<_> = ranked.iter().map(|r| r.agent.agent_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }
}
