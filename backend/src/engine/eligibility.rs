// backend/src/engine/eligibility.rs

//! Structural filter: which agents may receive a ticket at all.
//!
//! Predicates run in a fixed order and the first one that fails names the
//! exclusion reason, so each excluded agent is counted exactly once.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::engine::context::TicketContext;
use crate::models::{Agent, AgentLevel, Location};
use crate::settings::{EngineSettings, LocationPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    Status,
    Capacity,
    Skills,
    Level,
    Pto,
    Location,
    Specialization,
}

/// Per-attempt operational flags supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterFlags {
    /// Dry-run mode: skips the status and specialization checks and always
    /// returns suggestions, even when auto-assign is enabled.
    #[serde(default)]
    pub test_scenario: bool,
    /// Agents on leave according to the PTO sync.
    #[serde(default)]
    pub pto_agent_ids: BTreeSet<i64>,
}

/// The filter configuration actually applied, kept for audit/debug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub required_skills: Vec<String>,
    pub min_level: Option<AgentLevel>,
    pub location: Option<Location>,
    pub requires_onsite: bool,
    pub specialization_category: Option<i64>,
    pub capacity_limit: f64,
    pub max_load_percentage: f64,
    pub location_policy: LocationPolicy,
    pub match_timezone: bool,
    pub allow_remote_for_onsite: bool,
    pub check_pto: bool,
    pub test_scenario: bool,
    pub pto_agent_ids: BTreeSet<i64>,
}

impl FilterConfig {
    pub fn new(ctx: &TicketContext, settings: &EngineSettings, flags: &FilterFlags) -> Self {
        let specialization_category = if ctx.requires_specialization { ctx.category_id } else { None };
        Self {
            required_skills: ctx.required_skills.clone(),
            min_level: ctx.required_level,
            location: ctx.location.clone(),
            requires_onsite: ctx.requires_onsite,
            specialization_category,
            capacity_limit: settings.workload.capacity_limit,
            max_load_percentage: settings.workload.max_load_percentage,
            location_policy: settings.location_matching.policy,
            match_timezone: settings.location_matching.match_timezone,
            allow_remote_for_onsite: settings.location_matching.allow_remote_for_onsite,
            check_pto: settings.check_pto,
            test_scenario: flags.test_scenario,
            pto_agent_ids: flags.pto_agent_ids.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub candidates: Vec<Agent>,
    pub total_agents: usize,
    pub excluded_count: usize,
    pub exclusion_reasons: BTreeMap<ExclusionReason, usize>,
    pub applied: FilterConfig,
}

impl EligibilityResult {
    /// Diagnostics without the candidate list, for logs and failed results.
    pub fn diagnostics(&self) -> serde_json::Value {
        serde_json::json!({
            "total_agents": self.total_agents,
            "eligible": self.candidates.len(),
            "excluded": self.excluded_count,
            "exclusion_reasons": self.exclusion_reasons,
            "filters": self.applied,
        })
    }
}

pub fn filter_eligible(agents: &[Agent], config: FilterConfig) -> EligibilityResult {
    let mut candidates = Vec::new();
    let mut reasons: BTreeMap<ExclusionReason, usize> = BTreeMap::new();

    for agent in agents {
        match check_agent(agent, &config) {
            Ok(()) => candidates.push(agent.clone()),
            Err(reason) => *reasons.entry(reason).or_default() += 1,
        }
    }

    EligibilityResult {
        total_agents: agents.len(),
        excluded_count: agents.len() - candidates.len(),
        candidates,
        exclusion_reasons: reasons,
        applied: config,
    }
}

pub fn check_agent(agent: &Agent, cfg: &FilterConfig) -> Result<(), ExclusionReason> {
    if !cfg.test_scenario && !agent.is_effectively_available() {
        return Err(ExclusionReason::Status);
    }
    if !has_capacity(agent, cfg) {
        return Err(ExclusionReason::Capacity);
    }
    if !cfg.required_skills.is_empty() && !agent.skills.satisfies_any(&cfg.required_skills) {
        return Err(ExclusionReason::Skills);
    }
    if let Some(min) = cfg.min_level {
        if agent.level < min {
            return Err(ExclusionReason::Level);
        }
    }
    if cfg.check_pto && (agent.on_leave || cfg.pto_agent_ids.contains(&agent.agent_id)) {
        return Err(ExclusionReason::Pto);
    }
    if !meets_location(agent, cfg) {
        return Err(ExclusionReason::Location);
    }
    if !cfg.test_scenario {
        if let Some(category_id) = cfg.specialization_category {
            if !agent.category_ids.contains(&category_id) {
                return Err(ExclusionReason::Specialization);
            }
        }
    }
    Ok(())
}

/// Load must stay below the global ceiling and, when the agent declares a
/// maximum, below `max_load_percentage` of it.
pub fn has_capacity(agent: &Agent, cfg: &FilterConfig) -> bool {
    let mut limit = cfg.capacity_limit;
    if agent.max_concurrent_tickets > 0 {
        limit = limit.min(cfg.max_load_percentage * agent.max_concurrent_tickets as f64);
    }
    agent.effective_load() < limit
}

fn meets_location(agent: &Agent, cfg: &FilterConfig) -> bool {
    if cfg.location_policy == LocationPolicy::Disabled {
        return true;
    }

    if cfg.requires_onsite && !cfg.allow_remote_for_onsite {
        if agent.is_remote {
            return false;
        }
        if !agent.location.as_ref().is_some_and(Location::supports_onsite) {
            return false;
        }
    }

    // Nothing to match against.
    let Some(ticket_location) = cfg.location.as_ref() else {
        return true;
    };
    let same_location = agent.location_id() == Some(ticket_location.location_id);

    match cfg.location_policy {
        LocationPolicy::Disabled => true,
        LocationPolicy::Strict => same_location,
        LocationPolicy::Flexible => {
            if same_location || agent.is_remote {
                return true;
            }
            cfg.match_timezone && same_timezone(agent.location.as_ref(), ticket_location)
        }
    }
}

fn same_timezone(agent_location: Option<&Location>, ticket_location: &Location) -> bool {
    match (
        agent_location.and_then(|l| l.timezone.as_deref()),
        ticket_location.timezone.as_deref(),
    ) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::skills::SkillSet;
    use chrono::Utc;

    fn location(id: i64, tz: &str, onsite: bool) -> Location {
        Location {
            location_id: id,
            name: format!("site-{id}"),
            timezone: Some(tz.to_string()),
            support_types: if onsite { vec!["remote".into(), "onsite".into()] } else { vec!["remote".into()] },
        }
    }

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
            subject: "s".into(),
            description: String::new(),
            category_id: Some(3),
            required_skills: skills.iter().map(|s| s.to_string()).collect(),
            required_level: level,
            average_resolution_time: None,
            requires_specialization: false,
            location: None,
            is_vip: false,
            priority: crate::models::Priority::Medium,
            requires_onsite: false,
            current_responder_id: None,
            evaluated_at: Utc::now(),
        }
    }

    fn config(ctx: &TicketContext) -> FilterConfig {
        FilterConfig::new(ctx, &EngineSettings::default(), &FilterFlags::default())
    }

    #[test]
    fn skill_requirement_uses_substring_match() {
        let a = agent(1, &["networking"], AgentLevel::L1);
        assert_eq!(check_agent(&a, &config(&ctx(&["network"], None))), Ok(()));
        assert_eq!(
            check_agent(&a, &config(&ctx(&["database"], None))),
            Err(ExclusionReason::Skills)
        );
    }

    #[test]
    fn any_one_required_skill_is_enough() {
        let a = agent(1, &["printers"], AgentLevel::L1);
        assert_eq!(check_agent(&a, &config(&ctx(&["vpn", "printer"], None))), Ok(()));
    }

    #[test]
    fn agent_at_max_concurrent_is_excluded() {
        let mut a = agent(1, &[], AgentLevel::L2);
        a.max_concurrent_tickets = 4;
        a.current_ticket_count = 4;
        assert_eq!(check_agent(&a, &config(&ctx(&[], None))), Err(ExclusionReason::Capacity));

        a.current_ticket_count = 3;
        assert_eq!(check_agent(&a, &config(&ctx(&[], None))), Ok(()));
    }

    #[test]
    fn capacity_prefers_weighted_count() {
        let mut a = agent(1, &[], AgentLevel::L2);
        a.current_ticket_count = 1;
        a.weighted_ticket_count = Some(6.5);
        assert_eq!(check_agent(&a, &config(&ctx(&[], None))), Err(ExclusionReason::Capacity));
    }

    #[test]
    fn max_load_percentage_tightens_the_ceiling() {
        let mut a = agent(1, &[], AgentLevel::L2);
        a.max_concurrent_tickets = 4;
        a.current_ticket_count = 2;
        let mut cfg = config(&ctx(&[], None));
        cfg.max_load_percentage = 0.5;
        assert_eq!(check_agent(&a, &cfg), Err(ExclusionReason::Capacity));
    }

    #[test]
    fn level_is_a_minimum() {
        let c = config(&ctx(&[], Some(AgentLevel::L2)));
        assert_eq!(check_agent(&agent(1, &[], AgentLevel::L1), &c), Err(ExclusionReason::Level));
        assert_eq!(check_agent(&agent(2, &[], AgentLevel::Manager), &c), Ok(()));
    }

    #[test]
    fn first_failing_predicate_wins() {
        let mut a = agent(1, &["excel"], AgentLevel::L1);
        a.is_available = false;
        let result = filter_eligible(&[a], config(&ctx(&["vpn"], Some(AgentLevel::L3))));
        assert_eq!(result.excluded_count, 1);
        assert_eq!(result.exclusion_reasons.get(&ExclusionReason::Status), Some(&1));
        assert_eq!(result.exclusion_reasons.len(), 1);
    }

    #[test]
    fn manual_deactivation_overrides_sync_availability() {
        let mut a = agent(1, &[], AgentLevel::L1);
        a.manually_deactivated = true;
        assert_eq!(check_agent(&a, &config(&ctx(&[], None))), Err(ExclusionReason::Status));
    }

    #[test]
    fn test_scenario_skips_status_and_specialization() {
        let mut a = agent(1, &[], AgentLevel::L1);
        a.is_available = false;
        let mut c = ctx(&[], None);
        c.requires_specialization = true;
        let strict = config(&c);
        assert_eq!(check_agent(&a, &strict), Err(ExclusionReason::Status));

        let relaxed = FilterConfig::new(
            &c,
            &EngineSettings::default(),
            &FilterFlags { test_scenario: true, ..FilterFlags::default() },
        );
        assert_eq!(check_agent(&a, &relaxed), Ok(()));
    }

    #[test]
    fn specialization_requires_category_link() {
        let mut c = ctx(&[], None);
        c.requires_specialization = true;
        let cfg = config(&c);
        let mut a = agent(1, &[], AgentLevel::L1);
        assert_eq!(check_agent(&a, &cfg), Err(ExclusionReason::Specialization));
        a.category_ids = vec![3];
        assert_eq!(check_agent(&a, &cfg), Ok(()));
    }

    #[test]
    fn pto_list_and_leave_flag_exclude() {
        let c = ctx(&[], None);
        let flags = FilterFlags { pto_agent_ids: [2].into_iter().collect(), ..FilterFlags::default() };
        let cfg = FilterConfig::new(&c, &EngineSettings::default(), &flags);

        let mut on_leave = agent(1, &[], AgentLevel::L1);
        on_leave.on_leave = true;
        let result = filter_eligible(&[on_leave, agent(2, &[], AgentLevel::L1), agent(3, &[], AgentLevel::L1)], cfg.clone());
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.exclusion_reasons.get(&ExclusionReason::Pto), Some(&2));

        let mut no_pto = cfg;
        no_pto.check_pto = false;
        assert_eq!(check_agent(&agent(2, &[], AgentLevel::L1), &no_pto), Ok(()));
    }

    #[test]
    fn strict_location_requires_exact_match() {
        let mut c = ctx(&[], None);
        c.location = Some(location(5, "Europe/Berlin", true));
        let mut cfg = config(&c);
        cfg.location_policy = LocationPolicy::Strict;

        let mut here = agent(1, &[], AgentLevel::L1);
        here.location = Some(location(5, "Europe/Berlin", true));
        let mut elsewhere = agent(2, &[], AgentLevel::L1);
        elsewhere.location = Some(location(6, "Europe/Berlin", true));
        elsewhere.is_remote = true;

        assert_eq!(check_agent(&here, &cfg), Ok(()));
        assert_eq!(check_agent(&elsewhere, &cfg), Err(ExclusionReason::Location));
    }

    #[test]
    fn flexible_location_accepts_remote_or_same_timezone() {
        let mut c = ctx(&[], None);
        c.location = Some(location(5, "Europe/Berlin", true));
        let mut cfg = config(&c);
        cfg.location_policy = LocationPolicy::Flexible;

        let mut remote = agent(1, &[], AgentLevel::L1);
        remote.is_remote = true;
        let mut same_tz = agent(2, &[], AgentLevel::L1);
        same_tz.location = Some(location(6, "Europe/Berlin", false));
        let mut far = agent(3, &[], AgentLevel::L1);
        far.location = Some(location(7, "America/Chicago", true));

        assert_eq!(check_agent(&remote, &cfg), Ok(()));
        assert_eq!(check_agent(&same_tz, &cfg), Ok(()));
        assert_eq!(check_agent(&far, &cfg), Err(ExclusionReason::Location));

        cfg.match_timezone = false;
        assert_eq!(check_agent(&same_tz, &cfg), Err(ExclusionReason::Location));
    }

    #[test]
    fn onsite_tickets_exclude_remote_agents_and_non_onsite_locations() {
        let mut c = ctx(&[], None);
        c.requires_onsite = true;
        c.location = Some(location(5, "Europe/Berlin", true));
        let mut cfg = config(&c);
        cfg.location_policy = LocationPolicy::Flexible;

        let mut remote = agent(1, &[], AgentLevel::L1);
        remote.is_remote = true;
        remote.location = Some(location(5, "Europe/Berlin", true));
        let mut no_onsite = agent(2, &[], AgentLevel::L1);
        no_onsite.location = Some(location(5, "Europe/Berlin", false));
        let mut onsite = agent(3, &[], AgentLevel::L1);
        onsite.location = Some(location(5, "Europe/Berlin", true));

        assert_eq!(check_agent(&remote, &cfg), Err(ExclusionReason::Location));
        assert_eq!(check_agent(&no_onsite, &cfg), Err(ExclusionReason::Location));
        assert_eq!(check_agent(&onsite, &cfg), Ok(()));

        cfg.allow_remote_for_onsite = true;
        assert_eq!(check_agent(&remote, &cfg), Ok(()));
    }

    #[test]
    fn disabled_location_policy_ignores_location() {
        let mut c = ctx(&[], None);
        c.requires_onsite = true;
        c.location = Some(location(5, "Europe/Berlin", true));
        let mut remote = agent(1, &[], AgentLevel::L1);
        remote.is_remote = true;
        assert_eq!(check_agent(&remote, &config(&c)), Ok(()));
    }

    #[test]
    fn diagnostics_count_every_agent_once() {
        let mut busy = agent(2, &["vpn"], AgentLevel::L2);
        busy.current_ticket_count = 8;
        let agents = vec![
            agent(1, &["vpn"], AgentLevel::L1),
            busy,
            agent(3, &["vpn"], AgentLevel::L3),
        ];
        let result = filter_eligible(&agents, config(&ctx(&["vpn"], Some(AgentLevel::L2))));

        assert_eq!(result.total_agents, 3);
        assert_eq!(result.excluded_count, 2);
        assert_eq!(result.candidates.iter().map(|a| a.agent_id).collect::<Vec<_>>(), vec![3]);
        assert_eq!(result.exclusion_reasons.get(&ExclusionReason::Level), Some(&1));
        assert_eq!(result.exclusion_reasons.get(&ExclusionReason::Capacity), Some(&1));
        assert_eq!(result.diagnostics()["excluded"], 2);
    }
}
