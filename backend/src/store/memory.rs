// backend/src/store/memory.rs

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::warn;

use super::{AgentPatch, AssignmentStore, FeedbackUpdate, StoreError};
use crate::models::{Agent, AgentRow, Category, Decision, DecisionStats, Location, NewDecision};
use crate::settings::EngineSettings;

#[derive(Default)]
struct Inner {
    agents: BTreeMap<i64, AgentRow>,
    locations: HashMap<i64, Location>,
    categories: HashMap<i64, Category>,
    settings: BTreeMap<String, Value>,
    decisions: BTreeMap<i64, Decision>,
    next_decision_id: i64,
}

/// Store backed by a single write-locked map set. Used by tests and local runs
/// without a database.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent(self, row: AgentRow) -> Self {
        self.inner.write().agents.insert(row.agent_id, row);
        self
    }

    pub fn with_location(self, location: Location) -> Self {
        self.inner.write().locations.insert(location.location_id, location);
        self
    }

    pub fn with_category(self, category: Category) -> Self {
        self.inner.write().categories.insert(category.category_id, category);
        self
    }

    pub fn with_settings(self, settings: &EngineSettings) -> Result<Self, StoreError> {
        {
            let mut inner = self.inner.write();
            for (key, value) in settings.to_entries()? {
                inner.settings.insert(key, value);
            }
        }
        Ok(self)
    }

    /// Raw row as stored, for assertions on counters.
    pub fn agent_row(&self, agent_id: i64) -> Option<AgentRow> {
        self.inner.read().agents.get(&agent_id).cloned()
    }

    fn resolve(inner: &Inner, row: &AgentRow) -> Result<Agent, StoreError> {
        let location = row.location_id.and_then(|id| inner.locations.get(&id).cloned());
        Agent::from_row(row.clone(), location).map_err(|reason| StoreError::Corrupt {
            entity: "agent",
            id: row.agent_id,
            reason,
        })
    }
}

fn agent_not_found(id: i64) -> StoreError {
    StoreError::NotFound { entity: "agent", id }
}

fn decision_not_found(id: i64) -> StoreError {
    StoreError::NotFound { entity: "decision", id }
}

#[async_trait]
impl AssignmentStore for InMemoryStore {
    async fn list_agents(&self) -> Result<Vec<Agent>, StoreError> {
        let inner = self.inner.read();
        let mut agents = Vec::with_capacity(inner.agents.len());
        for row in inner.agents.values() {
            match Self::resolve(&inner, row) {
                Ok(agent) => agents.push(agent),
                Err(e) => warn!(agent_id = row.agent_id, error = %e, "skipping agent"),
            }
        }
        Ok(agents)
    }

    async fn get_agent(&self, agent_id: i64) -> Result<Agent, StoreError> {
        let inner = self.inner.read();
        let row = inner.agents.get(&agent_id).ok_or_else(|| agent_not_found(agent_id))?;
        Self::resolve(&inner, row)
    }

    async fn update_agent(&self, agent_id: i64, patch: AgentPatch) -> Result<Agent, StoreError> {
        let mut inner = self.inner.write();
        let row = inner.agents.get_mut(&agent_id).ok_or_else(|| agent_not_found(agent_id))?;
        if let Some(v) = patch.manually_deactivated {
            row.manually_deactivated = v;
        }
        if let Some(v) = patch.skills {
            row.skills = v;
        }
        if let Some(v) = patch.max_concurrent_tickets {
            row.max_concurrent_tickets = v;
        }
        if let Some(v) = patch.is_remote {
            row.is_remote = v;
        }
        if let Some(v) = patch.on_leave {
            row.on_leave = v;
        }
        let row = row.clone();
        Self::resolve(&inner, &row)
    }

    async fn increment_agent_load(&self, agent_id: i64, weight: f64) -> Result<i32, StoreError> {
        let mut inner = self.inner.write();
        let row = inner.agents.get_mut(&agent_id).ok_or_else(|| agent_not_found(agent_id))?;
        row.current_ticket_count += 1;
        if let Some(weighted) = row.weighted_ticket_count.as_mut() {
            *weighted += weight;
        }
        row.total_assignments += 1;
        Ok(row.current_ticket_count)
    }

    async fn set_agent_workload(&self, agent_id: i64, raw_count: i32, weighted: f64) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let row = inner.agents.get_mut(&agent_id).ok_or_else(|| agent_not_found(agent_id))?;
        row.current_ticket_count = raw_count;
        row.weighted_ticket_count = Some(weighted);
        Ok(())
    }

    async fn get_category(&self, category_id: i64) -> Result<Option<Category>, StoreError> {
        Ok(self.inner.read().categories.get(&category_id).cloned())
    }

    async fn get_location(&self, location_id: i64) -> Result<Option<Location>, StoreError> {
        Ok(self.inner.read().locations.get(&location_id).cloned())
    }

    async fn load_settings(&self) -> Result<EngineSettings, StoreError> {
        let entries: Vec<(String, Value)> = self
            .inner
            .read()
            .settings
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(EngineSettings::from_entries(entries)?)
    }

    async fn save_settings(&self, settings: &EngineSettings) -> Result<(), StoreError> {
        settings.validate()?;
        let entries = settings.to_entries()?;
        let mut inner = self.inner.write();
        for (key, value) in entries {
            inner.settings.insert(key, value);
        }
        Ok(())
    }

    async fn insert_decision(&self, decision: NewDecision) -> Result<Decision, StoreError> {
        let mut inner = self.inner.write();
        inner.next_decision_id += 1;
        let id = inner.next_decision_id;
        let stored = Decision::from_new(id, decision, Utc::now());
        inner.decisions.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_decision(&self, decision_id: i64) -> Result<Decision, StoreError> {
        self.inner
            .read()
            .decisions
            .get(&decision_id)
            .cloned()
            .ok_or_else(|| decision_not_found(decision_id))
    }

    async fn list_decisions(&self, ticket_id: Option<i64>, limit: i64) -> Result<Vec<Decision>, StoreError> {
        let inner = self.inner.read();
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(inner
            .decisions
            .values()
            .rev()
            .filter(|d| ticket_id.map_or(true, |t| d.ticket_id == t))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn record_feedback(&self, decision_id: i64, update: FeedbackUpdate) -> Result<Decision, StoreError> {
        let mut inner = self.inner.write();
        let decision = inner
            .decisions
            .get_mut(&decision_id)
            .ok_or_else(|| decision_not_found(decision_id))?;
        if decision.feedback_at.is_some() {
            return Err(StoreError::FeedbackAlreadyRecorded(decision_id));
        }
        decision.feedback = Some(update.feedback);
        decision.override_info = update.override_info;
        decision.decision_type = update.decision_type;
        decision.feedback_at = Some(update.at);
        Ok(decision.clone())
    }

    async fn decision_stats(&self) -> Result<DecisionStats, StoreError> {
        Ok(DecisionStats::from_decisions(self.inner.read().decisions.values()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DecisionType, ExternalSync, Feedback};
    use sqlx::types::Json;

    fn row(id: i64, level: &str) -> AgentRow {
        AgentRow {
            agent_id: id,
            name: format!("agent-{id}"),
            email: None,
            skills: vec!["vpn".into()],
            category_skills: vec![],
            auto_detected_skills: vec![],
            metadata: Json(serde_json::json!({})),
            level: level.into(),
            is_available: true,
            manually_deactivated: false,
            location_id: None,
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

    fn new_decision(ticket_id: i64) -> NewDecision {
        NewDecision {
            ticket_id,
            ticket_subject: "VPN down".into(),
            agent_id: Some(1),
            decision_type: DecisionType::Suggested,
            score: Some(0.8),
            confidence: Some(0.6),
            breakdown: None,
            alternatives: vec![],
            external_sync: ExternalSync::NotAttempted,
            external_error: None,
        }
    }

    #[tokio::test]
    async fn corrupt_agents_are_skipped_in_listing() {
        let store = InMemoryStore::new().with_agent(row(1, "L2")).with_agent(row(2, "L7"));
        let agents = store.list_agents().await.unwrap();
        assert_eq!(agents.len(), 1);
        assert!(matches!(store.get_agent(2).await, Err(StoreError::Corrupt { id: 2, .. })));
    }

    #[tokio::test]
    async fn increment_returns_new_count() {
        let store = InMemoryStore::new().with_agent(row(1, "L1"));
        assert_eq!(store.increment_agent_load(1, 2.0).await.unwrap(), 1);
        assert_eq!(store.increment_agent_load(1, 2.0).await.unwrap(), 2);
        let row = store.agent_row(1).unwrap();
        assert_eq!(row.total_assignments, 2);
        assert_eq!(row.weighted_ticket_count, None);
    }

    #[tokio::test]
    async fn increment_grows_stored_weighted_count() {
        let store = InMemoryStore::new().with_agent(row(1, "L1"));
        store.set_agent_workload(1, 2, 3.0).await.unwrap();
        assert_eq!(store.increment_agent_load(1, 2.0).await.unwrap(), 3);
        assert_eq!(store.agent_row(1).unwrap().weighted_ticket_count, Some(5.0));
        assert_eq!(store.get_agent(1).await.unwrap().effective_load(), 5.0);
    }

    #[tokio::test]
    async fn feedback_is_single_shot() {
        let store = InMemoryStore::new();
        let d = store.insert_decision(new_decision(7)).await.unwrap();
        let update = FeedbackUpdate {
            feedback: Feedback { score: 4.0, comments: None, accepted: Some(true) },
            override_info: None,
            decision_type: d.decision_type,
            at: Utc::now(),
        };
        store.record_feedback(d.decision_id, update.clone()).await.unwrap();
        let err = store.record_feedback(d.decision_id, update).await.unwrap_err();
        assert!(matches!(err, StoreError::FeedbackAlreadyRecorded(id) if id == d.decision_id));
    }

    #[tokio::test]
    async fn decisions_list_newest_first_filtered_by_ticket() {
        let store = InMemoryStore::new();
        store.insert_decision(new_decision(7)).await.unwrap();
        store.insert_decision(new_decision(8)).await.unwrap();
        let last = store.insert_decision(new_decision(7)).await.unwrap();

        let listed = store.list_decisions(Some(7), 10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].decision_id, last.decision_id);
        assert_eq!(store.list_decisions(None, 1).await.unwrap().len(), 1);
    }
}
