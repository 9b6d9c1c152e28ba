// backend/src/engine/context.rs

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::skills::normalize;
use crate::models::{AgentLevel, Category, Location, Priority};
use crate::ticketing::TicketPayload;

const MAX_PRIORITY: i32 = 4;
const ONSITE_KEYWORDS: [&str; 2] = ["onsite", "on-site"];

/// Immutable projection of a ticket, built once per assignment attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketContext {
    pub ticket_id: i64,
    pub subject: String,
    pub description: String,
    pub category_id: Option<i64>,
    pub required_skills: Vec<String>,
    pub required_level: Option<AgentLevel>,
    pub average_resolution_time: Option<f64>,
    pub requires_specialization: bool,
    pub location: Option<Location>,
    pub is_vip: bool,
    pub priority: Priority,
    pub requires_onsite: bool,
    pub current_responder_id: Option<i64>,
    pub evaluated_at: DateTime<Utc>,
}

impl TicketContext {
    pub fn build(
        ticket: &TicketPayload,
        category: Option<&Category>,
        location: Option<Location>,
        evaluated_at: DateTime<Utc>,
    ) -> Self {
        let priority_level = ticket.urgency.or(ticket.priority).unwrap_or(2);
        let is_vip = ticket.priority == Some(MAX_PRIORITY) || ticket.urgency == Some(MAX_PRIORITY);

        let mut required_skills: Vec<String> = category
            .map(|c| c.required_skills.iter().map(|s| normalize(s)).collect())
            .unwrap_or_default();
        let mut seen = HashSet::new();
        required_skills.retain(|s| !s.is_empty() && seen.insert(s.clone()));

        let requires_onsite = category.map(|c| c.requires_onsite).unwrap_or(false)
            || mentions_onsite(&ticket.subject)
            || mentions_onsite(ticket.text());

        Self {
            ticket_id: ticket.id,
            subject: ticket.subject.clone(),
            description: ticket.text().to_string(),
            category_id: category.map(|c| c.category_id),
            required_skills,
            required_level: category.and_then(Category::required_level),
            average_resolution_time: category.and_then(|c| c.average_resolution_time),
            requires_specialization: category.map(|c| c.requires_specialization).unwrap_or(false),
            location,
            is_vip,
            priority: Priority::from_level(priority_level),
            requires_onsite,
            current_responder_id: ticket.responder_id,
            evaluated_at,
        }
    }

    pub fn location_id(&self) -> Option<i64> {
        self.location.as_ref().map(|l| l.location_id)
    }

    pub fn location_timezone(&self) -> Option<&str> {
        self.location.as_ref().and_then(|l| l.timezone.as_deref())
    }
}

fn mentions_onsite(text: &str) -> bool {
    let lower = text.to_lowercase();
    ONSITE_KEYWORDS.iter().any(|k| lower.contains(k))
}
