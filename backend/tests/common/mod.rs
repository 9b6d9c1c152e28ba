// backend/tests/common/mod.rs

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use sqlx::types::Json;

use routedesk_api::assignment::AssignmentService;
use routedesk_api::engine::OpenTicket;
use routedesk_api::models::{AgentRow, Category, Location};
use routedesk_api::settings::EngineSettings;
use routedesk_api::store::InMemoryStore;
use routedesk_api::ticketing::{Requester, TicketPayload, TicketingApi, TicketingError};

pub const ADA: i64 = 1;
pub const BOB: i64 = 2;
pub const CY: i64 = 3;
pub const DEE: i64 = 4;

pub const VPN_CATEGORY: i64 = 10;
pub const MAINFRAME_CATEGORY: i64 = 11;

/// Ticketing system double that records every write.
#[derive(Default)]
pub struct FakeTicketing {
    pub tickets: Mutex<HashMap<i64, TicketPayload>>,
    pub open_tickets: Mutex<HashMap<i64, Vec<OpenTicket>>>,
    pub assigned: Mutex<Vec<(i64, i64)>>,
    pub notes: Mutex<Vec<(i64, String)>>,
    pub fail_assign: AtomicBool,
    pub fail_notes: AtomicBool,
}

impl FakeTicketing {
    pub fn with_ticket(self, ticket: TicketPayload) -> Self {
        self.tickets.lock().insert(ticket.id, ticket);
        self
    }

    pub fn failing_assign(self) -> Self {
        self.fail_assign.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_notes(self) -> Self {
        self.fail_notes.store(true, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl TicketingApi for FakeTicketing {
    async fn fetch_ticket(&self, ticket_id: i64) -> Result<TicketPayload, TicketingError> {
        self.tickets
            .lock()
            .get(&ticket_id)
            .cloned()
            .ok_or(TicketingError::NotFound(ticket_id))
    }

    async fn assign_ticket(&self, ticket_id: i64, agent_id: i64) -> Result<(), TicketingError> {
        if self.fail_assign.load(Ordering::SeqCst) {
            return Err(TicketingError::Api { status: 400, message: "responder is not an agent".into() });
        }
        self.assigned.lock().push((ticket_id, agent_id));
        Ok(())
    }

    async fn add_note(&self, ticket_id: i64, body: &str) -> Result<(), TicketingError> {
        if self.fail_notes.load(Ordering::SeqCst) {
            return Err(TicketingError::Api { status: 503, message: "unavailable".into() });
        }
        self.notes.lock().push((ticket_id, body.to_string()));
        Ok(())
    }

    async fn list_open_tickets(&self, agent_id: i64) -> Result<Vec<OpenTicket>, TicketingError> {
        Ok(self.open_tickets.lock().get(&agent_id).cloned().unwrap_or_default())
    }
}

pub fn agent_row(id: i64, name: &str, level: &str, skills: &[&str], load: i32) -> AgentRow {
    AgentRow {
        agent_id: id,
        name: name.to_string(),
        email: Some(format!("{}@desk.test", name.to_lowercase())),
        skills: skills.iter().map(|s| s.to_string()).collect(),
        category_skills: vec![],
        auto_detected_skills: vec![],
        metadata: Json(json!({})),
        level: level.to_string(),
        is_available: true,
        manually_deactivated: false,
        location_id: None,
        is_remote: false,
        current_ticket_count: load,
        weighted_ticket_count: None,
        max_concurrent_tickets: 10,
        total_assignments: 0,
        satisfaction_score: None,
        average_resolution_time: None,
        on_leave: false,
        category_ids: vec![],
    }
}

pub fn category(id: i64, skills: &[&str], level: Option<&str>) -> Category {
    Category {
        category_id: id,
        name: format!("category-{id}"),
        required_skills: skills.iter().map(|s| s.to_string()).collect(),
        priority_level: level.map(str::to_string),
        average_resolution_time: Some(4.0),
        requires_onsite: false,
        requires_specialization: false,
    }
}

pub fn hq() -> Location {
    Location {
        location_id: 100,
        name: "HQ".into(),
        timezone: Some("Europe/Berlin".into()),
        support_types: vec!["remote".into(), "onsite".into()],
    }
}

pub fn ticket(id: i64, category_id: i64) -> TicketPayload {
    TicketPayload {
        id,
        subject: "VPN drops every hour".into(),
        description: "Client disconnects from the corporate VPN.".into(),
        description_text: None,
        priority: Some(2),
        urgency: None,
        category_id: Some(category_id),
        requester: Some(Requester { location_id: Some(100) }),
        responder_id: None,
    }
}

/// Ada (L3, light load) and Bob (L2, heavier load) can take VPN tickets;
/// Cy is too junior for them and Dee only knows databases.
pub fn seeded_store(settings: &EngineSettings) -> InMemoryStore {
    InMemoryStore::new()
        .with_location(hq())
        .with_category(category(VPN_CATEGORY, &["vpn"], Some("L2")))
        .with_category(category(MAINFRAME_CATEGORY, &["mainframe"], None))
        .with_agent(agent_row(ADA, "Ada", "L3", &["vpn", "networking"], 1))
        .with_agent(agent_row(BOB, "Bob", "L2", &["vpn"], 4))
        .with_agent(agent_row(CY, "Cy", "L1", &["vpn"], 0))
        .with_agent(agent_row(DEE, "Dee", "L2", &["database"], 0))
        .with_settings(settings)
        .expect("default settings are valid")
}

pub fn auto_assign_settings() -> EngineSettings {
    EngineSettings { auto_assign_enabled: true, ..EngineSettings::default() }
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub ticketing: Arc<FakeTicketing>,
    pub service: AssignmentService,
}

pub fn harness(settings: EngineSettings, ticketing: FakeTicketing) -> Harness {
    let store = Arc::new(seeded_store(&settings));
    let ticketing = Arc::new(ticketing);
    let service = AssignmentService::new(store.clone(), ticketing.clone());
    Harness { store, ticketing, service }
}
