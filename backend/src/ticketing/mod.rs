// backend/src/ticketing/mod.rs

//! Boundary to the external ticketing system.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::workload::OpenTicket;

pub mod http;

pub use http::{HttpTicketingClient, TicketingConfig};

#[derive(Debug, Error)]
pub enum TicketingError {
    #[error("ticketing request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("ticketing API rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },
    #[error("ticketing API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("ticket {0} not found")]
    NotFound(i64),
}

impl TicketingError {
    pub fn is_retryable(&self) -> bool {
        match self {
            TicketingError::Http(e) => e.is_timeout() || e.is_connect(),
            TicketingError::RateLimited { .. } => true,
            TicketingError::Api { status, .. } => *status >= 500,
            TicketingError::NotFound(_) => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Requester {
    #[serde(default)]
    pub location_id: Option<i64>,
}

/// Ticket as returned by the ticketing system or supplied by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketPayload {
    pub id: i64,
    #[serde(default)]
    pub subject: String,
    /// Raw description; HTML when it comes from the ticketing system.
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_text: Option<String>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub urgency: Option<i32>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub requester: Option<Requester>,
    #[serde(default)]
    pub responder_id: Option<i64>,
}

impl TicketPayload {
    /// Minimal ticket used when the ticketing system cannot be reached.
    pub fn stub(id: i64) -> Self {
        Self {
            id,
            subject: "Unknown".to_string(),
            description: String::new(),
            description_text: None,
            priority: Some(2),
            urgency: None,
            category_id: None,
            requester: None,
            responder_id: None,
        }
    }

    /// Plain-text description, falling back to the raw field.
    pub fn text(&self) -> &str {
        match self.description_text.as_deref() {
            Some(text) if !text.trim().is_empty() => text,
            _ => &self.description,
        }
    }

    pub fn requester_location_id(&self) -> Option<i64> {
        self.requester.as_ref().and_then(|r| r.location_id)
    }
}

#[async_trait]
pub trait TicketingApi: Send + Sync {
    async fn fetch_ticket(&self, ticket_id: i64) -> Result<TicketPayload, TicketingError>;

    async fn assign_ticket(&self, ticket_id: i64, agent_id: i64) -> Result<(), TicketingError>;

    /// Adds a private note to the ticket.
    async fn add_note(&self, ticket_id: i64, body: &str) -> Result<(), TicketingError>;

    /// Open and pending tickets currently assigned to the agent.
    async fn list_open_tickets(&self, agent_id: i64) -> Result<Vec<OpenTicket>, TicketingError>;
}
