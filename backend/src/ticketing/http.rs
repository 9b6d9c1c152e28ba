// backend/src/ticketing/http.rs

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{TicketPayload, TicketingApi, TicketingError};
use crate::engine::workload::{OpenTicket, TicketStatus};

/// The filter endpoint returns at most this many tickets per page.
const FILTER_PAGE_SIZE: usize = 30;
const MAX_FILTER_PAGES: u32 = 10;

#[derive(Debug, Clone)]
pub struct TicketingConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for TicketingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9000".into(),
            api_key: String::new(),
            timeout: Duration::from_secs(30),
            max_retries: 5,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(30),
        }
    }
}

impl TicketingConfig {
    /// `base × 2^attempt`, never above `backoff_max`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.backoff_base
            .checked_mul(factor)
            .unwrap_or(self.backoff_max)
            .min(self.backoff_max)
    }
}

/// Freshservice-style v2 REST client with retry and backoff.
#[derive(Clone)]
pub struct HttpTicketingClient {
    config: TicketingConfig,
    http: reqwest::Client,
}

// Types to deserialize v2 responses
#[derive(Deserialize)]
struct TicketEnvelope {
    ticket: TicketPayload,
}

#[derive(Deserialize)]
struct FilterEnvelope {
    tickets: Vec<FilterTicket>,
}

#[derive(Deserialize)]
struct FilterTicket {
    id: i64,
    created_at: DateTime<Utc>,
    status: i32,
}

fn status_from_code(code: i32) -> TicketStatus {
    match code {
        2 => TicketStatus::Open,
        4 => TicketStatus::Resolved,
        5 => TicketStatus::Closed,
        // 3 and custom "waiting on ..." statuses
        _ => TicketStatus::Pending,
    }
}

impl HttpTicketingClient {
    pub fn new(config: TicketingConfig) -> Result<Self, TicketingError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.config.api_key, Some("X"))
    }

    async fn send_with_retry<F>(&self, build: F) -> Result<Response, TicketingError>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            let err = match self.authed(build()).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = resp
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(self.config.backoff(attempt).as_secs().max(1));
                    TicketingError::RateLimited { retry_after }
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let message = resp.text().await.unwrap_or_default();
                    TicketingError::Api { status, message }
                }
                Err(e) => TicketingError::Http(e),
            };

            if !err.is_retryable() || attempt >= self.config.max_retries {
                return Err(err);
            }

            let delay = match &err {
                TicketingError::RateLimited { retry_after } => {
                    Duration::from_secs(*retry_after).min(self.config.backoff_max)
                }
                _ => self.config.backoff(attempt),
            };
            warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying ticketing request");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl TicketingApi for HttpTicketingClient {
    async fn fetch_ticket(&self, ticket_id: i64) -> Result<TicketPayload, TicketingError> {
        let url = self.url(&format!("/api/v2/tickets/{ticket_id}?include=requester"));
        let resp = self
            .send_with_retry(|| self.http.get(&url))
            .await
            .map_err(|e| match e {
                TicketingError::Api { status: 404, .. } => TicketingError::NotFound(ticket_id),
                other => other,
            })?;
        let envelope: TicketEnvelope = resp.json().await?;
        Ok(envelope.ticket)
    }

    async fn assign_ticket(&self, ticket_id: i64, agent_id: i64) -> Result<(), TicketingError> {
        let url = self.url(&format!("/api/v2/tickets/{ticket_id}"));
        let body = json!({ "responder_id": agent_id });
        self.send_with_retry(|| self.http.put(&url).json(&body)).await?;
        debug!(ticket_id, agent_id, "ticket assigned in ticketing system");
        Ok(())
    }

    async fn add_note(&self, ticket_id: i64, body: &str) -> Result<(), TicketingError> {
        let url = self.url(&format!("/api/v2/tickets/{ticket_id}/notes"));
        let payload = json!({ "body": body, "private": true });
        self.send_with_retry(|| self.http.post(&url).json(&payload)).await?;
        Ok(())
    }

    async fn list_open_tickets(&self, agent_id: i64) -> Result<Vec<OpenTicket>, TicketingError> {
        let url = self.url("/api/v2/tickets/filter");
        let query = format!("\"agent_id:{agent_id} AND (status:2 OR status:3)\"");
        let mut tickets = Vec::new();

        for page in 1..=MAX_FILTER_PAGES {
            let page_str = page.to_string();
            let resp = self
                .send_with_retry(|| {
                    self.http
                        .get(&url)
                        .query(&[("query", query.as_str()), ("page", page_str.as_str())])
                })
                .await?;
            let envelope: FilterEnvelope = resp.json().await?;
            let count = envelope.tickets.len();
            tickets.extend(envelope.tickets.into_iter().map(|t| OpenTicket {
                id: t.id,
                created_at: t.created_at,
                status: status_from_code(t.status),
            }));
            if count < FILTER_PAGE_SIZE {
                break;
            }
        }

        debug!(agent_id, count = tickets.len(), "fetched open tickets");
        Ok(tickets)
    }
}
