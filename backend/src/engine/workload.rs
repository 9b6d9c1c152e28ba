// backend/src/engine/workload.rs

//! Age-weighted workload accounting.
//!
//! An agent's load is the sum of per-ticket weights where the weight depends
//! on how many business days the ticket has been open. Fresh tickets count
//! the most, so an agent cannot look light by letting tickets age.

use std::cmp::Ordering;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::settings::AgeWeights;

/// Weighted load at which an agent is considered full.
pub const FULL_LOAD: f64 = 10.0;

/// Weighted counts closer than this are treated as equal when comparing.
const WEIGHTED_TIE_MARGIN: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Pending,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn is_active(self) -> bool {
        matches!(self, TicketStatus::Open | TicketStatus::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenTicket {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub status: TicketStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeBucket {
    Fresh,
    Recent,
    Stale,
    Abandoned,
}

impl AgeBucket {
    pub fn for_business_days(days: i64) -> Self {
        match days {
            i64::MIN..=1 => AgeBucket::Fresh,
            2..=5 => AgeBucket::Recent,
            6..=14 => AgeBucket::Stale,
            _ => AgeBucket::Abandoned,
        }
    }

    pub fn weight(self, weights: &AgeWeights) -> f64 {
        match self {
            AgeBucket::Fresh => weights.fresh,
            AgeBucket::Recent => weights.recent,
            AgeBucket::Stale => weights.stale,
            AgeBucket::Abandoned => weights.old,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCounts {
    pub fresh: usize,
    pub recent: usize,
    pub stale: usize,
    pub abandoned: usize,
}

impl BucketCounts {
    fn bump(&mut self, bucket: AgeBucket) {
        match bucket {
            AgeBucket::Fresh => self.fresh += 1,
            AgeBucket::Recent => self.recent += 1,
            AgeBucket::Stale => self.stale += 1,
            AgeBucket::Abandoned => self.abandoned += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketAge {
    pub ticket_id: i64,
    pub calendar_days: i64,
    pub business_days: i64,
    pub bucket: AgeBucket,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSummary {
    pub agent_id: i64,
    pub raw_count: usize,
    pub weighted_count: f64,
    pub buckets: BucketCounts,
    /// min(1, weighted_count / 10)
    pub workload_score: f64,
    pub tickets: Vec<TicketAge>,
}

/// Weekdays strictly after `from` up to and including `to`.
pub fn business_days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    let days = (to - from).num_days();
    if days <= 0 {
        return 0;
    }
    let full_weeks = days / 7;
    let mut count = full_weeks * 5;
    let mut day = from + Duration::days(full_weeks * 7);
    for _ in 0..days % 7 {
        day += Duration::days(1);
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            count += 1;
        }
    }
    count
}

#[derive(Debug, Clone, Copy)]
pub struct WorkloadCalculator {
    weights: AgeWeights,
}

impl WorkloadCalculator {
    pub fn new(weights: AgeWeights) -> Self {
        Self { weights }
    }

    pub fn age_of(&self, ticket: &OpenTicket, now: DateTime<Utc>) -> TicketAge {
        let calendar_days = (now - ticket.created_at).num_days().max(0);
        let business_days = business_days_between(ticket.created_at.date_naive(), now.date_naive());
        let bucket = AgeBucket::for_business_days(business_days);
        TicketAge {
            ticket_id: ticket.id,
            calendar_days,
            business_days,
            bucket,
            weight: bucket.weight(&self.weights),
        }
    }

    /// Pure: same tickets, weights and `now` always give the same summary.
    /// Resolved and closed tickets are not load.
    pub fn calculate(&self, agent_id: i64, tickets: &[OpenTicket], now: DateTime<Utc>) -> WorkloadSummary {
        let mut buckets = BucketCounts::default();
        let mut weighted = 0.0;
        let mut ages = Vec::with_capacity(tickets.len());

        for ticket in tickets.iter().filter(|t| t.status.is_active()) {
            let age = self.age_of(ticket, now);
            buckets.bump(age.bucket);
            weighted += age.weight;
            ages.push(age);
        }

        let weighted_count = round2(weighted);
        WorkloadSummary {
            agent_id,
            raw_count: ages.len(),
            weighted_count,
            buckets,
            workload_score: round2((weighted_count / FULL_LOAD).min(1.0)),
            tickets: ages,
        }
    }
}

/// Orders two workloads lightest first: weighted count decides when the gap
/// exceeds 0.1, then the number of fresh tickets, then the raw count.
pub fn compare_workloads(a: &WorkloadSummary, b: &WorkloadSummary) -> Ordering {
    if (a.weighted_count - b.weighted_count).abs() > WEIGHTED_TIE_MARGIN {
        return a
            .weighted_count
            .partial_cmp(&b.weighted_count)
            .unwrap_or(Ordering::Equal);
    }
    a.buckets
        .fresh
        .cmp(&b.buckets.fresh)
        .then(a.raw_count.cmp(&b.raw_count))
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
