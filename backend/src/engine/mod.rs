// backend/src/engine/mod.rs

//! Pure decision logic: no I/O anywhere below this module.

pub mod context;
pub mod eligibility;
pub mod scoring;
pub mod skills;
pub mod workload;

pub use context::TicketContext;
pub use eligibility::{filter_eligible, EligibilityResult, ExclusionReason, FilterConfig, FilterFlags};
pub use scoring::{ScoreBreakdown, ScoringEngine, ScoringResult};
pub use skills::{SkillSet, SkillSource};
pub use workload::{compare_workloads, OpenTicket, WorkloadCalculator, WorkloadSummary};
