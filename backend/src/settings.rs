// backend/src/settings.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("malformed settings: {0}")]
    Malformed(#[from] serde_json::Error),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> SettingsError {
    SettingsError::Invalid { field, reason: reason.into() }
}

/// Weights of the five sub-scores. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub skill: f64,
    pub level: f64,
    pub load: f64,
    pub location: f64,
    pub vip: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self { skill: 0.30, level: 0.25, load: 0.25, location: 0.10, vip: 0.10 }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.skill + self.level + self.load + self.location + self.vip
    }
}

/// Multipliers applied per ticket-age bucket when weighting an agent's load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgeWeights {
    pub fresh: f64,
    pub recent: f64,
    pub stale: f64,
    pub old: f64,
}

impl Default for AgeWeights {
    fn default() -> Self {
        Self { fresh: 2.0, recent: 1.2, stale: 0.5, old: 0.1 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationPolicy {
    #[default]
    Disabled,
    Strict,
    Flexible,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationMatching {
    pub policy: LocationPolicy,
    pub match_timezone: bool,
    pub allow_remote_for_onsite: bool,
}

impl Default for LocationMatching {
    fn default() -> Self {
        Self { policy: LocationPolicy::Disabled, match_timezone: true, allow_remote_for_onsite: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadLimits {
    /// Absolute load ceiling; an agent at or above it is not eligible.
    pub capacity_limit: f64,
    /// Fraction of the agent's own `max_concurrent_tickets` usable.
    pub max_load_percentage: f64,
}

impl Default for WorkloadLimits {
    fn default() -> Self {
        Self { capacity_limit: 5.0, max_load_percentage: 1.0 }
    }
}

/// Engine configuration, shared by the workload calculator, eligibility
/// filter, scoring engine and orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub scoring_weights: ScoringWeights,
    pub ticket_age_weights: AgeWeights,
    pub auto_assign_enabled: bool,
    pub max_suggestions_count: usize,
    pub min_score_threshold: f64,
    pub location_matching: LocationMatching,
    pub workload: WorkloadLimits,
    pub check_pto: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            scoring_weights: ScoringWeights::default(),
            ticket_age_weights: AgeWeights::default(),
            auto_assign_enabled: false,
            max_suggestions_count: 3,
            min_score_threshold: 0.5,
            location_matching: LocationMatching::default(),
            workload: WorkloadLimits::default(),
            check_pto: true,
        }
    }
}

const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

impl EngineSettings {
    pub const KEYS: [&'static str; 8] = [
        "scoring_weights",
        "ticket_age_weights",
        "auto_assign_enabled",
        "max_suggestions_count",
        "min_score_threshold",
        "location_matching",
        "workload",
        "check_pto",
    ];

    /// Builds validated settings from stored key/value rows. Missing keys take
    /// their defaults; unknown keys are ignored.
    pub fn from_entries<I>(entries: I) -> Result<Self, SettingsError>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut map = serde_json::Map::new();
        for (key, value) in entries {
            if Self::KEYS.contains(&key.as_str()) {
                map.insert(key, value);
            } else {
                warn!(key = %key, "ignoring unknown assignment setting");
            }
        }
        let settings: EngineSettings = serde_json::from_value(Value::Object(map))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_entries(&self) -> Result<Vec<(String, Value)>, SettingsError> {
        let value = serde_json::to_value(self)?;
        let Value::Object(map) = value else {
            return Ok(Vec::new());
        };
        Ok(map.into_iter().collect())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let w = &self.scoring_weights;
        for (name, v) in [
            ("skill", w.skill),
            ("level", w.level),
            ("load", w.load),
            ("location", w.location),
            ("vip", w.vip),
        ] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(invalid("scoring_weights", format!("{name} weight {v} is outside [0, 1]")));
            }
        }
        if (w.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(invalid("scoring_weights", format!("weights sum to {:.3}, expected 1.0", w.sum())));
        }

        let a = &self.ticket_age_weights;
        for (name, v) in [("fresh", a.fresh), ("recent", a.recent), ("stale", a.stale), ("old", a.old)] {
            if !v.is_finite() || v < 0.0 {
                return Err(invalid("ticket_age_weights", format!("{name} weight {v} must be non-negative")));
            }
        }

        if self.max_suggestions_count == 0 {
            return Err(invalid("max_suggestions_count", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.min_score_threshold) {
            return Err(invalid("min_score_threshold", "must be within [0, 1]"));
        }
        if !self.workload.capacity_limit.is_finite() || self.workload.capacity_limit <= 0.0 {
            return Err(invalid("workload", "capacity_limit must be positive"));
        }
        let pct = self.workload.max_load_percentage;
        if !(pct > 0.0 && pct <= 1.0) {
            return Err(invalid("workload", "max_load_percentage must be within (0, 1]"));
        }
        Ok(())
    }
}
