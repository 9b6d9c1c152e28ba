// backend/src/assignment/explain.rs

//! Confidence estimate and the human-readable justification of a choice.

use std::fmt::Write as _;

use crate::engine::scoring::{ScoreBreakdown, ScoringResult};
use crate::engine::workload::round2;

/// How far the winner should lead the runner-up for a given confidence.
const CLEAR_LEAD: f64 = 0.2;
const SOLID_LEAD: f64 = 0.1;

/// Confidence in the top suggestion, from its score and the runner-up's.
pub fn confidence(top: f64, runner_up: Option<f64>) -> f64 {
    if top >= 0.8 {
        let Some(second) = runner_up else {
            return 0.95;
        };
        // Scores are two-decimal values; compare the gap on the same grid.
        let gap = round2(top - second);
        if gap >= CLEAR_LEAD {
            0.9
        } else if gap >= SOLID_LEAD {
            0.8
        } else {
            0.7
        }
    } else if top >= 0.6 {
        0.6
    } else {
        0.4
    }
}

pub fn assignment_reason(b: &ScoreBreakdown) -> String {
    let mut reasons = Vec::new();
    if b.skill >= 0.8 {
        reasons.push("excellent skill match");
    }
    if b.load >= 0.8 {
        reasons.push("optimal workload balance");
    }
    if b.level >= 0.9 {
        reasons.push("appropriate expertise level");
    }
    if b.location >= 1.0 {
        reasons.push("location requirements met");
    }
    if reasons.is_empty() {
        return "best overall match".to_string();
    }
    reasons.join(", ")
}

/// Private note posted on the ticket after an automatic assignment.
pub fn assignment_note(winner: &ScoringResult, alternatives: &[ScoringResult], confidence: f64) -> String {
    let mut note = format!(
        "Automatically assigned to {} (score {:.2}, confidence {:.0}%).\nReason: {}.",
        winner.agent.name,
        winner.score,
        confidence * 100.0,
        assignment_reason(&winner.breakdown),
    );
    if !alternatives.is_empty() {
        note.push_str("\nAlternatives considered:");
        for alt in alternatives {
            let _ = write!(note, "\n- {} ({:.2})", alt.agent.name, alt.score);
        }
    }
    note
}
