//! Dimension sub-scores.
//!
//! Each dimension combines a model-extracted signal in [0, 1] with small
//! deterministic boosts read from the raw answers, then clamps to its own
//! ceiling. The ceilings are part of the scoring contract and tested as
//! such.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TECHNICAL_READINESS_MAX: f64 = 50.0;
pub const BUSINESS_IMPACT_MAX: f64 = 55.0;
pub const FINANCIAL_CAPACITY_MAX: f64 = 45.0;
pub const URGENCY_MAX: f64 = 40.0;
pub const DECISION_AUTHORITY_MAX: f64 = 45.0;
pub const IMPLEMENTATION_SIMPLICITY_MAX: f64 = 50.0;

/// Model-extracted per-dimension signals, each expected in [0, 1]. Missing
/// fields deserialize to 0.0 rather than failing the whole payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionSignals {
    pub technical_readiness: f64,
    pub business_impact: f64,
    pub financial_capacity: f64,
    pub urgency: f64,
    pub decision_authority: f64,
    pub implementation_simplicity: f64,
}

impl Default for DimensionSignals {
    fn default() -> Self {
        Self {
            technical_readiness: 0.0,
            business_impact: 0.0,
            financial_capacity: 0.0,
            urgency: 0.0,
            decision_authority: 0.0,
            implementation_simplicity: 0.0,
        }
    }
}

/// Raw sub-scores after boosts and clamping, each in [0, ceiling].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub technical_readiness: f64,
    pub business_impact: f64,
    pub financial_capacity: f64,
    pub urgency: f64,
    pub decision_authority: f64,
    pub implementation_simplicity: f64,
}

/// Compute the six sub-scores from analysis signals and raw answers.
pub fn compute_dimensions(
    signals: &DimensionSignals,
    answers: &HashMap<String, Value>,
) -> DimensionScores {
    DimensionScores {
        technical_readiness: score_dimension(
            signals.technical_readiness,
            TECHNICAL_READINESS_MAX,
            technical_boost(answers),
        ),
        business_impact: score_dimension(
            signals.business_impact,
            BUSINESS_IMPACT_MAX,
            business_impact_boost(answers),
        ),
        financial_capacity: score_dimension(
            signals.financial_capacity,
            FINANCIAL_CAPACITY_MAX,
            financial_boost(answers),
        ),
        urgency: score_dimension(signals.urgency, URGENCY_MAX, urgency_boost(answers)),
        decision_authority: score_dimension(
            signals.decision_authority,
            DECISION_AUTHORITY_MAX,
            authority_boost(answers),
        ),
        implementation_simplicity: score_dimension(
            signals.implementation_simplicity,
            IMPLEMENTATION_SIMPLICITY_MAX,
            0.0,
        ),
    }
}

fn score_dimension(signal: f64, ceiling: f64, boost: f64) -> f64 {
    (clamp01(signal) * ceiling + boost).clamp(0.0, ceiling)
}

fn clamp01(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn text_answers(answers: &HashMap<String, Value>) -> impl Iterator<Item = (&str, &str)> {
    answers
        .iter()
        .filter_map(|(key, value)| value.as_str().map(|text| (key.as_str(), text)))
}

/// Present tooling/integration answers suggest an instrumented team.
fn technical_boost(answers: &HashMap<String, Value>) -> f64 {
    const KEYS: [&str; 3] = ["current_tools", "tech_stack", "integrations"];
    if answers.keys().any(|k| KEYS.contains(&k.as_str())) {
        4.0
    } else {
        0.0
    }
}

/// A long-form pain description signals real, articulated impact.
fn business_impact_boost(answers: &HashMap<String, Value>) -> f64 {
    if text_answers(answers).any(|(_, text)| text.len() > 200) {
        4.0
    } else {
        0.0
    }
}

fn financial_boost(answers: &HashMap<String, Value>) -> f64 {
    let has_budget_answer = answers
        .iter()
        .any(|(key, value)| key.contains("budget") && !value.is_null());
    if has_budget_answer {
        5.0
    } else {
        0.0
    }
}

fn urgency_boost(answers: &HashMap<String, Value>) -> f64 {
    const MARKERS: [&str; 4] = ["asap", "immediately", "urgent", "this month"];
    let urgent = text_answers(answers).any(|(_, text)| {
        let lowered = text.to_lowercase();
        MARKERS.iter().any(|marker| lowered.contains(marker))
    });
    if urgent {
        8.0
    } else {
        0.0
    }
}

fn authority_boost(answers: &HashMap<String, Value>) -> f64 {
    const ROLE_KEYS: [&str; 3] = ["role", "title", "job_title"];
    const SENIOR: [&str; 6] = ["founder", "ceo", "cto", "vp", "director", "head of"];
    let senior = text_answers(answers).any(|(key, text)| {
        if !ROLE_KEYS.contains(&key) {
            return false;
        }
        let lowered = text.to_lowercase();
        SENIOR.iter().any(|marker| lowered.contains(marker))
    });
    if senior {
        6.0
    } else {
        0.0
    }
}
