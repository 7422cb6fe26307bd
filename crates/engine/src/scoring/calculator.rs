//! Lead score calculator.
//!
//! One canonical implementation for both scoring modes. `score` is pure:
//! identical inputs always produce identical output, and nothing here
//! touches the workflow engine, stores, or clocks.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::dimensions::{compute_dimensions, DimensionSignals};
use super::weights::weights_for;
use super::{LeadScore, Tier};

/// Model-produced analysis of one form response. All fields are optional:
/// a degraded analysis (or none at all, when the LLM step soft-failed)
/// still yields a usable heuristic score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisPayload {
    pub summary: Option<String>,
    /// Overall response quality in [0, 100].
    pub quality_score: Option<f64>,
    pub industry: Option<String>,
    pub dimensions: Option<DimensionSignals>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringMode {
    /// Quality score plus content-richness bonuses.
    Heuristic,
    /// Weighted six-dimension scoring; falls back to the heuristic when the
    /// analysis carries no dimension signals.
    MultiDimensional,
}

#[derive(Debug, Clone, Copy)]
pub struct LeadScoreCalculator {
    mode: ScoringMode,
}

impl Default for LeadScoreCalculator {
    fn default() -> Self {
        Self::new(ScoringMode::MultiDimensional)
    }
}

impl LeadScoreCalculator {
    pub fn new(mode: ScoringMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ScoringMode {
        self.mode
    }

    /// Score one response. Always returns an integer score in [0, 100] and
    /// its tier.
    pub fn score(
        &self,
        analysis: &AnalysisPayload,
        answers: &HashMap<String, Value>,
    ) -> LeadScore {
        match (self.mode, &analysis.dimensions) {
            (ScoringMode::MultiDimensional, Some(signals)) => {
                self.score_weighted(signals, analysis.industry.as_deref(), answers)
            }
            _ => self.score_heuristic(analysis, answers),
        }
    }

    fn score_weighted(
        &self,
        signals: &DimensionSignals,
        industry: Option<&str>,
        answers: &HashMap<String, Value>,
    ) -> LeadScore {
        let dimensions = compute_dimensions(signals, answers);
        let weights = weights_for(industry);

        let weighted_sum = dimensions.technical_readiness * weights.technical_readiness
            + dimensions.business_impact * weights.business_impact
            + dimensions.financial_capacity * weights.financial_capacity
            + dimensions.urgency * weights.urgency
            + dimensions.decision_authority * weights.decision_authority
            + dimensions.implementation_simplicity * weights.implementation_simplicity;

        let score = weighted_sum.clamp(0.0, 100.0).round() as u8;

        LeadScore {
            score,
            tier: Tier::from_score(score),
            dimensions: Some(dimensions),
        }
    }

    fn score_heuristic(
        &self,
        analysis: &AnalysisPayload,
        answers: &HashMap<String, Value>,
    ) -> LeadScore {
        let quality = analysis
            .quality_score
            .filter(|q| q.is_finite())
            .unwrap_or(0.0)
            .clamp(0.0, 100.0);
        let base = quality * 0.7;

        // Content-richness bonuses: breadth, depth, and reachability.
        let answered_bonus = (answers.len().min(8) * 2) as f64;
        let total_text: usize = answers
            .values()
            .filter_map(|v| v.as_str())
            .map(|s| s.len())
            .sum();
        let depth_bonus = ((total_text / 80).min(9)) as f64;
        let contact_bonus = if answers.keys().any(|k| k.contains("email")) {
            5.0
        } else {
            0.0
        };

        let score = (base + answered_bonus + depth_bonus + contact_bonus)
            .clamp(0.0, 100.0)
            .round() as u8;

        LeadScore {
            score,
            tier: Tier::from_score(score),
            dimensions: None,
        }
    }
}
