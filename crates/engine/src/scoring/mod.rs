//! Lead scoring.
//!
//! A pure, deterministic function library with no dependency on the
//! workflow machinery. The calculator is exercised as one Task step by the
//! lead-qualification pipeline but is unit-testable entirely on its own.

pub mod calculator;
pub mod dimensions;
pub mod weights;

pub use calculator::{AnalysisPayload, LeadScoreCalculator, ScoringMode};
pub use dimensions::{compute_dimensions, DimensionScores, DimensionSignals};
pub use weights::{weights_for, IndustryWeights};

use serde::{Deserialize, Serialize};

/// Qualitative bucket derived from the numeric score. Boundaries are fixed:
/// hot >= 80, warm >= 60, lukewarm >= 40, cold below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Hot,
    Warm,
    Lukewarm,
    Cold,
}

impl Tier {
    pub fn from_score(score: u8) -> Self {
        if score >= 80 {
            Tier::Hot
        } else if score >= 60 {
            Tier::Warm
        } else if score >= 40 {
            Tier::Lukewarm
        } else {
            Tier::Cold
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Hot => "hot",
            Tier::Warm => "warm",
            Tier::Lukewarm => "lukewarm",
            Tier::Cold => "cold",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Tier {
    fn from(s: &str) -> Self {
        match s {
            "hot" => Tier::Hot,
            "warm" => Tier::Warm,
            "lukewarm" => Tier::Lukewarm,
            _ => Tier::Cold,
        }
    }
}

/// Final scoring output: an integer in [0, 100], its tier, and the clamped
/// dimension sub-scores when multi-dimensional mode ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadScore {
    pub score: u8,
    pub tier: Tier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<DimensionScores>,
}
