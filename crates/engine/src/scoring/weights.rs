//! Per-industry weight vectors.
//!
//! Each dimension is weighted 0.8–1.3 depending on the form owner's
//! industry; an unknown or missing industry uses the neutral vector.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndustryWeights {
    pub technical_readiness: f64,
    pub business_impact: f64,
    pub financial_capacity: f64,
    pub urgency: f64,
    pub decision_authority: f64,
    pub implementation_simplicity: f64,
}

pub const NEUTRAL: IndustryWeights = IndustryWeights {
    technical_readiness: 1.0,
    business_impact: 1.0,
    financial_capacity: 1.0,
    urgency: 1.0,
    decision_authority: 1.0,
    implementation_simplicity: 1.0,
};

const HEALTHCARE: IndustryWeights = IndustryWeights {
    technical_readiness: 0.8,
    business_impact: 1.3,
    financial_capacity: 1.1,
    urgency: 1.0,
    decision_authority: 1.2,
    implementation_simplicity: 0.9,
};

const FINANCE: IndustryWeights = IndustryWeights {
    technical_readiness: 1.1,
    business_impact: 1.2,
    financial_capacity: 1.3,
    urgency: 0.9,
    decision_authority: 1.1,
    implementation_simplicity: 0.8,
};

const RETAIL: IndustryWeights = IndustryWeights {
    technical_readiness: 0.9,
    business_impact: 1.1,
    financial_capacity: 0.8,
    urgency: 1.2,
    decision_authority: 0.9,
    implementation_simplicity: 1.3,
};

const TECHNOLOGY: IndustryWeights = IndustryWeights {
    technical_readiness: 1.3,
    business_impact: 1.0,
    financial_capacity: 0.9,
    urgency: 1.1,
    decision_authority: 0.8,
    implementation_simplicity: 1.2,
};

const MANUFACTURING: IndustryWeights = IndustryWeights {
    technical_readiness: 1.0,
    business_impact: 1.2,
    financial_capacity: 1.2,
    urgency: 0.8,
    decision_authority: 1.3,
    implementation_simplicity: 1.1,
};

/// Look up the weight vector for an industry name. Matching is
/// case-insensitive; unknown industries fall back to the neutral vector.
pub fn weights_for(industry: Option<&str>) -> IndustryWeights {
    match industry.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("healthcare") => HEALTHCARE,
        Some("finance") => FINANCE,
        Some("retail") => RETAIL,
        Some("technology") => TECHNOLOGY,
        Some("manufacturing") => MANUFACTURING,
        _ => NEUTRAL,
    }
}
