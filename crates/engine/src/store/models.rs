use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use uuid::Uuid;

use crate::scoring::Tier;

// Form definition owned by a tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    /// Industry the form owner operates in; drives scoring weights.
    pub industry: Option<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

// One submitted response to a form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormResponse {
    pub id: Uuid,
    pub form_id: Uuid,
    pub tenant_id: String,
    /// Field name to submitted value.
    pub answers: HashMap<String, JsonValue>,
    pub completed: bool,
    pub submitted_at: DateTime<Utc>,
}

// Scored lead produced by the qualification pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadRecord {
    pub id: Uuid,
    pub response_id: Uuid,
    pub form_id: Uuid,
    pub tenant_id: String,
    pub score: i32,
    pub tier: Tier,
    /// Clamped dimension sub-scores, when multi-dimensional mode ran.
    pub dimensions: Option<JsonValue>,
    /// Model-produced summary of the response, when analysis succeeded.
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
}
