//! Lead qualification pipeline.
//!
//! The canonical "response completed" workflow: load the response and its
//! form, validate, analyze with the model, score, persist the lead, draft a
//! follow-up, and push a snapshot to the UI. Analysis and follow-up are
//! optional enrichment — if either soft-fails, the lead still gets scored
//! (heuristically) and saved.
//!
//! Seed inputs: `response_id` and `form_id`, both as strings.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::llm::{CompletionOptions, ResponseFormat};
use crate::scoring::{AnalysisPayload, LeadScoreCalculator};
use crate::store::{LeadRecord, Store};
use crate::workflow::{
    ExecutionContext, LlmCallSpec, StepError, StepSpec, StreamSpec, TaskHandler,
    WorkflowDefinition,
};
use crate::Result;

pub const ANALYZE_COST_CENTS: i64 = 12;
pub const FOLLOWUP_COST_CENTS: i64 = 8;

const ANALYZE_PROMPT: &str = "\
You are a lead analyst for a form-building platform.
Analyze the answers below and respond with a single JSON object with keys:
summary (string), quality_score (number 0-100), industry (string), and
dimensions (object with technical_readiness, business_impact,
financial_capacity, urgency, decision_authority and
implementation_simplicity, each a number between 0.0 and 1.0).

Form: {{ steps.load_response.data.form.name }}
Industry: {{ steps.load_response.data.form.industry }}
Answers: {{ steps.load_response.data.response.answers | json_encode() }}";

const FOLLOWUP_PROMPT: &str = "\
Draft a short, friendly follow-up note for this lead. Respond with plain
text only, two sentences at most.

Lead summary: {{ steps.score_lead.data.summary }}
Score: {{ steps.score_lead.data.score }} ({{ steps.score_lead.data.tier }})";

/// Build the lead-qualification workflow over the given store.
pub fn lead_qualification(
    store: Arc<dyn Store>,
    calculator: LeadScoreCalculator,
) -> Result<WorkflowDefinition> {
    WorkflowDefinition::builder("lead_qualification")
        .step(
            StepSpec::task("load_response", Arc::new(LoadResponse { store: store.clone() }))
                .with_inputs(&["response_id"])
                .with_outputs(&["response", "form"]),
        )
        .step(
            StepSpec::validate("validate_response", Arc::new(ValidateResponse))
                .with_run_when("load_response")
                .with_outputs(&["valid", "message"]),
        )
        .step(
            StepSpec::llm_call(
                "analyze_response",
                LlmCallSpec {
                    prompt: ANALYZE_PROMPT.to_string(),
                    options: CompletionOptions {
                        response_format: ResponseFormat::Json,
                        ..Default::default()
                    },
                    estimated_cost_cents: ANALYZE_COST_CENTS,
                },
            )
            .with_run_when("validate_response"),
        )
        .step(
            StepSpec::task("score_lead", Arc::new(ScoreLead { calculator }))
                .with_run_when("load_response")
                .with_outputs(&["score", "tier", "dimensions", "summary"]),
        )
        .step(
            StepSpec::task("save_lead", Arc::new(SaveLead { store }))
                .with_run_when("score_lead")
                .with_outputs(&["lead_id"]),
        )
        .step(
            StepSpec::llm_call(
                "draft_followup",
                LlmCallSpec {
                    prompt: FOLLOWUP_PROMPT.to_string(),
                    options: CompletionOptions {
                        response_format: ResponseFormat::Text,
                        ..Default::default()
                    },
                    estimated_cost_cents: FOLLOWUP_COST_CENTS,
                },
            )
            .with_run_when("score_lead"),
        )
        .step(
            StepSpec::stream(
                "notify_ui",
                StreamSpec {
                    target: "forms/{{ inputs.form_id }}/leads".to_string(),
                    template: None,
                },
            )
            .with_inputs(&["form_id"]),
        )
        .build()
}

/// Loads the response and its owning form into the context.
struct LoadResponse {
    store: Arc<dyn Store>,
}

#[async_trait]
impl TaskHandler for LoadResponse {
    async fn run(&self, ctx: &ExecutionContext) -> std::result::Result<Value, StepError> {
        let response_id = seed_uuid(ctx, "response_id")?;

        let response = self
            .store
            .get_response(response_id)
            .await
            .map_err(|e| StepError::database(e.to_string()))?
            .ok_or_else(|| StepError::not_found(format!("response {} not found", response_id)))?;

        let form = self
            .store
            .get_form(response.form_id)
            .await
            .map_err(|e| StepError::database(e.to_string()))?
            .ok_or_else(|| {
                StepError::not_found(format!("form {} not found", response.form_id))
            })?;

        Ok(json!({
            "response": response,
            "form": form,
        }))
    }
}

/// Gate: an unpublished form or an empty/incomplete response never reaches
/// the model or the lead table.
struct ValidateResponse;

#[async_trait]
impl TaskHandler for ValidateResponse {
    async fn run(&self, ctx: &ExecutionContext) -> std::result::Result<Value, StepError> {
        let data = upstream_data(ctx, "load_response")?;

        let published = data["form"]["published"].as_bool().unwrap_or(false);
        let completed = data["response"]["completed"].as_bool().unwrap_or(false);
        let has_answers = data["response"]["answers"]
            .as_object()
            .map(|answers| !answers.is_empty())
            .unwrap_or(false);

        let (valid, message) = if !published {
            (false, "form is not published")
        } else if !completed {
            (false, "response is not complete")
        } else if !has_answers {
            (false, "response has no answers")
        } else {
            (true, "response accepted")
        };

        Ok(json!({ "valid": valid, "message": message }))
    }
}

/// Scores the lead. Uses the model analysis when the analyze step
/// succeeded; degrades to the heuristic path when it soft-failed, was
/// skipped, or produced an unusable payload.
struct ScoreLead {
    calculator: LeadScoreCalculator,
}

#[async_trait]
impl TaskHandler for ScoreLead {
    async fn run(&self, ctx: &ExecutionContext) -> std::result::Result<Value, StepError> {
        let loaded = upstream_data(ctx, "load_response")?;
        let answers: HashMap<String, Value> =
            serde_json::from_value(loaded["response"]["answers"].clone())
                .map_err(|e| StepError::unexpected(format!("answers not readable: {}", e)))?;

        let mut analysis = ctx
            .get("analyze_response")
            .and_then(|result| result.data())
            .and_then(|data| serde_json::from_value::<AnalysisPayload>(data.clone()).ok())
            .unwrap_or_default();

        // The form owner's industry wins over whatever the model guessed.
        if let Some(industry) = loaded["form"]["industry"].as_str() {
            analysis.industry = Some(industry.to_string());
        }

        let summary = analysis.summary.clone().unwrap_or_default();
        let lead = self.calculator.score(&analysis, &answers);

        Ok(json!({
            "score": lead.score,
            "tier": lead.tier,
            "dimensions": lead.dimensions,
            "summary": summary,
        }))
    }
}

/// Persists the scored lead. Saving twice for the same response is
/// harmless: retried runs overwrite with identical data.
struct SaveLead {
    store: Arc<dyn Store>,
}

#[async_trait]
impl TaskHandler for SaveLead {
    async fn run(&self, ctx: &ExecutionContext) -> std::result::Result<Value, StepError> {
        let loaded = upstream_data(ctx, "load_response")?;
        let scored = upstream_data(ctx, "score_lead")?;

        let response_id = value_uuid(&loaded["response"]["id"])?;
        let form_id = value_uuid(&loaded["response"]["form_id"])?;

        let score = scored["score"].as_i64().unwrap_or(0) as i32;
        let lead = LeadRecord {
            // Deterministic per response, so a retried run updates rather
            // than duplicates.
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, response_id.as_bytes()),
            response_id,
            form_id,
            tenant_id: ctx.tenant_id().to_string(),
            score,
            tier: crate::scoring::Tier::from_score(score.clamp(0, 100) as u8),
            dimensions: scored.get("dimensions").filter(|d| !d.is_null()).cloned(),
            summary: scored["summary"].as_str().filter(|s| !s.is_empty()).map(String::from),
            created_at: Utc::now(),
        };
        let lead_id = lead.id;

        self.store
            .save_lead(lead)
            .await
            .map_err(|e| StepError::database(e.to_string()))?;

        Ok(json!({ "lead_id": lead_id }))
    }
}

fn seed_uuid(ctx: &ExecutionContext, name: &str) -> std::result::Result<Uuid, StepError> {
    let raw = ctx
        .input(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| StepError::unexpected(format!("seed input '{}' missing or not a string", name)))?;
    raw.parse()
        .map_err(|e| StepError::unexpected(format!("seed input '{}' is not a UUID: {}", name, e)))
}

fn value_uuid(value: &Value) -> std::result::Result<Uuid, StepError> {
    value
        .as_str()
        .ok_or_else(|| StepError::unexpected("expected a UUID string"))?
        .parse()
        .map_err(|e| StepError::unexpected(format!("malformed UUID: {}", e)))
}

fn upstream_data<'a>(
    ctx: &'a ExecutionContext,
    step: &str,
) -> std::result::Result<&'a Value, StepError> {
    ctx.get(step)
        .and_then(|result| result.data())
        .ok_or_else(|| StepError::unexpected(format!("no successful '{}' result in context", step)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ScoringMode;
    use crate::store::{Form, FormResponse, InMemoryStore};
    use crate::workflow::StepResult;

    fn seeded_context(response_id: Uuid, form_id: Uuid) -> ExecutionContext {
        let mut seed = HashMap::new();
        seed.insert("response_id".to_string(), json!(response_id.to_string()));
        seed.insert("form_id".to_string(), json!(form_id.to_string()));
        ExecutionContext::with_seed("tenant-1", seed)
    }

    async fn store_with_records(published: bool, completed: bool) -> (Arc<InMemoryStore>, Uuid, Uuid) {
        let store = Arc::new(InMemoryStore::new());
        let form_id = Uuid::new_v4();
        let response_id = Uuid::new_v4();

        store
            .save_form(Form {
                id: form_id,
                tenant_id: "tenant-1".into(),
                name: "Demo Request".into(),
                industry: Some("healthcare".into()),
                published,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let mut answers = HashMap::new();
        answers.insert("email".to_string(), json!("pat@clinic.example"));
        answers.insert("role".to_string(), json!("Director of Operations"));
        store
            .save_response(FormResponse {
                id: response_id,
                form_id,
                tenant_id: "tenant-1".into(),
                answers,
                completed,
                submitted_at: Utc::now(),
            })
            .await
            .unwrap();

        (store, response_id, form_id)
    }

    #[tokio::test]
    async fn load_response_returns_response_and_form() {
        let (store, response_id, form_id) = store_with_records(true, true).await;
        let ctx = seeded_context(response_id, form_id);

        let handler = LoadResponse { store };
        let data = handler.run(&ctx).await.unwrap();

        assert_eq!(data["response"]["id"], response_id.to_string());
        assert_eq!(data["form"]["name"], "Demo Request");
    }

    #[tokio::test]
    async fn load_response_reports_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = seeded_context(Uuid::new_v4(), Uuid::new_v4());

        let handler = LoadResponse { store };
        let err = handler.run(&ctx).await.unwrap_err();
        assert_eq!(err.kind, crate::workflow::FailureKind::NotFound);
    }

    #[tokio::test]
    async fn validate_rejects_unpublished_form() {
        let (store, response_id, form_id) = store_with_records(false, true).await;
        let mut ctx = seeded_context(response_id, form_id);

        let loaded = LoadResponse { store }.run(&ctx).await.unwrap();
        ctx.insert("load_response", StepResult::success(loaded)).unwrap();

        let verdict = ValidateResponse.run(&ctx).await.unwrap();
        assert_eq!(verdict["valid"], false);
        assert_eq!(verdict["message"], "form is not published");
    }

    #[tokio::test]
    async fn validate_accepts_complete_response() {
        let (store, response_id, form_id) = store_with_records(true, true).await;
        let mut ctx = seeded_context(response_id, form_id);

        let loaded = LoadResponse { store }.run(&ctx).await.unwrap();
        ctx.insert("load_response", StepResult::success(loaded)).unwrap();

        let verdict = ValidateResponse.run(&ctx).await.unwrap();
        assert_eq!(verdict["valid"], true);
    }

    #[tokio::test]
    async fn score_lead_degrades_without_analysis() {
        let (store, response_id, form_id) = store_with_records(true, true).await;
        let mut ctx = seeded_context(response_id, form_id);

        let loaded = LoadResponse { store }.run(&ctx).await.unwrap();
        ctx.insert("load_response", StepResult::success(loaded)).unwrap();
        ctx.insert(
            "analyze_response",
            StepResult::failure(crate::workflow::FailureKind::LlmTimeout, "slow model"),
        )
        .unwrap();

        let handler = ScoreLead {
            calculator: LeadScoreCalculator::new(ScoringMode::MultiDimensional),
        };
        let scored = handler.run(&ctx).await.unwrap();

        // Heuristic fallback: no dimensions, score still an integer.
        assert!(scored["dimensions"].is_null());
        assert!(scored["score"].as_u64().unwrap() <= 100);
    }

    #[test]
    fn definition_builds_cleanly() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let definition = lead_qualification(store, LeadScoreCalculator::default()).unwrap();
        assert_eq!(definition.name(), "lead_qualification");
        assert_eq!(definition.len(), 7);
    }
}
