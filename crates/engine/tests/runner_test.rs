//! End-to-end engine scenarios: ordering, gating, budget interaction,
//! validation halts, and the full lead-qualification pipeline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use formflow_engine::budget::{BudgetLedger, InMemoryLedger};
use formflow_engine::llm::{
    CompletionOptions, CompletionResponse, LlmProvider, MockProvider, ResponseFormat,
};
use formflow_engine::pipelines::lead_qualification;
use formflow_engine::scoring::{LeadScoreCalculator, Tier};
use formflow_engine::sinks::RecordingSink;
use formflow_engine::store::{Form, FormResponse, InMemoryStore, Store};
use formflow_engine::workflow::{
    ExecutionContext, FailureKind, FnHandler, LlmCallSpec, RunState, SkipReason, StepError,
    StepExecutor, StepResult, StepSpec, StreamSpec, WorkflowDefinition,
    WorkflowRunner,
};

fn runner_with_ledger(ledger: Arc<InMemoryLedger>) -> WorkflowRunner {
    WorkflowRunner::new(
        StepExecutor::new(Arc::new(MockProvider), Arc::new(RecordingSink::new())),
        ledger,
    )
}

fn default_runner() -> WorkflowRunner {
    runner_with_ledger(Arc::new(InMemoryLedger::new(1_000)))
}

fn echo_sum_step() -> StepSpec {
    StepSpec::task(
        "echo",
        Arc::new(FnHandler(|ctx: &ExecutionContext| {
            let a = ctx.input("a").and_then(|v| v.as_i64()).unwrap_or(0);
            let b = ctx.input("b").and_then(|v| v.as_i64()).unwrap_or(0);
            Ok(json!(a + b))
        })),
    )
    .with_inputs(&["a", "b"])
}

#[tokio::test]
async fn seed_round_trip_produces_exactly_one_entry() {
    let definition = WorkflowDefinition::builder("echo")
        .step(echo_sum_step())
        .build()
        .unwrap();

    let mut seed = HashMap::new();
    seed.insert("a".to_string(), json!(19));
    seed.insert("b".to_string(), json!(23));

    let report = default_runner()
        .run(&definition, ExecutionContext::with_seed("tenant-1", seed))
        .await
        .unwrap();

    assert_eq!(report.outcome, RunState::Completed);
    assert_eq!(report.context.len(), 1);
    assert_eq!(
        report.context.get("echo").unwrap().data().unwrap(),
        &json!(42)
    );
    assert!(report.context.get("extra").is_none());
}

#[tokio::test]
async fn steps_execute_in_declared_order() {
    let trace: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    fn recording_step(name: &'static str, trace: Arc<Mutex<Vec<&'static str>>>) -> StepSpec {
        StepSpec::task(
            name,
            Arc::new(FnHandler(move |_ctx: &ExecutionContext| {
                trace.lock().unwrap().push(name);
                Ok(json!(name))
            })),
        )
    }

    let definition = WorkflowDefinition::builder("ordered")
        .step(recording_step("first", trace.clone()))
        .step(recording_step("second", trace.clone()))
        .step(recording_step("third", trace.clone()))
        .build()
        .unwrap();

    let report = default_runner()
        .run(&definition, ExecutionContext::new("tenant-1"))
        .await
        .unwrap();

    assert_eq!(report.outcome, RunState::Completed);
    assert_eq!(*trace.lock().unwrap(), vec!["first", "second", "third"]);
}

#[tokio::test]
async fn validation_failure_halts_before_later_step_bodies() {
    let side_effects = Arc::new(AtomicUsize::new(0));
    let counter = side_effects.clone();

    let definition = WorkflowDefinition::builder("gated")
        .step(StepSpec::validate(
            "gate",
            Arc::new(FnHandler(|_ctx: &ExecutionContext| {
                Ok(json!({"valid": false, "message": "missing consent checkbox"}))
            })),
        ))
        .step(StepSpec::task(
            "would_mutate",
            Arc::new(FnHandler(move |_ctx: &ExecutionContext| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!("mutated"))
            })),
        ))
        .build()
        .unwrap();

    let report = default_runner()
        .run(&definition, ExecutionContext::new("tenant-1"))
        .await
        .unwrap();

    assert_eq!(report.outcome, RunState::HaltedByValidation);
    assert_eq!(report.halt_detail.as_deref(), Some("missing consent checkbox"));
    assert_eq!(side_effects.load(Ordering::SeqCst), 0);
    assert!(report.context.get("would_mutate").is_none());
}

#[tokio::test]
async fn budget_denial_skips_llm_step_and_commits_nothing() {
    let ledger = Arc::new(InMemoryLedger::new(5));
    let runner = runner_with_ledger(ledger.clone());

    let definition = WorkflowDefinition::builder("expensive")
        .step(StepSpec::llm_call(
            "analyze",
            LlmCallSpec {
                prompt: "You are a lead analyst. Analyze the answers below.".into(),
                options: CompletionOptions {
                    response_format: ResponseFormat::Json,
                    ..Default::default()
                },
                estimated_cost_cents: 10,
            },
        ))
        .build()
        .unwrap();

    let report = runner
        .run(&definition, ExecutionContext::new("tenant-1"))
        .await
        .unwrap();

    assert_eq!(report.outcome, RunState::Completed);
    assert_eq!(
        report.context.get("analyze").unwrap(),
        &StepResult::skipped(SkipReason::BudgetExhausted)
    );
    assert!(ledger.entries("tenant-1").await.unwrap().is_empty());
    assert_eq!(ledger.remaining("tenant-1").await.unwrap(), 5);
}

#[tokio::test]
async fn granted_llm_step_commits_reported_actual_cost() {
    struct PricedProvider;

    #[async_trait]
    impl LlmProvider for PricedProvider {
        async fn complete(
            &self,
            _prompt: &str,
            _options: &CompletionOptions,
        ) -> anyhow::Result<CompletionResponse> {
            Ok(CompletionResponse {
                text: r#"{"quality_score": 66.0}"#.into(),
                cost_cents: Some(7),
            })
        }
    }

    let ledger = Arc::new(InMemoryLedger::new(100));
    let runner = WorkflowRunner::new(
        StepExecutor::new(Arc::new(PricedProvider), Arc::new(RecordingSink::new())),
        ledger.clone(),
    );

    let definition = WorkflowDefinition::builder("priced")
        .step(StepSpec::llm_call(
            "analyze",
            LlmCallSpec {
                prompt: "analyze".into(),
                options: CompletionOptions {
                    response_format: ResponseFormat::Json,
                    ..Default::default()
                },
                estimated_cost_cents: 10,
            },
        ))
        .build()
        .unwrap();

    let report = runner
        .run(&definition, ExecutionContext::new("tenant-1"))
        .await
        .unwrap();
    assert_eq!(report.outcome, RunState::Completed);

    // Reserved 10, trued-up to the provider-reported 7.
    let entries = ledger.entries("tenant-1").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount_cents, 7);
    assert_eq!(ledger.remaining("tenant-1").await.unwrap(), 93);
}

#[tokio::test]
async fn failed_llm_step_releases_reservation() {
    struct BrokenProvider;

    #[async_trait]
    impl LlmProvider for BrokenProvider {
        async fn complete(
            &self,
            _prompt: &str,
            _options: &CompletionOptions,
        ) -> anyhow::Result<CompletionResponse> {
            Err(anyhow::anyhow!("upstream 500"))
        }
    }

    let ledger = Arc::new(InMemoryLedger::new(100));
    let runner = WorkflowRunner::new(
        StepExecutor::new(Arc::new(BrokenProvider), Arc::new(RecordingSink::new())),
        ledger.clone(),
    );

    let definition = WorkflowDefinition::builder("broken")
        .step(StepSpec::llm_call(
            "analyze",
            LlmCallSpec {
                prompt: "analyze".into(),
                options: CompletionOptions::default(),
                estimated_cost_cents: 10,
            },
        ))
        .build()
        .unwrap();

    let report = runner
        .run(&definition, ExecutionContext::new("tenant-1"))
        .await
        .unwrap();

    assert_eq!(report.outcome, RunState::Completed);
    assert_eq!(
        report.context.get("analyze").unwrap().failure_kind(),
        Some(FailureKind::LlmError)
    );
    assert!(ledger.entries("tenant-1").await.unwrap().is_empty());
    assert_eq!(ledger.remaining("tenant-1").await.unwrap(), 100);
}

#[tokio::test]
async fn skip_propagates_transitively_through_run_when_chain() {
    let definition = WorkflowDefinition::builder("chain")
        .step(StepSpec::task(
            "fails",
            Arc::new(FnHandler(|_ctx: &ExecutionContext| {
                Err(StepError::not_found("record gone"))
            })),
        ))
        .step(StepSpec::task(
            "depends_on_failed",
            Arc::new(FnHandler(|_ctx: &ExecutionContext| Ok(json!("unreachable")))),
        )
        .with_run_when("fails"))
        .step(StepSpec::task(
            "depends_on_skipped",
            Arc::new(FnHandler(|_ctx: &ExecutionContext| Ok(json!("unreachable")))),
        )
        .with_run_when("depends_on_failed"))
        .step(StepSpec::task(
            "independent",
            Arc::new(FnHandler(|_ctx: &ExecutionContext| Ok(json!("ran")))),
        ))
        .build()
        .unwrap();

    let report = default_runner()
        .run(&definition, ExecutionContext::new("tenant-1"))
        .await
        .unwrap();

    assert_eq!(report.outcome, RunState::Completed);
    assert_eq!(
        report.context.get("depends_on_failed").unwrap(),
        &StepResult::skipped(SkipReason::UpstreamFailed {
            step: "fails".into()
        })
    );
    assert_eq!(
        report.context.get("depends_on_skipped").unwrap(),
        &StepResult::skipped(SkipReason::UpstreamFailed {
            step: "depends_on_failed".into()
        })
    );
    assert!(report.context.get("independent").unwrap().is_success());
}

#[tokio::test]
async fn stream_delivery_error_leaves_outcome_completed() {
    let sink = Arc::new(RecordingSink::failing());
    let runner = WorkflowRunner::new(
        StepExecutor::new(Arc::new(MockProvider), sink),
        Arc::new(InMemoryLedger::new(1_000)),
    );

    let definition = WorkflowDefinition::builder("streamy")
        .step(StepSpec::task(
            "compute",
            Arc::new(FnHandler(|_ctx: &ExecutionContext| Ok(json!(1)))),
        ))
        .step(StepSpec::stream(
            "notify",
            StreamSpec {
                target: "forms/updates".into(),
                template: None,
            },
        ))
        .build()
        .unwrap();

    let report = runner
        .run(&definition, ExecutionContext::new("tenant-1"))
        .await
        .unwrap();

    assert_eq!(report.outcome, RunState::Completed);
    let notify = report.context.get("notify").unwrap();
    assert!(notify.is_success());
    assert_eq!(notify.data().unwrap()["published"], false);
}

async fn seed_store() -> (Arc<InMemoryStore>, Uuid, Uuid) {
    let store = Arc::new(InMemoryStore::new());
    let form_id = Uuid::new_v4();
    let response_id = Uuid::new_v4();

    store
        .save_form(Form {
            id: form_id,
            tenant_id: "tenant-1".into(),
            name: "Clinic Intake".into(),
            industry: Some("healthcare".into()),
            published: true,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    let mut answers = HashMap::new();
    answers.insert("email".to_string(), json!("pat@clinic.example"));
    answers.insert("role".to_string(), json!("Director of Operations"));
    answers.insert("timeline".to_string(), json!("We need this ASAP"));
    answers.insert(
        "budget_range".to_string(),
        json!("$20k-50k annual"),
    );
    store
        .save_response(FormResponse {
            id: response_id,
            form_id,
            tenant_id: "tenant-1".into(),
            answers,
            completed: true,
            submitted_at: Utc::now(),
        })
        .await
        .unwrap();

    (store, response_id, form_id)
}

fn pipeline_seed(response_id: Uuid, form_id: Uuid) -> ExecutionContext {
    let mut seed = HashMap::new();
    seed.insert("response_id".to_string(), json!(response_id.to_string()));
    seed.insert("form_id".to_string(), json!(form_id.to_string()));
    ExecutionContext::with_seed("tenant-1", seed)
}

#[tokio::test]
async fn lead_qualification_pipeline_completes_and_persists() {
    let (store, response_id, form_id) = seed_store().await;
    let sink = Arc::new(RecordingSink::new());
    let ledger = Arc::new(InMemoryLedger::new(1_000));

    let runner = WorkflowRunner::new(
        StepExecutor::new(Arc::new(MockProvider), sink.clone()),
        ledger.clone(),
    );
    let definition = lead_qualification(
        store.clone() as Arc<dyn Store>,
        LeadScoreCalculator::default(),
    )
    .unwrap();

    let report = runner
        .run(&definition, pipeline_seed(response_id, form_id))
        .await
        .unwrap();

    assert_eq!(report.outcome, RunState::Completed);
    for step in [
        "load_response",
        "validate_response",
        "analyze_response",
        "score_lead",
        "save_lead",
        "draft_followup",
        "notify_ui",
    ] {
        assert!(
            report.context.get(step).unwrap().is_success(),
            "step {} did not succeed",
            step
        );
    }

    // The lead landed in the store with the analysis-driven score.
    let lead = store
        .get_lead_for_response(response_id)
        .await
        .unwrap()
        .expect("lead saved");
    assert!(lead.score > 0);
    assert_eq!(lead.form_id, form_id);
    assert!(lead.dimensions.is_some());

    // Both model calls were charged.
    assert_eq!(ledger.entries("tenant-1").await.unwrap().len(), 2);

    // The UI snapshot went out on the form's channel.
    let published = sink.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, format!("forms/{}/leads", form_id));
    assert_eq!(published[0].1["steps"]["save_lead"]["status"], "success");
}

#[tokio::test]
async fn pipeline_scores_heuristically_when_budget_blocks_analysis() {
    let (store, response_id, form_id) = seed_store().await;
    // Only enough for the follow-up, not the analysis.
    let ledger = Arc::new(InMemoryLedger::new(9));

    let runner = WorkflowRunner::new(
        StepExecutor::new(Arc::new(MockProvider), Arc::new(RecordingSink::new())),
        ledger.clone(),
    );
    let definition = lead_qualification(
        store.clone() as Arc<dyn Store>,
        LeadScoreCalculator::default(),
    )
    .unwrap();

    let report = runner
        .run(&definition, pipeline_seed(response_id, form_id))
        .await
        .unwrap();

    assert_eq!(report.outcome, RunState::Completed);
    assert_eq!(
        report.context.get("analyze_response").unwrap(),
        &StepResult::skipped(SkipReason::BudgetExhausted)
    );

    // Scoring degraded to the heuristic path and still saved a lead.
    let lead = store
        .get_lead_for_response(response_id)
        .await
        .unwrap()
        .expect("lead saved");
    assert!(lead.dimensions.is_none());
    assert_eq!(lead.tier, Tier::from_score(lead.score.clamp(0, 100) as u8));
}

#[tokio::test]
async fn pipeline_halts_on_incomplete_response() {
    let store = Arc::new(InMemoryStore::new());
    let form_id = Uuid::new_v4();
    let response_id = Uuid::new_v4();

    store
        .save_form(Form {
            id: form_id,
            tenant_id: "tenant-1".into(),
            name: "Clinic Intake".into(),
            industry: None,
            published: true,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    store
        .save_response(FormResponse {
            id: response_id,
            form_id,
            tenant_id: "tenant-1".into(),
            answers: HashMap::from([("email".to_string(), json!("a@b.c"))]),
            completed: false,
            submitted_at: Utc::now(),
        })
        .await
        .unwrap();

    let runner = WorkflowRunner::new(
        StepExecutor::new(Arc::new(MockProvider), Arc::new(RecordingSink::new())),
        Arc::new(InMemoryLedger::new(1_000)),
    );
    let definition = lead_qualification(
        store.clone() as Arc<dyn Store>,
        LeadScoreCalculator::default(),
    )
    .unwrap();

    let report = runner
        .run(&definition, pipeline_seed(response_id, form_id))
        .await
        .unwrap();

    assert_eq!(report.outcome, RunState::HaltedByValidation);
    assert_eq!(report.halt_detail.as_deref(), Some("response is not complete"));
    // Nothing after the gate ran.
    assert!(report.context.get("analyze_response").is_none());
    assert!(store
        .get_lead_for_response(response_id)
        .await
        .unwrap()
        .is_none());
}
