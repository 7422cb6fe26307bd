//! Workflow Runner
//!
//! Drives one workflow definition over one execution context: resolves the
//! declared step order, applies conditional gating and the budget guard,
//! invokes each step, and merges results into the context.
//!
//! The failure policy is centralized here, not in step authors: most
//! failures are soft and the run continues; only a Validate verdict or a
//! fatal-kind failure ends the run early.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::budget::{BudgetLedger, Reservation};
use crate::metrics;
use crate::workflow::{
    conditions, conditions::Decision, ExecutionContext, RunState, SkipReason, StepExecutor,
    StepKind, StepResult, WorkflowDefinition,
};
use crate::{Error, Result};

/// Final output of a run: the terminal state plus the full context.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunState,
    pub context: ExecutionContext,
    /// Validation message on `HaltedByValidation`, failure message on
    /// `AbortedByError`, `None` on `Completed`.
    pub halt_detail: Option<String>,
}

pub struct WorkflowRunner {
    executor: StepExecutor,
    budget: Arc<dyn BudgetLedger>,
}

impl WorkflowRunner {
    pub fn new(executor: StepExecutor, budget: Arc<dyn BudgetLedger>) -> Self {
        Self { executor, budget }
    }

    /// Execute every step of the definition in declared order. Returns
    /// `Err` only for definition-level problems detected before any step
    /// runs; step-level outcomes are always delivered inside the report.
    pub async fn run(
        &self,
        definition: &WorkflowDefinition,
        mut context: ExecutionContext,
    ) -> Result<RunReport> {
        validate_inputs(definition, &context)?;

        let mut state = RunState::Pending;
        info!(
            workflow = definition.name(),
            run_id = %context.run_id(),
            tenant = context.tenant_id(),
            total_steps = definition.len(),
            state = %state,
            "Starting workflow run"
        );
        state = RunState::Running;
        metrics::WORKFLOW_RUNS_TOTAL.inc();

        let mut halt_detail = None;

        for (idx, spec) in definition.steps().iter().enumerate() {
            info!(
                workflow = definition.name(),
                step = %spec.name,
                position = idx + 1,
                total = definition.len(),
                "Evaluating step"
            );

            match conditions::evaluate(spec, &context) {
                Decision::Run => {}
                Decision::SkipDueToPredicate => {
                    context.insert(&spec.name, StepResult::skipped(SkipReason::PredicateFalse))?;
                    metrics::STEPS_SKIPPED_TOTAL.inc();
                    continue;
                }
                Decision::SkipDueToUpstreamFailure => {
                    let upstream = spec
                        .run_when
                        .as_ref()
                        .map(|gate| gate.step.clone())
                        .unwrap_or_default();
                    context.insert(
                        &spec.name,
                        StepResult::skipped(SkipReason::UpstreamFailed { step: upstream }),
                    )?;
                    metrics::STEPS_SKIPPED_TOTAL.inc();
                    continue;
                }
            }

            // Cost-bearing steps must clear the budget guard before they run.
            let mut reserved_cents = None;
            if let Some(estimate) = spec.estimated_cost_cents() {
                match self.budget.reserve(context.tenant_id(), estimate).await? {
                    Reservation::Granted => reserved_cents = Some(estimate),
                    Reservation::Denied => {
                        info!(
                            step = %spec.name,
                            tenant = context.tenant_id(),
                            estimate_cents = estimate,
                            "Budget denied, skipping step"
                        );
                        context
                            .insert(&spec.name, StepResult::skipped(SkipReason::BudgetExhausted))?;
                        metrics::BUDGET_DENIALS_TOTAL.inc();
                        metrics::STEPS_SKIPPED_TOTAL.inc();
                        continue;
                    }
                }
            }

            let execution = self.executor.execute_step(spec, &context).await;
            metrics::STEPS_EXECUTED_TOTAL.inc();

            if let Some(estimate) = reserved_cents {
                if execution.result.is_success() {
                    let actual = execution.actual_cost_cents.unwrap_or(estimate);
                    self.budget
                        .commit(
                            context.tenant_id(),
                            context.run_id(),
                            &spec.name,
                            estimate,
                            actual,
                        )
                        .await?;
                } else {
                    self.budget.release(context.tenant_id(), estimate).await?;
                }
            }

            if let StepResult::Success { data } = &execution.result {
                for output in &spec.outputs {
                    if data.get(output).is_none() {
                        warn!(
                            step = %spec.name,
                            output = %output,
                            "Declared output missing from step payload"
                        );
                    }
                }
            }

            let verdict = if spec.kind() == StepKind::Validate {
                validation_halt(&execution.result)
            } else {
                None
            };
            let fatal_message = match &execution.result {
                StepResult::Failure { kind, message, .. } if kind.is_fatal() => {
                    Some(message.clone())
                }
                _ => None,
            };
            if let StepResult::Failure { kind, message, .. } = &execution.result {
                warn!(
                    step = %spec.name,
                    kind = %kind,
                    error = %message,
                    duration_ms = execution.duration_ms,
                    "Step failed"
                );
            }

            context.insert(&spec.name, execution.result)?;

            if let Some(detail) = verdict {
                info!(
                    workflow = definition.name(),
                    step = %spec.name,
                    detail = %detail,
                    "Validation halted the run"
                );
                state = RunState::HaltedByValidation;
                halt_detail = Some(detail);
                break;
            }

            if let Some(message) = fatal_message {
                error!(
                    workflow = definition.name(),
                    step = %spec.name,
                    error = %message,
                    "Fatal failure aborted the run"
                );
                state = RunState::AbortedByError;
                halt_detail = Some(message);
                break;
            }
        }

        if !state.is_terminal() {
            state = RunState::Completed;
        }

        info!(
            workflow = definition.name(),
            run_id = %context.run_id(),
            outcome = %state,
            steps_evaluated = context.len(),
            "Workflow run finished"
        );

        Ok(RunReport {
            outcome: state,
            context,
            halt_detail,
        })
    }
}

/// Declared inputs must be satisfied by run-seed data or a prior step's
/// output; checked before any step executes.
fn validate_inputs(definition: &WorkflowDefinition, ctx: &ExecutionContext) -> Result<()> {
    let mut available: HashSet<&str> = ctx.input_names().collect();

    for spec in definition.steps() {
        for input in &spec.inputs {
            if !available.contains(input.as_str()) {
                return Err(Error::Definition(format!(
                    "step '{}' declares input '{}' that is satisfied by neither seed data nor a prior step",
                    spec.name, input
                )));
            }
        }
        available.insert(spec.name.as_str());
    }

    Ok(())
}

/// A Validate step halts the run when it fails outright or reports
/// `valid: false`. A missing verdict counts as a halt: a gate that cannot
/// decide must not wave the run through.
fn validation_halt(result: &StepResult) -> Option<String> {
    match result {
        StepResult::Failure { message, .. } => Some(message.clone()),
        StepResult::Success { data } => match data.get("valid").and_then(|v| v.as_bool()) {
            Some(true) => None,
            Some(false) => Some(
                data.get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("validation failed")
                    .to_string(),
            ),
            None => Some("validation step returned no verdict".to_string()),
        },
        StepResult::Skipped { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::InMemoryLedger;
    use crate::llm::MockProvider;
    use crate::sinks::RecordingSink;
    use crate::workflow::{FailureKind, FnHandler, StepSpec};
    use serde_json::json;
    use std::collections::HashMap;

    fn runner() -> WorkflowRunner {
        WorkflowRunner::new(
            StepExecutor::new(Arc::new(MockProvider), Arc::new(RecordingSink::new())),
            Arc::new(InMemoryLedger::new(1_000)),
        )
    }

    #[tokio::test]
    async fn unsatisfied_input_fails_before_any_step() {
        let definition = WorkflowDefinition::builder("test")
            .step(
                StepSpec::task(
                    "needs_input",
                    Arc::new(FnHandler(|_ctx: &ExecutionContext| Ok(json!(1)))),
                )
                .with_inputs(&["missing_key"]),
            )
            .build()
            .unwrap();

        let err = runner()
            .run(&definition, ExecutionContext::new("tenant-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Definition(msg) if msg.contains("missing_key")));
    }

    #[tokio::test]
    async fn prior_step_output_satisfies_input() {
        let definition = WorkflowDefinition::builder("test")
            .step(StepSpec::task(
                "produce",
                Arc::new(FnHandler(|_ctx: &ExecutionContext| Ok(json!(1)))),
            ))
            .step(
                StepSpec::task(
                    "consume",
                    Arc::new(FnHandler(|ctx: &ExecutionContext| {
                        Ok(ctx.get("produce").and_then(|r| r.data()).cloned().unwrap_or(json!(null)))
                    })),
                )
                .with_inputs(&["produce"]),
            )
            .build()
            .unwrap();

        let report = runner()
            .run(&definition, ExecutionContext::new("tenant-1"))
            .await
            .unwrap();
        assert_eq!(report.outcome, RunState::Completed);
    }

    #[tokio::test]
    async fn soft_failure_does_not_end_run() {
        let definition = WorkflowDefinition::builder("test")
            .step(StepSpec::task(
                "fails",
                Arc::new(FnHandler(|_ctx: &ExecutionContext| {
                    Err(crate::workflow::StepError::not_found("gone"))
                })),
            ))
            .step(StepSpec::task(
                "still_runs",
                Arc::new(FnHandler(|_ctx: &ExecutionContext| Ok(json!("done")))),
            ))
            .build()
            .unwrap();

        let report = runner()
            .run(&definition, ExecutionContext::new("tenant-1"))
            .await
            .unwrap();

        assert_eq!(report.outcome, RunState::Completed);
        assert!(report.context.get("fails").unwrap().is_failure());
        assert!(report.context.get("still_runs").unwrap().is_success());
    }

    #[tokio::test]
    async fn fatal_failure_aborts_run() {
        let definition = WorkflowDefinition::builder("test")
            .step(StepSpec::task(
                "fatal",
                Arc::new(FnHandler(|_ctx: &ExecutionContext| {
                    Err(crate::workflow::StepError::fatal("config torched"))
                })),
            ))
            .step(StepSpec::task(
                "never_runs",
                Arc::new(FnHandler(|_ctx: &ExecutionContext| Ok(json!("unreachable")))),
            ))
            .build()
            .unwrap();

        let report = runner()
            .run(&definition, ExecutionContext::new("tenant-1"))
            .await
            .unwrap();

        assert_eq!(report.outcome, RunState::AbortedByError);
        assert_eq!(report.halt_detail.as_deref(), Some("config torched"));
        assert!(report.context.get("never_runs").is_none());
    }

    #[tokio::test]
    async fn validate_without_verdict_halts() {
        let definition = WorkflowDefinition::builder("test")
            .step(StepSpec::validate(
                "gate",
                Arc::new(FnHandler(|_ctx: &ExecutionContext| Ok(json!({"note": "no flag"})))),
            ))
            .build()
            .unwrap();

        let report = runner()
            .run(&definition, ExecutionContext::new("tenant-1"))
            .await
            .unwrap();
        assert_eq!(report.outcome, RunState::HaltedByValidation);
    }

    #[tokio::test]
    async fn validate_failure_kind_halts_too() {
        let definition = WorkflowDefinition::builder("test")
            .step(StepSpec::validate(
                "gate",
                Arc::new(FnHandler(|_ctx: &ExecutionContext| {
                    Err(crate::workflow::StepError::database("lookup failed"))
                })),
            ))
            .build()
            .unwrap();

        let report = runner()
            .run(&definition, ExecutionContext::new("tenant-1"))
            .await
            .unwrap();
        assert_eq!(report.outcome, RunState::HaltedByValidation);
        assert_eq!(report.halt_detail.as_deref(), Some("lookup failed"));
        assert_eq!(
            report.context.get("gate").unwrap().failure_kind(),
            Some(FailureKind::Database)
        );
    }

    #[tokio::test]
    async fn seed_inputs_reach_handlers() {
        let mut seed = HashMap::new();
        seed.insert("a".to_string(), json!(2));
        seed.insert("b".to_string(), json!(3));

        let definition = WorkflowDefinition::builder("test")
            .step(
                StepSpec::task(
                    "sum",
                    Arc::new(FnHandler(|ctx: &ExecutionContext| {
                        let a = ctx.input("a").and_then(|v| v.as_i64()).unwrap_or(0);
                        let b = ctx.input("b").and_then(|v| v.as_i64()).unwrap_or(0);
                        Ok(json!(a + b))
                    })),
                )
                .with_inputs(&["a", "b"]),
            )
            .build()
            .unwrap();

        let report = runner()
            .run(&definition, ExecutionContext::with_seed("tenant-1", seed))
            .await
            .unwrap();

        assert_eq!(report.outcome, RunState::Completed);
        assert_eq!(report.context.get("sum").unwrap().data().unwrap(), &json!(5));
    }
}
