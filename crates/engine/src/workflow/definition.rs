//! Workflow and step definitions.
//!
//! A `WorkflowDefinition` is an immutable, ordered list of `StepSpec`s built
//! once per workflow type and handed to the runner. Predicates and handlers
//! are first-class function values stored on the spec, not re-parsed at run
//! time.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::CompletionOptions;
use crate::workflow::{ExecutionContext, StepError};
use crate::{Error, Result};

/// Read-only predicate over the context, deciding whether a step runs.
pub type Predicate = Arc<dyn Fn(&ExecutionContext) -> bool + Send + Sync>;

/// Secondary predicate over an upstream step's success payload.
pub type PayloadPredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Handler for Task and Validate steps.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(&self, ctx: &ExecutionContext) -> std::result::Result<Value, StepError>;
}

/// Adapter turning a synchronous closure into a `TaskHandler`.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> TaskHandler for FnHandler<F>
where
    F: Fn(&ExecutionContext) -> std::result::Result<Value, StepError> + Send + Sync,
{
    async fn run(&self, ctx: &ExecutionContext) -> std::result::Result<Value, StepError> {
        (self.0)(ctx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Task,
    Validate,
    LlmCall,
    Stream,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Task => write!(f, "task"),
            StepKind::Validate => write!(f, "validate"),
            StepKind::LlmCall => write!(f, "llm_call"),
            StepKind::Stream => write!(f, "stream"),
        }
    }
}

/// `run_when` gate: execute only if the named earlier step succeeded, with
/// an optional acceptance predicate over its success payload.
#[derive(Clone)]
pub struct UpstreamGate {
    pub step: String,
    pub accept: Option<PayloadPredicate>,
}

/// Generative-model call definition. The prompt is a tera template rendered
/// over the context snapshot.
#[derive(Debug, Clone)]
pub struct LlmCallSpec {
    pub prompt: String,
    pub options: CompletionOptions,
    pub estimated_cost_cents: i64,
}

/// UI-push definition. `template == None` publishes the raw context
/// snapshot; the target may itself contain template variables.
#[derive(Debug, Clone)]
pub struct StreamSpec {
    pub target: String,
    pub template: Option<String>,
}

/// What a step actually does when invoked.
#[derive(Clone)]
pub enum StepAction {
    Task(Arc<dyn TaskHandler>),
    Validate(Arc<dyn TaskHandler>),
    LlmCall(LlmCallSpec),
    Stream(StreamSpec),
}

/// Static definition of one step within a workflow.
#[derive(Clone)]
pub struct StepSpec {
    pub name: String,
    /// Names this step reads: satisfied by run-seed data or a prior step.
    pub inputs: Vec<String>,
    /// Top-level keys the success payload declares. Checked after each
    /// successful invocation; a missing key is reported, not fatal.
    pub outputs: Vec<String>,
    pub run_if: Option<Predicate>,
    pub run_when: Option<UpstreamGate>,
    pub action: StepAction,
}

impl StepSpec {
    pub fn task(name: impl Into<String>, handler: Arc<dyn TaskHandler>) -> Self {
        Self::with_action(name, StepAction::Task(handler))
    }

    pub fn validate(name: impl Into<String>, handler: Arc<dyn TaskHandler>) -> Self {
        Self::with_action(name, StepAction::Validate(handler))
    }

    pub fn llm_call(name: impl Into<String>, call: LlmCallSpec) -> Self {
        Self::with_action(name, StepAction::LlmCall(call))
    }

    pub fn stream(name: impl Into<String>, stream: StreamSpec) -> Self {
        Self::with_action(name, StepAction::Stream(stream))
    }

    fn with_action(name: impl Into<String>, action: StepAction) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            run_if: None,
            run_when: None,
            action,
        }
    }

    pub fn with_inputs(mut self, inputs: &[&str]) -> Self {
        self.inputs = inputs.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_outputs(mut self, outputs: &[&str]) -> Self {
        self.outputs = outputs.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_run_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ExecutionContext) -> bool + Send + Sync + 'static,
    {
        self.run_if = Some(Arc::new(predicate));
        self
    }

    pub fn with_run_when(mut self, step: impl Into<String>) -> Self {
        self.run_when = Some(UpstreamGate {
            step: step.into(),
            accept: None,
        });
        self
    }

    pub fn with_run_when_accept<F>(mut self, step: impl Into<String>, accept: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.run_when = Some(UpstreamGate {
            step: step.into(),
            accept: Some(Arc::new(accept)),
        });
        self
    }

    pub fn kind(&self) -> StepKind {
        match &self.action {
            StepAction::Task(_) => StepKind::Task,
            StepAction::Validate(_) => StepKind::Validate,
            StepAction::LlmCall(_) => StepKind::LlmCall,
            StepAction::Stream(_) => StepKind::Stream,
        }
    }

    /// Estimated cost for cost-bearing steps, None otherwise.
    pub fn estimated_cost_cents(&self) -> Option<i64> {
        match &self.action {
            StepAction::LlmCall(call) => Some(call.estimated_cost_cents),
            _ => None,
        }
    }
}

// Handlers and predicates are opaque; show the structural fields only.
impl fmt::Debug for StepSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepSpec")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("has_run_if", &self.run_if.is_some())
            .field("run_when", &self.run_when.as_ref().map(|g| g.step.as_str()))
            .finish()
    }
}

/// Immutable, ordered sequence of steps.
pub struct WorkflowDefinition {
    name: String,
    steps: Vec<StepSpec>,
}

impl WorkflowDefinition {
    pub fn builder(name: impl Into<String>) -> WorkflowDefinitionBuilder {
        WorkflowDefinitionBuilder {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[StepSpec] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Debug for WorkflowDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowDefinition")
            .field("name", &self.name)
            .field("steps", &self.steps)
            .finish()
    }
}

pub struct WorkflowDefinitionBuilder {
    name: String,
    steps: Vec<StepSpec>,
}

impl WorkflowDefinitionBuilder {
    pub fn step(mut self, spec: StepSpec) -> Self {
        self.steps.push(spec);
        self
    }

    /// Validate and freeze the definition. Checks: unique step names,
    /// `run_when` targets strictly earlier in declaration order (backward
    /// references only), positive estimated cost on every LlmCall step.
    pub fn build(self) -> Result<WorkflowDefinition> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.steps.len());

        for spec in &self.steps {
            if seen.contains(&spec.name.as_str()) {
                return Err(Error::Definition(format!(
                    "duplicate step name '{}' in workflow '{}'",
                    spec.name, self.name
                )));
            }

            if let Some(gate) = &spec.run_when {
                if !seen.contains(&gate.step.as_str()) {
                    return Err(Error::Definition(format!(
                        "step '{}' has run_when target '{}' that does not appear earlier in workflow '{}'",
                        spec.name, gate.step, self.name
                    )));
                }
            }

            if let Some(cost) = spec.estimated_cost_cents() {
                if cost <= 0 {
                    return Err(Error::Definition(format!(
                        "llm_call step '{}' must declare a positive estimated cost",
                        spec.name
                    )));
                }
            }

            seen.push(spec.name.as_str());
        }

        Ok(WorkflowDefinition {
            name: self.name,
            steps: self.steps,
        })
    }
}
