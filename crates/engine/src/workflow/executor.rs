//! Step execution.
//!
//! One invocation in, exactly one `StepResult` out. Handler errors and
//! panics are converted at this boundary; nothing a step body does can
//! escape into the runner as an unhandled fault.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde_json::json;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::llm::{output, LlmProvider, ResponseFormat};
use crate::sinks::ChannelSink;
use crate::template::render_template;
use crate::workflow::{
    ExecutionContext, FailureKind, LlmCallSpec, StepAction, StepResult, StepSpec, StreamSpec,
    TaskHandler,
};

/// A completed invocation: the result plus execution metadata the runner
/// needs (actual LLM cost for budget true-up, duration for tracing).
#[derive(Debug, Clone)]
pub struct StepExecution {
    pub result: StepResult,
    pub actual_cost_cents: Option<i64>,
    pub duration_ms: u64,
}

pub struct StepExecutor {
    llm: Arc<dyn LlmProvider>,
    sink: Arc<dyn ChannelSink>,
    llm_timeout: Duration,
    publish_timeout: Duration,
}

impl StepExecutor {
    pub fn new(llm: Arc<dyn LlmProvider>, sink: Arc<dyn ChannelSink>) -> Self {
        Self {
            llm,
            sink,
            llm_timeout: Duration::from_secs(60),
            publish_timeout: Duration::from_millis(1500),
        }
    }

    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub async fn execute_step(&self, spec: &StepSpec, ctx: &ExecutionContext) -> StepExecution {
        info!(step = %spec.name, kind = %spec.kind(), "Executing step");
        let start = Instant::now();

        let (result, actual_cost_cents) = match &spec.action {
            StepAction::Task(handler) | StepAction::Validate(handler) => {
                (self.execute_task(&spec.name, handler.as_ref(), ctx).await, None)
            }
            StepAction::LlmCall(call) => self.execute_llm_call(&spec.name, call, ctx).await,
            StepAction::Stream(stream) => {
                (self.execute_stream(&spec.name, stream, ctx).await, None)
            }
        };

        StepExecution {
            result,
            actual_cost_cents,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn execute_task(
        &self,
        name: &str,
        handler: &dyn TaskHandler,
        ctx: &ExecutionContext,
    ) -> StepResult {
        match std::panic::AssertUnwindSafe(handler.run(ctx))
            .catch_unwind()
            .await
        {
            Ok(Ok(data)) => StepResult::success(data),
            Ok(Err(step_error)) => {
                warn!(step = name, kind = %step_error.kind, error = %step_error.message, "Step failed");
                step_error.into()
            }
            Err(panic) => {
                let message = panic_message(panic);
                error!(step = name, panic = %message, "Step panicked");
                StepResult::failure(
                    FailureKind::Unexpected,
                    format!("step body panicked: {}", message),
                )
            }
        }
    }

    async fn execute_llm_call(
        &self,
        name: &str,
        call: &LlmCallSpec,
        ctx: &ExecutionContext,
    ) -> (StepResult, Option<i64>) {
        let snapshot = ctx.snapshot();
        let prompt = match render_template(&call.prompt, &snapshot) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(step = name, error = %e, "Prompt template failed to render");
                return (
                    StepResult::failure(
                        FailureKind::Unexpected,
                        format!("prompt render failed: {}", e),
                    ),
                    None,
                );
            }
        };

        debug!(step = name, prompt_len = prompt.len(), "Calling model provider");

        let response = match timeout(self.llm_timeout, self.llm.complete(&prompt, &call.options))
            .await
        {
            Err(_) => {
                warn!(step = name, timeout_ms = self.llm_timeout.as_millis() as u64, "Model call timed out");
                return (
                    StepResult::failure(
                        FailureKind::LlmTimeout,
                        format!("model call exceeded {}ms", self.llm_timeout.as_millis()),
                    ),
                    None,
                );
            }
            Ok(Err(e)) => {
                warn!(step = name, error = %e, "Model provider error");
                return (
                    StepResult::failure(FailureKind::LlmError, e.to_string()),
                    None,
                );
            }
            Ok(Ok(response)) => response,
        };

        let result = match call.options.response_format {
            ResponseFormat::Text => StepResult::success(json!({ "text": response.text })),
            ResponseFormat::Json => match output::parse_structured(&response.text) {
                Ok(value) => StepResult::success(value),
                Err(reason) => {
                    warn!(step = name, reason = %reason, "Model output failed validation");
                    StepResult::failure_with(
                        FailureKind::LlmOutputInvalid,
                        reason,
                        json!({ "raw_output": response.text }),
                    )
                }
            },
        };

        (result, response.cost_cents)
    }

    /// Fire-and-forget UI push. Delivery errors and timeouts are logged and
    /// swallowed; the step reports whether the publish landed but never
    /// fails the run.
    async fn execute_stream(
        &self,
        name: &str,
        stream: &StreamSpec,
        ctx: &ExecutionContext,
    ) -> StepResult {
        let snapshot = ctx.snapshot();

        let target = match render_template(&stream.target, &snapshot) {
            Ok(target) => target,
            Err(e) => {
                warn!(step = name, error = %e, "Stream target template failed, using raw target");
                stream.target.clone()
            }
        };

        let payload = match &stream.template {
            Some(template) => match render_template(template, &snapshot) {
                Ok(rendered) => json!({ "message": rendered }),
                Err(e) => {
                    warn!(step = name, error = %e, "Stream payload template failed, publishing snapshot");
                    snapshot
                }
            },
            None => snapshot,
        };

        let published =
            match timeout(self.publish_timeout, self.sink.publish(&target, &payload)).await {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    warn!(step = name, target = %target, error = %e, "Publish failed, continuing");
                    false
                }
                Err(_) => {
                    warn!(step = name, target = %target, "Publish timed out, continuing");
                    false
                }
            };

        StepResult::success(json!({ "published": published, "target": target }))
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
