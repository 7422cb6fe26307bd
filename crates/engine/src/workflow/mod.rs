pub mod conditions;
pub mod context;
pub mod definition;
pub mod executor;
pub mod result;
pub mod runner;
pub mod state;

pub use conditions::Decision;
pub use context::ExecutionContext;
pub use definition::{
    FnHandler, LlmCallSpec, PayloadPredicate, Predicate, StepAction, StepKind, StepSpec,
    StreamSpec, TaskHandler, UpstreamGate, WorkflowDefinition, WorkflowDefinitionBuilder,
};
pub use executor::{StepExecution, StepExecutor};
pub use result::{FailureKind, SkipReason, StepError, StepResult};
pub use runner::{RunReport, WorkflowRunner};
pub use state::RunState;
