//! Conditional evaluation of steps.
//!
//! Decides, before a step is invoked, whether it must run. An absent
//! upstream entry is never treated as success; skips written by earlier
//! gates propagate transitively through later `run_when` chains.

use tracing::debug;

use crate::workflow::{ExecutionContext, StepResult, StepSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Run,
    SkipDueToPredicate,
    SkipDueToUpstreamFailure,
}

/// Evaluate a step's `run_if` predicate and `run_when` gate against the
/// current context. Unconditional steps always evaluate to `Run`.
pub fn evaluate(spec: &StepSpec, ctx: &ExecutionContext) -> Decision {
    if let Some(predicate) = &spec.run_if {
        if !predicate(ctx) {
            debug!(step = %spec.name, "run_if predicate is false, skipping");
            return Decision::SkipDueToPredicate;
        }
    }

    if let Some(gate) = &spec.run_when {
        match ctx.get(&gate.step) {
            None => {
                debug!(step = %spec.name, upstream = %gate.step, "upstream absent, skipping");
                return Decision::SkipDueToUpstreamFailure;
            }
            Some(StepResult::Failure { .. }) | Some(StepResult::Skipped { .. }) => {
                debug!(step = %spec.name, upstream = %gate.step, "upstream did not succeed, skipping");
                return Decision::SkipDueToUpstreamFailure;
            }
            Some(StepResult::Success { data }) => {
                if let Some(accept) = &gate.accept {
                    if !accept(data) {
                        debug!(
                            step = %spec.name,
                            upstream = %gate.step,
                            "upstream payload rejected by accept predicate, skipping"
                        );
                        return Decision::SkipDueToUpstreamFailure;
                    }
                }
            }
        }
    }

    Decision::Run
}
