use lazy_static::lazy_static;
use prometheus::{register_int_counter, Encoder, IntCounter, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref WORKFLOW_RUNS_TOTAL: IntCounter = register_int_counter!(
        "formflow_workflow_runs_total",
        "Total number of workflow runs started."
    )
    .unwrap();
    pub static ref STEPS_EXECUTED_TOTAL: IntCounter = register_int_counter!(
        "formflow_steps_executed_total",
        "Total number of step bodies invoked."
    )
    .unwrap();
    pub static ref STEPS_SKIPPED_TOTAL: IntCounter = register_int_counter!(
        "formflow_steps_skipped_total",
        "Total number of steps skipped by gating or budget."
    )
    .unwrap();
    pub static ref BUDGET_DENIALS_TOTAL: IntCounter = register_int_counter!(
        "formflow_budget_denials_total",
        "Total number of reservations denied by the budget guard."
    )
    .unwrap();
}

pub fn register_metrics() {
    REGISTRY
        .register(Box::new(WORKFLOW_RUNS_TOTAL.clone()))
        .expect("Failed to register WORKFLOW_RUNS_TOTAL");
    REGISTRY
        .register(Box::new(STEPS_EXECUTED_TOTAL.clone()))
        .expect("Failed to register STEPS_EXECUTED_TOTAL");
    REGISTRY
        .register(Box::new(STEPS_SKIPPED_TOTAL.clone()))
        .expect("Failed to register STEPS_SKIPPED_TOTAL");
    REGISTRY
        .register(Box::new(BUDGET_DENIALS_TOTAL.clone()))
        .expect("Failed to register BUDGET_DENIALS_TOTAL");
}

// Gather metrics for exposition by the embedding application.
pub fn gather_metrics() -> String {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Failed to convert metrics to string")
}
