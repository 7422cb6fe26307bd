//! Execution context threaded through one workflow run.
//!
//! Two separate namespaces: run-seed inputs (read via `input`) and step
//! results (read via `get`). Step results are single-assignment — once a
//! name is written it can never be overwritten within the same run. An
//! absent name reads as `None`; nothing ever defaults silently.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::workflow::StepResult;
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    run_id: Uuid,
    tenant_id: String,
    started_at: DateTime<Utc>,
    seed: HashMap<String, Value>,
    results: HashMap<String, StepResult>,
    /// Step names in write order, for stable snapshots.
    order: Vec<String>,
}

impl ExecutionContext {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            started_at: Utc::now(),
            seed: HashMap::new(),
            results: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn with_seed(tenant_id: impl Into<String>, inputs: HashMap<String, Value>) -> Self {
        let mut ctx = Self::new(tenant_id);
        ctx.seed(inputs);
        ctx
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Populate run-start values. Intended for use before any step executes;
    /// later calls extend the seed map but never touch step results.
    pub fn seed(&mut self, inputs: HashMap<String, Value>) {
        self.seed.extend(inputs);
    }

    /// Read a run-seed input. `None` means the input was never provided.
    pub fn input(&self, name: &str) -> Option<&Value> {
        self.seed.get(name)
    }

    pub fn input_names(&self) -> impl Iterator<Item = &str> {
        self.seed.keys().map(String::as_str)
    }

    /// Read a step result by name. `None` is the explicit "absent" marker —
    /// callers must handle it, never assume a default.
    pub fn get(&self, name: &str) -> Option<&StepResult> {
        self.results.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.results.contains_key(name)
    }

    /// Record a step's result. Fails if the name already has a value — the
    /// single-assignment invariant of the run.
    pub fn insert(&mut self, name: &str, result: StepResult) -> Result<()> {
        if self.results.contains_key(name) {
            return Err(Error::DuplicateWrite(name.to_string()));
        }
        self.order.push(name.to_string());
        self.results.insert(name.to_string(), result);
        Ok(())
    }

    /// Step names in the order their results were written.
    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// JSON view of the run state for template rendering and stream
    /// publishing: `{ run_id, tenant_id, inputs, steps }`.
    pub fn snapshot(&self) -> Value {
        let mut steps = serde_json::Map::new();
        for name in &self.order {
            if let Some(result) = self.results.get(name) {
                steps.insert(name.clone(), result.to_value());
            }
        }
        json!({
            "run_id": self.run_id.to_string(),
            "tenant_id": self.tenant_id,
            "started_at": self.started_at.to_rfc3339(),
            "inputs": self.seed,
            "steps": Value::Object(steps),
        })
    }
}
