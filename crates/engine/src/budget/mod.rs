//! Budget Guard: per-tenant spend ceiling for cost-bearing steps.
//!
//! Reservations use the step's estimate; commits true-up to the actual cost
//! afterwards. The true-up is bookkeeping and is never itself reserved
//! against. Denial is an expected steady-state condition, surfaced to the
//! runner as a skip rather than a failure.

pub mod memory;

pub use memory::InMemoryLedger;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One committed charge against a tenant's allowance.
#[derive(Debug, Clone, Serialize)]
pub struct CostLedgerEntry {
    pub run_id: Uuid,
    pub tenant_id: String,
    pub step_name: String,
    pub amount_cents: i64,
    pub recorded_at: DateTime<Utc>,
}

/// Outcome of a reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    Granted,
    Denied,
}

/// Port for the per-tenant cost ledger. `reserve` must be atomic with
/// respect to concurrent runs for the same tenant: two reservations whose
/// combined cost exceeds the allowance must never both be granted.
#[async_trait]
pub trait BudgetLedger: Send + Sync {
    async fn reserve(&self, tenant_id: &str, amount_cents: i64) -> crate::Result<Reservation>;

    /// Release the reservation and commit the actual cost after a
    /// successful step. Estimated and actual amounts may differ.
    async fn commit(
        &self,
        tenant_id: &str,
        run_id: Uuid,
        step_name: &str,
        estimated_cents: i64,
        actual_cents: i64,
    ) -> crate::Result<()>;

    /// Drop a reservation without committing cost (the reserved step
    /// failed before completing).
    async fn release(&self, tenant_id: &str, amount_cents: i64) -> crate::Result<()>;

    /// Allowance minus committed and outstanding reservations.
    async fn remaining(&self, tenant_id: &str) -> crate::Result<i64>;

    async fn entries(&self, tenant_id: &str) -> crate::Result<Vec<CostLedgerEntry>>;
}
