//! In-memory budget ledger.
//!
//! A single mutex guards each check-and-reserve, which is what makes the
//! reserve path atomic across concurrent runs for the same tenant.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{BudgetLedger, CostLedgerEntry, Reservation};
use crate::{Error, Result};

#[derive(Debug, Default, Clone, Copy)]
struct TenantAccount {
    allowance_cents: i64,
    reserved_cents: i64,
    committed_cents: i64,
}

impl TenantAccount {
    fn remaining(&self) -> i64 {
        self.allowance_cents - self.reserved_cents - self.committed_cents
    }
}

#[derive(Debug)]
pub struct InMemoryLedger {
    default_allowance_cents: i64,
    accounts: Mutex<HashMap<String, TenantAccount>>,
    entries: Mutex<Vec<CostLedgerEntry>>,
}

impl InMemoryLedger {
    pub fn new(default_allowance_cents: i64) -> Self {
        Self {
            default_allowance_cents,
            accounts: Mutex::new(HashMap::new()),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Override the allowance for one tenant.
    pub fn set_allowance(&self, tenant_id: &str, allowance_cents: i64) {
        let mut accounts = self.accounts.lock().expect("budget accounts lock");
        let account = accounts.entry(tenant_id.to_string()).or_insert(TenantAccount {
            allowance_cents,
            ..Default::default()
        });
        account.allowance_cents = allowance_cents;
    }

    fn lock_accounts(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, TenantAccount>>> {
        self.accounts
            .lock()
            .map_err(|e| Error::Internal(format!("budget ledger lock poisoned: {}", e)))
    }
}

#[async_trait]
impl BudgetLedger for InMemoryLedger {
    async fn reserve(&self, tenant_id: &str, amount_cents: i64) -> Result<Reservation> {
        let mut accounts = self.lock_accounts()?;
        let default_allowance = self.default_allowance_cents;
        let account = accounts
            .entry(tenant_id.to_string())
            .or_insert(TenantAccount {
                allowance_cents: default_allowance,
                ..Default::default()
            });

        if amount_cents > account.remaining() {
            debug!(
                tenant = tenant_id,
                requested = amount_cents,
                remaining = account.remaining(),
                "Budget reservation denied"
            );
            return Ok(Reservation::Denied);
        }

        account.reserved_cents += amount_cents;
        Ok(Reservation::Granted)
    }

    async fn commit(
        &self,
        tenant_id: &str,
        run_id: Uuid,
        step_name: &str,
        estimated_cents: i64,
        actual_cents: i64,
    ) -> Result<()> {
        {
            let mut accounts = self.lock_accounts()?;
            let account = accounts
                .entry(tenant_id.to_string())
                .or_default();

            if account.reserved_cents < estimated_cents {
                warn!(
                    tenant = tenant_id,
                    step = step_name,
                    "Commit without matching reservation"
                );
            }
            account.reserved_cents = (account.reserved_cents - estimated_cents).max(0);
            account.committed_cents += actual_cents;
        }

        let mut entries = self
            .entries
            .lock()
            .map_err(|e| Error::Internal(format!("budget entries lock poisoned: {}", e)))?;
        entries.push(CostLedgerEntry {
            run_id,
            tenant_id: tenant_id.to_string(),
            step_name: step_name.to_string(),
            amount_cents: actual_cents,
            recorded_at: Utc::now(),
        });

        Ok(())
    }

    async fn release(&self, tenant_id: &str, amount_cents: i64) -> Result<()> {
        let mut accounts = self.lock_accounts()?;
        if let Some(account) = accounts.get_mut(tenant_id) {
            account.reserved_cents = (account.reserved_cents - amount_cents).max(0);
        }
        Ok(())
    }

    async fn remaining(&self, tenant_id: &str) -> Result<i64> {
        let accounts = self.lock_accounts()?;
        Ok(accounts
            .get(tenant_id)
            .map(|a| a.remaining())
            .unwrap_or(self.default_allowance_cents))
    }

    async fn entries(&self, tenant_id: &str) -> Result<Vec<CostLedgerEntry>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| Error::Internal(format!("budget entries lock poisoned: {}", e)))?;
        Ok(entries
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
}
