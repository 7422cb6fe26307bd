//! In-memory store, the default adapter for tests and single-process use.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use super::{Form, FormResponse, LeadRecord, Store};
use crate::{Error, Result};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    forms: RwLock<HashMap<Uuid, Form>>,
    responses: RwLock<HashMap<Uuid, FormResponse>>,
    leads: RwLock<HashMap<Uuid, LeadRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_err<T>(e: std::sync::PoisonError<T>) -> Error {
    Error::Store(format!("store lock poisoned: {}", e))
}

#[async_trait]
impl Store for InMemoryStore {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn save_form(&self, form: Form) -> Result<()> {
        let mut forms = self.forms.write().map_err(lock_err)?;
        forms.insert(form.id, form);
        Ok(())
    }

    async fn get_form(&self, id: Uuid) -> Result<Option<Form>> {
        let forms = self.forms.read().map_err(lock_err)?;
        Ok(forms.get(&id).cloned())
    }

    async fn save_response(&self, response: FormResponse) -> Result<()> {
        let mut responses = self.responses.write().map_err(lock_err)?;
        responses.insert(response.id, response);
        Ok(())
    }

    async fn get_response(&self, id: Uuid) -> Result<Option<FormResponse>> {
        let responses = self.responses.read().map_err(lock_err)?;
        Ok(responses.get(&id).cloned())
    }

    async fn save_lead(&self, lead: LeadRecord) -> Result<()> {
        let mut leads = self.leads.write().map_err(lock_err)?;
        leads.insert(lead.id, lead);
        Ok(())
    }

    async fn get_lead_for_response(&self, response_id: Uuid) -> Result<Option<LeadRecord>> {
        let leads = self.leads.read().map_err(lock_err)?;
        Ok(leads
            .values()
            .find(|lead| lead.response_id == response_id)
            .cloned())
    }

    async fn list_leads_for_form(&self, form_id: Uuid, limit: i64) -> Result<Vec<LeadRecord>> {
        let leads = self.leads.read().map_err(lock_err)?;
        let mut matching: Vec<LeadRecord> = leads
            .values()
            .filter(|lead| lead.form_id == form_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit.max(0) as usize);
        Ok(matching)
    }
}
