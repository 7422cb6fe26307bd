mod config;
mod factory;
mod memory;
mod models;
mod sqlite;

pub use config::{DatabaseConfig, DatabaseType};
pub use factory::create_store;
pub use memory::InMemoryStore;
pub use models::*;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use uuid::Uuid;

/// Persistence collaborator port. The engine itself never persists run
/// state; Task steps use this to load domain records and save computed
/// results.
#[async_trait]
pub trait Store: Send + Sync {
    // Initialize database schema
    async fn init(&self) -> crate::Result<()>;

    // Form operations
    async fn save_form(&self, form: Form) -> crate::Result<()>;
    async fn get_form(&self, id: Uuid) -> crate::Result<Option<Form>>;

    // Response operations
    async fn save_response(&self, response: FormResponse) -> crate::Result<()>;
    async fn get_response(&self, id: Uuid) -> crate::Result<Option<FormResponse>>;

    // Lead operations
    async fn save_lead(&self, lead: LeadRecord) -> crate::Result<()>;
    async fn get_lead_for_response(&self, response_id: Uuid) -> crate::Result<Option<LeadRecord>>;
    async fn list_leads_for_form(&self, form_id: Uuid, limit: i64) -> crate::Result<Vec<LeadRecord>>;
}
