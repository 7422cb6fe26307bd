use std::sync::Arc;

use super::{DatabaseConfig, DatabaseType, InMemoryStore, SqliteStore, Store};
use crate::{Error, Result};

pub async fn create_store(config: &DatabaseConfig) -> Result<Arc<dyn Store>> {
    match config.db_type {
        DatabaseType::Memory => Ok(Arc::new(InMemoryStore::new())),
        DatabaseType::Sqlite => {
            let path = config.sqlite_path.as_ref().ok_or_else(|| {
                Error::Config("SQLITE_PATH must be set when using SQLite".to_string())
            })?;
            let url = format!("sqlite://{}?mode=rwc", path.display());
            let store = SqliteStore::new(&url).await?;
            Ok(Arc::new(store))
        }
    }
}
