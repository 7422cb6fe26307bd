use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::llm::LlmConfig;
use crate::store::{DatabaseConfig, DatabaseType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Allowance applied to tenants without an explicit override.
    pub default_allowance_cents: i64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            default_allowance_cents: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// How long a Stream step waits for the push channel before abandoning
    /// the publish.
    pub publish_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            publish_timeout_ms: 1500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub llm: LlmConfig,
    pub budget: BudgetConfig,
    pub stream: StreamConfig,
    pub database: DatabaseConfig,
}

impl EngineConfig {
    pub fn load() -> crate::Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        let config = EngineConfig {
            llm: LlmConfig {
                provider: std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "anthropic".to_string()),
                endpoint: std::env::var("LLM_ENDPOINT").ok(),
                model: std::env::var("LLM_MODEL")
                    .unwrap_or_else(|_| "claude-3-5-sonnet".to_string()),
                api_key: std::env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty()),
                temperature: std::env::var("LLM_TEMPERATURE")
                    .ok()
                    .and_then(|s| s.parse().ok()),
                max_tokens: std::env::var("LLM_MAX_TOKENS")
                    .ok()
                    .and_then(|s| s.parse().ok()),
                timeout_seconds: std::env::var("LLM_TIMEOUT_SECONDS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .or(Some(60)),
            },
            budget: BudgetConfig {
                default_allowance_cents: std::env::var("BUDGET_DEFAULT_ALLOWANCE_CENTS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(500),
            },
            stream: StreamConfig {
                publish_timeout_ms: std::env::var("STREAM_PUBLISH_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1500),
            },
            database: DatabaseConfig {
                db_type: match std::env::var("DATABASE_TYPE")
                    .unwrap_or_else(|_| "memory".to_string())
                    .to_lowercase()
                    .as_str()
                {
                    "sqlite" => DatabaseType::Sqlite,
                    _ => DatabaseType::Memory,
                },
                sqlite_path: std::env::var("SQLITE_PATH").map(PathBuf::from).ok(),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            },
        };

        // Validate required fields
        if config.llm.api_key.is_none() && config.llm.provider != "mock" {
            tracing::warn!(
                "LLM_API_KEY is not set. Model calls will rely on provider environment variables."
            );
        }

        if config.budget.default_allowance_cents < 0 {
            return Err(crate::Error::Config(
                "BUDGET_DEFAULT_ALLOWANCE_CENTS must not be negative".to_string(),
            ));
        }

        if config.database.db_type == DatabaseType::Sqlite && config.database.sqlite_path.is_none()
        {
            return Err(crate::Error::Config(
                "SQLITE_PATH must be set when using SQLite".to_string(),
            ));
        }

        Ok(config)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            budget: BudgetConfig::default(),
            stream: StreamConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}
