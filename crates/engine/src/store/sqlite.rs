use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{sqlite::SqlitePool, Pool, Row, Sqlite};
use std::collections::HashMap;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::scoring::Tier;
use crate::store::{Form, FormResponse, LeadRecord, Store};
use crate::{Error, Result};

pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        info!("Connecting to SQLite database: {}", database_url);

        let pool = SqlitePool::connect(database_url).await.map_err(|e| {
            error!("Failed to connect to SQLite: {}", e);
            Error::Sqlx(e)
        })?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn init(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to run migrations: {}", e);
                Error::Migrate(e)
            })?;

        Ok(())
    }

    async fn save_form(&self, form: Form) -> Result<()> {
        debug!("Saving form: {}", form.id);

        sqlx::query(
            r#"
            INSERT INTO forms (id, tenant_id, name, industry, published, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                industry = excluded.industry,
                published = excluded.published
            "#,
        )
        .bind(form.id.to_string())
        .bind(&form.tenant_id)
        .bind(&form.name)
        .bind(&form.industry)
        .bind(form.published)
        .bind(form.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_form(&self, id: Uuid) -> Result<Option<Form>> {
        debug!("Getting form: {}", id);

        let row = sqlx::query(
            "SELECT id, tenant_id, name, industry, published, created_at FROM forms WHERE id = ?1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(Form {
                id: r.get::<String, _>("id").parse()?,
                tenant_id: r.get("tenant_id"),
                name: r.get("name"),
                industry: r.get("industry"),
                published: r.get("published"),
                created_at: r.get("created_at"),
            })),
            None => Ok(None),
        }
    }

    async fn save_response(&self, response: FormResponse) -> Result<()> {
        debug!("Saving response: {}", response.id);

        let answers_json = serde_json::to_string(&response.answers)?;

        sqlx::query(
            r#"
            INSERT INTO form_responses (id, form_id, tenant_id, answers, completed, submitted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                answers = excluded.answers,
                completed = excluded.completed
            "#,
        )
        .bind(response.id.to_string())
        .bind(response.form_id.to_string())
        .bind(&response.tenant_id)
        .bind(answers_json)
        .bind(response.completed)
        .bind(response.submitted_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_response(&self, id: Uuid) -> Result<Option<FormResponse>> {
        debug!("Getting response: {}", id);

        let row = sqlx::query(
            r#"
            SELECT id, form_id, tenant_id, answers, completed, submitted_at
            FROM form_responses
            WHERE id = ?1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => {
                let answers: HashMap<String, JsonValue> =
                    serde_json::from_str(r.get("answers"))?;

                Ok(Some(FormResponse {
                    id: r.get::<String, _>("id").parse()?,
                    form_id: r.get::<String, _>("form_id").parse()?,
                    tenant_id: r.get("tenant_id"),
                    answers,
                    completed: r.get("completed"),
                    submitted_at: r.get("submitted_at"),
                }))
            }
            None => Ok(None),
        }
    }

    async fn save_lead(&self, lead: LeadRecord) -> Result<()> {
        debug!("Saving lead: {} (score {})", lead.id, lead.score);

        let dimensions_json = lead
            .dimensions
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO leads (id, response_id, form_id, tenant_id, score, tier, dimensions, summary, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                score = excluded.score,
                tier = excluded.tier,
                dimensions = excluded.dimensions,
                summary = excluded.summary
            "#,
        )
        .bind(lead.id.to_string())
        .bind(lead.response_id.to_string())
        .bind(lead.form_id.to_string())
        .bind(&lead.tenant_id)
        .bind(lead.score)
        .bind(lead.tier.as_str())
        .bind(dimensions_json)
        .bind(&lead.summary)
        .bind(lead.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_lead_for_response(&self, response_id: Uuid) -> Result<Option<LeadRecord>> {
        debug!("Getting lead for response: {}", response_id);

        let row = sqlx::query(
            r#"
            SELECT id, response_id, form_id, tenant_id, score, tier, dimensions, summary, created_at
            FROM leads
            WHERE response_id = ?1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(response_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(lead_from_row(&r)?)),
            None => Ok(None),
        }
    }

    async fn list_leads_for_form(&self, form_id: Uuid, limit: i64) -> Result<Vec<LeadRecord>> {
        debug!("Listing leads for form: {}", form_id);

        let rows = sqlx::query(
            r#"
            SELECT id, response_id, form_id, tenant_id, score, tier, dimensions, summary, created_at
            FROM leads
            WHERE form_id = ?1
            ORDER BY created_at DESC
            LIMIT ?2
            "#,
        )
        .bind(form_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(lead_from_row).collect()
    }
}

fn lead_from_row(r: &sqlx::sqlite::SqliteRow) -> Result<LeadRecord> {
    let dimensions: Option<JsonValue> = r
        .get::<Option<String>, _>("dimensions")
        .map(|s| serde_json::from_str(&s))
        .transpose()?;

    Ok(LeadRecord {
        id: r.get::<String, _>("id").parse()?,
        response_id: r.get::<String, _>("response_id").parse()?,
        form_id: r.get::<String, _>("form_id").parse()?,
        tenant_id: r.get("tenant_id"),
        score: r.get("score"),
        tier: Tier::from(r.get::<String, _>("tier").as_str()),
        dimensions,
        summary: r.get("summary"),
        created_at: r.get("created_at"),
    })
}
