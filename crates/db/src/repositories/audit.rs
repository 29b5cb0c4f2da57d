use std::collections::BTreeMap;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};

use canteen_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
use canteen_core::domain::purchase_request::PurchaseRequestId;

use super::purchase_request::decode_timestamp;
use super::{AuditRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAuditRepository {
    pool: DbPool,
}

impl SqlAuditRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AuditRepository for SqlAuditRepository {
    async fn append(&self, event: AuditEvent) -> Result<(), RepositoryError> {
        insert_event(&self.pool, &event).await
    }

    async fn list_for_subject(
        &self,
        subject_id: &PurchaseRequestId,
    ) -> Result<Vec<AuditEvent>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, subject_id, correlation_id, event_type, category, actor, outcome,
                    metadata_json, occurred_at
             FROM audit_event
             WHERE subject_id = ?
             ORDER BY occurred_at ASC, id ASC",
        )
        .bind(&subject_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect()
    }
}

pub(crate) async fn insert_event<'e, E>(executor: E, event: &AuditEvent) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let metadata_json = serde_json::to_string(&event.metadata)
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    sqlx::query(
        "INSERT INTO audit_event
            (id, subject_id, correlation_id, event_type, category, actor, outcome,
             metadata_json, occurred_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&event.event_id)
    .bind(event.subject_id.as_ref().map(|id| id.0.as_str()))
    .bind(&event.correlation_id)
    .bind(&event.event_type)
    .bind(event.category.as_str())
    .bind(&event.actor)
    .bind(event.outcome.as_str())
    .bind(metadata_json)
    .bind(event.occurred_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

fn row_to_event(row: &SqliteRow) -> Result<AuditEvent, RepositoryError> {
    let event_id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let subject_id: Option<String> =
        row.try_get("subject_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let correlation_id: String =
        row.try_get("correlation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let event_type: String =
        row.try_get("event_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let category: String =
        row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let actor: String = row.try_get("actor").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let outcome: String =
        row.try_get("outcome").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let metadata_json: String =
        row.try_get("metadata_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let occurred_at: String =
        row.try_get("occurred_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let category = AuditCategory::parse(&category)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown audit category `{category}`")))?;
    let outcome = AuditOutcome::parse(&outcome)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown audit outcome `{outcome}`")))?;
    let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata_json)
        .map_err(|error| RepositoryError::Decode(format!("metadata_json: {error}")))?;

    Ok(AuditEvent {
        event_id,
        subject_id: subject_id.map(PurchaseRequestId),
        correlation_id,
        event_type,
        category,
        actor,
        outcome,
        metadata,
        occurred_at: decode_timestamp("occurred_at", &occurred_at)?,
    })
}
