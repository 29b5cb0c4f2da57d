use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};

use canteen_core::audit::AuditEvent;
use canteen_core::domain::purchase_request::{
    PurchaseRequest, PurchaseRequestId, PurchaseRequestStatus,
};

use super::audit::insert_event;
use super::{PurchaseRequestRepository, RepositoryError};
use crate::DbPool;

const SELECT_COLUMNS: &str = "SELECT id, cook_id, product_name, quantity, unit_price, reason,
        status, reviewed_by, review_note, created_at, updated_at
     FROM purchase_request";

pub struct SqlPurchaseRequestRepository {
    pool: DbPool,
}

impl SqlPurchaseRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PurchaseRequestRepository for SqlPurchaseRequestRepository {
    async fn find_by_id(
        &self,
        id: &PurchaseRequestId,
    ) -> Result<Option<PurchaseRequest>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_request).transpose()
    }

    async fn save(&self, request: PurchaseRequest) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        upsert(&mut tx, &request).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<PurchaseRequest>, RepositoryError> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY created_at DESC, id DESC"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_request).collect()
    }

    async fn apply_reclassifications(
        &self,
        records: &[PurchaseRequest],
        events: &[AuditEvent],
    ) -> Result<(), RepositoryError> {
        if records.is_empty() && events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            upsert(&mut tx, record).await?;
        }
        for event in events {
            insert_event(&mut *tx, event).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

async fn upsert(
    tx: &mut Transaction<'_, Sqlite>,
    request: &PurchaseRequest,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO purchase_request
            (id, cook_id, product_name, quantity, unit_price, reason, status,
             reviewed_by, review_note, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            cook_id = excluded.cook_id,
            product_name = excluded.product_name,
            quantity = excluded.quantity,
            unit_price = excluded.unit_price,
            reason = excluded.reason,
            status = excluded.status,
            reviewed_by = excluded.reviewed_by,
            review_note = excluded.review_note,
            updated_at = excluded.updated_at",
    )
    .bind(&request.id.0)
    .bind(&request.cook_id)
    .bind(&request.product_name)
    .bind(request.quantity.to_string())
    .bind(request.unit_price.to_string())
    .bind(&request.reason)
    .bind(request.status.as_str())
    .bind(&request.reviewed_by)
    .bind(&request.review_note)
    .bind(request.created_at.to_rfc3339())
    .bind(request.updated_at.to_rfc3339())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn row_to_request(row: &SqliteRow) -> Result<PurchaseRequest, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let cook_id: String =
        row.try_get("cook_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let product_name: String =
        row.try_get("product_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quantity: String =
        row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let unit_price: String =
        row.try_get("unit_price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let reason: String =
        row.try_get("reason").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let reviewed_by: Option<String> =
        row.try_get("reviewed_by").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let review_note: Option<String> =
        row.try_get("review_note").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let status = PurchaseRequestStatus::parse(&status)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown purchase request status `{status}`")))?;

    Ok(PurchaseRequest {
        id: PurchaseRequestId(id),
        cook_id,
        product_name,
        quantity: decode_decimal("quantity", &quantity)?,
        unit_price: decode_decimal("unit_price", &unit_price)?,
        reason,
        status,
        reviewed_by,
        review_note,
        created_at: decode_timestamp("created_at", &created_at)?,
        updated_at: decode_timestamp("updated_at", &updated_at)?,
    })
}

pub(crate) fn decode_decimal(column: &str, raw: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str_exact(raw.trim())
        .map_err(|error| RepositoryError::Decode(format!("{column} `{raw}`: {error}")))
}

pub(crate) fn decode_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column} `{raw}`: {error}")))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use canteen_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
    use canteen_core::domain::purchase_request::{
        NewPurchaseRequest, PurchaseRequest, PurchaseRequestId, PurchaseRequestStatus,
    };

    use super::SqlPurchaseRequestRepository;
    use crate::repositories::{AuditRepository, PurchaseRequestRepository, SqlAuditRepository};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn submitted(product: &str, quantity: Decimal, unit_price: Decimal, day: u32) -> PurchaseRequest {
        let at = Utc.with_ymd_and_hms(2026, 2, day, 9, 0, 0).single().expect("timestamp");
        PurchaseRequest::submit(
            NewPurchaseRequest {
                cook_id: "cook-1".to_string(),
                product_name: product.to_string(),
                quantity,
                unit_price,
                reason: "menu".to_string(),
            },
            at,
        )
        .expect("valid request")
    }

    #[tokio::test]
    async fn save_and_find_preserves_decimal_scale() {
        let repo = SqlPurchaseRequestRepository::new(setup().await);
        let request = submitted("Buckwheat", Decimal::new(123_400, 4), Decimal::new(7150, 2), 1);

        repo.save(request.clone()).await.expect("save");
        let found = repo.find_by_id(&request.id).await.expect("find").expect("present");

        assert_eq!(found, request);
        assert_eq!(found.quantity.scale(), 4);
        assert_eq!(found.unit_price.to_string(), "71.50");
    }

    #[tokio::test]
    async fn find_unknown_id_returns_none() {
        let repo = SqlPurchaseRequestRepository::new(setup().await);
        let found = repo.find_by_id(&PurchaseRequestId("PR-missing".to_string())).await.expect("find");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn save_updates_existing_row_on_review() {
        let repo = SqlPurchaseRequestRepository::new(setup().await);
        let mut request = submitted("Rice", Decimal::new(5, 0), Decimal::new(80, 0), 2);
        repo.save(request.clone()).await.expect("save");

        request.review(PurchaseRequestStatus::Approved, "admin-1", Utc::now()).expect("review");
        repo.save(request.clone()).await.expect("save review");

        let all = repo.list_all().await.expect("list");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, PurchaseRequestStatus::Approved);
        assert_eq!(all[0].reviewed_by.as_deref(), Some("admin-1"));
    }

    #[tokio::test]
    async fn list_all_returns_newest_first() {
        let repo = SqlPurchaseRequestRepository::new(setup().await);
        repo.save(submitted("Old", Decimal::ONE, Decimal::ONE, 1)).await.expect("save old");
        repo.save(submitted("New", Decimal::ONE, Decimal::ONE, 9)).await.expect("save new");

        let names: Vec<String> = repo
            .list_all()
            .await
            .expect("list")
            .into_iter()
            .map(|request| request.product_name)
            .collect();
        assert_eq!(names, vec!["New".to_string(), "Old".to_string()]);
    }

    #[tokio::test]
    async fn approving_zero_price_row_is_refused_by_storage() {
        let repo = SqlPurchaseRequestRepository::new(setup().await);
        let mut request = submitted("Salt", Decimal::ONE, Decimal::ONE, 3);
        request.status = PurchaseRequestStatus::Approved;
        request.unit_price = Decimal::ZERO;

        let result = repo.save(request).await;
        assert!(result.is_err(), "storage must keep the approved-price invariant");
    }

    #[tokio::test]
    async fn reclassifications_commit_rows_and_events_together() {
        let pool = setup().await;
        let repo = SqlPurchaseRequestRepository::new(pool.clone());
        let audit = SqlAuditRepository::new(pool);

        let mut request = submitted("Legacy", Decimal::new(5, 0), Decimal::new(500, 2), 4);
        repo.save(request.clone()).await.expect("save");
        request.status = PurchaseRequestStatus::Rejected;
        request.review_note = Some("note".to_string());

        let event = AuditEvent::new(
            Some(request.id.clone()),
            "test",
            "purchase_request.legacy_reclassified",
            AuditCategory::System,
            "system",
            AuditOutcome::Success,
        );
        repo.apply_reclassifications(&[request.clone()], &[event]).await.expect("apply");

        let stored = repo.find_by_id(&request.id).await.expect("find").expect("present");
        assert_eq!(stored.status, PurchaseRequestStatus::Rejected);
        assert_eq!(audit.list_for_subject(&request.id).await.expect("events").len(), 1);
    }

    #[tokio::test]
    async fn failed_reclassification_rolls_back_every_row() {
        let pool = setup().await;
        let repo = SqlPurchaseRequestRepository::new(pool.clone());
        let audit = SqlAuditRepository::new(pool);

        let mut first = submitted("First", Decimal::ONE, Decimal::ONE, 5);
        repo.save(first.clone()).await.expect("save first");
        first.status = PurchaseRequestStatus::Rejected;

        let mut invalid = submitted("Second", Decimal::ONE, Decimal::ONE, 6);
        invalid.status = PurchaseRequestStatus::Approved;
        invalid.unit_price = Decimal::ZERO;

        let event = AuditEvent::new(
            Some(first.id.clone()),
            "test",
            "purchase_request.legacy_reclassified",
            AuditCategory::System,
            "system",
            AuditOutcome::Success,
        );
        let result = repo.apply_reclassifications(&[first.clone(), invalid], &[event]).await;

        assert!(result.is_err());
        let stored = repo.find_by_id(&first.id).await.expect("find").expect("present");
        assert_eq!(stored.status, PurchaseRequestStatus::Pending);
        assert!(audit.list_for_subject(&first.id).await.expect("events").is_empty());
    }

    #[tokio::test]
    async fn corrupt_decimal_text_is_reported_as_decode_error() {
        let pool = setup().await;
        sqlx::query(
            "INSERT INTO purchase_request
                (id, cook_id, product_name, quantity, unit_price, reason, status, created_at, updated_at)
             VALUES ('PR-bad', 'cook-1', 'Oil', '1e3', '2.00', 'r', 'pending',
                     '2026-01-01T00:00:00+00:00', '2026-01-01T00:00:00+00:00')",
        )
        .execute(&pool)
        .await
        .expect("insert corrupt row");

        let repo = SqlPurchaseRequestRepository::new(pool);
        let result = repo.list_all().await;
        assert!(matches!(result, Err(crate::repositories::RepositoryError::Decode(_))));
    }
}
