use serde::Serialize;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Demo purchase requests covering each review outcome.
const SEED_REQUESTS: &[SeedRequestContract] = &[
    SeedRequestContract {
        id: "PR-DEMO-0001",
        product_name: "Rice",
        status: "approved",
        quantity: "5",
        unit_price: "80.00",
        audit_events: 2,
    },
    SeedRequestContract {
        id: "PR-DEMO-0002",
        product_name: "Buckwheat",
        status: "pending",
        quantity: "12.345",
        unit_price: "71.50",
        audit_events: 1,
    },
    SeedRequestContract {
        id: "PR-DEMO-0003",
        product_name: "Eggs",
        status: "rejected",
        quantity: "300",
        unit_price: "9.90",
        audit_events: 2,
    },
];

const SEED_AUDIT_EVENT_IDS: &[&str] =
    &["AE-DEMO-0001", "AE-DEMO-0002", "AE-DEMO-0003", "AE-DEMO-0004", "AE-DEMO-0005"];

pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    /// Loads the demo rows. Rows that already exist are left untouched, so
    /// repeated loads are harmless.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let before = Self::seeded_request_count(pool).await?;

        let mut tx = pool.begin().await?;
        sqlx::query(Self::SQL).execute(&mut *tx).await?;
        tx.commit().await?;

        let after = Self::seeded_request_count(pool).await?;
        let requests_seeded = SEED_REQUESTS
            .iter()
            .map(|request| SeedRequestInfo {
                id: request.id,
                product_name: request.product_name,
                status: request.status,
            })
            .collect();

        Ok(SeedResult { requests_seeded, newly_inserted: (after - before).max(0) as usize })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for request in SEED_REQUESTS {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM purchase_request
                  WHERE id = ?1 AND status = ?2 AND quantity = ?3 AND unit_price = ?4)",
            )
            .bind(request.id)
            .bind(request.status)
            .bind(request.quantity)
            .bind(request.unit_price)
            .fetch_one(pool)
            .await?;
            checks.push((request.id, present == 1));

            let events: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM audit_event WHERE subject_id = ?1")
                    .bind(request.id)
                    .fetch_one(pool)
                    .await?;
            checks.push((request.audit_label(), events >= request.audit_events));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let request_ids: Vec<&str> = SEED_REQUESTS.iter().map(|request| request.id).collect();
        sqlx::query(&format!(
            "DELETE FROM audit_event WHERE id IN {}",
            sql_array_from_ids(SEED_AUDIT_EVENT_IDS)
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!(
            "DELETE FROM purchase_request WHERE id IN {}",
            sql_array_from_ids(&request_ids)
        ))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn seeded_request_count(pool: &DbPool) -> Result<i64, RepositoryError> {
        let request_ids: Vec<&str> = SEED_REQUESTS.iter().map(|request| request.id).collect();
        let count = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM purchase_request WHERE id IN {}",
            sql_array_from_ids(&request_ids)
        ))
        .fetch_one(pool)
        .await?;
        Ok(count)
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedRequestContract {
    id: &'static str,
    product_name: &'static str,
    status: &'static str,
    quantity: &'static str,
    unit_price: &'static str,
    audit_events: i64,
}

impl SeedRequestContract {
    fn audit_label(&self) -> &'static str {
        match self.status {
            "approved" => "audit-approved-trail",
            "pending" => "audit-pending-trail",
            _ => "audit-rejected-trail",
        }
    }
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug, Serialize)]
pub struct SeedResult {
    pub requests_seeded: Vec<SeedRequestInfo>,
    pub newly_inserted: usize,
}

#[derive(Debug, Serialize)]
pub struct SeedRequestInfo {
    pub id: &'static str,
    pub product_name: &'static str,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
