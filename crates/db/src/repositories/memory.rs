use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use canteen_core::audit::AuditEvent;
use canteen_core::domain::purchase_request::{PurchaseRequest, PurchaseRequestId};

use super::{AuditRepository, PurchaseRequestRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryPurchaseRequestRepository {
    requests: RwLock<HashMap<String, PurchaseRequest>>,
    audit: Arc<InMemoryAuditRepository>,
}

impl InMemoryPurchaseRequestRepository {
    /// Reclassification events land in `audit` so callers can read them back
    /// through the same audit repository they hand to the HTTP layer.
    pub fn with_audit(audit: Arc<InMemoryAuditRepository>) -> Self {
        Self { requests: RwLock::default(), audit }
    }
}

#[async_trait::async_trait]
impl PurchaseRequestRepository for InMemoryPurchaseRequestRepository {
    async fn find_by_id(
        &self,
        id: &PurchaseRequestId,
    ) -> Result<Option<PurchaseRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id.0).cloned())
    }

    async fn save(&self, request: PurchaseRequest) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        requests.insert(request.id.0.clone(), request);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<PurchaseRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut all: Vec<PurchaseRequest> = requests.values().cloned().collect();
        all.sort_by(|left, right| {
            right.created_at.cmp(&left.created_at).then_with(|| right.id.0.cmp(&left.id.0))
        });
        Ok(all)
    }

    async fn apply_reclassifications(
        &self,
        records: &[PurchaseRequest],
        events: &[AuditEvent],
    ) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        let mut log = self.audit.events.write().await;
        for record in records {
            requests.insert(record.id.0.clone(), record.clone());
        }
        log.extend(events.iter().cloned());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAuditRepository {
    events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryAuditRepository {
    pub async fn all(&self) -> Vec<AuditEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait::async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn append(&self, event: AuditEvent) -> Result<(), RepositoryError> {
        let mut events = self.events.write().await;
        events.push(event);
        Ok(())
    }

    async fn list_for_subject(
        &self,
        subject_id: &PurchaseRequestId,
    ) -> Result<Vec<AuditEvent>, RepositoryError> {
        let events = self.events.read().await;
        let mut matching: Vec<AuditEvent> = events
            .iter()
            .filter(|event| event.subject_id.as_ref() == Some(subject_id))
            .cloned()
            .collect();
        matching.sort_by(|left, right| left.occurred_at.cmp(&right.occurred_at));
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use canteen_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
    use canteen_core::domain::purchase_request::{
        PurchaseRequest, PurchaseRequestId, PurchaseRequestStatus,
    };

    use crate::repositories::{
        AuditRepository, InMemoryAuditRepository, InMemoryPurchaseRequestRepository,
        PurchaseRequestRepository,
    };

    fn request(id: &str, day: u32) -> PurchaseRequest {
        let at = Utc.with_ymd_and_hms(2026, 1, day, 0, 0, 0).single().expect("timestamp");
        PurchaseRequest {
            id: PurchaseRequestId(id.to_string()),
            cook_id: "cook-1".to_string(),
            product_name: "Flour".to_string(),
            quantity: Decimal::new(25, 1),
            unit_price: Decimal::new(4590, 2),
            reason: "baking".to_string(),
            status: PurchaseRequestStatus::Pending,
            reviewed_by: None,
            review_note: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn in_memory_purchase_request_repo_round_trip() {
        let repo = InMemoryPurchaseRequestRepository::default();
        let stored = request("PR-1", 1);

        repo.save(stored.clone()).await.expect("save request");
        let found = repo.find_by_id(&stored.id).await.expect("find request");

        assert_eq!(found, Some(stored));
    }

    #[tokio::test]
    async fn list_all_orders_newest_first() {
        let repo = InMemoryPurchaseRequestRepository::default();
        repo.save(request("PR-1", 1)).await.expect("save");
        repo.save(request("PR-2", 3)).await.expect("save");
        repo.save(request("PR-3", 2)).await.expect("save");

        let ids: Vec<String> =
            repo.list_all().await.expect("list").into_iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec!["PR-2", "PR-3", "PR-1"]);
    }

    #[tokio::test]
    async fn reclassifications_are_visible_through_shared_audit_repo() {
        let audit = Arc::new(InMemoryAuditRepository::default());
        let repo = InMemoryPurchaseRequestRepository::with_audit(audit.clone());
        let mut rewritten = request("PR-1", 1);
        rewritten.status = PurchaseRequestStatus::Rejected;
        let event = AuditEvent::new(
            Some(rewritten.id.clone()),
            "bootstrap",
            "purchase_request.legacy_reclassified",
            AuditCategory::System,
            "system",
            AuditOutcome::Success,
        );

        repo.apply_reclassifications(&[rewritten.clone()], &[event]).await.expect("apply");

        assert_eq!(
            repo.find_by_id(&rewritten.id).await.expect("find").map(|r| r.status),
            Some(PurchaseRequestStatus::Rejected)
        );
        assert_eq!(audit.list_for_subject(&rewritten.id).await.expect("events").len(), 1);
        assert_eq!(audit.all().await.len(), 1);
    }
}
