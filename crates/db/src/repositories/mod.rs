use async_trait::async_trait;
use thiserror::Error;

use canteen_core::audit::AuditEvent;
use canteen_core::domain::purchase_request::{PurchaseRequest, PurchaseRequestId};

pub mod audit;
pub mod memory;
pub mod purchase_request;

pub use audit::SqlAuditRepository;
pub use memory::{InMemoryAuditRepository, InMemoryPurchaseRequestRepository};
pub use purchase_request::SqlPurchaseRequestRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait PurchaseRequestRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &PurchaseRequestId,
    ) -> Result<Option<PurchaseRequest>, RepositoryError>;

    async fn save(&self, request: PurchaseRequest) -> Result<(), RepositoryError>;

    /// Every stored request, newest first.
    async fn list_all(&self) -> Result<Vec<PurchaseRequest>, RepositoryError>;

    /// Writes the rewritten records and their audit trail as one unit: either
    /// all of them land or none do.
    async fn apply_reclassifications(
        &self,
        records: &[PurchaseRequest],
        events: &[AuditEvent],
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn append(&self, event: AuditEvent) -> Result<(), RepositoryError>;

    async fn list_for_subject(
        &self,
        subject_id: &PurchaseRequestId,
    ) -> Result<Vec<AuditEvent>, RepositoryError>;
}
