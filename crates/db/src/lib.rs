pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod normalization;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{DemoSeedDataset, SeedRequestInfo, SeedResult, VerificationResult};
pub use normalization::{run_legacy_price_policy, run_legacy_price_policy_with, LegacyPolicySummary};
pub use repositories::{
    AuditRepository, InMemoryAuditRepository, InMemoryPurchaseRequestRepository,
    PurchaseRequestRepository, RepositoryError, SqlAuditRepository, SqlPurchaseRequestRepository,
};
