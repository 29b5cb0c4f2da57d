//! Persistence step for the legacy zero-price policy.
//!
//! Loads every purchase request, runs the pure policy from
//! `canteen_core::policy::legacy`, and writes back only what changed together
//! with one audit event per reclassified row.

use serde::Serialize;
use tracing::{error, info};

use canteen_core::policy::LegacyPricePolicy;

use crate::repositories::{PurchaseRequestRepository, RepositoryError};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LegacyPolicySummary {
    pub scanned: usize,
    pub reclassified: usize,
    pub reclassified_ids: Vec<String>,
}

pub async fn run_legacy_price_policy(
    repository: &dyn PurchaseRequestRepository,
    correlation_id: &str,
) -> Result<LegacyPolicySummary, RepositoryError> {
    run_legacy_price_policy_with(repository, LegacyPricePolicy::default(), correlation_id).await
}

pub async fn run_legacy_price_policy_with(
    repository: &dyn PurchaseRequestRepository,
    policy: LegacyPricePolicy,
    correlation_id: &str,
) -> Result<LegacyPolicySummary, RepositoryError> {
    info!(
        event_name = "policy.legacy_price.start",
        correlation_id = correlation_id,
        "applying legacy zero-price policy"
    );

    let records = repository.list_all().await?;
    let scanned = records.len();
    let outcome = policy.apply(records);

    if outcome.is_noop() {
        info!(
            event_name = "policy.legacy_price.noop",
            correlation_id = correlation_id,
            scanned,
            "no purchase requests needed reclassification"
        );
        return Ok(LegacyPolicySummary { scanned, ..LegacyPolicySummary::default() });
    }

    let changed: Vec<_> = outcome.changed_records().into_iter().cloned().collect();
    let events: Vec<_> =
        outcome.reclassified.iter().map(|change| change.audit_event(correlation_id)).collect();

    if let Err(err) = repository.apply_reclassifications(&changed, &events).await {
        error!(
            event_name = "policy.legacy_price.failed",
            correlation_id = correlation_id,
            error = %err,
            "legacy zero-price policy could not be persisted"
        );
        return Err(err);
    }

    let reclassified_ids: Vec<String> =
        outcome.reclassified.iter().map(|change| change.id.0.clone()).collect();
    for id in &reclassified_ids {
        info!(
            event_name = "policy.legacy_price.reclassified",
            correlation_id = correlation_id,
            purchase_request_id = %id,
            "approved purchase request with zero unit price was rejected"
        );
    }
    info!(
        event_name = "policy.legacy_price.completed",
        correlation_id = correlation_id,
        scanned,
        reclassified = reclassified_ids.len(),
        "legacy zero-price policy applied"
    );

    Ok(LegacyPolicySummary { scanned, reclassified: reclassified_ids.len(), reclassified_ids })
}
