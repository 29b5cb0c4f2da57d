//! One-time repair of purchase requests written before approvals required a
//! positive unit price.
//!
//! The policy is a pure function over records. Persisting the result is the
//! caller's job (see `canteen_db::normalization`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, SYSTEM_ACTOR};
use crate::domain::purchase_request::{PurchaseRequest, PurchaseRequestId, PurchaseRequestStatus};

pub const LEGACY_ZERO_PRICE_NOTE: &str = "legacy zero-price policy";
pub const RECLASSIFIED_EVENT: &str = "purchase_request.legacy_reclassified";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reclassification {
    pub id: PurchaseRequestId,
    pub previous_status: PurchaseRequestStatus,
    pub new_status: PurchaseRequestStatus,
    pub at: DateTime<Utc>,
}

impl Reclassification {
    pub fn audit_event(&self, correlation_id: &str) -> AuditEvent {
        AuditEvent::new(
            Some(self.id.clone()),
            correlation_id,
            RECLASSIFIED_EVENT,
            AuditCategory::System,
            SYSTEM_ACTOR,
            AuditOutcome::Success,
        )
        .with_metadata("reason", LEGACY_ZERO_PRICE_NOTE)
        .with_metadata("previous_status", self.previous_status.as_str())
        .with_metadata("new_status", self.new_status.as_str())
        .occurred_at(self.at)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyOutcome {
    pub records: Vec<PurchaseRequest>,
    pub reclassified: Vec<Reclassification>,
}

impl PolicyOutcome {
    pub fn is_noop(&self) -> bool {
        self.reclassified.is_empty()
    }

    /// Records the policy rewrote, in input order.
    pub fn changed_records(&self) -> Vec<&PurchaseRequest> {
        self.records
            .iter()
            .filter(|record| self.reclassified.iter().any(|change| change.id == record.id))
            .collect()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LegacyPricePolicy {
    now: DateTime<Utc>,
}

impl Default for LegacyPricePolicy {
    fn default() -> Self {
        Self::at(Utc::now())
    }
}

impl LegacyPricePolicy {
    /// Pins the timestamp written into `updated_at` of rewritten rows.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    pub fn apply(&self, records: Vec<PurchaseRequest>) -> PolicyOutcome {
        let mut reclassified = Vec::new();
        let records = records
            .into_iter()
            .map(|record| match self.reclassify(&record) {
                Some((rewritten, change)) => {
                    reclassified.push(change);
                    rewritten
                }
                None => record,
            })
            .collect();

        PolicyOutcome { records, reclassified }
    }

    fn reclassify(&self, record: &PurchaseRequest) -> Option<(PurchaseRequest, Reclassification)> {
        if !record.violates_price_invariant() {
            return None;
        }

        let mut rewritten = record.clone();
        rewritten.status = PurchaseRequestStatus::Rejected;
        rewritten.reviewed_by = Some(SYSTEM_ACTOR.to_owned());
        rewritten.review_note = Some(LEGACY_ZERO_PRICE_NOTE.to_owned());
        rewritten.updated_at = self.now;

        let change = Reclassification {
            id: record.id.clone(),
            previous_status: record.status,
            new_status: rewritten.status,
            at: self.now,
        };
        Some((rewritten, change))
    }
}

pub fn normalize(records: Vec<PurchaseRequest>) -> Vec<PurchaseRequest> {
    LegacyPricePolicy::default().apply(records).records
}
