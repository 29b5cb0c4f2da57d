use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PurchaseRequestId(pub String);

impl PurchaseRequestId {
    pub fn generate() -> Self {
        Self(format!("PR-{}", &Uuid::new_v4().simple().to_string()[..12]))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl PurchaseRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub id: PurchaseRequestId,
    pub cook_id: String,
    pub product_name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub reason: String,
    pub status: PurchaseRequestStatus,
    pub reviewed_by: Option<String>,
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for a new request. Quantity and price are expected to come
/// out of [`crate::numeric::parse_positive_decimal`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPurchaseRequest {
    pub cook_id: String,
    pub product_name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub reason: String,
}

impl PurchaseRequest {
    pub fn submit(input: NewPurchaseRequest, now: DateTime<Utc>) -> Result<Self, DomainError> {
        let product_name = input.product_name.trim();
        let reason = input.reason.trim();
        let cook_id = input.cook_id.trim();
        if cook_id.is_empty() || product_name.is_empty() || reason.is_empty() {
            return Err(DomainError::InvariantViolation(
                "cook, product name and reason are required".to_owned(),
            ));
        }
        if input.quantity <= Decimal::ZERO || input.unit_price <= Decimal::ZERO {
            return Err(DomainError::InvariantViolation(
                "quantity and unit price must be positive".to_owned(),
            ));
        }
        if input.quantity.checked_mul(input.unit_price).is_none() {
            return Err(DomainError::InvariantViolation(
                "quantity times unit price is too large".to_owned(),
            ));
        }

        Ok(Self {
            id: PurchaseRequestId::generate(),
            cook_id: cook_id.to_owned(),
            product_name: product_name.to_owned(),
            quantity: input.quantity,
            unit_price: input.unit_price,
            reason: reason.to_owned(),
            status: PurchaseRequestStatus::Pending,
            reviewed_by: None,
            review_note: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// `quantity * unit_price`. Rows read back from storage carry no bound, so
    /// the product is checked.
    pub fn total_cost(&self) -> Result<Decimal, DomainError> {
        self.quantity
            .checked_mul(self.unit_price)
            .ok_or_else(|| DomainError::CostOverflow(self.id.0.clone()))
    }

    /// An approved request must carry a positive unit price.
    pub fn violates_price_invariant(&self) -> bool {
        self.status == PurchaseRequestStatus::Approved && self.unit_price.is_zero()
    }

    pub fn can_transition_to(&self, next: PurchaseRequestStatus) -> bool {
        matches!(
            (self.status, next),
            (PurchaseRequestStatus::Pending, PurchaseRequestStatus::Approved)
                | (PurchaseRequestStatus::Pending, PurchaseRequestStatus::Rejected)
        )
    }

    pub fn review(
        &mut self,
        decision: PurchaseRequestStatus,
        reviewer: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.can_transition_to(decision) {
            return Err(DomainError::InvalidStatusTransition { from: self.status, to: decision });
        }
        if decision == PurchaseRequestStatus::Approved && self.unit_price <= Decimal::ZERO {
            return Err(DomainError::InvariantViolation(
                "a request without a positive unit price cannot be approved".to_owned(),
            ));
        }

        self.status = decision;
        self.reviewed_by = Some(reviewer.into());
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{NewPurchaseRequest, PurchaseRequest, PurchaseRequestStatus};
    use crate::errors::DomainError;

    fn new_request(unit_price: Decimal) -> NewPurchaseRequest {
        NewPurchaseRequest {
            cook_id: "cook-1".to_string(),
            product_name: " Rice ".to_string(),
            quantity: Decimal::new(5, 0),
            unit_price,
            reason: "Side dish".to_string(),
        }
    }

    #[test]
    fn submit_creates_pending_request_with_trimmed_fields() {
        let request =
            PurchaseRequest::submit(new_request(Decimal::new(80, 0)), Utc::now()).expect("submit");

        assert_eq!(request.status, PurchaseRequestStatus::Pending);
        assert_eq!(request.product_name, "Rice");
        assert!(request.id.0.starts_with("PR-"));
        assert_eq!(request.total_cost(), Ok(Decimal::new(400, 0)));
    }

    #[test]
    fn submit_refuses_amounts_whose_cost_overflows() {
        let huge = Decimal::from_str_exact("90000000000000000000").expect("huge");
        let mut input = new_request(huge);
        input.quantity = huge;

        let error = PurchaseRequest::submit(input, Utc::now()).expect_err("overflowing cost");
        assert!(matches!(error, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn total_cost_reports_overflow_for_unbounded_stored_rows() {
        let mut request =
            PurchaseRequest::submit(new_request(Decimal::ONE), Utc::now()).expect("submit");
        request.quantity = Decimal::MAX;
        request.unit_price = Decimal::from(2);

        assert_eq!(request.total_cost(), Err(DomainError::CostOverflow(request.id.0.clone())));
    }

    #[test]
    fn submit_rejects_blank_reason() {
        let mut input = new_request(Decimal::ONE);
        input.reason = "   ".to_string();

        let error = PurchaseRequest::submit(input, Utc::now()).expect_err("blank reason");
        assert!(matches!(error, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn pending_request_can_be_approved_once() {
        let mut request =
            PurchaseRequest::submit(new_request(Decimal::new(7150, 2)), Utc::now()).expect("submit");

        request.review(PurchaseRequestStatus::Approved, "admin-1", Utc::now()).expect("approve");
        assert_eq!(request.status, PurchaseRequestStatus::Approved);
        assert_eq!(request.reviewed_by.as_deref(), Some("admin-1"));

        let error = request
            .review(PurchaseRequestStatus::Rejected, "admin-1", Utc::now())
            .expect_err("already reviewed");
        assert!(matches!(error, DomainError::InvalidStatusTransition { .. }));
    }

    #[test]
    fn zero_price_request_cannot_be_approved() {
        let mut request =
            PurchaseRequest::submit(new_request(Decimal::ONE), Utc::now()).expect("submit");
        request.unit_price = Decimal::ZERO;

        let error = request
            .review(PurchaseRequestStatus::Approved, "admin-1", Utc::now())
            .expect_err("zero price approval");
        assert!(matches!(error, DomainError::InvariantViolation(_)));
        assert_eq!(request.status, PurchaseRequestStatus::Pending);
    }

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!(PurchaseRequestStatus::parse(" Approved "), Some(PurchaseRequestStatus::Approved));
        assert_eq!(PurchaseRequestStatus::parse("escalated"), None);
    }
}
