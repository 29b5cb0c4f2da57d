//! Procurement summary and its CSV export.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::purchase_request::{PurchaseRequest, PurchaseRequestStatus};
use crate::errors::DomainError;
use crate::numeric::NumericLimits;

const REQUEST_COLUMNS: &[&str] = &[
    "id",
    "product_name",
    "quantity",
    "unit_price",
    "total_cost",
    "status",
    "cook_id",
    "reviewed_by",
    "review_note",
    "created_at",
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub id: String,
    pub product_name: String,
    pub quantity: String,
    pub unit_price: String,
    pub total_cost: String,
    pub status: &'static str,
    pub cook_id: String,
    pub reviewed_by: String,
    pub review_note: String,
    pub created_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProcurementReport {
    pub generated_at: DateTime<Utc>,
    pub pending_requests: usize,
    pub approved_requests: usize,
    pub rejected_requests: usize,
    pub approved_procurement_cost: Decimal,
    pub approved_procurement_cost_display: String,
    pub rows: Vec<ReportRow>,
}

impl ProcurementReport {
    /// Fails with [`DomainError::CostOverflow`] when a row's cost or the
    /// approved total does not fit a `Decimal`.
    pub fn build(
        requests: &[PurchaseRequest],
        limits: &NumericLimits,
        generated_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let count =
            |status: PurchaseRequestStatus| requests.iter().filter(|r| r.status == status).count();

        let mut approved_procurement_cost = Decimal::ZERO;
        let mut rows = Vec::with_capacity(requests.len());
        for request in requests {
            let total_cost = request.total_cost()?;
            if request.status == PurchaseRequestStatus::Approved {
                approved_procurement_cost = approved_procurement_cost
                    .checked_add(total_cost)
                    .ok_or_else(|| DomainError::CostOverflow("approved total".to_owned()))?;
            }
            rows.push(ReportRow {
                id: request.id.0.clone(),
                product_name: request.product_name.clone(),
                quantity: limits.quantity.format(request.quantity),
                unit_price: limits.unit_price.format(request.unit_price),
                total_cost: limits.unit_price.format(total_cost),
                status: request.status.as_str(),
                cook_id: request.cook_id.clone(),
                reviewed_by: request.reviewed_by.clone().unwrap_or_default(),
                review_note: request.review_note.clone().unwrap_or_default(),
                created_at: request.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            });
        }

        Ok(Self {
            generated_at,
            pending_requests: count(PurchaseRequestStatus::Pending),
            approved_requests: count(PurchaseRequestStatus::Approved),
            rejected_requests: count(PurchaseRequestStatus::Rejected),
            approved_procurement_cost,
            approved_procurement_cost_display: limits.unit_price.format(approved_procurement_cost),
            rows,
        })
    }

    pub fn to_csv(&self) -> String {
        let generated_at = self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        let pending = self.pending_requests.to_string();
        let approved = self.approved_requests.to_string();
        let rejected = self.rejected_requests.to_string();

        let mut lines = vec![
            csv_line(&["generated_at", generated_at.as_str()]),
            csv_line(&["metric", "value"]),
            csv_line(&["pending_requests", pending.as_str()]),
            csv_line(&["approved_requests", approved.as_str()]),
            csv_line(&["rejected_requests", rejected.as_str()]),
            csv_line(&[
                "approved_procurement_cost",
                self.approved_procurement_cost_display.as_str(),
            ]),
            String::new(),
            csv_line(REQUEST_COLUMNS),
        ];

        lines.extend(self.rows.iter().map(|row| {
            csv_line(&[
                row.id.as_str(),
                row.product_name.as_str(),
                row.quantity.as_str(),
                row.unit_price.as_str(),
                row.total_cost.as_str(),
                row.status,
                row.cook_id.as_str(),
                row.reviewed_by.as_str(),
                row.review_note.as_str(),
                row.created_at.as_str(),
            ])
        }));

        let mut output = lines.join("\r\n");
        output.push_str("\r\n");
        output
    }
}

fn csv_line(fields: &[&str]) -> String {
    fields.iter().map(|field| csv_field(field)).collect::<Vec<_>>().join(",")
}

/// Quotes a field when it holds a delimiter, quote or line break (RFC 4180).
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{csv_field, ProcurementReport};
    use crate::domain::purchase_request::{
        PurchaseRequest, PurchaseRequestId, PurchaseRequestStatus,
    };
    use crate::errors::DomainError;
    use crate::numeric::NumericLimits;

    fn request(
        id: &str,
        product: &str,
        quantity: &str,
        unit_price: &str,
        status: PurchaseRequestStatus,
    ) -> PurchaseRequest {
        let created = Utc.with_ymd_and_hms(2026, 2, 3, 9, 30, 0).single().expect("timestamp");
        PurchaseRequest {
            id: PurchaseRequestId(id.to_string()),
            cook_id: "cook-1".to_string(),
            product_name: product.to_string(),
            quantity: Decimal::from_str(quantity).expect("quantity"),
            unit_price: Decimal::from_str(unit_price).expect("price"),
            reason: "menu".to_string(),
            status,
            reviewed_by: None,
            review_note: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn approved_cost_sums_only_approved_requests() {
        let requests = vec![
            request("PR-1", "Rice", "5", "80", PurchaseRequestStatus::Approved),
            request("PR-2", "Buckwheat", "12.345", "71.50", PurchaseRequestStatus::Pending),
            request("PR-3", "Eggs", "300", "9.90", PurchaseRequestStatus::Rejected),
        ];
        let report = ProcurementReport::build(&requests, &NumericLimits::default(), Utc::now())
            .expect("report builds");

        assert_eq!(report.approved_procurement_cost, Decimal::new(400, 0));
        assert_eq!(report.approved_procurement_cost_display, "400.00");
        assert_eq!(
            (report.pending_requests, report.approved_requests, report.rejected_requests),
            (1, 1, 1)
        );
        assert_eq!(report.rows[1].quantity, "12.345");
        assert_eq!(report.rows[1].unit_price, "71.50");
        assert_eq!(report.rows[1].total_cost, "882.67");
    }

    #[test]
    fn csv_contains_summary_and_rows_without_exponents() {
        let generated = Utc.with_ymd_and_hms(2026, 2, 4, 12, 0, 0).single().expect("timestamp");
        let requests = vec![
            request("PR-1", "Rice", "5", "80", PurchaseRequestStatus::Approved),
            request("PR-2", "Salt, iodized", "0.001", "999999999.99", PurchaseRequestStatus::Pending),
        ];
        let csv = ProcurementReport::build(&requests, &NumericLimits::default(), generated)
            .expect("report builds")
            .to_csv();

        assert!(csv.starts_with("generated_at,2026-02-04T12:00:00Z\r\n"));
        assert!(csv.contains("approved_procurement_cost,400.00\r\n"));
        assert!(csv.contains("PR-1,Rice,5,80.00,400.00,approved,cook-1,,,2026-02-03T09:30:00Z"));
        assert!(csv.contains("PR-2,\"Salt, iodized\",0.001,999999999.99,1000000.00,pending"));
        assert!(!csv.to_lowercase().contains("e+"));
    }

    #[test]
    fn overflowing_stored_row_fails_the_report_instead_of_panicking() {
        let huge = "90000000000000000000";
        let requests = vec![
            request("PR-1", "Rice", "5", "80", PurchaseRequestStatus::Approved),
            request("PR-9", "Legacy bulk", huge, huge, PurchaseRequestStatus::Pending),
        ];

        let error = ProcurementReport::build(&requests, &NumericLimits::default(), Utc::now())
            .expect_err("overflow is reported");
        assert_eq!(error, DomainError::CostOverflow("PR-9".to_string()));
    }

    #[test]
    fn approved_total_overflow_is_reported() {
        let big = "200000000000000";
        let requests = vec![
            request("PR-1", "Flour", big, big, PurchaseRequestStatus::Approved),
            request("PR-2", "Sugar", big, big, PurchaseRequestStatus::Approved),
        ];

        let error = ProcurementReport::build(&requests, &NumericLimits::default(), Utc::now())
            .expect_err("sum overflow is reported");
        assert_eq!(error, DomainError::CostOverflow("approved total".to_string()));
    }

    #[test]
    fn csv_field_escapes_quotes_and_line_breaks() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }
}
