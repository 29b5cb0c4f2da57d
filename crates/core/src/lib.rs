pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod numeric;
pub mod policy;
pub mod report;

pub use audit::{AuditCategory, AuditEvent, AuditOutcome};
pub use domain::purchase_request::{
    NewPurchaseRequest, PurchaseRequest, PurchaseRequestId, PurchaseRequestStatus,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use numeric::{
    format_decimal, parse_positive_decimal, DisplayStyle, FieldLimits, NumericField,
    NumericLimits, Rejection,
};
pub use policy::{normalize, LegacyPricePolicy, PolicyOutcome, Reclassification};
pub use report::ProcurementReport;
