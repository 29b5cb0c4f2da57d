//! Purchase-request routes for cooks and admins.
//!
//! - `POST /cook/purchase-requests`                — submit a request (form)
//! - `GET  /cook/dashboard`                        — HTML table of requests
//! - `GET  /purchase-requests`                     — JSON listing, newest first
//! - `POST /admin/purchase-requests/{id}/status`   — approve or reject (form)
//! - `GET  /admin/report.csv`                      — procurement report export

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use tracing::{error, info, warn};
use uuid::Uuid;

use canteen_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
use canteen_core::domain::purchase_request::{
    NewPurchaseRequest, PurchaseRequest, PurchaseRequestId, PurchaseRequestStatus,
};
use canteen_core::errors::{ApplicationError, DomainError, InterfaceError};
use canteen_core::numeric::{NumericField, NumericLimits, Rejection};
use canteen_core::report::ProcurementReport;
use canteen_db::{AuditRepository, PurchaseRequestRepository, RepositoryError};

const DASHBOARD_TEMPLATE: &str = "cook/dashboard.html";
const SUBMITTED_EVENT: &str = "purchase_request.submitted";
const REVIEWED_EVENT: &str = "purchase_request.reviewed";

#[derive(Clone)]
pub struct ProcurementState {
    requests: Arc<dyn PurchaseRequestRepository>,
    audit: Arc<dyn AuditRepository>,
    limits: NumericLimits,
    templates: Arc<Tera>,
}

impl ProcurementState {
    pub fn new(
        requests: Arc<dyn PurchaseRequestRepository>,
        audit: Arc<dyn AuditRepository>,
        limits: NumericLimits,
    ) -> Result<Self, tera::Error> {
        Ok(Self { requests, audit, limits, templates: init_templates()? })
    }
}

fn init_templates() -> Result<Arc<Tera>, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_template(
        DASHBOARD_TEMPLATE,
        include_str!("../../../templates/cook/dashboard.html"),
    )?;
    Ok(Arc::new(tera))
}

pub fn router(state: ProcurementState) -> Router {
    Router::new()
        .route("/cook/purchase-requests", post(submit_purchase_request))
        .route("/cook/dashboard", get(cook_dashboard))
        .route("/purchase-requests", get(list_purchase_requests))
        .route("/admin/purchase-requests/{id}/status", post(review_purchase_request))
        .route("/admin/report.csv", get(export_report))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Every field is optional so that a missing field is reported the same way
/// as an empty one instead of as an extractor failure.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitPurchaseRequestForm {
    pub cook_id: Option<String>,
    pub product_name: Option<String>,
    pub qty: Option<String>,
    pub unit_price: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewForm {
    pub status: Option<String>,
    pub reviewer_id: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub cook_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PurchaseRequestView {
    pub id: String,
    pub cook_id: String,
    pub product_name: String,
    pub quantity: String,
    pub unit_price: String,
    pub total_cost: String,
    pub reason: String,
    pub status: &'static str,
    pub reviewed_by: Option<String>,
    pub review_note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl PurchaseRequestView {
    fn from_request(
        request: &PurchaseRequest,
        limits: &NumericLimits,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            id: request.id.0.clone(),
            cook_id: request.cook_id.clone(),
            product_name: request.product_name.clone(),
            quantity: limits.quantity.format(request.quantity),
            unit_price: limits.unit_price.format(request.unit_price),
            total_cost: limits.unit_price.format(request.total_cost()?),
            reason: request.reason.clone(),
            status: request.status.as_str(),
            reviewed_by: request.reviewed_by.clone(),
            review_note: request.review_note.clone(),
            created_at: request.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            updated_at: request.updated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        })
    }

    fn list(
        requests: &[PurchaseRequest],
        limits: &NumericLimits,
        correlation_id: &str,
    ) -> Result<Vec<Self>, ProcurementError> {
        requests
            .iter()
            .map(|request| Self::from_request(request, limits))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| ProcurementError::arithmetic(error, correlation_id))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrorBody {
    pub field: String,
    pub reason: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

#[derive(Debug)]
pub enum ProcurementError {
    Field(FieldErrorBody),
    Interface(InterfaceError),
}

impl ProcurementError {
    fn field(field: &str, reason: &str, message: impl Into<String>) -> Self {
        Self::Field(FieldErrorBody {
            field: field.to_string(),
            reason: reason.to_string(),
            message: message.into(),
        })
    }

    fn rejected(field: &str, rejection: Rejection, numeric: &NumericField) -> Self {
        Self::field(field, rejection.as_str(), rejection.field_message(field, &numeric.limits))
    }

    fn application(error: ApplicationError, correlation_id: &str) -> Self {
        Self::Interface(error.into_interface(correlation_id))
    }

    /// A stored row whose cost cannot be computed is a data problem, not a
    /// client error.
    fn arithmetic(error: DomainError, correlation_id: &str) -> Self {
        error!(
            event_name = "procurement.cost.overflow",
            correlation_id = correlation_id,
            error = %error,
            "purchase request cost could not be computed"
        );
        Self::Interface(InterfaceError::Internal {
            message: error.to_string(),
            correlation_id: correlation_id.to_string(),
        })
    }

    fn storage(error: RepositoryError, correlation_id: &str) -> Self {
        error!(
            event_name = "procurement.storage.error",
            correlation_id = correlation_id,
            error = %error,
            "purchase request storage failed"
        );
        Self::application(ApplicationError::Persistence(error.to_string()), correlation_id)
    }
}

impl IntoResponse for ProcurementError {
    fn into_response(self) -> Response {
        match self {
            Self::Field(body) => (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response(),
            Self::Interface(error) => {
                let status = match error {
                    InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
                    InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
                    InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let body = ErrorBody {
                    error: error.user_message().to_string(),
                    correlation_id: error.correlation_id().to_string(),
                };
                (status, Json(body)).into_response()
            }
        }
    }
}

fn correlation_id() -> String {
    format!("req-{}", Uuid::new_v4().simple())
}

fn required_text(field: &str, value: Option<&str>) -> Result<String, ProcurementError> {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(ProcurementError::field(
            field,
            Rejection::Empty.as_str(),
            format!("{field}: a value is required"),
        )),
    }
}

fn numeric_input(
    field: &str,
    value: Option<&str>,
    numeric: &NumericField,
) -> Result<rust_decimal::Decimal, ProcurementError> {
    numeric
        .parse(value.unwrap_or_default())
        .map_err(|rejection| ProcurementError::rejected(field, rejection, numeric))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn submit_purchase_request(
    State(state): State<ProcurementState>,
    Form(form): Form<SubmitPurchaseRequestForm>,
) -> Result<(StatusCode, Json<PurchaseRequestView>), ProcurementError> {
    let correlation_id = correlation_id();

    let input = match validate_submission(&form, &state.limits) {
        Ok(input) => input,
        Err(rejected) => {
            if let ProcurementError::Field(body) = &rejected {
                warn!(
                    event_name = "procurement.submission.rejected",
                    correlation_id = %correlation_id,
                    field = %body.field,
                    reason = %body.reason,
                    "purchase request input rejected"
                );
            }
            return Err(rejected);
        }
    };

    let request = PurchaseRequest::submit(input, Utc::now())
        .map_err(|error| ProcurementError::application(error.into(), &correlation_id))?;

    state
        .requests
        .save(request.clone())
        .await
        .map_err(|error| ProcurementError::storage(error, &correlation_id))?;

    let event = AuditEvent::new(
        Some(request.id.clone()),
        correlation_id.as_str(),
        SUBMITTED_EVENT,
        AuditCategory::Procurement,
        request.cook_id.as_str(),
        AuditOutcome::Success,
    )
    .with_metadata("quantity", request.quantity.to_string())
    .with_metadata("unit_price", request.unit_price.to_string());
    state
        .audit
        .append(event)
        .await
        .map_err(|error| ProcurementError::storage(error, &correlation_id))?;

    info!(
        event_name = "procurement.submission.created",
        correlation_id = %correlation_id,
        purchase_request_id = %request.id.0,
        cook_id = %request.cook_id,
        "purchase request submitted"
    );

    let view = PurchaseRequestView::from_request(&request, &state.limits)
        .map_err(|error| ProcurementError::arithmetic(error, &correlation_id))?;
    Ok((StatusCode::CREATED, Json(view)))
}

fn validate_submission(
    form: &SubmitPurchaseRequestForm,
    limits: &NumericLimits,
) -> Result<NewPurchaseRequest, ProcurementError> {
    let cook_id = required_text("cook_id", form.cook_id.as_deref())?;
    let product_name = required_text("product_name", form.product_name.as_deref())?;
    let quantity = numeric_input("qty", form.qty.as_deref(), &limits.quantity)?;
    let unit_price = numeric_input("unit_price", form.unit_price.as_deref(), &limits.unit_price)?;
    let reason = required_text("reason", form.reason.as_deref())?;

    Ok(NewPurchaseRequest { cook_id, product_name, quantity, unit_price, reason })
}

pub async fn list_purchase_requests(
    State(state): State<ProcurementState>,
) -> Result<Json<Vec<PurchaseRequestView>>, ProcurementError> {
    let correlation_id = correlation_id();
    let requests = state
        .requests
        .list_all()
        .await
        .map_err(|error| ProcurementError::storage(error, &correlation_id))?;

    Ok(Json(PurchaseRequestView::list(&requests, &state.limits, &correlation_id)?))
}

pub async fn review_purchase_request(
    Path(id): Path<String>,
    State(state): State<ProcurementState>,
    Form(form): Form<ReviewForm>,
) -> Result<Json<PurchaseRequestView>, ProcurementError> {
    let correlation_id = correlation_id();

    let decision = match form.status.as_deref().and_then(PurchaseRequestStatus::parse) {
        Some(status @ (PurchaseRequestStatus::Approved | PurchaseRequestStatus::Rejected)) => {
            status
        }
        _ => {
            return Err(ProcurementError::field(
                "status",
                "invalid_choice",
                "status: choose approved or rejected",
            ))
        }
    };
    let reviewer_id = required_text("reviewer_id", form.reviewer_id.as_deref())?;
    let note = form.note.as_deref().map(str::trim).filter(|note| !note.is_empty());

    let id = PurchaseRequestId(id);
    let mut request = state
        .requests
        .find_by_id(&id)
        .await
        .map_err(|error| ProcurementError::storage(error, &correlation_id))?
        .ok_or_else(|| {
            ProcurementError::application(
                ApplicationError::NotFound(format!("purchase request {}", id.0)),
                &correlation_id,
            )
        })?;

    let previous = request.status;
    if let Err(domain_error) = request.review(decision, reviewer_id.as_str(), Utc::now()) {
        warn!(
            event_name = "procurement.review.refused",
            correlation_id = %correlation_id,
            purchase_request_id = %id.0,
            error = %domain_error,
            "purchase request review refused"
        );
        let refused = AuditEvent::new(
            Some(id.clone()),
            correlation_id.as_str(),
            REVIEWED_EVENT,
            AuditCategory::Review,
            reviewer_id.as_str(),
            AuditOutcome::Rejected,
        )
        .with_metadata("from", previous.as_str())
        .with_metadata("to", decision.as_str())
        .with_metadata("error", domain_error.to_string());
        state
            .audit
            .append(refused)
            .await
            .map_err(|error| ProcurementError::storage(error, &correlation_id))?;
        return Err(ProcurementError::application(domain_error.into(), &correlation_id));
    }
    if let Some(note) = note {
        request.review_note = Some(note.to_string());
    }

    state
        .requests
        .save(request.clone())
        .await
        .map_err(|error| ProcurementError::storage(error, &correlation_id))?;

    let event = AuditEvent::new(
        Some(request.id.clone()),
        correlation_id.as_str(),
        REVIEWED_EVENT,
        AuditCategory::Review,
        reviewer_id.as_str(),
        AuditOutcome::Success,
    )
    .with_metadata("from", previous.as_str())
    .with_metadata("to", decision.as_str());
    state
        .audit
        .append(event)
        .await
        .map_err(|error| ProcurementError::storage(error, &correlation_id))?;

    info!(
        event_name = "procurement.review.recorded",
        correlation_id = %correlation_id,
        purchase_request_id = %request.id.0,
        decision = decision.as_str(),
        reviewer_id = %reviewer_id,
        "purchase request reviewed"
    );

    let view = PurchaseRequestView::from_request(&request, &state.limits)
        .map_err(|error| ProcurementError::arithmetic(error, &correlation_id))?;
    Ok(Json(view))
}

pub async fn export_report(
    State(state): State<ProcurementState>,
) -> Result<Response, ProcurementError> {
    let correlation_id = correlation_id();
    let requests = state
        .requests
        .list_all()
        .await
        .map_err(|error| ProcurementError::storage(error, &correlation_id))?;

    let report = ProcurementReport::build(&requests, &state.limits, Utc::now())
        .map_err(|error| ProcurementError::arithmetic(error, &correlation_id))?;
    info!(
        event_name = "procurement.report.exported",
        correlation_id = %correlation_id,
        rows = report.rows.len(),
        "procurement report exported"
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"procurement-report.csv\""),
        ],
        report.to_csv(),
    )
        .into_response())
}

pub async fn cook_dashboard(
    State(state): State<ProcurementState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Html<String>, ProcurementError> {
    let correlation_id = correlation_id();
    let cook_id = query.cook_id.map(|id| id.trim().to_string()).unwrap_or_default();

    let requests: Vec<PurchaseRequest> = state
        .requests
        .list_all()
        .await
        .map_err(|error| ProcurementError::storage(error, &correlation_id))?
        .into_iter()
        .filter(|request| cook_id.is_empty() || request.cook_id == cook_id)
        .collect();

    let report = ProcurementReport::build(&requests, &state.limits, Utc::now())
        .map_err(|error| ProcurementError::arithmetic(error, &correlation_id))?;
    let views = PurchaseRequestView::list(&requests, &state.limits, &correlation_id)?;

    let mut context = Context::new();
    context.insert("cook_id", &cook_id);
    context.insert("requests", &views);
    context.insert("approved_procurement_cost", &report.approved_procurement_cost_display);

    state.templates.render(DASHBOARD_TEMPLATE, &context).map(Html).map_err(|error| {
        error!(
            event_name = "procurement.dashboard.render_failed",
            correlation_id = %correlation_id,
            error = %error,
            "cook dashboard template failed to render"
        );
        ProcurementError::application(
            ApplicationError::Configuration(format!("dashboard template: {error}")),
            &correlation_id,
        )
    })
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        extract::{Path, Query, State},
        http::{Request, StatusCode},
        response::IntoResponse,
        Form,
    };
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use tower::ServiceExt;

    use canteen_core::audit::AuditOutcome;
    use canteen_core::domain::purchase_request::{
        PurchaseRequest, PurchaseRequestId, PurchaseRequestStatus,
    };
    use canteen_core::numeric::{NumericField, NumericLimits};
    use canteen_db::{
        AuditRepository, InMemoryAuditRepository, InMemoryPurchaseRequestRepository,
        PurchaseRequestRepository,
    };

    use super::{
        cook_dashboard, review_purchase_request, router, submit_purchase_request,
        DashboardQuery, FieldErrorBody, ProcurementError, ProcurementState, ReviewForm,
        SubmitPurchaseRequestForm,
    };

    struct Harness {
        requests: Arc<InMemoryPurchaseRequestRepository>,
        audit: Arc<InMemoryAuditRepository>,
        state: ProcurementState,
    }

    fn harness() -> Harness {
        let audit = Arc::new(InMemoryAuditRepository::default());
        let requests = Arc::new(InMemoryPurchaseRequestRepository::with_audit(audit.clone()));
        let state = ProcurementState::new(requests.clone(), audit.clone(), NumericLimits::default())
            .expect("templates should load");
        Harness { requests, audit, state }
    }

    fn form(qty: &str, unit_price: &str) -> SubmitPurchaseRequestForm {
        SubmitPurchaseRequestForm {
            cook_id: Some("cook-1".to_string()),
            product_name: Some("Buckwheat".to_string()),
            qty: Some(qty.to_string()),
            unit_price: Some(unit_price.to_string()),
            reason: Some("Breakfast porridge".to_string()),
        }
    }

    fn field_error(result: Result<impl Sized, ProcurementError>) -> FieldErrorBody {
        match result {
            Err(ProcurementError::Field(body)) => body,
            Err(other) => panic!("expected field error, got {other:?}"),
            Ok(_) => panic!("expected field error, got success"),
        }
    }

    fn stored(id: &str, status: PurchaseRequestStatus, unit_price: Decimal) -> PurchaseRequest {
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).single().expect("timestamp");
        PurchaseRequest {
            id: PurchaseRequestId(id.to_string()),
            cook_id: "cook-1".to_string(),
            product_name: "Rice".to_string(),
            quantity: Decimal::new(5, 0),
            unit_price,
            reason: "Side dish".to_string(),
            status,
            reviewed_by: None,
            review_note: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn submit_creates_pending_request_with_exact_decimals() {
        let h = harness();

        let (status, body) =
            submit_purchase_request(State(h.state.clone()), Form(form("12.345", "71.50")))
                .await
                .expect("submission should succeed");

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.0.status, "pending");
        assert_eq!(body.0.quantity, "12.345");
        assert_eq!(body.0.unit_price, "71.50");
        assert_eq!(body.0.total_cost, "882.67");

        let saved = h
            .requests
            .find_by_id(&PurchaseRequestId(body.0.id.clone()))
            .await
            .expect("find")
            .expect("saved");
        assert_eq!(saved.quantity, Decimal::from_str("12.345").expect("decimal"));
        assert_eq!(h.audit.all().await.len(), 1);
    }

    #[tokio::test]
    async fn submit_rejects_exponent_and_non_finite_quantities() {
        let h = harness();

        let exponent =
            field_error(submit_purchase_request(State(h.state.clone()), Form(form("1e3", "10"))).await);
        assert_eq!(exponent.field, "qty");
        assert_eq!(exponent.reason, "exponent_not_allowed");

        let infinite =
            field_error(submit_purchase_request(State(h.state.clone()), Form(form("inf", "10"))).await);
        assert_eq!(infinite.reason, "non_finite");

        let nan =
            field_error(submit_purchase_request(State(h.state.clone()), Form(form("NaN", "10"))).await);
        assert_eq!(nan.reason, "non_finite");

        assert!(h.requests.list_all().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn submit_rejects_zero_price_and_oversized_values() {
        let h = harness();

        let zero =
            field_error(submit_purchase_request(State(h.state.clone()), Form(form("5", "0"))).await);
        assert_eq!(zero.field, "unit_price");
        assert_eq!(zero.reason, "not_positive");

        let huge = field_error(
            submit_purchase_request(State(h.state.clone()), Form(form("1000000000", "1"))).await,
        );
        assert_eq!(huge.reason, "too_large");

        let precise =
            field_error(submit_purchase_request(State(h.state.clone()), Form(form("1", "0.001"))).await);
        assert_eq!(precise.reason, "too_precise");
        assert_eq!(precise.message, "unit_price: at most 2 digits after the decimal point");
    }

    #[tokio::test]
    async fn submit_requires_text_fields() {
        let h = harness();
        let mut missing_reason = form("5", "80");
        missing_reason.reason = Some("   ".to_string());

        let error =
            field_error(submit_purchase_request(State(h.state.clone()), Form(missing_reason)).await);
        assert_eq!(error.field, "reason");
        assert_eq!(error.reason, "empty");
    }

    #[tokio::test]
    async fn review_approves_pending_request_and_records_audit() {
        let h = harness();
        h.requests
            .save(stored("PR-1", PurchaseRequestStatus::Pending, Decimal::new(8000, 2)))
            .await
            .expect("save");

        let body = review_purchase_request(
            Path("PR-1".to_string()),
            State(h.state.clone()),
            Form(ReviewForm {
                status: Some("approved".to_string()),
                reviewer_id: Some("admin-1".to_string()),
                note: None,
            }),
        )
        .await
        .expect("review should succeed");

        assert_eq!(body.0.status, "approved");
        assert_eq!(body.0.reviewed_by.as_deref(), Some("admin-1"));
        let events = h
            .audit
            .list_for_subject(&PurchaseRequestId("PR-1".to_string()))
            .await
            .expect("events");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].metadata.get("to").map(String::as_str), Some("approved"));
    }

    #[tokio::test]
    async fn review_refuses_second_decision() {
        let h = harness();
        h.requests
            .save(stored("PR-1", PurchaseRequestStatus::Rejected, Decimal::new(8000, 2)))
            .await
            .expect("save");

        let result = review_purchase_request(
            Path("PR-1".to_string()),
            State(h.state.clone()),
            Form(ReviewForm {
                status: Some("approved".to_string()),
                reviewer_id: Some("admin-1".to_string()),
                note: None,
            }),
        )
        .await;

        let response = result.expect_err("second review must fail").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let events = h.audit.all().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome, AuditOutcome::Rejected);
    }

    #[tokio::test]
    async fn review_refuses_approval_of_zero_price_request() {
        let h = harness();
        h.requests
            .save(stored("PR-0", PurchaseRequestStatus::Pending, Decimal::ZERO))
            .await
            .expect("save");

        let result = review_purchase_request(
            Path("PR-0".to_string()),
            State(h.state.clone()),
            Form(ReviewForm {
                status: Some("approved".to_string()),
                reviewer_id: Some("admin-1".to_string()),
                note: None,
            }),
        )
        .await;

        assert!(result.is_err());
        let unchanged = h
            .requests
            .find_by_id(&PurchaseRequestId("PR-0".to_string()))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(unchanged.status, PurchaseRequestStatus::Pending);
    }

    #[tokio::test]
    async fn review_rejects_unknown_status_and_missing_request() {
        let h = harness();

        let invalid = field_error(
            review_purchase_request(
                Path("PR-1".to_string()),
                State(h.state.clone()),
                Form(ReviewForm {
                    status: Some("pending".to_string()),
                    reviewer_id: Some("admin-1".to_string()),
                    note: None,
                }),
            )
            .await,
        );
        assert_eq!(invalid.field, "status");

        let missing = review_purchase_request(
            Path("PR-404".to_string()),
            State(h.state.clone()),
            Form(ReviewForm {
                status: Some("rejected".to_string()),
                reviewer_id: Some("admin-1".to_string()),
                note: Some("duplicate".to_string()),
            }),
        )
        .await
        .expect_err("unknown id must fail")
        .into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn dashboard_renders_formatted_decimals_without_exponents() {
        let h = harness();
        submit_purchase_request(State(h.state.clone()), Form(form("12.345", "71.50")))
            .await
            .expect("submit");

        let html = cook_dashboard(
            State(h.state.clone()),
            Query(DashboardQuery { cook_id: Some("cook-1".to_string()) }),
        )
        .await
        .expect("render")
        .0;

        assert!(html.contains("12.345"));
        assert!(html.contains("71.50"));
        assert!(html.contains("882.67"));
        assert!(!html.to_lowercase().contains("e+"));
    }

    #[tokio::test]
    async fn router_returns_unprocessable_entity_json_for_rejected_input() {
        let h = harness();
        let app = router(h.state.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/cook/purchase-requests")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from("cook_id=cook-1&product_name=Salt&qty=1e3&unit_price=2&reason=r"))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body: FieldErrorBody = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body.field, "qty");
        assert_eq!(body.reason, "exponent_not_allowed");
    }

    #[tokio::test]
    async fn router_exports_csv_report() {
        let h = harness();
        h.requests
            .save(stored("PR-1", PurchaseRequestStatus::Approved, Decimal::new(80, 0)))
            .await
            .expect("save");
        let app = router(h.state.clone());

        let response = app
            .oneshot(Request::builder().uri("/admin/report.csv").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(content_type.starts_with("text/csv"));
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let csv = String::from_utf8(bytes.to_vec()).expect("utf8");
        assert!(csv.starts_with("generated_at,"));
        assert!(csv.contains("approved_procurement_cost,400.00"));
    }

    #[tokio::test]
    async fn overflowing_stored_row_yields_internal_error_instead_of_panicking() {
        let h = harness();
        let mut legacy = stored("PR-BULK", PurchaseRequestStatus::Approved, Decimal::new(80, 0));
        legacy.quantity = Decimal::MAX;
        h.requests.save(legacy).await.expect("save");
        let app = router(h.state.clone());

        for uri in ["/purchase-requests", "/admin/report.csv", "/cook/dashboard"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "uri {uri}");
        }
    }

    #[tokio::test]
    async fn submit_refuses_cost_overflow_under_wide_limits() {
        let audit = Arc::new(InMemoryAuditRepository::default());
        let requests = Arc::new(InMemoryPurchaseRequestRepository::with_audit(audit.clone()));
        let ceiling = Decimal::from_str("100000000000000000000").expect("ceiling");
        let limits = NumericLimits {
            quantity: NumericField::quantity(ceiling, 4),
            unit_price: NumericField::money(ceiling, 2),
        };
        let state =
            ProcurementState::new(requests.clone(), audit, limits).expect("templates should load");

        let huge = "90000000000000000000";
        let result = submit_purchase_request(State(state), Form(form(huge, huge))).await;

        let response = match result {
            Err(error) => error.into_response(),
            Ok(_) => panic!("overflowing submission must be refused"),
        };
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(requests.list_all().await.expect("list").is_empty());
    }
}
