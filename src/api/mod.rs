//! HTTP surface
//!
//! Handlers are thin: extract, call one service, shape the JSON. Every handle
//! lives in [`AppState`] so tests can swap repositories, storage, the payment
//! gateway and the email sender for in-memory doubles.

pub mod applications;
pub mod documents;
pub mod health;
pub mod payments;
pub mod webhooks;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, FromRef},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};

use crate::config::PayPalMode;
use crate::database::repository::{
    ApplicationRepository, DocumentRepository, PaymentRepository, SnapshotRepository,
};
use crate::error::{AppError, AppResult};
use crate::health::HealthChecker;
use crate::middleware::auth::TokenVerifier;
use crate::middleware::error::get_request_id_from_headers;
use crate::middleware::logging::{request_logging_middleware, UuidRequestId};
use crate::payments::gateway::PaymentGateway;
use crate::services::notification::EmailSender;
use crate::services::{
    ApplicationService, DocumentUploadService, NotificationDispatcher, PaymentCaptureService,
    PaymentOrderService, SubmissionService, WebhookProcessor,
};
use crate::storage::ObjectStorage;

/// Largest accepted upload body: the 2 MiB passport cap plus multipart framing
const UPLOAD_BODY_LIMIT: usize = 2 * 1024 * 1024 + 64 * 1024;

/// Values exposed by `GET /api/paypal/config`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPayPalConfig {
    pub client_id: Option<String>,
    pub mode: PayPalMode,
}

/// Collaborators the services are built from
pub struct AppDependencies {
    pub applications: Arc<dyn ApplicationRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub documents: Arc<dyn DocumentRepository>,
    pub snapshots: Arc<dyn SnapshotRepository>,
    pub storage: Arc<dyn ObjectStorage>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub email: Arc<dyn EmailSender>,
    pub admin_email: String,
    pub token_verifier: Arc<TokenVerifier>,
    pub health_checker: HealthChecker,
    pub paypal: PublicPayPalConfig,
}

#[derive(Clone)]
pub struct AppState {
    pub applications: Arc<ApplicationService>,
    pub orders: Arc<PaymentOrderService>,
    pub captures: Arc<PaymentCaptureService>,
    pub webhooks: Arc<WebhookProcessor>,
    pub uploads: Arc<DocumentUploadService>,
    pub submissions: Arc<SubmissionService>,
    pub token_verifier: Arc<TokenVerifier>,
    pub health_checker: HealthChecker,
    pub paypal: PublicPayPalConfig,
}

impl AppState {
    pub fn new(deps: AppDependencies) -> Self {
        let notifications = Arc::new(NotificationDispatcher::new(deps.email, deps.admin_email));
        let captures = Arc::new(PaymentCaptureService::new(
            deps.gateway.clone(),
            deps.payments.clone(),
            notifications.clone(),
        ));

        Self {
            applications: Arc::new(ApplicationService::new(deps.applications.clone())),
            orders: Arc::new(PaymentOrderService::new(
                deps.gateway.clone(),
                deps.payments.clone(),
                deps.applications.clone(),
            )),
            webhooks: Arc::new(WebhookProcessor::new(
                deps.gateway,
                deps.payments.clone(),
                captures.clone(),
            )),
            captures,
            uploads: Arc::new(DocumentUploadService::new(
                deps.applications.clone(),
                deps.documents.clone(),
                deps.storage.clone(),
            )),
            submissions: Arc::new(SubmissionService::new(
                deps.applications,
                deps.documents,
                deps.payments,
                deps.snapshots,
                deps.storage,
                notifications,
            )),
            token_verifier: deps.token_verifier,
            health_checker: deps.health_checker,
            paypal: deps.paypal,
        }
    }
}

impl FromRef<AppState> for Arc<TokenVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.token_verifier.clone()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/health/live", get(health::liveness))
        .route("/api/paypal/config", get(payments::get_config))
        .route("/api/paypal/create-order", post(payments::create_order))
        .route("/api/paypal/capture-order", post(payments::capture_order))
        .route("/api/paypal/webhook", post(webhooks::handle_webhook))
        .route(
            "/api/documents/upload",
            post(documents::upload_document).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/eligibility", post(applications::check_eligibility))
        .route("/api/applications", post(applications::create_draft))
        .route("/api/applications/submit", post(applications::submit_application))
        .route(
            "/api/applications/{id}",
            get(applications::get_draft)
                .patch(applications::update_draft)
                .delete(applications::delete_draft),
        )
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}

/// Stamp the caller's request id onto an error before it is rendered
pub(crate) fn tag_request(headers: &HeaderMap) -> impl Fn(AppError) -> AppError + '_ {
    move |err| match get_request_id_from_headers(headers) {
        Some(request_id) => err.with_request_id(request_id),
        None => err,
    }
}

/// Turn a JSON extraction failure into a 400 with the standard error body
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::invalid_field("body", rejection.body_text()))
}
