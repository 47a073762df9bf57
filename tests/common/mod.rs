//! Shared fixtures: in-memory state, a scripted payment gateway, a recording
//! email sender and bearer tokens.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use chrono::NaiveDate;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::value::RawValue;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use evisa_backend::api::{self, AppDependencies, AppState, PublicPayPalConfig};
use evisa_backend::config::{AuthConfig, PayPalMode};
use evisa_backend::database::application_repository::VisaApplication;
use evisa_backend::database::memory::InMemoryStore;
use evisa_backend::health::HealthChecker;
use evisa_backend::middleware::auth::{AuthUser, TokenVerifier};
use evisa_backend::payments::types::{
    CaptureOutcome, CaptureStatus, CreateOrderRequest, CreatedOrder, WebhookHeaders,
};
use evisa_backend::payments::{PaymentError, PaymentGateway, PaymentResult};
use evisa_backend::services::notification::{Email, EmailError, EmailSender};
use evisa_backend::storage::InMemoryStorage;

pub const JWT_SECRET: &str = "integration-test-secret-0123456789";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const PAYER_EMAIL: &str = "payer@example.com";

/// What the next capture call returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureScript {
    Complete,
    Pending,
    ReportDeclined,
    InstrumentDeclined,
    Unavailable,
}

pub struct MockGateway {
    orders_created: AtomicUsize,
    captures: AtomicUsize,
    script: Mutex<CaptureScript>,
    verify_result: AtomicBool,
    last_order: Mutex<Option<CreateOrderRequest>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            orders_created: AtomicUsize::new(0),
            captures: AtomicUsize::new(0),
            script: Mutex::new(CaptureScript::Complete),
            verify_result: AtomicBool::new(true),
            last_order: Mutex::new(None),
        }
    }
}

impl MockGateway {
    pub fn capture_calls(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    pub fn orders_created(&self) -> usize {
        self.orders_created.load(Ordering::SeqCst)
    }

    pub async fn script_capture(&self, script: CaptureScript) {
        *self.script.lock().await = script;
    }

    pub fn set_verification(&self, verified: bool) {
        self.verify_result.store(verified, Ordering::SeqCst);
    }

    pub async fn last_order(&self) -> Option<CreateOrderRequest> {
        self.last_order.lock().await.clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_order(&self, request: &CreateOrderRequest) -> PaymentResult<CreatedOrder> {
        let n = self.orders_created.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_order.lock().await = Some(request.clone());
        Ok(CreatedOrder {
            order_id: format!("ORDER-{}", n),
            status: "CREATED".to_string(),
        })
    }

    async fn capture_order(&self, order_id: &str) -> PaymentResult<CaptureOutcome> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        let outcome = |status: CaptureStatus| CaptureOutcome {
            order_id: order_id.to_string(),
            status,
            capture_id: Some(format!("CAP-{}", order_id)),
            payer_email: Some(PAYER_EMAIL.to_string()),
            payer_name: Some("Jean Dupont".to_string()),
        };
        match *self.script.lock().await {
            CaptureScript::Complete => Ok(outcome(CaptureStatus::Completed)),
            CaptureScript::Pending => Ok(outcome(CaptureStatus::Pending)),
            CaptureScript::ReportDeclined => Ok(outcome(CaptureStatus::Declined)),
            CaptureScript::InstrumentDeclined => Err(PaymentError::CaptureFailed {
                name: "UNPROCESSABLE_ENTITY".to_string(),
                message: "The requested action could not be performed".to_string(),
                debug_id: Some("dbg-1".to_string()),
                details: vec!["INSTRUMENT_DECLINED: declined".to_string()],
                issue: Some("INSTRUMENT_DECLINED".to_string()),
            }),
            CaptureScript::Unavailable => Err(PaymentError::ProviderError {
                message: "upstream unavailable".to_string(),
                provider_code: None,
                debug_id: None,
                retryable: true,
            }),
        }
    }

    async fn verify_webhook_signature(
        &self,
        _headers: &WebhookHeaders,
        _event: &RawValue,
    ) -> PaymentResult<bool> {
        Ok(self.verify_result.load(Ordering::SeqCst))
    }
}

#[derive(Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<Email>>,
}

impl RecordingEmailSender {
    pub async fn sent(&self) -> Vec<Email> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_to(&self, to: &str) -> usize {
        self.sent.lock().await.iter().filter(|e| e.to == to).count()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, email: &Email) -> Result<(), EmailError> {
        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub storage: Arc<InMemoryStorage>,
    pub gateway: Arc<MockGateway>,
    pub email: Arc<RecordingEmailSender>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let storage = Arc::new(InMemoryStorage::new());
        let gateway = Arc::new(MockGateway::default());
        let email = Arc::new(RecordingEmailSender::default());

        let state = AppState::new(AppDependencies {
            applications: store.clone(),
            payments: store.clone(),
            documents: store.clone(),
            snapshots: store.clone(),
            storage: storage.clone(),
            gateway: gateway.clone(),
            email: email.clone(),
            admin_email: ADMIN_EMAIL.to_string(),
            token_verifier: Arc::new(TokenVerifier::new(&auth_config())),
            health_checker: HealthChecker::new(None, true, true),
            paypal: PublicPayPalConfig {
                client_id: Some("public-client-id".to_string()),
                mode: PayPalMode::Sandbox,
            },
        });

        Self {
            state,
            store,
            storage,
            gateway,
            email,
        }
    }

    pub fn router(&self) -> Router {
        api::router(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router().oneshot(request).await.unwrap()
    }

    /// Store an eligible French applicant's draft owned by `user`
    pub async fn seed_draft(&self, user: &AuthUser) -> VisaApplication {
        let application = eligible_draft(user.user_id);
        self.store.put_application(application.clone()).await;
        application
    }
}

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: JWT_SECRET.to_string(),
        audience: Some("authenticated".to_string()),
    }
}

pub fn user() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        email: Some("applicant@example.com".to_string()),
    }
}

pub fn token_for(user: &AuthUser) -> String {
    let claims = serde_json::json!({
        "sub": user.user_id.to_string(),
        "aud": "authenticated",
        "email": user.email,
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn eligible_draft(user_id: Uuid) -> VisaApplication {
    let mut application = VisaApplication::new_draft(user_id);
    application.surname = Some("Dupont".to_string());
    application.given_name = Some("Jean".to_string());
    application.date_of_birth = NaiveDate::from_ymd_opt(1988, 4, 12);
    application.nationality = Some("France".to_string());
    application.nationality_by_birth = Some(true);
    application.country_of_birth = Some("France".to_string());
    application.passport_number = Some("19FR12345".to_string());
    application.passport_place_of_issue = Some("Paris, France".to_string());
    application.email = Some("jean.dupont@example.com".to_string());
    application
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub const BOUNDARY: &str = "----evisa-test-boundary";

/// Hand-built multipart body with the three upload fields
pub fn multipart_upload(
    token: &str,
    application_id: &str,
    document_type: &str,
    file_name: &str,
    content_type: &str,
    bytes: &[u8],
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in [("application_id", application_id), ("document_type", document_type)] {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            BOUNDARY, file_name, content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/documents/upload")
        .header("authorization", format!("Bearer {}", token))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// The five transmission headers a genuine delivery carries
pub fn webhook_headers() -> Vec<(&'static str, &'static str)> {
    vec![
        ("paypal-transmission-id", "tx-1"),
        ("paypal-transmission-time", "2026-10-16T10:00:00Z"),
        ("paypal-transmission-sig", "c2lnbmF0dXJl"),
        ("paypal-cert-url", "https://api.paypal.com/cert.pem"),
        ("paypal-auth-algo", "SHA256withRSA"),
    ]
}
