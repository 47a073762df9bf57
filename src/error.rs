//! Unified error handling for the visa intake backend
//!
//! Every handler failure is an [`AppError`]: a classified kind that maps onto an
//! HTTP status, a stable machine-readable [`ErrorCode`] and a user-facing
//! message that never carries provider secrets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error codes clients may branch on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Authentication / authorization
    #[serde(rename = "UNAUTHORIZED")]
    Unauthorized,
    #[serde(rename = "FORBIDDEN")]
    Forbidden,

    // Domain errors (4xx)
    #[serde(rename = "NOT_FOUND")]
    NotFound,
    #[serde(rename = "INELIGIBLE_APPLICANT")]
    IneligibleApplicant,
    #[serde(rename = "APPLICATION_NOT_DRAFT")]
    ApplicationNotDraft,
    #[serde(rename = "APPLICATION_LOCKED")]
    ApplicationLocked,

    // Input validation
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
    #[serde(rename = "FILE_TOO_LARGE")]
    FileTooLarge,
    #[serde(rename = "UNSUPPORTED_FILE_TYPE")]
    UnsupportedFileType,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "STORAGE_ERROR")]
    StorageError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // Upstream integrations
    #[serde(rename = "PAYMENT_PROVIDER_ERROR")]
    PaymentProviderError,
    #[serde(rename = "PAYMENT_CAPTURE_FAILED")]
    PaymentCaptureFailed,
    #[serde(rename = "EMAIL_PROVIDER_ERROR")]
    EmailProviderError,

    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

/// Bearer-token failures
#[derive(Debug, Clone)]
pub enum AuthError {
    MissingToken,
    InvalidToken { reason: String },
    /// Processor webhook failed authenticity checks
    InvalidWebhookSignature { reason: String },
}

/// Business and state errors
#[derive(Debug, Clone)]
pub enum DomainError {
    /// Referenced row is absent
    NotFound { entity: String, id: String },
    /// Caller is authenticated but does not own the resource
    NotOwner { entity: String, id: String },
    /// Application has left the draft state
    NotDraft { application_id: String, status: String },
    /// Application has been locked by submission
    Locked { application_id: String },
    /// Eligibility rule rejected the applicant
    Ineligible { reason: String },
}

/// Infrastructure-level errors (database, storage, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    Database { message: String, is_retryable: bool },
    Storage { message: String },
    Configuration { message: String },
}

/// Upstream integration failures
#[derive(Debug, Clone)]
pub enum ExternalError {
    /// Payment processor unreachable or returned an unexpected failure
    PaymentProvider {
        operation: String,
        message: String,
        is_retryable: bool,
    },
    /// Processor refused the capture; `summary` is safe to show the user
    CaptureRejected { summary: String },
    /// Transactional email provider failure
    Email { message: String },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    InvalidField { field: String, reason: String },
    MissingField { field: String },
    FileTooLarge {
        document_type: String,
        size: u64,
        max: u64,
    },
    UnsupportedMimeType {
        document_type: String,
        mime_type: String,
    },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Auth(AuthError),
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn unauthorized() -> Self {
        Self::new(AppErrorKind::Auth(AuthError::MissingToken))
    }

    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::new(AppErrorKind::Domain(DomainError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }))
    }

    pub fn not_owner(entity: &str, id: impl ToString) -> Self {
        Self::new(AppErrorKind::Domain(DomainError::NotOwner {
            entity: entity.to_string(),
            id: id.to_string(),
        }))
    }

    pub fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Validation(ValidationError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }))
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(AppErrorKind::Validation(ValidationError::MissingField {
            field: field.to_string(),
        }))
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Infrastructure(InfrastructureError::Storage {
            message: message.into(),
        }))
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Infrastructure(
            InfrastructureError::Configuration {
                message: message.into(),
            },
        ))
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Auth(_) => 401,
            AppErrorKind::Domain(err) => match err {
                DomainError::NotFound { .. } => 404,
                DomainError::NotOwner { .. } => 403,
                DomainError::NotDraft { .. } => 409, // Conflict
                DomainError::Locked { .. } => 409,
                DomainError::Ineligible { .. } => 422, // Unprocessable Entity
            },
            AppErrorKind::Validation(_) => 400,
            AppErrorKind::Infrastructure(_) => 500,
            AppErrorKind::External(_) => 500,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Auth(_) => ErrorCode::Unauthorized,
            AppErrorKind::Domain(err) => match err {
                DomainError::NotFound { .. } => ErrorCode::NotFound,
                DomainError::NotOwner { .. } => ErrorCode::Forbidden,
                DomainError::NotDraft { .. } => ErrorCode::ApplicationNotDraft,
                DomainError::Locked { .. } => ErrorCode::ApplicationLocked,
                DomainError::Ineligible { .. } => ErrorCode::IneligibleApplicant,
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::FileTooLarge { .. } => ErrorCode::FileTooLarge,
                ValidationError::UnsupportedMimeType { .. } => ErrorCode::UnsupportedFileType,
                _ => ErrorCode::ValidationError,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Storage { .. } => ErrorCode::StorageError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { .. } => ErrorCode::PaymentProviderError,
                ExternalError::CaptureRejected { .. } => ErrorCode::PaymentCaptureFailed,
                ExternalError::Email { .. } => ErrorCode::EmailProviderError,
            },
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Auth(err) => match err {
                AuthError::MissingToken => "Authentication required".to_string(),
                AuthError::InvalidToken { .. } => "Invalid or expired token".to_string(),
                AuthError::InvalidWebhookSignature { .. } => {
                    "Webhook signature verification failed".to_string()
                }
            },
            AppErrorKind::Domain(err) => match err {
                DomainError::NotFound { entity, .. } => format!("{} not found", entity),
                DomainError::NotOwner { entity, .. } => {
                    format!("You do not have access to this {}", entity.to_lowercase())
                }
                DomainError::NotDraft { status, .. } => format!(
                    "Application cannot be modified in '{}' status",
                    status
                ),
                DomainError::Locked { .. } => {
                    "Application has already been submitted and is locked".to_string()
                }
                DomainError::Ineligible { reason } => reason.clone(),
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::InvalidField { field, reason } => {
                    format!("Invalid value for '{}': {}", field, reason)
                }
                ValidationError::MissingField { field } => {
                    format!("Required field '{}' is missing", field)
                }
                ValidationError::FileTooLarge {
                    document_type, max, ..
                } => format!(
                    "File too large for {} upload. Maximum size is {} MB",
                    document_type,
                    max / (1024 * 1024)
                ),
                ValidationError::UnsupportedMimeType {
                    document_type,
                    mime_type,
                } => format!(
                    "File type '{}' is not allowed for {} uploads",
                    mime_type, document_type
                ),
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Storage { .. } => "Failed to store the document".to_string(),
                _ => "Service temporarily unavailable. Please try again later".to_string(),
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { operation, .. } => {
                    format!("Failed to {}", operation)
                }
                ExternalError::CaptureRejected { summary } => summary.clone(),
                ExternalError::Email { .. } => "Failed to send email".to_string(),
            },
        }
    }

    /// Diagnostic detail safe to attach to a response
    ///
    /// Only storage and database failures carry their underlying message;
    /// configuration and provider errors stay server-side.
    pub fn details(&self) -> Option<serde_json::Value> {
        match &self.kind {
            AppErrorKind::Infrastructure(InfrastructureError::Storage { message })
            | AppErrorKind::Infrastructure(InfrastructureError::Database { message, .. }) => {
                Some(serde_json::Value::String(message.clone()))
            }
            AppErrorKind::Validation(ValidationError::FileTooLarge { size, max, .. }) => {
                Some(serde_json::json!({ "size": size, "max": max }))
            }
            _ => None,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Storage { .. } => true,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { is_retryable, .. } => *is_retryable,
                ExternalError::CaptureRejected { .. } => false,
                ExternalError::Email { .. } => true,
            },
            _ => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{} ({})", self.user_message(), context),
            None => write!(f, "{}", self.user_message()),
        }
    }
}

impl std::error::Error for AppError {}

// Conversions from subsystem errors live next to those errors:
// database/error.rs, payments/error.rs, storage/mod.rs, services/notification.rs

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ineligible_error() {
        let error = AppError::new(AppErrorKind::Domain(DomainError::Ineligible {
            reason: "Indian citizens cannot apply".to_string(),
        }));

        assert_eq!(error.status_code(), 422);
        assert_eq!(error.error_code(), ErrorCode::IneligibleApplicant);
        assert!(error.user_message().contains("Indian citizens"));
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_state_conflicts_are_409() {
        let locked = AppError::new(AppErrorKind::Domain(DomainError::Locked {
            application_id: "a1".to_string(),
        }));
        let not_draft = AppError::new(AppErrorKind::Domain(DomainError::NotDraft {
            application_id: "a1".to_string(),
            status: "submitted".to_string(),
        }));

        assert_eq!(locked.status_code(), 409);
        assert_eq!(not_draft.status_code(), 409);
        assert_eq!(not_draft.error_code(), ErrorCode::ApplicationNotDraft);
    }

    #[test]
    fn test_ownership_and_auth() {
        assert_eq!(AppError::unauthorized().status_code(), 401);
        let forbidden = AppError::not_owner("Application", "a1");
        assert_eq!(forbidden.status_code(), 403);
        assert_eq!(forbidden.error_code(), ErrorCode::Forbidden);
    }

    #[test]
    fn test_provider_error_is_sanitized() {
        let error = AppError::new(AppErrorKind::External(ExternalError::PaymentProvider {
            operation: "create order".to_string(),
            message: "client_secret=shh rejected".to_string(),
            is_retryable: false,
        }));

        assert_eq!(error.status_code(), 500);
        assert_eq!(error.user_message(), "Failed to create order");
        assert!(error.details().is_none());
    }

    #[test]
    fn test_storage_error_carries_details() {
        let error = AppError::storage("bucket not found");
        assert_eq!(error.status_code(), 500);
        assert_eq!(
            error.details(),
            Some(serde_json::Value::String("bucket not found".to_string()))
        );
    }

    #[test]
    fn test_validation_error() {
        let error = AppError::new(AppErrorKind::Validation(ValidationError::FileTooLarge {
            document_type: "photo".to_string(),
            size: 2 * 1024 * 1024,
            max: 1024 * 1024,
        }));

        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), ErrorCode::FileTooLarge);
        assert!(error.user_message().contains("1 MB"));
    }
}
