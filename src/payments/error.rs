use thiserror::Error;

use crate::error::{
    AppError, AppErrorKind, AuthError, ExternalError, InfrastructureError, ValidationError,
};
use crate::payments::utils::ProviderErrorDetail;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    /// Credentials or base URL missing; never exposed verbatim to clients
    #[error("Payment configuration error: {message}")]
    Configuration { message: String },

    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimitError {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Processor rejected credentials: {message}")]
    AuthenticationFailed { message: String },

    /// Structured 4xx refusal from the processor
    #[error("Processor rejected request: HTTP {status}: {name}: {message}")]
    Rejected {
        status: u16,
        name: String,
        message: String,
        debug_id: Option<String>,
        details: Vec<ProviderErrorDetail>,
    },

    /// Structured capture refusal reported by the processor
    #[error("Capture failed: {name}: {message}")]
    CaptureFailed {
        name: String,
        message: String,
        debug_id: Option<String>,
        details: Vec<String>,
        issue: Option<String>,
    },

    #[error("Webhook verification failed: {message}")]
    WebhookVerificationError { message: String },

    #[error("Provider error: status={provider_code:?}, message={message}")]
    ProviderError {
        message: String,
        provider_code: Option<String>,
        debug_id: Option<String>,
        retryable: bool,
    },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::Configuration { .. } => false,
            PaymentError::ValidationError { .. } => false,
            PaymentError::NetworkError { .. } => true,
            PaymentError::RateLimitError { .. } => true,
            PaymentError::AuthenticationFailed { .. } => false,
            PaymentError::Rejected { .. } => false,
            PaymentError::CaptureFailed { .. } => false,
            PaymentError::WebhookVerificationError { .. } => false,
            PaymentError::ProviderError { retryable, .. } => *retryable,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::ValidationError { .. } => 400,
            PaymentError::WebhookVerificationError { .. } => 401,
            _ => 500,
        }
    }

    /// Re-shape a processor refusal of a capture call into [`PaymentError::CaptureFailed`]
    pub fn into_capture_failure(self) -> Self {
        match self {
            PaymentError::Rejected {
                name,
                message,
                debug_id,
                details,
                ..
            } => PaymentError::CaptureFailed {
                name,
                message,
                debug_id,
                issue: details.first().map(|d| d.issue.clone()),
                details: details.iter().map(ProviderErrorDetail::summary).collect(),
            },
            other => other,
        }
    }

    /// True when the processor declined the payer's instrument
    pub fn is_declined(&self) -> bool {
        match self {
            PaymentError::CaptureFailed { issue, .. } => matches!(
                issue.as_deref(),
                Some("INSTRUMENT_DECLINED") | Some("PAYER_ACTION_REQUIRED") | Some("TRANSACTION_REFUSED")
            ),
            _ => false,
        }
    }

    /// Message shown to the payer. Only capture refusals carry processor text,
    /// since that text is about the payer's own instrument.
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::ValidationError { message, .. } => message.clone(),
            PaymentError::CaptureFailed {
                name,
                message,
                debug_id,
                details,
                ..
            } => {
                let mut summary = format!("{}: {}", name, message);
                if !details.is_empty() {
                    summary.push_str(&format!(" ({})", details.join("; ")));
                }
                if let Some(debug_id) = debug_id {
                    summary.push_str(&format!(" [debug id {}]", debug_id));
                }
                summary
            }
            PaymentError::WebhookVerificationError { .. } => {
                "Invalid webhook signature".to_string()
            }
            _ => "Payment provider returned an error".to_string(),
        }
    }

    /// Convert into an [`AppError`] naming the operation that failed, e.g.
    /// "create order" surfaces as "Failed to create order".
    pub fn into_app_error(self, operation: &str) -> AppError {
        let kind = match &self {
            PaymentError::Configuration { message } => {
                AppErrorKind::Infrastructure(InfrastructureError::Configuration {
                    message: message.clone(),
                })
            }
            PaymentError::ValidationError { message, field } => {
                AppErrorKind::Validation(ValidationError::InvalidField {
                    field: field.clone().unwrap_or_else(|| "payment".to_string()),
                    reason: message.clone(),
                })
            }
            PaymentError::CaptureFailed { .. } => {
                AppErrorKind::External(ExternalError::CaptureRejected {
                    summary: self.user_message(),
                })
            }
            PaymentError::WebhookVerificationError { message } => {
                AppErrorKind::Auth(AuthError::InvalidWebhookSignature {
                    reason: message.clone(),
                })
            }
            _ => AppErrorKind::External(ExternalError::PaymentProvider {
                operation: operation.to_string(),
                message: self.to_string(),
                is_retryable: self.is_retryable(),
            }),
        };

        AppError::new(kind).with_context(self.to_string())
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        err.into_app_error("process payment")
    }
}
