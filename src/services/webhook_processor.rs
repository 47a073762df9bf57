use chrono::Utc;
use http::HeaderMap;
use serde_json::value::RawValue;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::database::repository::PaymentRepository;
use crate::error::{AppError, AppErrorKind, AppResult, AuthError};
use crate::payments::gateway::PaymentGateway;
use crate::payments::paypal::{
    capture_outcome_from_webhook, order_id_from_webhook, refunded_capture_id,
};
use crate::payments::types::{WebhookEvent, WebhookEventType, WebhookHeaders};
use crate::services::payment_capture::PaymentCaptureService;

/// What happened to a verified delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A payment row changed
    Applied,
    /// Verified but nothing to change (duplicate, unknown order, unknown type)
    Ignored,
}

/// Verifies processor deliveries and reconciles payment status from them.
///
/// Every transition is conditional, so redelivery of the same event is safe.
pub struct WebhookProcessor {
    gateway: Arc<dyn PaymentGateway>,
    payments: Arc<dyn PaymentRepository>,
    capture: Arc<PaymentCaptureService>,
}

impl WebhookProcessor {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        payments: Arc<dyn PaymentRepository>,
        capture: Arc<PaymentCaptureService>,
    ) -> Self {
        Self {
            gateway,
            payments,
            capture,
        }
    }

    pub async fn process_webhook(&self, headers: &HeaderMap, body: &str) -> AppResult<WebhookOutcome> {
        let transmission = WebhookHeaders::from_header_map(headers).map_err(|e| {
            warn!(error = %e, "webhook rejected");
            e.into_app_error("verify webhook")
        })?;

        // The signature covers the body as delivered, so it is forwarded unparsed
        let payload: &RawValue = serde_json::from_str(body)
            .map_err(|e| AppError::invalid_field("body", format!("invalid JSON: {}", e)))?;

        let verified = self
            .gateway
            .verify_webhook_signature(&transmission, payload)
            .await
            .map_err(|e| {
                warn!(transmission_id = %transmission.transmission_id, error = %e, "webhook verification error");
                e.into_app_error("verify webhook")
            })?;
        if !verified {
            warn!(transmission_id = %transmission.transmission_id, "webhook signature not verified");
            return Err(AppError::new(AppErrorKind::Auth(
                AuthError::InvalidWebhookSignature {
                    reason: "verification status was not SUCCESS".to_string(),
                },
            )));
        }

        let event: WebhookEvent = serde_json::from_str(payload.get())
            .map_err(|e| AppError::invalid_field("event_type", e.to_string()))?;

        info!(
            event_id = ?event.id,
            event_type = %event.event_type,
            "📨 webhook verified"
        );
        self.process_event(&event).await
    }

    async fn process_event(&self, event: &WebhookEvent) -> AppResult<WebhookOutcome> {
        match WebhookEventType::parse(&event.event_type) {
            WebhookEventType::OrderApproved => {
                let Some(order_id) = order_id_from_webhook(&event.resource) else {
                    warn!(event_type = %event.event_type, "approved event without order id");
                    return Ok(WebhookOutcome::Ignored);
                };
                match self.payments.mark_approved(&order_id).await {
                    Ok(Some(_)) => {
                        info!(order_id = %order_id, "order approved");
                        Ok(WebhookOutcome::Applied)
                    }
                    Ok(None) => {
                        info!(order_id = %order_id, "order approved, payment unknown or settled");
                        Ok(WebhookOutcome::Ignored)
                    }
                    Err(e) => {
                        error!(order_id = %order_id, error = %e, "failed to apply approval");
                        Err(e.into())
                    }
                }
            }
            WebhookEventType::CaptureCompleted => {
                let Some(outcome) = capture_outcome_from_webhook(&event.resource) else {
                    warn!(event_type = %event.event_type, "capture event without order id");
                    return Ok(WebhookOutcome::Ignored);
                };
                match self.capture.record_completion(&outcome).await? {
                    Some(_) => Ok(WebhookOutcome::Applied),
                    None => {
                        warn!(order_id = %outcome.order_id, "capture for unknown order");
                        Ok(WebhookOutcome::Ignored)
                    }
                }
            }
            WebhookEventType::CaptureRefunded => {
                let Some(capture_id) = refunded_capture_id(&event.resource) else {
                    warn!(event_type = %event.event_type, "refund event without capture link");
                    return Ok(WebhookOutcome::Ignored);
                };
                match self.payments.mark_refunded(&capture_id, Utc::now()).await? {
                    Some(payment) => {
                        info!(order_id = %payment.paypal_order_id, capture_id = %capture_id, "↩️ payment refunded");
                        Ok(WebhookOutcome::Applied)
                    }
                    None => {
                        warn!(capture_id = %capture_id, "refund for unknown or unsettled capture");
                        Ok(WebhookOutcome::Ignored)
                    }
                }
            }
            WebhookEventType::Unknown => {
                info!(event_type = %event.event_type, "ignoring unhandled webhook event");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }
}
