//! Idempotent order capture
//!
//! The payment row is the source of truth: a settled payment is returned as-is
//! without touching the processor, and completion is a conditional write that
//! the capture call and the capture-completed webhook may both perform.

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::database::payment_repository::{CaptureRecord, Payment};
use crate::database::repository::PaymentRepository;
use crate::error::{AppError, AppErrorKind, AppResult, ExternalError};
use crate::middleware::auth::AuthUser;
use crate::payments::gateway::PaymentGateway;
use crate::payments::types::{CaptureOutcome, CaptureStatus};
use crate::services::notification::{Notification, NotificationDispatcher};

pub struct PaymentCaptureService {
    gateway: Arc<dyn PaymentGateway>,
    payments: Arc<dyn PaymentRepository>,
    notifications: Arc<NotificationDispatcher>,
}

impl PaymentCaptureService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        payments: Arc<dyn PaymentRepository>,
        notifications: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            gateway,
            payments,
            notifications,
        }
    }

    pub async fn capture(&self, user: &AuthUser, order_id: &str) -> AppResult<Payment> {
        let payment = self
            .payments
            .find_by_order_id(order_id)
            .await?
            .ok_or_else(|| AppError::not_found("Payment", order_id))?;

        if payment.user_id != user.user_id {
            return Err(AppError::not_owner("Payment", order_id));
        }

        if payment.status.is_settled() {
            info!(order_id = %order_id, status = %payment.status, "payment already settled, skipping capture");
            return Ok(payment);
        }

        let outcome = match self.gateway.capture_order(order_id).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_declined() => {
                warn!(order_id = %order_id, error = %e, "capture declined");
                self.payments.mark_failed(order_id).await?;
                return Err(e.into_app_error("capture payment"));
            }
            Err(e) => {
                error!(order_id = %order_id, error = %e, "capture failed");
                return Err(e.into_app_error("capture payment"));
            }
        };

        match outcome.status {
            CaptureStatus::Completed => self
                .record_completion(&outcome)
                .await?
                .ok_or_else(|| AppError::not_found("Payment", order_id)),
            CaptureStatus::Pending => {
                info!(order_id = %order_id, "capture pending at processor");
                self.payments
                    .find_by_order_id(order_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Payment", order_id))
            }
            CaptureStatus::Declined => {
                warn!(order_id = %order_id, "capture reported as declined");
                self.payments.mark_failed(order_id).await?;
                Err(AppError::new(AppErrorKind::External(
                    ExternalError::CaptureRejected {
                        summary: "The payment was declined by the processor".to_string(),
                    },
                )))
            }
        }
    }

    /// Mark the payment completed and send the payment emails once.
    ///
    /// Returns the stored row, or `None` when no payment has this order id.
    /// A payment already refunded is returned unchanged.
    pub async fn record_completion(&self, outcome: &CaptureOutcome) -> AppResult<Option<Payment>> {
        let record = CaptureRecord {
            capture_id: outcome.capture_id.clone(),
            payer_email: outcome.payer_email.clone(),
            payer_name: outcome.payer_name.clone(),
            captured_at: Utc::now(),
        };

        let payment = match self
            .payments
            .mark_completed(&outcome.order_id, &record)
            .await?
        {
            Some(payment) => payment,
            None => return Ok(self.payments.find_by_order_id(&outcome.order_id).await?),
        };

        info!(
            order_id = %payment.paypal_order_id,
            capture_id = ?payment.paypal_capture_id,
            "✅ payment completed"
        );

        self.notify_once(&payment).await;
        Ok(Some(payment))
    }

    async fn notify_once(&self, payment: &Payment) {
        match self
            .payments
            .claim_thank_you_email(&payment.paypal_order_id)
            .await
        {
            Ok(true) => {
                self.notifications
                    .dispatch(vec![
                        Notification::PaymentThankYou {
                            payment: payment.clone(),
                        },
                        Notification::AdminPaymentNotice {
                            payment: payment.clone(),
                        },
                    ])
                    .await;
            }
            Ok(false) => {
                info!(order_id = %payment.paypal_order_id, "payment emails already sent");
            }
            Err(e) => {
                error!(order_id = %payment.paypal_order_id, error = %e, "failed to claim payment emails");
            }
        }
    }
}
