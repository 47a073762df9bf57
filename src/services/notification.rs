//! Transactional email notifications
//!
//! Every send is best-effort: the dispatcher logs failures and never returns
//! them, so a broken email provider cannot undo a payment or a submission.

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::EmailConfig;
use crate::database::application_repository::VisaApplication;
use crate::database::payment_repository::Payment;
use crate::error::{AppError, AppErrorKind, ExternalError};

#[derive(Debug, Clone, Error)]
pub enum EmailError {
    #[error("email request failed: {0}")]
    Request(String),
    #[error("email provider returned {status}: {message}")]
    Rejected { status: u16, message: String },
}

impl From<EmailError> for AppError {
    fn from(err: EmailError) -> Self {
        AppError::new(AppErrorKind::External(ExternalError::Email {
            message: err.to_string(),
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), EmailError>;
}

/// Sends through an HTTP email API (`POST {from, to, subject, html}`)
pub struct ResendEmailSender {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct SendEmailBody<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

impl ResendEmailSender {
    pub fn new(api_url: String, api_key: String, from: String) -> Result<Self, EmailError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| EmailError::Request(e.to_string()))?;
        Ok(Self {
            client,
            api_url,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl EmailSender for ResendEmailSender {
    async fn send(&self, email: &Email) -> Result<(), EmailError> {
        let body = SendEmailBody {
            from: &self.from,
            to: [&email.to],
            subject: &email.subject,
            html: &email.html,
        };
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmailError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

/// Logs instead of sending; used when no API key is configured
#[derive(Debug, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, email: &Email) -> Result<(), EmailError> {
        info!(to = %email.to, subject = %email.subject, "📧 email (not sent, no provider configured)");
        Ok(())
    }
}

/// Pick the sender for the configured environment
pub fn sender_from_config(config: &EmailConfig) -> Result<Arc<dyn EmailSender>, EmailError> {
    match &config.api_key {
        Some(api_key) => Ok(Arc::new(ResendEmailSender::new(
            config.api_url.clone(),
            api_key.clone(),
            config.from.clone(),
        )?)),
        None => {
            warn!("EMAIL_API_KEY not set, emails will only be logged");
            Ok(Arc::new(LogEmailSender))
        }
    }
}

#[derive(Debug, Clone)]
pub enum Notification {
    PaymentThankYou { payment: Payment },
    AdminPaymentNotice { payment: Payment },
    SubmissionConfirmation { application: VisaApplication, to: String },
    AdminSubmissionNotice { application: VisaApplication },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::PaymentThankYou { .. } => "payment_thank_you",
            Notification::AdminPaymentNotice { .. } => "admin_payment_notice",
            Notification::SubmissionConfirmation { .. } => "submission_confirmation",
            Notification::AdminSubmissionNotice { .. } => "admin_submission_notice",
        }
    }

    /// Render to an email; `None` when there is nobody to send to
    fn render(&self, admin_email: &str) -> Option<Email> {
        match self {
            Notification::PaymentThankYou { payment } => {
                let to = payment.payer_email.clone()?;
                let name = payment.payer_name.as_deref().unwrap_or("applicant");
                Some(Email {
                    to,
                    subject: "Thank you for your payment".to_string(),
                    html: format!(
                        "<p>Dear {},</p><p>We received your payment of {} {} for a {} ({}) visa. \
                         Order reference: {}.</p>",
                        escape_html(name),
                        payment.total_amount,
                        payment.currency,
                        payment.visa_type.display_name(),
                        payment.visa_duration.label(),
                        escape_html(&payment.paypal_order_id),
                    ),
                })
            }
            Notification::AdminPaymentNotice { payment } => Some(Email {
                to: admin_email.to_string(),
                subject: format!("Payment received: {}", payment.paypal_order_id),
                html: format!(
                    "<p>Order {} captured for {} {}.</p><p>Payer: {} ({})</p>\
                     <p>Visa: {} / {}</p><p>Application: {}</p>",
                    escape_html(&payment.paypal_order_id),
                    payment.total_amount,
                    payment.currency,
                    escape_html(payment.payer_name.as_deref().unwrap_or("-")),
                    escape_html(payment.payer_email.as_deref().unwrap_or("-")),
                    payment.visa_type.display_name(),
                    payment.visa_duration.label(),
                    payment
                        .application_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ),
            }),
            Notification::SubmissionConfirmation { application, to } => Some(Email {
                to: to.clone(),
                subject: "Your visa application has been submitted".to_string(),
                html: format!(
                    "<p>Dear {},</p><p>Your application {} has been submitted and is now \
                     locked for review.</p>",
                    escape_html(application.full_name().as_deref().unwrap_or("applicant")),
                    application.id,
                ),
            }),
            Notification::AdminSubmissionNotice { application } => Some(Email {
                to: admin_email.to_string(),
                subject: format!("Application submitted: {}", application.id),
                html: format!(
                    "<p>Application {} was submitted by {}.</p><p>Nationality: {}</p>",
                    application.id,
                    escape_html(application.full_name().as_deref().unwrap_or("-")),
                    escape_html(application.nationality.as_deref().unwrap_or("-")),
                ),
            }),
        }
    }
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub struct NotificationDispatcher {
    sender: Arc<dyn EmailSender>,
    admin_email: String,
}

impl NotificationDispatcher {
    pub fn new(sender: Arc<dyn EmailSender>, admin_email: impl Into<String>) -> Self {
        Self {
            sender,
            admin_email: admin_email.into(),
        }
    }

    /// Send each notification independently; returns how many were delivered
    pub async fn dispatch(&self, notifications: Vec<Notification>) -> usize {
        let sends = notifications.iter().map(|notification| async move {
            let Some(email) = notification.render(&self.admin_email) else {
                warn!(kind = notification.kind(), "notification skipped, no recipient");
                return false;
            };
            match self.sender.send(&email).await {
                Ok(()) => {
                    info!(kind = notification.kind(), to = %email.to, "🔔 notification sent");
                    true
                }
                Err(e) => {
                    error!(kind = notification.kind(), to = %email.to, error = %e, "notification failed");
                    false
                }
            }
        });

        join_all(sends).await.into_iter().filter(|sent| *sent).count()
    }
}
