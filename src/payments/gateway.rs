use async_trait::async_trait;
use serde_json::value::RawValue;

use crate::payments::error::PaymentResult;
use crate::payments::types::{CaptureOutcome, CreateOrderRequest, CreatedOrder, WebhookHeaders};

/// The payment processor as the workflows see it
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout order for the request total
    async fn create_order(&self, request: &CreateOrderRequest) -> PaymentResult<CreatedOrder>;

    /// Capture an approved order. Implementations send the order id as the
    /// processor's request-idempotency key so transport retries are safe.
    async fn capture_order(&self, order_id: &str) -> PaymentResult<CaptureOutcome>;

    /// Ask the processor whether a webhook delivery is authentic.
    /// `event` is the delivery body exactly as received; the signature covers
    /// those bytes. `Ok(false)` means the processor answered with anything but
    /// SUCCESS.
    async fn verify_webhook_signature(
        &self,
        headers: &WebhookHeaders,
        event: &RawValue,
    ) -> PaymentResult<bool>;
}
