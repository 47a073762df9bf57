//! PayPal REST implementation of [`PaymentGateway`]

use crate::config::PayPalConfig;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::gateway::PaymentGateway;
use crate::payments::types::{
    CaptureOutcome, CaptureStatus, CreateOrderRequest, CreatedOrder, WebhookHeaders,
};
use crate::payments::utils::{PaymentHttpClient, RequestAuth, RequestBody};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct PayPalGateway {
    config: PayPalConfig,
    http: PaymentHttpClient,
}

impl PayPalGateway {
    pub fn new(config: PayPalConfig) -> PaymentResult<Self> {
        let retry = RetryPolicy::new(
            config.max_retries + 1,
            Duration::from_secs(1),
            Duration::from_secs(8),
        );
        let http = PaymentHttpClient::new(Duration::from_secs(config.timeout_secs), retry)?;
        Ok(Self { config, http })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn credentials(&self) -> PaymentResult<(&str, &str)> {
        match (&self.config.client_id, &self.config.client_secret) {
            (Some(id), Some(secret)) => Ok((id.as_str(), secret.as_str())),
            _ => Err(PaymentError::Configuration {
                message: "processor client id/secret not configured".to_string(),
            }),
        }
    }

    /// Client-credentials token. Not cached: every operation asks for a fresh one.
    async fn access_token(&self) -> PaymentResult<String> {
        let (client_id, client_secret) = self.credentials()?;

        let token: TokenResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/v1/oauth2/token"),
                RequestAuth::Basic {
                    username: client_id,
                    password: client_secret,
                },
                RequestBody::Form("grant_type=client_credentials"),
                &[("Accept", "application/json")],
            )
            .await?;

        debug!(expires_in = token.expires_in, "obtained processor access token");
        Ok(token.access_token)
    }
}

#[async_trait]
impl PaymentGateway for PayPalGateway {
    async fn create_order(&self, request: &CreateOrderRequest) -> PaymentResult<CreatedOrder> {
        let token = self.access_token().await?;
        let currency = request.total.currency.as_str();

        let mut purchase_unit = serde_json::json!({
            "description": request.description,
            "custom_id": request.custom_id,
            "amount": {
                "currency_code": currency,
                "value": request.total.to_amount_string(),
                "breakdown": {
                    "item_total": {
                        "currency_code": currency,
                        "value": request.item_total.to_amount_string(),
                    },
                    "handling": {
                        "currency_code": currency,
                        "value": request.convenience_fee.to_amount_string(),
                    },
                    "tax_total": {
                        "currency_code": currency,
                        "value": request.tax.to_amount_string(),
                    },
                },
            },
        });
        if let Some(reference_id) = &request.reference_id {
            purchase_unit["reference_id"] = JsonValue::String(reference_id.clone());
        }

        let payload = serde_json::json!({
            "intent": "CAPTURE",
            "purchase_units": [purchase_unit],
        });

        let order: OrderResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/v2/checkout/orders"),
                RequestAuth::Bearer(&token),
                RequestBody::Json(&payload),
                &[("Prefer", "return=representation")],
            )
            .await?;

        info!(order_id = %order.id, status = %order.status, "processor order created");

        Ok(CreatedOrder {
            order_id: order.id,
            status: order.status,
        })
    }

    async fn capture_order(&self, order_id: &str) -> PaymentResult<CaptureOutcome> {
        let token = self.access_token().await?;
        let empty = serde_json::json!({});

        let order: OrderResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint(&format!("/v2/checkout/orders/{}/capture", order_id)),
                RequestAuth::Bearer(&token),
                RequestBody::Json(&empty),
                &[
                    ("PayPal-Request-Id", order_id),
                    ("Prefer", "return=representation"),
                ],
            )
            .await
            .map_err(PaymentError::into_capture_failure)?;

        Ok(order.into_capture_outcome(order_id))
    }

    async fn verify_webhook_signature(
        &self,
        headers: &WebhookHeaders,
        event: &RawValue,
    ) -> PaymentResult<bool> {
        let webhook_id =
            self.config
                .webhook_id
                .as_deref()
                .ok_or_else(|| PaymentError::WebhookVerificationError {
                    message: "webhook id not configured".to_string(),
                })?;
        let token = self.access_token().await?;

        let payload = serde_json::to_string(&VerificationRequest {
            auth_algo: &headers.auth_algo,
            cert_url: &headers.cert_url,
            transmission_id: &headers.transmission_id,
            transmission_sig: &headers.transmission_sig,
            transmission_time: &headers.transmission_time,
            webhook_id,
            webhook_event: event,
        })
        .map_err(|e| PaymentError::WebhookVerificationError {
            message: format!("failed to encode verification request: {}", e),
        })?;

        let result: VerificationResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/v1/notifications/verify-webhook-signature"),
                RequestAuth::Bearer(&token),
                RequestBody::EncodedJson(&payload),
                &[],
            )
            .await?;

        let verified = result.verification_status.eq_ignore_ascii_case("SUCCESS");
        if !verified {
            warn!(
                transmission_id = %headers.transmission_id,
                status = %result.verification_status,
                "webhook signature not verified"
            );
        }
        Ok(verified)
    }
}

/// Capture details carried by a `PAYMENT.CAPTURE.COMPLETED` resource.
///
/// The resource is the capture itself; its order id lives under
/// `supplementary_data.related_ids`. Payer details are not included.
pub fn capture_outcome_from_webhook(resource: &JsonValue) -> Option<CaptureOutcome> {
    let order_id = resource
        .pointer("/supplementary_data/related_ids/order_id")
        .and_then(JsonValue::as_str)?;
    let status = resource
        .get("status")
        .and_then(JsonValue::as_str)
        .map(CaptureStatus::from_provider)
        .unwrap_or(CaptureStatus::Completed);

    Some(CaptureOutcome {
        order_id: order_id.to_string(),
        status,
        capture_id: resource
            .get("id")
            .and_then(JsonValue::as_str)
            .map(str::to_string),
        payer_email: None,
        payer_name: None,
    })
}

/// Order id carried by a `CHECKOUT.ORDER.APPROVED` resource (the order itself)
pub fn order_id_from_webhook(resource: &JsonValue) -> Option<String> {
    resource
        .get("id")
        .and_then(JsonValue::as_str)
        .map(str::to_string)
}

/// Capture id a `PAYMENT.CAPTURE.REFUNDED` refund resource points back to.
///
/// Refund resources link to their capture through the `up` relation.
pub fn refunded_capture_id(resource: &JsonValue) -> Option<String> {
    let links = resource.get("links").and_then(JsonValue::as_array)?;
    links
        .iter()
        .find(|link| link.get("rel").and_then(JsonValue::as_str) == Some("up"))
        .and_then(|link| link.get("href").and_then(JsonValue::as_str))
        .and_then(|href| href.trim_end_matches('/').rsplit('/').next())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

/// Body of the verify-webhook-signature call; the event is embedded verbatim
#[derive(Debug, Serialize)]
struct VerificationRequest<'a> {
    auth_algo: &'a str,
    cert_url: &'a str,
    transmission_id: &'a str,
    transmission_sig: &'a str,
    transmission_time: &'a str,
    webhook_id: &'a str,
    webhook_event: &'a RawValue,
}

#[derive(Debug, Deserialize)]
struct VerificationResponse {
    verification_status: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    status: String,
    #[serde(default)]
    payer: Option<Payer>,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
}

#[derive(Debug, Deserialize)]
struct Payer {
    #[serde(default)]
    email_address: Option<String>,
    #[serde(default)]
    name: Option<PayerName>,
}

#[derive(Debug, Deserialize)]
struct PayerName {
    #[serde(default)]
    given_name: Option<String>,
    #[serde(default)]
    surname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PurchaseUnit {
    #[serde(default)]
    payments: Option<PurchaseUnitPayments>,
}

#[derive(Debug, Deserialize)]
struct PurchaseUnitPayments {
    #[serde(default)]
    captures: Vec<Capture>,
}

#[derive(Debug, Deserialize)]
struct Capture {
    id: String,
    status: String,
}

impl OrderResponse {
    fn into_capture_outcome(self, order_id: &str) -> CaptureOutcome {
        let capture = self
            .purchase_units
            .iter()
            .filter_map(|unit| unit.payments.as_ref())
            .flat_map(|payments| payments.captures.iter())
            .next();

        // The capture's own status wins over the order status
        let status = match capture {
            Some(capture) => CaptureStatus::from_provider(&capture.status),
            None => CaptureStatus::from_provider(&self.status),
        };

        let payer_name = self.payer.as_ref().and_then(|p| p.name.as_ref()).map(|n| {
            [n.given_name.as_deref(), n.surname.as_deref()]
                .iter()
                .flatten()
                .copied()
                .collect::<Vec<_>>()
                .join(" ")
        });

        CaptureOutcome {
            order_id: if self.id.is_empty() {
                order_id.to_string()
            } else {
                self.id.clone()
            },
            status,
            capture_id: capture.map(|c| c.id.clone()),
            payer_email: self.payer.as_ref().and_then(|p| p.email_address.clone()),
            payer_name: payer_name.filter(|n| !n.is_empty()),
        }
    }
}
