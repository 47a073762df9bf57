use crate::payments::error::PaymentError;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "visa_type", rename_all = "snake_case")]
pub enum VisaType {
    Tourist,
    Business,
    Medical,
    Conference,
}

impl VisaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisaType::Tourist => "tourist",
            VisaType::Business => "business",
            VisaType::Medical => "medical",
            VisaType::Conference => "conference",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            VisaType::Tourist => "e-Tourist Visa",
            VisaType::Business => "e-Business Visa",
            VisaType::Medical => "e-Medical Visa",
            VisaType::Conference => "e-Conference Visa",
        }
    }
}

impl std::fmt::Display for VisaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VisaType {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "tourist" | "e-tourist" => Ok(VisaType::Tourist),
            "business" | "e-business" => Ok(VisaType::Business),
            "medical" | "e-medical" => Ok(VisaType::Medical),
            "conference" | "e-conference" => Ok(VisaType::Conference),
            _ => Err(PaymentError::ValidationError {
                message: format!("unsupported visa type: {}", value),
                field: Some("visaType".to_string()),
            }),
        }
    }
}

/// Visa validity tier
///
/// Clients send either spelling ("30 days" or "30_days"); [`VisaDuration::normalize`]
/// is the only place those variants are recognised.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "visa_duration")]
pub enum VisaDuration {
    #[serde(rename = "30_days", alias = "30 days")]
    #[sqlx(rename = "30_days")]
    ThirtyDays,
    #[serde(rename = "1_year", alias = "1 year")]
    #[sqlx(rename = "1_year")]
    OneYear,
    #[serde(rename = "5_years", alias = "5 years")]
    #[sqlx(rename = "5_years")]
    FiveYears,
}

impl VisaDuration {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisaDuration::ThirtyDays => "30_days",
            VisaDuration::OneYear => "1_year",
            VisaDuration::FiveYears => "5_years",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VisaDuration::ThirtyDays => "30 days",
            VisaDuration::OneYear => "1 year",
            VisaDuration::FiveYears => "5 years",
        }
    }

    /// Map a free-text duration onto a tier, or `None` if unrecognised
    pub fn normalize(value: &str) -> Option<Self> {
        let collapsed: String = value
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();

        match collapsed.as_str() {
            "30_days" | "30_day" | "30days" | "1_month" => Some(VisaDuration::ThirtyDays),
            "1_year" | "1_years" | "1year" | "12_months" => Some(VisaDuration::OneYear),
            "5_years" | "5_year" | "5years" => Some(VisaDuration::FiveYears),
            _ => None,
        }
    }
}

impl std::fmt::Display for VisaDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "currency_code", rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Gbp,
    Eur,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
            Currency::Eur => "EUR",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An amount in minor units (cents/pence)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Money {
    pub minor_units: i64,
    pub currency: Currency,
}

impl Money {
    pub fn new(minor_units: i64, currency: Currency) -> Self {
        Self {
            minor_units,
            currency,
        }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    /// Two-decimal string as the processor expects it, e.g. `"39.90"`
    pub fn to_amount_string(&self) -> String {
        let sign = if self.minor_units < 0 { "-" } else { "" };
        let abs = self.minor_units.abs();
        format!("{}{}.{:02}", sign, abs / 100, abs % 100)
    }

    pub fn to_decimal(&self) -> BigDecimal {
        BigDecimal::new(self.minor_units.into(), 2)
    }
}

/// Order to be created with the processor
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub total: Money,
    pub item_total: Money,
    pub convenience_fee: Money,
    pub tax: Money,
    pub description: String,
    /// Application id, when the payment is tied to one
    pub reference_id: Option<String>,
    /// Paying user's id
    pub custom_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedOrder {
    pub order_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Completed,
    /// Held for review by the processor; funds not yet settled
    Pending,
    Declined,
}

impl CaptureStatus {
    pub fn from_provider(status: &str) -> Self {
        match status.to_uppercase().as_str() {
            "COMPLETED" => CaptureStatus::Completed,
            "PENDING" => CaptureStatus::Pending,
            _ => CaptureStatus::Declined,
        }
    }
}

/// Result of a capture call or a capture-completed webhook resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutcome {
    pub order_id: String,
    pub status: CaptureStatus,
    pub capture_id: Option<String>,
    pub payer_email: Option<String>,
    pub payer_name: Option<String>,
}

pub const HEADER_TRANSMISSION_ID: &str = "paypal-transmission-id";
pub const HEADER_TRANSMISSION_TIME: &str = "paypal-transmission-time";
pub const HEADER_TRANSMISSION_SIG: &str = "paypal-transmission-sig";
pub const HEADER_CERT_URL: &str = "paypal-cert-url";
pub const HEADER_AUTH_ALGO: &str = "paypal-auth-algo";

/// Transmission headers that accompany every webhook delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookHeaders {
    pub transmission_id: String,
    pub transmission_time: String,
    pub transmission_sig: String,
    pub cert_url: String,
    pub auth_algo: String,
}

impl WebhookHeaders {
    /// Extract all five headers; the first missing or empty one is reported
    pub fn from_header_map(headers: &http::HeaderMap) -> Result<Self, PaymentError> {
        let get = |name: &str| -> Result<String, PaymentError> {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| PaymentError::WebhookVerificationError {
                    message: format!("missing header {}", name),
                })
        };

        Ok(Self {
            transmission_id: get(HEADER_TRANSMISSION_ID)?,
            transmission_time: get(HEADER_TRANSMISSION_TIME)?,
            transmission_sig: get(HEADER_TRANSMISSION_SIG)?,
            cert_url: get(HEADER_CERT_URL)?,
            auth_algo: get(HEADER_AUTH_ALGO)?,
        })
    }
}

/// Processor event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: Option<String>,
    pub event_type: String,
    #[serde(default)]
    pub resource: JsonValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEventType {
    OrderApproved,
    CaptureCompleted,
    CaptureRefunded,
    Unknown,
}

impl WebhookEventType {
    pub fn parse(event_type: &str) -> Self {
        match event_type {
            "CHECKOUT.ORDER.APPROVED" => WebhookEventType::OrderApproved,
            "PAYMENT.CAPTURE.COMPLETED" => WebhookEventType::CaptureCompleted,
            "PAYMENT.CAPTURE.REFUNDED" => WebhookEventType::CaptureRefunded,
            _ => WebhookEventType::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_normalization_accepts_both_spellings() {
        assert_eq!(
            VisaDuration::normalize("30 days"),
            Some(VisaDuration::ThirtyDays)
        );
        assert_eq!(
            VisaDuration::normalize("30_days"),
            Some(VisaDuration::ThirtyDays)
        );
        assert_eq!(VisaDuration::normalize(" 1 Year "), Some(VisaDuration::OneYear));
        assert_eq!(VisaDuration::normalize("5-years"), Some(VisaDuration::FiveYears));
        assert_eq!(VisaDuration::normalize("fortnight"), None);
    }

    #[test]
    fn duration_deserializes_from_either_spelling() {
        let a: VisaDuration = serde_json::from_str("\"30 days\"").unwrap();
        let b: VisaDuration = serde_json::from_str("\"30_days\"").unwrap();
        assert_eq!(a, b);
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"30_days\"");
    }

    #[test]
    fn money_formats_two_decimals() {
        let money = Money::new(3990, Currency::Eur);
        assert_eq!(money.to_amount_string(), "39.90");
        assert_eq!(money.to_decimal().to_string(), "39.90");
        assert_eq!(Money::new(5, Currency::Usd).to_amount_string(), "0.05");
    }

    #[test]
    fn webhook_headers_report_missing_header() {
        let mut headers = http::HeaderMap::new();
        headers.insert(HEADER_TRANSMISSION_ID, "id".parse().unwrap());
        headers.insert(HEADER_TRANSMISSION_TIME, "time".parse().unwrap());
        headers.insert(HEADER_TRANSMISSION_SIG, "sig".parse().unwrap());
        headers.insert(HEADER_CERT_URL, "https://cert".parse().unwrap());

        let err = WebhookHeaders::from_header_map(&headers).unwrap_err();
        assert!(err.to_string().contains(HEADER_AUTH_ALGO));

        headers.insert(HEADER_AUTH_ALGO, "SHA256withRSA".parse().unwrap());
        assert!(WebhookHeaders::from_header_map(&headers).is_ok());
    }

    #[test]
    fn event_types_parse() {
        assert_eq!(
            WebhookEventType::parse("PAYMENT.CAPTURE.COMPLETED"),
            WebhookEventType::CaptureCompleted
        );
        assert_eq!(
            WebhookEventType::parse("CUSTOMER.DISPUTE.CREATED"),
            WebhookEventType::Unknown
        );
    }
}
