use crate::database::error::DatabaseError;
use crate::database::repository::PaymentRepository;
use crate::payments::types::{Currency, VisaDuration, VisaType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::BigDecimal, FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    /// Allowed moves. Staying put is always allowed so duplicate events are
    /// harmless; nothing ever returns to pending once money has moved.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Pending)
                | (Pending, Completed)
                | (Pending, Failed)
                | (Failed, Failed)
                | (Failed, Pending)
                | (Failed, Completed)
                | (Completed, Completed)
                | (Completed, Refunded)
                | (Refunded, Refunded)
        )
    }

    /// Capture already happened; the row is returned as-is
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Refunded)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment entity, one per processor order
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub paypal_order_id: String,
    pub paypal_capture_id: Option<String>,
    pub application_id: Option<Uuid>,
    pub user_id: Uuid,
    pub visa_type: VisaType,
    pub visa_duration: VisaDuration,
    pub amount: BigDecimal,
    pub convenience_fee: BigDecimal,
    pub tax: BigDecimal,
    pub currency: Currency,
    pub total_amount: BigDecimal,
    pub status: PaymentStatus,
    pub payer_email: Option<String>,
    pub payer_name: Option<String>,
    pub captured_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub thank_you_email_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values for a freshly created order
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub paypal_order_id: String,
    pub application_id: Option<Uuid>,
    pub user_id: Uuid,
    pub visa_type: VisaType,
    pub visa_duration: VisaDuration,
    pub amount: BigDecimal,
    pub convenience_fee: BigDecimal,
    pub tax: BigDecimal,
    pub currency: Currency,
    pub total_amount: BigDecimal,
    /// Account email of the buyer; the processor's payer email replaces it on capture
    pub payer_email: Option<String>,
}

impl NewPayment {
    pub fn into_pending(self) -> Payment {
        let now = Utc::now();
        Payment {
            id: Uuid::new_v4(),
            paypal_order_id: self.paypal_order_id,
            paypal_capture_id: None,
            application_id: self.application_id,
            user_id: self.user_id,
            visa_type: self.visa_type,
            visa_duration: self.visa_duration,
            amount: self.amount,
            convenience_fee: self.convenience_fee,
            tax: self.tax,
            currency: self.currency,
            total_amount: self.total_amount,
            status: PaymentStatus::Pending,
            payer_email: self.payer_email,
            payer_name: None,
            captured_at: None,
            refunded_at: None,
            thank_you_email_sent: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Fields recorded when a capture completes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRecord {
    pub capture_id: Option<String>,
    pub payer_email: Option<String>,
    pub payer_name: Option<String>,
    pub captured_at: DateTime<Utc>,
}

const PAYMENT_COLUMNS: &str = "id, paypal_order_id, paypal_capture_id, application_id, user_id, \
     visa_type, visa_duration, amount, convenience_fee, tax, currency, total_amount, status, \
     payer_email, payer_name, captured_at, refunded_at, thank_you_email_sent, created_at, updated_at";

/// Postgres-backed payment repository
pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    async fn insert_pending(&self, payment: NewPayment) -> Result<Payment, DatabaseError> {
        sqlx::query_as::<_, Payment>(&format!(
            "INSERT INTO payments
             (paypal_order_id, application_id, user_id, visa_type, visa_duration,
              amount, convenience_fee, tax, currency, total_amount, payer_email, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'pending')
             RETURNING {}",
            PAYMENT_COLUMNS
        ))
        .bind(&payment.paypal_order_id)
        .bind(payment.application_id)
        .bind(payment.user_id)
        .bind(payment.visa_type)
        .bind(payment.visa_duration)
        .bind(&payment.amount)
        .bind(&payment.convenience_fee)
        .bind(&payment.tax)
        .bind(payment.currency)
        .bind(&payment.total_amount)
        .bind(&payment.payer_email)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Payment>, DatabaseError> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments WHERE paypal_order_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_completed_for_application(
        &self,
        application_id: Uuid,
    ) -> Result<Option<Payment>, DatabaseError> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments
             WHERE application_id = $1 AND status = 'completed'
             ORDER BY captured_at DESC NULLS LAST
             LIMIT 1",
            PAYMENT_COLUMNS
        ))
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn mark_completed(
        &self,
        order_id: &str,
        capture: &CaptureRecord,
    ) -> Result<Option<Payment>, DatabaseError> {
        // Capture call and webhook race here; both write the same values and
        // the first captured_at is kept.
        sqlx::query_as::<_, Payment>(&format!(
            "UPDATE payments SET
                status = 'completed',
                paypal_capture_id = COALESCE($2, paypal_capture_id),
                payer_email = COALESCE($3, payer_email),
                payer_name = COALESCE($4, payer_name),
                captured_at = COALESCE(captured_at, $5),
                updated_at = NOW()
             WHERE paypal_order_id = $1 AND status IN ('pending', 'failed', 'completed')
             RETURNING {}",
            PAYMENT_COLUMNS
        ))
        .bind(order_id)
        .bind(&capture.capture_id)
        .bind(&capture.payer_email)
        .bind(&capture.payer_name)
        .bind(capture.captured_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn mark_failed(&self, order_id: &str) -> Result<Option<Payment>, DatabaseError> {
        sqlx::query_as::<_, Payment>(&format!(
            "UPDATE payments SET status = 'failed', updated_at = NOW()
             WHERE paypal_order_id = $1 AND status IN ('pending', 'failed')
             RETURNING {}",
            PAYMENT_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn mark_approved(&self, order_id: &str) -> Result<Option<Payment>, DatabaseError> {
        sqlx::query_as::<_, Payment>(&format!(
            "UPDATE payments SET status = 'pending', updated_at = NOW()
             WHERE paypal_order_id = $1 AND status IN ('pending', 'failed')
             RETURNING {}",
            PAYMENT_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn mark_refunded(
        &self,
        capture_id: &str,
        refunded_at: DateTime<Utc>,
    ) -> Result<Option<Payment>, DatabaseError> {
        sqlx::query_as::<_, Payment>(&format!(
            "UPDATE payments SET
                status = 'refunded',
                refunded_at = COALESCE(refunded_at, $2),
                updated_at = NOW()
             WHERE paypal_capture_id = $1 AND status IN ('completed', 'refunded')
             RETURNING {}",
            PAYMENT_COLUMNS
        ))
        .bind(capture_id)
        .bind(refunded_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn claim_thank_you_email(&self, order_id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE payments SET thank_you_email_sent = true, updated_at = NOW()
             WHERE paypal_order_id = $1 AND thank_you_email_sent = false",
        )
        .bind(order_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_never_returns_to_pending() {
        assert!(!PaymentStatus::Completed.can_transition_to(PaymentStatus::Pending));
        assert!(!PaymentStatus::Refunded.can_transition_to(PaymentStatus::Completed));
        assert!(!PaymentStatus::Completed.can_transition_to(PaymentStatus::Failed));
    }

    #[test]
    fn forward_transitions_are_allowed() {
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Completed));
        assert!(PaymentStatus::Completed.can_transition_to(PaymentStatus::Refunded));
        assert!(PaymentStatus::Completed.can_transition_to(PaymentStatus::Completed));
        assert!(PaymentStatus::Failed.can_transition_to(PaymentStatus::Completed));
    }

    #[test]
    fn serializes_for_clients_in_camel_case() {
        let payment = NewPayment {
            paypal_order_id: "ORDER1".to_string(),
            application_id: None,
            user_id: Uuid::new_v4(),
            visa_type: VisaType::Tourist,
            visa_duration: VisaDuration::ThirtyDays,
            amount: BigDecimal::new(3990.into(), 2),
            convenience_fee: BigDecimal::new(0.into(), 2),
            tax: BigDecimal::new(0.into(), 2),
            currency: Currency::Eur,
            total_amount: BigDecimal::new(3990.into(), 2),
            payer_email: None,
        }
        .into_pending();

        let json = serde_json::to_value(&payment).unwrap();
        assert_eq!(json["paypalOrderId"], "ORDER1");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["currency"], "EUR");
        assert_eq!(json["visaDuration"], "30_days");
        assert_eq!(json["thankYouEmailSent"], false);
    }
}
