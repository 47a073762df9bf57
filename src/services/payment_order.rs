//! Checkout order creation
//!
//! Prices the visa from its duration and the applicant's currency region,
//! opens a processor order for the total and records a pending payment keyed
//! by the processor's order id.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::payment_repository::{NewPayment, Payment};
use crate::database::repository::{ApplicationRepository, PaymentRepository};
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::payments::gateway::PaymentGateway;
use crate::payments::pricing::{self, Quote};
use crate::payments::types::{CreateOrderRequest, VisaType};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderInput {
    pub visa_type: VisaType,
    /// Free text such as "30 days" or "1_year"
    pub duration: String,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub application_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreated {
    pub order_id: String,
    pub amount: String,
    pub currency: String,
    pub total_amount: String,
    pub payment_id: Uuid,
}

pub struct PaymentOrderService {
    gateway: Arc<dyn PaymentGateway>,
    payments: Arc<dyn PaymentRepository>,
    applications: Arc<dyn ApplicationRepository>,
}

impl PaymentOrderService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        payments: Arc<dyn PaymentRepository>,
        applications: Arc<dyn ApplicationRepository>,
    ) -> Self {
        Self {
            gateway,
            payments,
            applications,
        }
    }

    pub async fn create_order(
        &self,
        user: &AuthUser,
        input: CreateOrderInput,
    ) -> AppResult<(OrderCreated, Payment)> {
        let currency = pricing::currency_for_nationality(input.nationality.as_deref());
        let quote = pricing::quote(&input.duration, currency);
        let application_id = self.linkable_application(user, input.application_id).await?;

        let request = order_request(&quote, input.visa_type, application_id, user.user_id);
        let order = self
            .gateway
            .create_order(&request)
            .await
            .map_err(|e| e.into_app_error("create order"))?;

        let payment = self
            .payments
            .insert_pending(NewPayment {
                paypal_order_id: order.order_id.clone(),
                application_id,
                user_id: user.user_id,
                visa_type: input.visa_type,
                visa_duration: quote.duration,
                amount: quote.amount.to_decimal(),
                convenience_fee: quote.convenience_fee.to_decimal(),
                tax: quote.tax.to_decimal(),
                currency: quote.total.currency,
                total_amount: quote.total.to_decimal(),
                payer_email: user.email.clone(),
            })
            .await?;

        info!(
            order_id = %order.order_id,
            payment_id = %payment.id,
            user_id = %user.user_id,
            total = %quote.total.to_amount_string(),
            currency = %quote.total.currency,
            "💳 order created"
        );

        let created = OrderCreated {
            order_id: order.order_id,
            amount: quote.amount.to_amount_string(),
            currency: quote.total.currency.to_string(),
            total_amount: quote.total.to_amount_string(),
            payment_id: payment.id,
        };
        Ok((created, payment))
    }

    /// Application id to store on the payment; unknown or foreign ids become
    /// `None` so a credit payment can still be taken
    async fn linkable_application(
        &self,
        user: &AuthUser,
        application_id: Option<Uuid>,
    ) -> AppResult<Option<Uuid>> {
        let Some(id) = application_id else {
            return Ok(None);
        };
        match self.applications.find_by_id(id).await? {
            Some(application) if application.user_id == user.user_id => Ok(Some(id)),
            Some(_) => {
                warn!(application_id = %id, user_id = %user.user_id, "application belongs to another user, not linking");
                Ok(None)
            }
            None => {
                warn!(application_id = %id, "application not found, storing payment unlinked");
                Ok(None)
            }
        }
    }
}

fn order_request(
    quote: &Quote,
    visa_type: VisaType,
    application_id: Option<Uuid>,
    user_id: Uuid,
) -> CreateOrderRequest {
    CreateOrderRequest {
        total: quote.total,
        item_total: quote.amount,
        convenience_fee: quote.convenience_fee,
        tax: quote.tax,
        description: format!(
            "{} ({})",
            visa_type.display_name(),
            quote.duration.label()
        ),
        reference_id: application_id.map(|id| id.to_string()),
        custom_id: user_id.to_string(),
    }
}
