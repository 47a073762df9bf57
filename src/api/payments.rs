use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{json_body, tag_request, AppState, PublicPayPalConfig};
use crate::database::payment_repository::Payment;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::services::payment_order::{CreateOrderInput, OrderCreated};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub success: bool,
    #[serde(flatten)]
    pub order: OrderCreated,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOrderRequest {
    pub order_id: String,
}

#[derive(Debug, Serialize)]
pub struct CaptureOrderResponse {
    pub success: bool,
    pub payment: Payment,
}

/// POST /api/paypal/create-order
pub async fn create_order(
    user: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreateOrderInput>, JsonRejection>,
) -> AppResult<Json<CreateOrderResponse>> {
    let input = json_body(body).map_err(tag_request(&headers))?;
    info!(user_id = %user.user_id, visa_type = %input.visa_type, duration = %input.duration, "create order requested");

    let (order, _payment) = state
        .orders
        .create_order(&user, input)
        .await
        .map_err(tag_request(&headers))?;

    Ok(Json(CreateOrderResponse {
        success: true,
        order,
    }))
}

/// POST /api/paypal/capture-order
pub async fn capture_order(
    user: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CaptureOrderRequest>, JsonRejection>,
) -> AppResult<Json<CaptureOrderResponse>> {
    let request = json_body(body).map_err(tag_request(&headers))?;
    let order_id = request.order_id.trim();
    if order_id.is_empty() {
        return Err(tag_request(&headers)(AppError::missing_field("orderId")));
    }

    let payment = state
        .captures
        .capture(&user, order_id)
        .await
        .map_err(tag_request(&headers))?;

    Ok(Json(CaptureOrderResponse {
        success: true,
        payment,
    }))
}

/// GET /api/paypal/config
pub async fn get_config(State(state): State<AppState>) -> Json<PublicPayPalConfig> {
    Json(state.paypal.clone())
}
