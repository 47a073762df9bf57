use axum::{extract::State, http::HeaderMap, Json};
use serde_json::{json, Value as JsonValue};
use tracing::info;

use super::{tag_request, AppState};
use crate::error::AppResult;

/// POST /api/paypal/webhook
///
/// Unverified deliveries get 401 and are not applied. Failures while applying
/// a verified event return 5xx so the processor redelivers.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> AppResult<Json<JsonValue>> {
    let outcome = state
        .webhooks
        .process_webhook(&headers, &body)
        .await
        .map_err(tag_request(&headers))?;

    info!(outcome = ?outcome, "webhook handled");
    Ok(Json(json!({ "received": true })))
}
