use axum::{extract::State, http::StatusCode, Json};
use tracing::{error, info};

use super::AppState;
use crate::health::{HealthState, HealthStatus};

pub async fn root() -> &'static str {
    info!("📍 Root endpoint accessed");
    "e-Visa intake backend"
}

pub async fn health(
    State(state): State<AppState>,
) -> Result<Json<HealthStatus>, (StatusCode, String)> {
    info!("🏥 Health check requested");
    let health_status = state.health_checker.check_health().await;

    // Return 503 if any component is unhealthy
    if health_status.status == HealthState::Unhealthy {
        error!("❌ Health check failed - service unhealthy");
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "Service Unavailable".to_string(),
        ))
    } else {
        info!("✅ Health check passed");
        Ok(Json(health_status))
    }
}

/// Readiness probe - checks if the service is ready to accept traffic
pub async fn readiness(
    State(state): State<AppState>,
) -> Result<Json<HealthStatus>, (StatusCode, String)> {
    info!("🔍 Readiness probe requested");
    let result = health(State(state)).await;
    if result.is_err() {
        error!("❌ Readiness check failed");
    }
    result
}

/// Liveness probe - the process is up and serving
pub async fn liveness() -> &'static str {
    info!("💓 Liveness probe requested");
    "OK"
}
