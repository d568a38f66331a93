use axum::{extract::State, http::StatusCode, Json};
use tracing::{error, info};

use crate::api::ApiState;
use crate::health::{HealthState, HealthStatus};

pub async fn health(
    State(state): State<ApiState>,
) -> Result<Json<HealthStatus>, (StatusCode, String)> {
    let health_status = state.health_checker.check_health().await;

    if matches!(health_status.status, HealthState::Unhealthy) {
        error!("Health check failed - service unhealthy");
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "Service Unavailable".to_string(),
        ))
    } else {
        Ok(Json(health_status))
    }
}

/// Readiness probe - checks if the service is ready to accept traffic
pub async fn readiness(
    State(state): State<ApiState>,
) -> Result<Json<HealthStatus>, (StatusCode, String)> {
    let result = health(State(state)).await;
    if result.is_err() {
        error!("Readiness check failed");
    }
    result
}

/// Liveness probe - checks if the service is alive (basic check)
pub async fn liveness() -> Result<&'static str, (StatusCode, String)> {
    info!("Liveness check passed");
    Ok("OK")
}
