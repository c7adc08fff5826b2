//! # Health Check Handlers

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::database::health_check;
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    database: String,
    timestamp: String,
}

/// Liveness plus a database ping: GET /health
pub async fn basic_health(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    match health_check(&state.pool).await {
        Ok(true) => Ok(Json(HealthResponse {
            status: "ok".to_string(),
            database: "connected".to_string(),
            timestamp: state.clock.now().to_rfc3339(),
        })),
        Ok(false) => Err(ApiError::ServiceUnavailable),
        Err(e) => {
            error!(error = %e, "Health check database ping failed");
            Err(ApiError::ServiceUnavailable)
        }
    }
}
