use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::monitor::{MonitorStatus, MonitorWorker};

/// Application state shared across handlers
pub struct AppState {
    pub worker: Arc<MonitorWorker>,
    pub node_id: String,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Monitor Status
// ============================================================================

#[derive(Serialize)]
pub struct StatusResponse {
    pub node_id: String,
    #[serde(flatten)]
    pub monitor: MonitorStatus,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, ApiError> {
    if !state.worker.is_running() {
        return Err(ApiError::Unavailable("monitor worker is not running".to_string()));
    }

    Ok(Json(StatusResponse {
        node_id: state.node_id.clone(),
        monitor: state.worker.status(),
    }))
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
