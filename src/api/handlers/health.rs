use crate::AppState;
use crate::services::worker_pool::PoolStatus;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub converter: String,
    pub converter_path: Option<String>,
    pub workers: PoolStatus,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let located = state.converter.locate().ok();
    let (status, converter) = if located.is_some() {
        ("ok", "available")
    } else {
        ("degraded", "missing")
    };

    Json(HealthResponse {
        status: status.to_string(),
        converter: converter.to_string(),
        converter_path: located.map(|p| p.display().to_string()),
        workers: state.pool.status(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
