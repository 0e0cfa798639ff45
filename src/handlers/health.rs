// Health endpoint: reports pool liveness

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::app::AppState;
use crate::db::check_diesel_health;

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match check_diesel_health(&state.diesel_pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "database": "up" })),
        ),
        Err(e) => {
            tracing::error!("health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "database": "down" })),
            )
        },
    }
}
