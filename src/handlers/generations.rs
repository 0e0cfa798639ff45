// Generation request endpoint

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::app::AppState;
use crate::handlers::load_or_create_user;
use crate::middleware::AuthenticatedFid;
use crate::utils::service_error::ServiceError;

/// POST /api/v1/generations
/// Generator failure is reported in the payload, not as a 5xx; the
/// credit is spent either way.
pub async fn request_generation(
    State(state): State<AppState>,
    AuthenticatedFid(fid): AuthenticatedFid,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    let user = load_or_create_user(&state, &mut conn, fid).await?;

    let generation = state.lifecycle.request_generation(&mut conn, &user).await?;

    Ok(Json(json!({ "generation": generation })))
}
