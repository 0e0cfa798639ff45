// Social share endpoint: first share per (user, generation, platform)
// awards a gallery point

use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use uuid::Uuid;

use crate::app::AppState;
use crate::handlers::load_or_create_user;
use crate::middleware::AuthenticatedFid;
use crate::models::{SharePlatform, SocialShare};
use crate::utils::service_error::ServiceError;

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub generation_id: Uuid,
    pub platform: String,
}

/// POST /api/v1/shares
pub async fn record_share(
    State(state): State<AppState>,
    AuthenticatedFid(fid): AuthenticatedFid,
    Json(request): Json<ShareRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let platform = SharePlatform::from_str(&request.platform)
        .map_err(ServiceError::InvalidInput)?;

    let mut conn = state.diesel_pool.get().await?;
    let user = load_or_create_user(&state, &mut conn, fid).await?;

    let awarded = SocialShare::record(&mut conn, user.id, request.generation_id, platform).await?;

    Ok(Json(json!({ "point_awarded": awarded })))
}
