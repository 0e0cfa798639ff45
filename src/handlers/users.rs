// Current-user endpoint: every call refreshes the profile snapshot

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::app::AppState;
use crate::middleware::AuthenticatedFid;
use crate::models::{Payment, User};
use crate::utils::service_error::ServiceError;

/// GET /api/v1/users/me
pub async fn get_me(
    State(state): State<AppState>,
    AuthenticatedFid(fid): AuthenticatedFid,
) -> Result<impl IntoResponse, ServiceError> {
    let profile = state.identity.resolve(fid).await?;

    let mut conn = state.diesel_pool.get().await?;
    let user = User::upsert_by_fid(&mut conn, fid, profile.to_profile_update()).await?;
    let credits = Payment::credits_remaining(&mut conn, user.id).await?;

    Ok(Json(json!({
        "user": user,
        "credits_remaining": credits,
    })))
}
