// Referral tracking: set-once referrer with a self-referral guard

use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::handlers::load_or_create_user;
use crate::middleware::AuthenticatedFid;
use crate::models::User;
use crate::utils::service_error::ServiceError;

#[derive(Debug, Deserialize, Validate)]
pub struct TrackReferralRequest {
    #[validate(length(min = 1, max = 16))]
    pub referral_code: String,
}

/// POST /api/v1/referrals/track
pub async fn track_referral(
    State(state): State<AppState>,
    AuthenticatedFid(fid): AuthenticatedFid,
    Json(request): Json<TrackReferralRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    request.validate()?;

    let mut conn = state.diesel_pool.get().await?;
    let user = load_or_create_user(&state, &mut conn, fid).await?;

    let referrer = User::find_by_referral_code(&mut conn, &request.referral_code)
        .await
        .map_err(|e| match e {
            diesel::result::Error::NotFound => {
                ServiceError::NotFound("Unknown referral code".to_string())
            },
            other => other.into(),
        })?;

    if referrer.id == user.id {
        return Err(ServiceError::InvalidInput(
            "Cannot refer yourself".to_string(),
        ));
    }

    // Set-once: a user who already has a referrer keeps it
    let attached = User::attach_referrer(&mut conn, user.id, &request.referral_code).await?;
    if !attached {
        return Ok(Json(json!({ "tracked": false })));
    }

    User::increment_referral_count(&mut conn, referrer.id).await?;
    info!(fid, referrer_fid = referrer.fid, "referral tracked");

    Ok(Json(json!({ "tracked": true })))
}
