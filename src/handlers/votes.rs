// Vote endpoints: capped at 2 per user, unique per (user, generation)

use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::app::AppState;
use crate::handlers::load_or_create_user;
use crate::middleware::AuthenticatedFid;
use crate::models::{Vote, MAX_VOTES_PER_USER};
use crate::utils::service_error::ServiceError;

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub generation_id: Uuid,
}

/// POST /api/v1/votes
pub async fn cast_vote(
    State(state): State<AppState>,
    AuthenticatedFid(fid): AuthenticatedFid,
    Json(request): Json<VoteRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    let user = load_or_create_user(&state, &mut conn, fid).await?;

    let votes_used = Vote::cast(&mut conn, user.id, request.generation_id)
        .await
        .map_err(|e| match e {
            diesel::result::Error::RollbackTransaction => ServiceError::QuotaExceeded(format!(
                "Vote limit of {} reached",
                MAX_VOTES_PER_USER
            )),
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => ServiceError::StateConflict("Already voted for this generation".to_string()),
            // Serializable cast lost to concurrent writers on every retry
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::SerializationFailure,
                _,
            ) => ServiceError::StateConflict(
                "Vote raced with concurrent activity, please retry".to_string(),
            ),
            other => other.into(),
        })?;

    Ok(Json(json!({
        "votes_used": votes_used,
        "votes_remaining": MAX_VOTES_PER_USER - votes_used,
    })))
}

/// DELETE /api/v1/votes
pub async fn retract_vote(
    State(state): State<AppState>,
    AuthenticatedFid(fid): AuthenticatedFid,
    Json(request): Json<VoteRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    let user = load_or_create_user(&state, &mut conn, fid).await?;

    let removed = Vote::retract(&mut conn, user.id, request.generation_id).await?;
    if !removed {
        return Err(ServiceError::NotFound(
            "No vote to retract for this generation".to_string(),
        ));
    }

    let votes_used = Vote::count_for_user(&mut conn, user.id).await?;

    Ok(Json(json!({
        "votes_used": votes_used,
        "votes_remaining": MAX_VOTES_PER_USER - votes_used,
    })))
}
