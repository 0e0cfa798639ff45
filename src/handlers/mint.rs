// Mint preparation and confirmation endpoints

use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::app::AppState;
use crate::handlers::load_or_create_user;
use crate::middleware::AuthenticatedFid;
use crate::utils::service_error::ServiceError;

#[derive(Debug, Deserialize)]
pub struct PrepareMintRequest {
    pub generation_id: Uuid,
    pub to_address: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmMintRequest {
    pub generation_id: Uuid,
    pub tx_hash: String,
}

/// POST /api/v1/mint/prepare
pub async fn prepare_mint(
    State(state): State<AppState>,
    AuthenticatedFid(fid): AuthenticatedFid,
    Json(request): Json<PrepareMintRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    let user = load_or_create_user(&state, &mut conn, fid).await?;

    let prepared = state
        .lifecycle
        .prepare_mint(&mut conn, &user, request.generation_id, &request.to_address)
        .await?;

    Ok(Json(prepared))
}

/// POST /api/v1/mint/confirm
pub async fn confirm_mint(
    State(state): State<AppState>,
    AuthenticatedFid(fid): AuthenticatedFid,
    Json(request): Json<ConfirmMintRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    let user = load_or_create_user(&state, &mut conn, fid).await?;

    let generation = state
        .lifecycle
        .confirm_mint(&mut conn, &user, request.generation_id, &request.tx_hash)
        .await?;

    Ok(Json(json!({ "generation": generation })))
}
