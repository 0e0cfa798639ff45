// Admin endpoints, gated on the configured admin wallet

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::app::AppState;
use crate::handlers::{ensure_admin, load_or_create_user};
use crate::middleware::AuthenticatedFid;
use crate::models::{Generation, TOP_900_CAP};
use crate::utils::service_error::ServiceError;

#[derive(Debug, Deserialize)]
pub struct AdminListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct Top900Request {
    pub generation_id: Uuid,
    pub selected: bool,
}

#[derive(Debug, Deserialize)]
pub struct RegenerateRequest {
    pub generation_id: Uuid,
}

/// GET /api/v1/admin/generations
pub async fn list_generations(
    State(state): State<AppState>,
    AuthenticatedFid(fid): AuthenticatedFid,
    Query(params): Query<AdminListParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    let user = load_or_create_user(&state, &mut conn, fid).await?;
    ensure_admin(&user)?;

    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(50).clamp(1, 200);

    let (rows, total) = Generation::admin_page(&mut conn, page, limit).await?;

    Ok(Json(json!({
        "generations": rows,
        "page": page,
        "limit": limit,
        "total": total,
    })))
}

/// POST /api/v1/admin/top900
pub async fn toggle_top_900(
    State(state): State<AppState>,
    AuthenticatedFid(fid): AuthenticatedFid,
    Json(request): Json<Top900Request>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    let user = load_or_create_user(&state, &mut conn, fid).await?;
    ensure_admin(&user)?;

    Generation::set_top_900(&mut conn, request.generation_id, request.selected)
        .await
        .map_err(|e| match e {
            diesel::result::Error::RollbackTransaction => ServiceError::QuotaExceeded(format!(
                "Top-{} selection is full",
                TOP_900_CAP
            )),
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::SerializationFailure,
                _,
            ) => ServiceError::StateConflict(
                "Selection raced with a concurrent toggle, please retry".to_string(),
            ),
            other => other.into(),
        })?;

    let selected_count = Generation::count_top_900(&mut conn).await?;

    Ok(Json(json!({
        "generation_id": request.generation_id,
        "selected": request.selected,
        "selected_count": selected_count,
        "cap": TOP_900_CAP,
    })))
}

/// POST /api/v1/admin/regenerate
pub async fn regenerate(
    State(state): State<AppState>,
    AuthenticatedFid(fid): AuthenticatedFid,
    Json(request): Json<RegenerateRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    let user = load_or_create_user(&state, &mut conn, fid).await?;
    ensure_admin(&user)?;

    let generation = state
        .lifecycle
        .regenerate(&mut conn, request.generation_id)
        .await?;

    Ok(Json(json!({ "generation": generation })))
}
