// Public gallery listing

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::app::AppState;
use crate::models::Generation;
use crate::utils::service_error::ServiceError;

const DEFAULT_PAGE_SIZE: i64 = 24;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct GalleryParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /api/v1/gallery
pub async fn list_gallery(
    State(state): State<AppState>,
    Query(params): Query<GalleryParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let mut conn = state.diesel_pool.get().await?;
    let (entries, total) = Generation::gallery_page(&mut conn, page, limit).await?;

    Ok(Json(json!({
        "entries": entries,
        "page": page,
        "limit": limit,
        "total": total,
    })))
}
