// Authentication middleware for protected routes
// Validates Quick Auth bearer tokens and injects AuthenticatedFid into
// request extensions

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::{app::AppState, middleware::auth::AuthenticatedFid};

pub async fn auth_middleware(
    State(app_state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "Missing or invalid authorization header",
                    "status": 401
                })),
            )
                .into_response();
        },
    };

    match app_state.quick_auth.verify(token) {
        Ok(authenticated_fid) => {
            request.extensions_mut().insert(authenticated_fid);
            next.run(request).await
        },
        Err(e) => {
            tracing::warn!("Quick Auth validation failed: {}", e);
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "Invalid or expired token",
                    "status": 401
                })),
            )
                .into_response()
        },
    }
}

/// Extractor so handlers can take AuthenticatedFid directly
impl FromRequestParts<AppState> for AuthenticatedFid {
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedFid>()
            .copied()
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({
                        "error": "Authentication required",
                        "status": 401
                    })),
                )
            })
    }
}
