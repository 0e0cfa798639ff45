// Directory service webhooks
// Signature is HMAC-SHA256 over the raw request body, hex-encoded in
// the x-neynar-signature header. Verification is constant-time via
// ring; an unconfigured secret rejects every delivery.

use axum::{body::Bytes, extract::State, http::HeaderMap, response::IntoResponse, Json};
use ring::hmac;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::app::AppState;
use crate::app_config::config;
use crate::models::user::UserProfileUpdate;
use crate::models::User;
use crate::services::identity::normalize_profile;
use crate::utils::service_error::ServiceError;

const SIGNATURE_HEADER: &str = "x-neynar-signature";

/// POST /api/v1/webhooks/neynar
pub async fn neynar_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let secret = config()
        .neynar_webhook_secret
        .as_deref()
        .ok_or(ServiceError::Unauthorized)?;

    let signature_hex = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ServiceError::Unauthorized)?;

    verify_signature(secret, &body, signature_hex)?;

    let event: Value = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::InvalidInput(format!("Malformed webhook body: {}", e)))?;

    let event_type = event
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown");

    match event_type {
        "user.created" | "user.updated" => {
            let raw_user = event
                .pointer("/data")
                .ok_or_else(|| ServiceError::InvalidInput("Missing event data".to_string()))?;
            let fid = raw_user
                .get("fid")
                .and_then(Value::as_i64)
                .ok_or_else(|| ServiceError::InvalidInput("Missing fid".to_string()))?;

            let profile = normalize_profile(fid, raw_user);
            let update: UserProfileUpdate = profile.to_profile_update();

            let mut conn = state.diesel_pool.get().await?;
            User::upsert_by_fid(&mut conn, fid, update).await?;
            info!(fid, event_type, "user snapshot upserted from webhook");
        },
        other => {
            // installed / uninstalled / cast.created and anything new
            info!(event_type = other, "webhook event ignored");
        },
    }

    Ok(Json(json!({ "received": true })))
}

fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> Result<(), ServiceError> {
    let signature = hex::decode(signature_hex).map_err(|_| {
        warn!("webhook signature is not valid hex");
        ServiceError::Unauthorized
    })?;

    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    hmac::verify(&key, body, &signature).map_err(|_| {
        warn!("webhook signature mismatch");
        ServiceError::Unauthorized
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
        hex::encode(hmac::sign(&key, body).as_ref())
    }

    #[test]
    fn test_valid_signature_accepted() {
        let body = br#"{"type":"user.created"}"#;
        let signature = sign("secret", body);
        assert!(verify_signature("secret", body, &signature).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let signature = sign("secret", br#"{"type":"user.created"}"#);
        assert!(verify_signature("secret", br#"{"type":"user.deleted"}"#, &signature).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = br#"{"type":"user.created"}"#;
        let signature = sign("other-secret", body);
        assert!(verify_signature("secret", body, &signature).is_err());
    }

    #[test]
    fn test_non_hex_signature_rejected() {
        assert!(verify_signature("secret", b"{}", "not-hex!").is_err());
    }
}
