// Identity Resolver
// Fetches a user's profile from the Farcaster directory service (Neynar)
// and normalizes the loosely-typed payload into a fixed shape in exactly
// one place. Every downstream consumer sees IdentityProfile, never the
// raw JSON.

use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{instrument, warn};

use crate::app_config::AppConfig;
use crate::models::user::UserProfileUpdate;
use crate::utils::eth::{is_address, normalize_address};
use crate::utils::service_error::ServiceError;

/// Follower count mapping to a score of 1.0 in the fallback formula
const SCORE_FALLBACK_DIVISOR: f64 = 10_000.0;

// Shared HTTP client for directory lookups
static DIRECTORY_HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to create HTTP client for directory lookups")
});

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("FID {0} not found in directory")]
    NotFound(i64),

    #[error("Directory request failed: {0}")]
    Upstream(String),
}

impl From<IdentityError> for ServiceError {
    fn from(error: IdentityError) -> Self {
        match error {
            IdentityError::NotFound(fid) => {
                ServiceError::NotFound(format!("User {} not found in directory", fid))
            },
            IdentityError::Upstream(msg) => ServiceError::UpstreamFailure(msg),
        }
    }
}

/// Fixed internal identity shape; the only output of the resolver
#[derive(Debug, Clone, serde::Serialize)]
pub struct IdentityProfile {
    pub fid: i64,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub pfp_url: Option<String>,
    pub bio: Option<String>,
    pub follower_count: i64,
    pub score: f64,
    pub has_badge: bool,
    pub verified_addresses: Vec<String>,
    pub custody_address: Option<String>,
}

impl IdentityProfile {
    /// Changeset for the FID-keyed user upsert
    pub fn to_profile_update(&self) -> UserProfileUpdate {
        UserProfileUpdate {
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            pfp_url: self.pfp_url.clone(),
            bio: self.bio.clone(),
            custody_address: self.custody_address.clone(),
            primary_address: self.verified_addresses.first().cloned(),
            verified_addresses: Some(self.verified_addresses.clone()),
        }
    }
}

pub struct IdentityResolver {
    api_base: String,
    api_key: String,
}

impl IdentityResolver {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            api_base: config.neynar_api_base.clone(),
            api_key: config.neynar_api_key.clone(),
        }
    }

    /// Resolve an FID to its normalized identity profile.
    /// Tries the recommended `x-api-key` header first, then the legacy
    /// `api_key` header; a missing user is an error, never zero-value data.
    #[instrument(skip(self))]
    pub async fn resolve(&self, fid: i64) -> Result<IdentityProfile, IdentityError> {
        let url = format!("{}/v2/farcaster/user/bulk?fids={}", self.api_base, fid);

        let mut response = DIRECTORY_HTTP_CLIENT
            .get(&url)
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            warn!(
                "x-api-key header rejected ({}), retrying with api_key header",
                response.status()
            );
            response = DIRECTORY_HTTP_CLIENT
                .get(&url)
                .header("api_key", &self.api_key)
                .send()
                .await
                .map_err(|e| IdentityError::Upstream(e.to_string()))?;
        }

        if !response.status().is_success() {
            return Err(IdentityError::Upstream(format!(
                "directory returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;

        let raw_user = body
            .get("users")
            .and_then(|u| u.as_array())
            .and_then(|u| u.first())
            .ok_or(IdentityError::NotFound(fid))?;

        Ok(normalize_profile(fid, raw_user))
    }
}

/// Normalization adapter: maps the directory service's raw payload into
/// the fixed internal shape, in one place. Field probing orders are part
/// of the contract and pinned by tests.
pub fn normalize_profile(fid: i64, raw: &Value) -> IdentityProfile {
    let follower_count = raw
        .get("follower_count")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    IdentityProfile {
        fid,
        username: string_field(raw, "username"),
        display_name: string_field(raw, "display_name"),
        pfp_url: string_field(raw, "pfp_url"),
        bio: raw
            .pointer("/profile/bio/text")
            .and_then(Value::as_str)
            .map(str::to_string),
        follower_count,
        score: normalize_score(raw, follower_count),
        has_badge: normalize_badge(raw),
        verified_addresses: normalize_addresses(raw),
        custody_address: string_field(raw, "custody_address").map(|a| normalize_address(&a)),
    }
}

/// Authoritative score fields in probe order, then the follower-count
/// approximation: min(follower_count / 10000, 1.0)
fn normalize_score(raw: &Value, follower_count: i64) -> f64 {
    for field in ["neynar_score", "score", "user_score", "quality_score"] {
        if let Some(score) = raw.get(field).and_then(Value::as_f64) {
            if score > 0.0 {
                return score;
            }
        }
    }

    (follower_count as f64 / SCORE_FALLBACK_DIVISOR).min(1.0)
}

/// Pro/verified badge appeared under several names and nestings across
/// directory API revisions; absent means false
fn normalize_badge(raw: &Value) -> bool {
    for field in ["power_badge", "pro_badge", "badge"] {
        if let Some(flag) = raw.get(field).and_then(Value::as_bool) {
            return flag;
        }
    }

    raw.pointer("/pro/status")
        .and_then(Value::as_str)
        .map(|s| s == "subscribed")
        .unwrap_or(false)
}

/// Union of explicitly verified ETH addresses and hex-looking entries in
/// the general verifications list; the custody address is a last resort
/// when both are empty. Lowercased, deduplicated, order-preserving.
fn normalize_addresses(raw: &Value) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut addresses = Vec::new();

    fn push(
        seen: &mut std::collections::HashSet<String>,
        addresses: &mut Vec<String>,
        candidate: &str,
    ) {
        if is_address(candidate) {
            let normalized = normalize_address(candidate);
            if seen.insert(normalized.clone()) {
                addresses.push(normalized);
            }
        }
    }

    if let Some(eth) = raw
        .pointer("/verified_addresses/eth_addresses")
        .and_then(Value::as_array)
    {
        for entry in eth.iter().filter_map(Value::as_str) {
            push(&mut seen, &mut addresses, entry);
        }
    }

    if let Some(verifications) = raw.get("verifications").and_then(Value::as_array) {
        for entry in verifications.iter().filter_map(Value::as_str) {
            push(&mut seen, &mut addresses, entry);
        }
    }

    if addresses.is_empty() {
        if let Some(custody) = raw.get("custody_address").and_then(Value::as_str) {
            push(&mut seen, &mut addresses, custody);
        }
    }

    addresses
}

fn string_field(raw: &Value, field: &str) -> Option<String> {
    raw.get(field).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_score_prefers_authoritative_fields_in_order() {
        let raw = json!({ "neynar_score": 0.9, "score": 0.1, "follower_count": 100 });
        assert_eq!(normalize_score(&raw, 100), 0.9);

        let raw = json!({ "score": 0.4, "user_score": 0.2 });
        assert_eq!(normalize_score(&raw, 0), 0.4);

        let raw = json!({ "user_score": 0.3 });
        assert_eq!(normalize_score(&raw, 0), 0.3);

        let raw = json!({ "quality_score": 0.7 });
        assert_eq!(normalize_score(&raw, 0), 0.7);
    }

    #[test]
    fn test_score_fallback_formula_and_clamp() {
        let raw = json!({ "follower_count": 5000 });
        assert_eq!(normalize_score(&raw, 5000), 0.5);

        // Clamps at 1.0
        let raw = json!({ "follower_count": 50000 });
        assert_eq!(normalize_score(&raw, 50000), 1.0);

        // A zero score falls through to the approximation
        let raw = json!({ "score": 0.0, "follower_count": 2500 });
        assert_eq!(normalize_score(&raw, 2500), 0.25);
    }

    #[test]
    fn test_badge_probe_branches() {
        assert!(normalize_badge(&json!({ "power_badge": true })));
        assert!(normalize_badge(&json!({ "pro_badge": true })));
        assert!(normalize_badge(&json!({ "badge": true })));
        assert!(normalize_badge(&json!({ "pro": { "status": "subscribed" } })));
        assert!(!normalize_badge(&json!({ "pro": { "status": "expired" } })));
        assert!(!normalize_badge(&json!({ "power_badge": false, "pro_badge": true })));
        assert!(!normalize_badge(&json!({})));
    }

    #[test]
    fn test_address_union_dedupes_case_variants() {
        let raw = json!({
            "verified_addresses": {
                "eth_addresses": ["0xABCDEFabcdefABCDEFabcdefabcdefABCDEFabcd"]
            },
            "verifications": [
                "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd",
                "0x1111111111111111111111111111111111111111",
                "not-an-address"
            ],
            "custody_address": "0x2222222222222222222222222222222222222222"
        });

        let addresses = normalize_addresses(&raw);
        assert_eq!(
            addresses,
            vec![
                "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd".to_string(),
                "0x1111111111111111111111111111111111111111".to_string(),
            ]
        );
    }

    #[test]
    fn test_custody_address_is_last_resort() {
        let raw = json!({
            "custody_address": "0x2222222222222222222222222222222222222222"
        });
        assert_eq!(
            normalize_addresses(&raw),
            vec!["0x2222222222222222222222222222222222222222".to_string()]
        );
    }

    #[test]
    fn test_full_profile_normalization() {
        let raw = json!({
            "username": "alice",
            "display_name": "Alice",
            "pfp_url": "https://img.example/alice.png",
            "profile": { "bio": { "text": "gm" } },
            "follower_count": 2000,
            "power_badge": true,
            "verified_addresses": {
                "eth_addresses": ["0x1111111111111111111111111111111111111111"]
            },
            "custody_address": "0x2222222222222222222222222222222222222222"
        });

        let profile = normalize_profile(3, &raw);
        assert_eq!(profile.fid, 3);
        assert_eq!(profile.username.as_deref(), Some("alice"));
        assert_eq!(profile.bio.as_deref(), Some("gm"));
        assert_eq!(profile.score, 0.2);
        assert!(profile.has_badge);
        assert_eq!(profile.verified_addresses.len(), 1);
        assert_eq!(
            profile.custody_address.as_deref(),
            Some("0x2222222222222222222222222222222222222222")
        );
    }
}
