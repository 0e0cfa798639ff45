// HTTP surface. Handlers stay thin: extract, delegate, serialize.

pub mod admin;
pub mod eligibility;
pub mod gallery;
pub mod generations;
pub mod health;
pub mod mint;
pub mod payments;
pub mod referrals;
pub mod shares;
pub mod users;
pub mod votes;
pub mod webhooks;

use axum::{
    routing::{get, post},
    Router,
};
use diesel_async::AsyncPgConnection;

use crate::app::AppState;
use crate::app_config::config;
use crate::models::User;
use crate::utils::eth::normalize_address;
use crate::utils::service_error::ServiceError;

// Public routes (no auth)
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/gallery", get(gallery::list_gallery))
        .route("/webhooks/neynar", post(webhooks::neynar_webhook))
}

// Routes behind Quick Auth
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(users::get_me))
        .route("/eligibility", get(eligibility::check_eligibility))
        .route("/payments", post(payments::record_payment))
        .route("/generations", post(generations::request_generation))
        .route("/mint/prepare", post(mint::prepare_mint))
        .route("/mint/confirm", post(mint::confirm_mint))
        .route("/votes", post(votes::cast_vote).delete(votes::retract_vote))
        .route("/shares", post(shares::record_share))
        .route("/referrals/track", post(referrals::track_referral))
}

// Admin routes (Quick Auth + wallet gate inside the handlers)
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/generations", get(admin::list_generations))
        .route("/admin/top900", post(admin::toggle_top_900))
        .route("/admin/regenerate", post(admin::regenerate))
}

/// Load the caller's user row, creating it from a fresh directory
/// snapshot on first contact
pub(crate) async fn load_or_create_user(
    state: &AppState,
    conn: &mut AsyncPgConnection,
    fid: i64,
) -> Result<User, ServiceError> {
    match User::find_by_fid(conn, fid).await {
        Ok(user) => Ok(user),
        Err(diesel::result::Error::NotFound) => {
            let profile = state.identity.resolve(fid).await?;
            Ok(User::upsert_by_fid(conn, fid, profile.to_profile_update()).await?)
        },
        Err(e) => Err(e.into()),
    }
}

/// Admin gate: the caller's wallet set must contain the configured
/// admin wallet
pub(crate) fn ensure_admin(user: &User) -> Result<(), ServiceError> {
    let admin = normalize_address(&config().admin_wallet_address);

    let is_admin = user
        .primary_address
        .as_deref()
        .map(normalize_address)
        .is_some_and(|a| a == admin)
        || user
            .custody_address
            .as_deref()
            .map(normalize_address)
            .is_some_and(|a| a == admin)
        || user
            .verified_addresses
            .iter()
            .any(|a| normalize_address(a) == admin);

    if is_admin {
        Ok(())
    } else {
        Err(ServiceError::Forbidden("Admin access required".to_string()))
    }
}
