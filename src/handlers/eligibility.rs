// Eligibility endpoint: identity snapshot + balance aggregation + policy

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::app::AppState;
use crate::app_config::config;
use crate::middleware::AuthenticatedFid;
use crate::services::TokenBalanceOracle;
use crate::utils::service_error::ServiceError;

/// GET /api/v1/eligibility
pub async fn check_eligibility(
    State(state): State<AppState>,
    AuthenticatedFid(fid): AuthenticatedFid,
) -> Result<impl IntoResponse, ServiceError> {
    let profile = state.identity.resolve(fid).await?;

    // No wallet is a policy outcome, never an error
    let balance = if profile.verified_addresses.is_empty() {
        None
    } else {
        let oracle = TokenBalanceOracle::new(&state.chain, &config().token_contract_address);
        Some(oracle.aggregate_balance(&profile.verified_addresses).await)
    };

    let result = state.eligibility.evaluate(&profile, balance.as_ref());

    Ok(Json(json!({
        "fid": fid,
        "score": profile.score,
        "has_badge": profile.has_badge,
        "result": result,
    })))
}
