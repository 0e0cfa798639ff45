// Payment recording with on-chain verification

use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use validator::Validate;

use crate::app::AppState;
use crate::handlers::load_or_create_user;
use crate::middleware::AuthenticatedFid;
use crate::models::{NewPayment, Payment, PaymentPurpose, PaymentStatus};
use crate::services::chain::ChainError;
use crate::utils::eth::validate_tx_hash;
use crate::utils::service_error::ServiceError;

#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    #[validate(length(min = 66, max = 66))]
    pub tx_hash: String,
    #[validate(length(min = 1, max = 32))]
    pub amount: String,
    #[validate(length(min = 1, max = 10))]
    pub token_symbol: String,
}

/// POST /api/v1/payments
/// The receipt is checked before the payment is trusted; a reverted or
/// missing transaction is recorded as FAILED.
pub async fn record_payment(
    State(state): State<AppState>,
    AuthenticatedFid(fid): AuthenticatedFid,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    request.validate()?;
    validate_tx_hash(&request.tx_hash)?;

    let mut conn = state.diesel_pool.get().await?;
    let user = load_or_create_user(&state, &mut conn, fid).await?;

    // tx_hash is unique; a replay is answered with the existing record
    if let Some(existing) = Payment::find_by_tx_hash(&mut conn, &request.tx_hash).await? {
        if existing.user_id != user.id {
            return Err(ServiceError::StateConflict(
                "Transaction already recorded by another user".to_string(),
            ));
        }
        return Ok(Json(json!({ "payment": existing, "replayed": true })));
    }

    let status = match state.chain.wait_for_receipt(&request.tx_hash).await {
        Ok(_) => PaymentStatus::Confirmed,
        Err(ChainError::Reverted(_)) | Err(ChainError::TxNotFound(_)) => {
            warn!(tx_hash = %request.tx_hash, "payment transaction not confirmed");
            PaymentStatus::Failed
        },
        Err(e) => return Err(e.into()),
    };

    let payment = Payment::create(
        &mut conn,
        NewPayment {
            user_id: user.id,
            amount: request.amount,
            token_symbol: request.token_symbol,
            tx_hash: request.tx_hash,
            status: status.as_str().to_string(),
            purpose: PaymentPurpose::Generation.as_str().to_string(),
            generation_id: None,
        },
    )
    .await?;

    info!(payment_id = %payment.id, status = payment.status, "payment recorded");

    Ok(Json(json!({ "payment": payment, "replayed": false })))
}
