// Generation Lifecycle Coordinator
// Drives the per-image state machine across the generator, pinning
// service, signer and chain client:
//   PROCESSING -> COMPLETED | FAILED        (generation step)
//   COMPLETED  -> PENDING   -> MINTED       (mint step)
// All state advances go through the models' conditional updates, so
// concurrent requests lose cleanly instead of corrupting a row.

use diesel_async::AsyncPgConnection;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::app_config::AppConfig;
use crate::models::{
    Generation, GenerationStatus, NewGeneration, NewPayment, Payment, PaymentPurpose,
    PaymentStatus, User,
};
use crate::models::generation::SnapshotUpdate;
use crate::services::chain::ChainClient;
use crate::services::generator::{GeneratedImage, GeneratorClient};
use crate::services::identity::{IdentityProfile, IdentityResolver};
use crate::services::ipfs::{build_nft_metadata, PinningClient};
use crate::services::notification::NotificationService;
use crate::services::signer::MintSigner;
use crate::utils::eth::{validate_address, validate_tx_hash};
use crate::utils::service_error::ServiceError;

static IMAGE_FETCH_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to create HTTP client for image downloads")
});

/// Everything the client needs to submit the mint transaction
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedMint {
    pub generation_id: Uuid,
    pub token_id: i64,
    pub ipfs_uri: String,
    pub signature: String,
    pub contract_address: String,
    pub payment_token_address: String,
    /// Mint cost in the payment token's smallest unit
    pub mint_cost: String,
}

pub struct GenerationLifecycle {
    identity: Arc<IdentityResolver>,
    chain: Arc<ChainClient>,
    generator: Arc<GeneratorClient>,
    pinning: Arc<PinningClient>,
    signer: Arc<MintSigner>,
    notifications: Arc<NotificationService>,
    nft_contract_address: String,
    token_contract_address: String,
    mint_price: String,
    mint_cost_units: String,
}

impl GenerationLifecycle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &AppConfig,
        identity: Arc<IdentityResolver>,
        chain: Arc<ChainClient>,
        generator: Arc<GeneratorClient>,
        pinning: Arc<PinningClient>,
        signer: Arc<MintSigner>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            identity,
            chain,
            generator,
            pinning,
            signer,
            notifications,
            nft_contract_address: config.nft_contract_address.clone(),
            token_contract_address: config.token_contract_address.clone(),
            mint_price: config.mint_price.clone(),
            mint_cost_units: config.mint_cost_units.clone(),
        }
    }

    // ===== GENERATION STEP =====

    /// Consume one generation credit and run the generator. Generator
    /// failure is an outcome, not an error: the row lands in FAILED and
    /// is returned, never thrown.
    #[instrument(skip(self, conn, user), fields(fid = user.fid))]
    pub async fn request_generation(
        &self,
        conn: &mut AsyncPgConnection,
        user: &User,
    ) -> Result<Generation, ServiceError> {
        let credit_ids = Payment::available_credit_ids(conn, user.id).await?;
        if credit_ids.is_empty() {
            return Err(ServiceError::QuotaExceeded(
                "No generation credits available".to_string(),
            ));
        }

        let profile = self.identity.resolve(user.fid).await?;

        // The quota predicate lives inside the UPDATE; a credit that
        // raced away here just moves us to the next one
        let mut consumed = false;
        for credit_id in credit_ids {
            if Payment::try_consume_credit(conn, credit_id).await? {
                consumed = true;
                break;
            }
        }
        if !consumed {
            return Err(ServiceError::QuotaExceeded(
                "No generation credits available".to_string(),
            ));
        }

        let generation = Generation::create(
            conn,
            NewGeneration {
                user_id: user.id,
                fid: user.fid,
                prompt: build_prompt(&profile),
                status: GenerationStatus::Processing.as_str().to_string(),
                image_url: String::new(),
                user_pfp_url: profile.pfp_url.clone(),
                user_bio: profile.bio.clone(),
                user_followers: Some(profile.follower_count.min(i32::MAX as i64) as i32),
                user_verified: profile.has_badge,
            },
        )
        .await?;

        self.run_generator(conn, generation, &profile).await
    }

    /// Re-run the generator for an existing row with a refreshed identity
    /// snapshot. Admin flow; the credit is not charged again.
    #[instrument(skip(self, conn))]
    pub async fn regenerate(
        &self,
        conn: &mut AsyncPgConnection,
        generation_id: Uuid,
    ) -> Result<Generation, ServiceError> {
        let generation = Generation::find_by_id(conn, generation_id).await?;

        if !generation
            .status_enum()
            .can_transition_to(GenerationStatus::Processing)
        {
            return Err(ServiceError::StateConflict(format!(
                "Generation is {} and cannot be regenerated",
                generation.status
            )));
        }

        let profile = self.identity.resolve(generation.fid).await?;

        let generation = Generation::mark_reprocessing(
            conn,
            generation_id,
            SnapshotUpdate {
                user_pfp_url: profile.pfp_url.clone(),
                user_bio: profile.bio.clone(),
                user_followers: Some(profile.follower_count.min(i32::MAX as i64) as i32),
                user_verified: Some(profile.has_badge),
            },
        )
        .await?;

        self.run_generator(conn, generation, &profile).await
    }

    async fn run_generator(
        &self,
        conn: &mut AsyncPgConnection,
        generation: Generation,
        profile: &IdentityProfile,
    ) -> Result<Generation, ServiceError> {
        match self.generator.generate(generation.id, profile).await {
            Ok(GeneratedImage::Bytes(bytes)) => {
                // Inline bytes are pinned right away; the gateway URL is
                // what browsers load
                let image_uri = self
                    .pinning
                    .pin_image(&format!("generation-{}.png", generation.id), bytes)
                    .await?;
                let display_url = self.pinning.to_http_url(&image_uri);
                Ok(Generation::mark_completed(
                    conn,
                    generation.id,
                    &display_url,
                    Some(&image_uri),
                )
                .await?)
            },
            Ok(GeneratedImage::Url(url)) => {
                Ok(Generation::mark_completed(conn, generation.id, &url, None).await?)
            },
            Err(e) => {
                warn!(generation_id = %generation.id, "generation failed: {}", e);
                Generation::mark_failed(conn, generation.id).await?;
                Ok(Generation::find_by_id(conn, generation.id).await?)
            },
        }
    }

    // ===== MINT STEP =====

    /// Pin the image and metadata, sign the mint permit and move the row
    /// to PENDING. The COMPLETED + token-id-unset predicate on the update
    /// makes concurrent prepares lose with a conflict.
    #[instrument(skip(self, conn, user), fields(fid = user.fid))]
    pub async fn prepare_mint(
        &self,
        conn: &mut AsyncPgConnection,
        user: &User,
        generation_id: Uuid,
        to_address: &str,
    ) -> Result<PreparedMint, ServiceError> {
        validate_address(to_address)?;

        let generation = Generation::find_by_id(conn, generation_id).await?;
        if generation.user_id != user.id {
            return Err(ServiceError::Forbidden(
                "Generation belongs to another user".to_string(),
            ));
        }

        match generation.status_enum() {
            GenerationStatus::Completed => {},
            GenerationStatus::Minted => {
                return Err(ServiceError::StateConflict(
                    "Generation is already minted".to_string(),
                ));
            },
            other => {
                return Err(ServiceError::StateConflict(format!(
                    "Generation is {} and cannot be minted",
                    other.as_str()
                )));
            },
        }
        if generation.token_id.is_some() {
            return Err(ServiceError::StateConflict(
                "Mint is already prepared for this generation".to_string(),
            ));
        }

        // The token id IS the FID: one NFT per FID, across all of that
        // user's generations
        if Generation::fid_token_exists(conn, generation.fid).await? {
            return Err(ServiceError::StateConflict(format!(
                "FID {} already has a token prepared or minted",
                generation.fid
            )));
        }
        let token_id = generation.fid;

        let image_uri = match &generation.ipfs_image_uri {
            Some(uri) => uri.clone(),
            None => {
                let bytes = self.download_image(&generation.image_url).await?;
                self.pinning
                    .pin_image(&format!("generation-{}.png", generation.id), bytes)
                    .await?
            },
        };

        let metadata = build_nft_metadata(
            token_id,
            generation.fid,
            user.username.as_deref(),
            &image_uri,
        );
        let metadata_uri = self
            .pinning
            .pin_json(&format!("generation-{}", generation.id), &metadata)
            .await?;

        let signature = self
            .signer
            .sign_mint_permit(to_address, token_id as u64, &metadata_uri)?;

        let claimed =
            Generation::begin_mint(conn, generation_id, token_id, &image_uri, &metadata_uri)
                .await?;
        if !claimed {
            return Err(ServiceError::StateConflict(
                "Generation was claimed by a concurrent mint preparation".to_string(),
            ));
        }

        info!(generation_id = %generation_id, token_id, "mint prepared");

        Ok(PreparedMint {
            generation_id,
            token_id,
            ipfs_uri: metadata_uri,
            signature,
            contract_address: self.nft_contract_address.clone(),
            payment_token_address: self.token_contract_address.clone(),
            mint_cost: self.mint_cost_units.clone(),
        })
    }

    /// Wait (bounded) for the mint transaction, then finalize the row and
    /// record the mint payment. Replays fail before any chain call.
    #[instrument(skip(self, conn, user), fields(fid = user.fid))]
    pub async fn confirm_mint(
        &self,
        conn: &mut AsyncPgConnection,
        user: &User,
        generation_id: Uuid,
        tx_hash: &str,
    ) -> Result<Generation, ServiceError> {
        validate_tx_hash(tx_hash)?;

        let generation = Generation::find_by_id(conn, generation_id).await?;
        if generation.user_id != user.id {
            return Err(ServiceError::Forbidden(
                "Generation belongs to another user".to_string(),
            ));
        }

        match generation.status_enum() {
            GenerationStatus::Pending => {},
            GenerationStatus::Minted => {
                return Err(ServiceError::StateConflict(
                    "Generation is already minted".to_string(),
                ));
            },
            other => {
                return Err(ServiceError::StateConflict(format!(
                    "Generation is {} and has no mint to confirm",
                    other.as_str()
                )));
            },
        }

        self.chain.wait_for_receipt(tx_hash).await?;

        let generation = Generation::finalize_mint(conn, generation_id, tx_hash)
            .await?
            .ok_or_else(|| {
                ServiceError::StateConflict(
                    "Mint was already confirmed by a concurrent request".to_string(),
                )
            })?;

        // tx_hash uniqueness gives at-most-once; a replayed hash is fine
        match Payment::create(
            conn,
            NewPayment {
                user_id: user.id,
                amount: self.mint_price.clone(),
                token_symbol: "USDC".to_string(),
                tx_hash: tx_hash.to_string(),
                status: PaymentStatus::Confirmed.as_str().to_string(),
                purpose: PaymentPurpose::Mint.as_str().to_string(),
                generation_id: Some(generation_id),
            },
        )
        .await
        {
            Ok(_) => {},
            Err(diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            )) => {
                info!(tx_hash, "mint payment already recorded");
            },
            Err(e) => return Err(e.into()),
        }

        if let Some(token_id) = generation.token_id {
            self.notifications
                .notify_mint_confirmed(user.fid, token_id)
                .await;
        }

        info!(generation_id = %generation_id, "mint confirmed");

        Ok(generation)
    }

    async fn download_image(&self, url: &str) -> Result<Vec<u8>, ServiceError> {
        let response = IMAGE_FETCH_CLIENT
            .get(url)
            .send()
            .await
            .map_err(|e| ServiceError::UpstreamFailure(format!("image download failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::UpstreamFailure(format!(
                "image download returned {}",
                response.status()
            )));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| ServiceError::UpstreamFailure(format!("image download failed: {}", e)))
    }
}

fn build_prompt(profile: &IdentityProfile) -> String {
    let handle = profile.username.as_deref().unwrap_or("anon");
    format!("mfer portrait for @{} (FID {})", handle, profile.fid)
}
