// Application state and configuration
use std::sync::Arc;

use crate::{
    db::DieselPool,
    middleware::QuickAuthVerifier,
    services::{
        ChainClient, EligibilityEngine, GenerationLifecycle, IdentityResolver,
        NotificationService, PinningClient,
    },
};

// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub diesel_pool: DieselPool,
    pub quick_auth: Arc<QuickAuthVerifier>,
    pub identity: Arc<IdentityResolver>,
    pub chain: Arc<ChainClient>,
    pub eligibility: Arc<EligibilityEngine>,
    pub pinning: Arc<PinningClient>,
    pub notifications: Arc<NotificationService>,
    pub lifecycle: Arc<GenerationLifecycle>,
}
