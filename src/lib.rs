// Library exports for the FID MFERS backend
// Exposes modules and the app-state initializer for the server binary
// and integration tests

pub mod app;
pub mod app_config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use app::AppState;
pub use app_config::{AppConfig, CONFIG};
pub use db::DieselPool;
pub use middleware::{auth_middleware, AuthenticatedFid};
pub use utils::service_error::ServiceError;

// Diesel database pool type alias
use bb8::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;

pub type DbPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Build the shared application state: pool, outbound clients and the
/// lifecycle coordinator
pub async fn initialize_app_state() -> Result<AppState, Box<dyn std::error::Error>> {
    use std::sync::Arc;
    use tracing::info;

    dotenv::dotenv().ok();
    let config = app_config::config();

    info!("Initializing database pool...");
    let db_config = db::DieselDatabaseConfig::default();
    let diesel_pool = db::create_diesel_pool(db_config).await?;

    let identity = Arc::new(services::IdentityResolver::new(config));
    let chain = Arc::new(services::ChainClient::new(config));
    let eligibility = Arc::new(services::EligibilityEngine::new(config));
    let generator = Arc::new(services::GeneratorClient::new(config));
    let pinning = Arc::new(services::PinningClient::new(config));
    let signer = Arc::new(services::MintSigner::new(config)?);
    let notifications = Arc::new(services::NotificationService::new(config));
    let quick_auth = Arc::new(middleware::QuickAuthVerifier::new(config));

    let lifecycle = Arc::new(services::GenerationLifecycle::new(
        config,
        identity.clone(),
        chain.clone(),
        generator,
        pinning.clone(),
        signer,
        notifications.clone(),
    ));

    Ok(AppState {
        diesel_pool,
        quick_auth,
        identity,
        chain,
        eligibility,
        pinning,
        notifications,
        lifecycle,
    })
}

/// Assemble the full router: public routes, Quick Auth protected routes
/// and the admin surface, all under /api/v1
pub fn build_router(state: AppState) -> axum::Router {
    use axum::middleware::from_fn_with_state;

    let protected = handlers::protected_routes()
        .merge(handlers::admin_routes())
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    axum::Router::new()
        .nest("/api/v1", handlers::public_routes().merge(protected))
        .with_state(state)
}
