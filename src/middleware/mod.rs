pub mod auth;
pub mod auth_middleware;

pub use auth::{AuthenticatedFid, QuickAuthVerifier};
pub use auth_middleware::auth_middleware;
