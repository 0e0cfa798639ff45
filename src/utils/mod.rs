// Utility modules for the FID MFERS backend

pub mod eip712;
pub mod eth;
pub mod service_error;

pub use eth::{is_address, is_tx_hash, normalize_address, validate_address, validate_tx_hash};
pub use service_error::ServiceError;
