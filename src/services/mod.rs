// Service layer: outbound clients and the orchestration around them

pub mod balance;
pub mod chain;
pub mod eligibility;
pub mod generator;
pub mod identity;
pub mod ipfs;
pub mod lifecycle;
pub mod notification;
pub mod signer;

pub use balance::{AggregateBalance, TokenBalanceOracle};
pub use chain::ChainClient;
pub use eligibility::{EligibilityEngine, EligibilityResult, IneligibilityReason};
pub use generator::GeneratorClient;
pub use identity::{IdentityProfile, IdentityResolver};
pub use ipfs::PinningClient;
pub use lifecycle::{GenerationLifecycle, PreparedMint};
pub use notification::NotificationService;
pub use signer::MintSigner;
