// Database models for the FID MFERS backend

pub mod generation;
pub mod payment;
pub mod social_share;
pub mod user;
pub mod vote;

/// Attempts for serializable transactions that lose to a concurrent
/// writer before the failure is surfaced to the caller
pub(crate) const SERIALIZATION_RETRIES: u8 = 3;

pub use generation::{Generation, GenerationStatus, NewGeneration, TOP_900_CAP};
pub use payment::{NewPayment, Payment, PaymentPurpose, PaymentStatus, GENERATION_QUOTA};
pub use social_share::{SharePlatform, SocialShare};
pub use user::{NewUser, User, UserProfileUpdate};
pub use vote::{Vote, MAX_VOTES_PER_USER};
