// Eligibility & Pricing Engine
// Pure policy: decides whether an identity may mint and at what price.
// Token-gated rules — pro badge plus a minimum aggregate token balance.
// Every failed condition is enumerated so the client can show all of
// them at once.

use serde::Serialize;

use crate::app_config::AppConfig;
use crate::services::balance::AggregateBalance;
use crate::services::identity::IdentityProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibilityReason {
    /// No verified wallet address to check balances against
    NoWalletFound,
    MissingBadge,
    InsufficientBalance,
}

/// Tagged outcome: a price exists only for eligible users
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EligibilityResult {
    Eligible { price: String },
    Ineligible { reasons: Vec<IneligibilityReason> },
}

impl EligibilityResult {
    pub fn is_eligible(&self) -> bool {
        matches!(self, EligibilityResult::Eligible { .. })
    }
}

pub struct EligibilityEngine {
    required_token_balance: u64,
    mint_price: String,
}

impl EligibilityEngine {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_policy(config.required_token_balance, &config.mint_price)
    }

    pub fn with_policy(required_token_balance: u64, mint_price: &str) -> Self {
        Self {
            required_token_balance,
            mint_price: mint_price.to_string(),
        }
    }

    /// Evaluate the policy. `balance` is None when the user has no wallet
    /// to query; that is an ineligibility reason, never an error.
    pub fn evaluate(
        &self,
        profile: &IdentityProfile,
        balance: Option<&AggregateBalance>,
    ) -> EligibilityResult {
        let mut reasons = Vec::new();

        if !profile.has_badge {
            reasons.push(IneligibilityReason::MissingBadge);
        }

        match balance {
            None => reasons.push(IneligibilityReason::NoWalletFound),
            Some(balance) => {
                if !balance.meets_whole_token_threshold(self.required_token_balance) {
                    reasons.push(IneligibilityReason::InsufficientBalance);
                }
            },
        }

        if reasons.is_empty() {
            EligibilityResult::Eligible {
                price: self.mint_price.clone(),
            }
        } else {
            EligibilityResult::Ineligible { reasons }
        }
    }
}
