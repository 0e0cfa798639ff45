// Token Balance Oracle
// Aggregates an ERC-20 balance across all of a user's wallet addresses.
// Individual address failures are logged and skipped; a total of zero is
// a valid answer, not an error.

use thiserror::Error;
use tracing::{instrument, warn};

use crate::services::chain::{ChainClient, ChainError};
use crate::utils::eth::normalize_address;

// ERC-20 function selectors
const BALANCE_OF_SELECTOR: &str = "0x70a08231";
const DECIMALS_SELECTOR: &str = "0x313ce567";

const DEFAULT_DECIMALS: u8 = 18;

#[derive(Debug, Error)]
pub enum BalanceError {
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Raw aggregate balance plus the token's decimals
#[derive(Debug, Clone, Copy)]
pub struct AggregateBalance {
    pub raw: u128,
    pub decimals: u8,
}

impl AggregateBalance {
    /// Threshold in whole tokens scaled to the token's decimals.
    /// Saturates instead of overflowing for absurd decimals values.
    pub fn meets_whole_token_threshold(&self, whole_tokens: u64) -> bool {
        let scale = 10u128.checked_pow(self.decimals as u32);
        match scale.and_then(|s| (whole_tokens as u128).checked_mul(s)) {
            Some(threshold) => self.raw >= threshold,
            None => false,
        }
    }
}

pub struct TokenBalanceOracle<'a> {
    chain: &'a ChainClient,
    token_address: String,
}

impl<'a> TokenBalanceOracle<'a> {
    pub fn new(chain: &'a ChainClient, token_address: &str) -> Self {
        Self {
            chain,
            token_address: token_address.to_string(),
        }
    }

    /// Sum `balanceOf` over the deduplicated address list. Addresses whose
    /// query fails contribute zero; decimals are fetched once and default
    /// to 18 on failure.
    #[instrument(skip(self))]
    pub async fn aggregate_balance(&self, addresses: &[String]) -> AggregateBalance {
        let mut seen = std::collections::HashSet::new();
        let mut total: u128 = 0;

        for address in addresses {
            let normalized = normalize_address(address);
            if !seen.insert(normalized.clone()) {
                continue;
            }

            match self.balance_of(&normalized).await {
                Ok(balance) => total = total.saturating_add(balance),
                Err(e) => {
                    warn!(address = %normalized, "balance query failed, skipping: {}", e);
                },
            }
        }

        let decimals = match self.decimals().await {
            Ok(d) => d,
            Err(e) => {
                warn!("decimals query failed, defaulting to {}: {}", DEFAULT_DECIMALS, e);
                DEFAULT_DECIMALS
            },
        };

        AggregateBalance {
            raw: total,
            decimals,
        }
    }

    async fn balance_of(&self, address: &str) -> Result<u128, BalanceError> {
        let call_data = format!(
            "{}{:0>64}",
            BALANCE_OF_SELECTOR,
            address.trim_start_matches("0x")
        );
        let result = self.chain.eth_call(&self.token_address, &call_data).await?;
        Ok(parse_uint(&result))
    }

    async fn decimals(&self) -> Result<u8, BalanceError> {
        let result = self
            .chain
            .eth_call(&self.token_address, DECIMALS_SELECTOR)
            .await?;
        Ok(parse_uint(&result).min(u8::MAX as u128) as u8)
    }
}

/// Decode an ABI-encoded uint256 return value, truncating to u128.
/// Balances above u128::MAX are clamped; far beyond any real supply.
fn parse_uint(hex_result: &str) -> u128 {
    let trimmed = hex_result.trim_start_matches("0x");
    if trimmed.is_empty() {
        return 0;
    }
    // Take the low 32 hex chars (128 bits) of the 32-byte word
    let low = if trimmed.len() > 32 {
        &trimmed[trimmed.len() - 32..]
    } else {
        trimmed
    };
    u128::from_str_radix(low, 16).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uint_word() {
        let word = format!("0x{:0>64}", "de0b6b3a7640000"); // 1e18
        assert_eq!(parse_uint(&word), 1_000_000_000_000_000_000);
        assert_eq!(parse_uint("0x"), 0);
        assert_eq!(parse_uint(&format!("0x{:0>64}", "12")), 18);
    }

    #[test]
    fn test_threshold_at_boundary() {
        let exact = AggregateBalance {
            raw: 200_000u128 * 10u128.pow(18),
            decimals: 18,
        };
        assert!(exact.meets_whole_token_threshold(200_000));

        let one_unit_short = AggregateBalance {
            raw: 200_000u128 * 10u128.pow(18) - 1,
            decimals: 18,
        };
        assert!(!one_unit_short.meets_whole_token_threshold(200_000));
    }

    #[test]
    fn test_threshold_with_six_decimals() {
        let balance = AggregateBalance {
            raw: 200_000_000_000, // 200,000 * 10^6
            decimals: 6,
        };
        assert!(balance.meets_whole_token_threshold(200_000));
        assert!(!balance.meets_whole_token_threshold(200_001));
    }
}
