// Ethereum address and transaction hash helpers

use once_cell::sync::Lazy;
use regex::Regex;

use crate::utils::service_error::ServiceError;

static ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").expect("address regex"));

static TX_HASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[a-fA-F0-9]{64}$").expect("tx hash regex"));

/// True if `s` is a 0x-prefixed 20-byte hex address
pub fn is_address(s: &str) -> bool {
    ADDRESS_RE.is_match(s)
}

/// True if `s` is a 0x-prefixed 32-byte hex transaction hash
pub fn is_tx_hash(s: &str) -> bool {
    TX_HASH_RE.is_match(s)
}

/// Normalize an address to its lowercase form
pub fn normalize_address(s: &str) -> String {
    s.to_lowercase()
}

/// Validate and normalize a wallet address from client input
pub fn validate_address(s: &str) -> Result<String, ServiceError> {
    if !is_address(s) {
        return Err(ServiceError::InvalidInput(
            "Invalid wallet address format".to_string(),
        ));
    }
    Ok(normalize_address(s))
}

/// Validate and normalize a transaction hash from client input
pub fn validate_tx_hash(s: &str) -> Result<String, ServiceError> {
    if !is_tx_hash(s) {
        return Err(ServiceError::InvalidInput(
            "Invalid transaction hash format".to_string(),
        ));
    }
    Ok(s.to_lowercase())
}

/// Parse a 0x-prefixed address into its 20 raw bytes
pub fn parse_address(s: &str) -> Result<[u8; 20], ServiceError> {
    if !is_address(s) {
        return Err(ServiceError::InvalidInput(format!(
            "not a valid address: {}",
            s
        )));
    }
    let bytes = hex::decode(&s[2..])
        .map_err(|e| ServiceError::InvalidInput(format!("address hex decode: {}", e)))?;
    let mut out = [0u8; 20];
    out.copy_from_slice(&bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_validation() {
        assert!(is_address("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"));
        assert!(!is_address("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA0291")); // too short
        assert!(!is_address("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913")); // no prefix
        assert!(!is_address("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA0291g")); // bad hex
    }

    #[test]
    fn test_tx_hash_validation() {
        let good = format!("0x{}", "ab".repeat(32));
        assert!(is_tx_hash(&good));
        assert!(!is_tx_hash(&good[..60]));
        assert!(!is_tx_hash(&good.replace("ab", "zz")));
    }

    #[test]
    fn test_validate_lowercases_input() {
        assert_eq!(
            validate_address("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913").unwrap(),
            "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913"
        );
        let mixed = format!("0x{}", "aB".repeat(32));
        assert_eq!(validate_tx_hash(&mixed).unwrap(), mixed.to_lowercase());
        assert!(validate_tx_hash("0xnope").is_err());
    }

    #[test]
    fn test_parse_address() {
        let parsed = parse_address("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913").unwrap();
        assert_eq!(parsed[0], 0x83);
        assert_eq!(parsed[19], 0x13);
        assert!(parse_address("0xnope").is_err());
    }
}
