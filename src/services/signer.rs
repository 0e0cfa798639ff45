// Mint Permit Signer
// Holds the backend signing key and produces EIP-712 mint-permit
// signatures the NFT contract verifies on-chain.

use k256::ecdsa::SigningKey;
use thiserror::Error;

use crate::app_config::AppConfig;
use crate::utils::eip712::{mint_permit_struct_hash, signing_digest, Eip712Domain};
use crate::utils::eth::parse_address;
use crate::utils::service_error::ServiceError;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("Invalid signer key: {0}")]
    InvalidKey(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Signing failed: {0}")]
    Signing(String),
}

impl From<SignerError> for ServiceError {
    fn from(error: SignerError) -> Self {
        match error {
            SignerError::InvalidAddress(a) => {
                ServiceError::InvalidInput(format!("Invalid address: {}", a))
            },
            other => ServiceError::Infrastructure(other.to_string()),
        }
    }
}

pub struct MintSigner {
    key: SigningKey,
    domain: Eip712Domain,
}

impl MintSigner {
    /// Domain tuple is versioned and append-only; changing any component
    /// invalidates every outstanding permit.
    pub fn new(config: &AppConfig) -> Result<Self, SignerError> {
        let key_hex = config.nft_signer_private_key.trim_start_matches("0x");
        let key_bytes = hex::decode(key_hex).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        let key = SigningKey::from_slice(&key_bytes)
            .map_err(|e| SignerError::InvalidKey(e.to_string()))?;

        let verifying_contract = parse_address(&config.nft_contract_address)
            .map_err(|_| SignerError::InvalidAddress(config.nft_contract_address.clone()))?;

        Ok(Self {
            key,
            domain: Eip712Domain {
                name: "FidMfers".to_string(),
                version: "1".to_string(),
                chain_id: config.chain_id,
                verifying_contract,
            },
        })
    }

    /// Build a signer from an explicit key and domain
    pub fn with_key(key: SigningKey, domain: Eip712Domain) -> Self {
        Self { key, domain }
    }

    /// 32-byte digest the wallet-side verifier recomputes
    pub fn permit_digest(
        &self,
        to: &str,
        token_id: u64,
        ipfs_uri: &str,
    ) -> Result<[u8; 32], SignerError> {
        let to = parse_address(to).map_err(|_| SignerError::InvalidAddress(to.to_string()))?;
        let struct_hash = mint_permit_struct_hash(&to, token_id, ipfs_uri);
        Ok(signing_digest(&self.domain.separator(), &struct_hash))
    }

    /// Sign a mint permit; returns the 65-byte r‖s‖v signature as 0x-hex
    /// with v in {27, 28}
    pub fn sign_mint_permit(
        &self,
        to: &str,
        token_id: u64,
        ipfs_uri: &str,
    ) -> Result<String, SignerError> {
        let digest = self.permit_digest(to, token_id, ipfs_uri)?;

        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| SignerError::Signing(e.to_string()))?;

        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = 27 + recovery_id.to_byte();

        Ok(format!("0x{}", hex::encode(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

    fn test_signer() -> MintSigner {
        let key = SigningKey::from_slice(&[0x42u8; 32]).expect("valid key");
        let domain = Eip712Domain {
            name: "FidMfers".to_string(),
            version: "1".to_string(),
            chain_id: 8453,
            verifying_contract: [0x11u8; 20],
        };
        MintSigner::with_key(key, domain)
    }

    #[test]
    fn test_digest_is_deterministic_and_input_sensitive() {
        let signer = test_signer();
        let to = "0x1111111111111111111111111111111111111111";

        let a = signer.permit_digest(to, 1, "ipfs://QmAbc").expect("digest");
        let b = signer.permit_digest(to, 1, "ipfs://QmAbc").expect("digest");
        let c = signer.permit_digest(to, 2, "ipfs://QmAbc").expect("digest");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_signature_recovers_to_signer() {
        let signer = test_signer();
        let to = "0x1111111111111111111111111111111111111111";

        let sig_hex = signer
            .sign_mint_permit(to, 7, "ipfs://QmAbc")
            .expect("signature");
        let bytes = hex::decode(sig_hex.trim_start_matches("0x")).expect("hex");
        assert_eq!(bytes.len(), 65);
        let v = bytes[64];
        assert!(v == 27 || v == 28);

        let signature = Signature::from_slice(&bytes[..64]).expect("signature bytes");
        let recovery_id = RecoveryId::from_byte(v - 27).expect("recovery id");
        let digest = signer.permit_digest(to, 7, "ipfs://QmAbc").expect("digest");

        let recovered = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
            .expect("recovery");
        assert_eq!(&recovered, signer.key.verifying_key());
    }

    #[test]
    fn test_rejects_malformed_recipient() {
        let signer = test_signer();
        assert!(signer.sign_mint_permit("not-an-address", 1, "ipfs://x").is_err());
    }
}
