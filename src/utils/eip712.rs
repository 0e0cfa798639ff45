// EIP-712 typed-data hashing for presigned mint permits
//
// The domain tuple and the MintPermit field order are consumed by the
// on-chain verifier; both are append-only. Changing either invalidates
// every signature issued so far.

use sha3::{Digest, Keccak256};

/// keccak256 of arbitrary bytes
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// ABI-encode an address into a 32-byte word
pub fn encode_address(address: &[u8; 20]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(address);
    out
}

/// ABI-encode a uint256 (from u64) into a 32-byte big-endian word
pub fn encode_uint(value: u64) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[24..].copy_from_slice(&value.to_be_bytes());
    out
}

/// EIP-712 domain binding signatures to one contract deployment
#[derive(Debug, Clone)]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: [u8; 20],
}

impl Eip712Domain {
    /// keccak256("EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)")
    fn type_hash() -> [u8; 32] {
        keccak256(
            b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
        )
    }

    /// hashStruct of the domain
    pub fn separator(&self) -> [u8; 32] {
        let mut encoded = Vec::with_capacity(160);
        encoded.extend_from_slice(&Self::type_hash());
        encoded.extend_from_slice(&keccak256(self.name.as_bytes()));
        encoded.extend_from_slice(&keccak256(self.version.as_bytes()));
        encoded.extend_from_slice(&encode_uint(self.chain_id));
        encoded.extend_from_slice(&encode_address(&self.verifying_contract));
        keccak256(&encoded)
    }
}

/// keccak256("MintPermit(address to,uint256 tokenId,string ipfsURI)")
pub fn mint_permit_type_hash() -> [u8; 32] {
    keccak256(b"MintPermit(address to,uint256 tokenId,string ipfsURI)")
}

/// hashStruct(MintPermit{to, tokenId, ipfsURI})
pub fn mint_permit_struct_hash(to: &[u8; 20], token_id: u64, ipfs_uri: &str) -> [u8; 32] {
    let mut encoded = Vec::with_capacity(128);
    encoded.extend_from_slice(&mint_permit_type_hash());
    encoded.extend_from_slice(&encode_address(to));
    encoded.extend_from_slice(&encode_uint(token_id));
    encoded.extend_from_slice(&keccak256(ipfs_uri.as_bytes()));
    keccak256(&encoded)
}

/// Final signing digest: keccak256("\x19\x01" || domainSeparator || structHash)
pub fn signing_digest(domain_separator: &[u8; 32], struct_hash: &[u8; 32]) -> [u8; 32] {
    let mut encoded = Vec::with_capacity(66);
    encoded.extend_from_slice(&[0x19, 0x01]);
    encoded.extend_from_slice(domain_separator);
    encoded.extend_from_slice(struct_hash);
    keccak256(&encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_known_vector() {
        // keccak256("") is a well-known constant
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_word_encodings() {
        let addr = [0x11u8; 20];
        let word = encode_address(&addr);
        assert_eq!(&word[..12], &[0u8; 12]);
        assert_eq!(&word[12..], &addr);

        let word = encode_uint(3);
        assert_eq!(word[31], 3);
        assert_eq!(&word[..31], &[0u8; 31]);
    }

    #[test]
    fn test_domain_separator_changes_with_chain() {
        let contract = [0x22u8; 20];
        let base = Eip712Domain {
            name: "FidMfers".to_string(),
            version: "1".to_string(),
            chain_id: 8453,
            verifying_contract: contract,
        };
        let other_chain = Eip712Domain {
            chain_id: 1,
            ..base.clone()
        };
        assert_ne!(base.separator(), other_chain.separator());
        // Deterministic for the same inputs
        assert_eq!(base.separator(), base.clone().separator());
    }

    #[test]
    fn test_struct_hash_binds_every_field() {
        let to = [0x33u8; 20];
        let h = mint_permit_struct_hash(&to, 3, "ipfs://Qm123");
        assert_ne!(h, mint_permit_struct_hash(&[0x44u8; 20], 3, "ipfs://Qm123"));
        assert_ne!(h, mint_permit_struct_hash(&to, 4, "ipfs://Qm123"));
        assert_ne!(h, mint_permit_struct_hash(&to, 3, "ipfs://Qm124"));
    }
}
