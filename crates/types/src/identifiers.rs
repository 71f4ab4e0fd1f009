//! Identifier newtypes.

use sbor::prelude::BasicSbor;
use sha2::{Digest, Sha256};
use std::fmt;

/// Identifies a shard group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BasicSbor)]
pub struct ShardGroupId(pub u64);

/// Block height in the chain (strictly sequential).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BasicSbor)]
pub struct BlockHeight(pub u64);

/// A 20-byte chain address, derived from a validator's public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BasicSbor)]
pub struct Address([u8; 20]);

impl Address {
    /// Derive an address from compressed public key bytes.
    ///
    /// The address is the trailing 20 bytes of the SHA-256 digest of the key.
    pub fn from_public_key_bytes(bytes: &[u8]) -> Self {
        let digest: [u8; 32] = Sha256::digest(bytes).into();
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&digest[12..]);
        Address(addr)
    }

    pub fn new(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}..", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for ShardGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shard-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_is_deterministic() {
        let a = Address::from_public_key_bytes(&[1u8; 96]);
        let b = Address::from_public_key_bytes(&[1u8; 96]);
        assert_eq!(a, b);
        assert_ne!(a, Address::from_public_key_bytes(&[2u8; 96]));
    }

    #[test]
    fn test_address_display() {
        let addr = Address::new([0xab; 20]);
        assert!(addr.to_string().starts_with("0xabab"));
    }
}
