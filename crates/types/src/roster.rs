//! Ordered validator roster and signer masks.

use thiserror::Error;

use crate::crypto::{AggregateError, PublicKey};
use crate::signer_bitfield::{BitfieldError, SignerBitfield};

/// Errors binding a bitfield to a roster.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RosterError {
    #[error(transparent)]
    Bitfield(#[from] BitfieldError),

    #[error("bitfield covers {bitfield} validators, roster has {roster}")]
    SizeMismatch { bitfield: usize, roster: usize },
}

/// The ordered set of validator public keys for a shard.
///
/// Index defines bitmap position; the roster must match across all validators
/// in the shard for aggregate verification to succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorRoster {
    keys: Vec<PublicKey>,
}

impl ValidatorRoster {
    pub fn new(keys: Vec<PublicKey>) -> Self {
        ValidatorRoster { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Byte length of a wire bitmap covering this roster.
    pub fn bitfield_len(&self) -> usize {
        SignerBitfield::byte_len(self.keys.len())
    }

    pub fn get(&self, index: usize) -> Option<&PublicKey> {
        self.keys.get(index)
    }

    /// Bitmap position of a key, if it is a roster member.
    pub fn position_of(&self, key: &PublicKey) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PublicKey> {
        self.keys.iter()
    }

    /// Bind wire bitmap bytes to this roster, producing a verifiable mask.
    pub fn mask_from_bytes(&self, bitmap: &[u8]) -> Result<SignerMask, RosterError> {
        let bitfield = SignerBitfield::from_bytes(bitmap, self.keys.len())?;
        self.mask(bitfield)
    }

    /// Bind an existing bitfield to this roster.
    pub fn mask(&self, bitfield: SignerBitfield) -> Result<SignerMask, RosterError> {
        if bitfield.len() != self.keys.len() {
            return Err(RosterError::SizeMismatch {
                bitfield: bitfield.len(),
                roster: self.keys.len(),
            });
        }
        Ok(SignerMask {
            keys: self
                .keys
                .iter()
                .enumerate()
                .filter(|(i, _)| bitfield.is_set(*i))
                .map(|(_, k)| *k)
                .collect(),
            bitfield,
        })
    }
}

/// A bitfield bound to a roster snapshot.
///
/// Holds the subset of roster keys the bitfield selects, in roster order.
#[derive(Debug, Clone)]
pub struct SignerMask {
    keys: Vec<PublicKey>,
    bitfield: SignerBitfield,
}

impl SignerMask {
    /// Number of signers in the mask.
    pub fn count(&self) -> usize {
        self.keys.len()
    }

    /// The underlying participation bitfield.
    pub fn bitfield(&self) -> &SignerBitfield {
        &self.bitfield
    }

    pub fn into_bitfield(self) -> SignerBitfield {
        self.bitfield
    }

    /// Aggregate public key of the masked members.
    pub fn aggregate_public_key(&self) -> Result<PublicKey, AggregateError> {
        PublicKey::aggregate_bls(&self.keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{KeyPair, Signature};

    fn roster_of(n: usize) -> (Vec<KeyPair>, ValidatorRoster) {
        let keys: Vec<KeyPair> = (0..n).map(|_| KeyPair::generate_bls()).collect();
        let roster = ValidatorRoster::new(keys.iter().map(|k| k.public_key()).collect());
        (keys, roster)
    }

    #[test]
    fn test_position_of() {
        let (_, roster) = roster_of(4);
        let third = *roster.get(2).unwrap();
        assert_eq!(roster.position_of(&third), Some(2));
        assert_eq!(
            roster.position_of(&KeyPair::generate_bls().public_key()),
            None
        );
    }

    #[test]
    fn test_mask_selects_subset() {
        let (keys, roster) = roster_of(4);
        let mut bits = SignerBitfield::new(4);
        bits.set(1);
        bits.set(3);
        let mask = roster.mask(bits).unwrap();
        assert_eq!(mask.count(), 2);

        // Aggregate of members 1 and 3 verifies their aggregated signature.
        let msg = b"masked";
        let agg = Signature::aggregate(&[keys[1].sign(msg), keys[3].sign(msg)]).unwrap();
        assert!(mask.aggregate_public_key().unwrap().verify(msg, &agg));
    }

    #[test]
    fn test_mask_rejects_size_mismatch() {
        let (_, roster) = roster_of(4);
        let err = roster.mask(SignerBitfield::new(5)).unwrap_err();
        assert_eq!(
            err,
            RosterError::SizeMismatch {
                bitfield: 5,
                roster: 4
            }
        );
    }

    #[test]
    fn test_mask_from_wire_bytes() {
        let (_, roster) = roster_of(9);
        // 9 validators need 2 bytes.
        assert_eq!(roster.bitfield_len(), 2);
        let mask = roster.mask_from_bytes(&[0b0000_0101, 0b0000_0001]).unwrap();
        assert_eq!(mask.count(), 3);
        assert!(roster.mask_from_bytes(&[0xff]).is_err());
    }
}
