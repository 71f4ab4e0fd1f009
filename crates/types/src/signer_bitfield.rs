//! Participation bitfield over a validator roster.

use sbor::prelude::BasicSbor;
use std::fmt;
use thiserror::Error;

/// Errors constructing a bitfield from wire bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BitfieldError {
    #[error("bitfield is {got} bytes, expected {expected} for {validators} validators")]
    WrongLength {
        got: usize,
        expected: usize,
        validators: usize,
    },

    #[error("bitfield has bits set beyond validator {validators}")]
    TrailingBits { validators: usize },
}

/// Tracks which validators signed. Bit *i* corresponds to roster position *i*.
///
/// The byte length is always the roster size rounded up to a whole byte.
#[derive(Clone, PartialEq, Eq, BasicSbor)]
pub struct SignerBitfield {
    validators: u32,
    bits: Vec<u8>,
}

impl SignerBitfield {
    /// An empty bitfield sized for `validators` roster members.
    pub fn new(validators: usize) -> Self {
        SignerBitfield {
            validators: validators as u32,
            bits: vec![0u8; Self::byte_len(validators)],
        }
    }

    /// Byte length of a bitfield covering `validators` members.
    pub fn byte_len(validators: usize) -> usize {
        validators.div_ceil(8)
    }

    /// Reconstruct a bitfield received on the wire.
    ///
    /// Rejects payloads whose length does not match the roster and payloads
    /// claiming signers beyond the roster end.
    pub fn from_bytes(bytes: &[u8], validators: usize) -> Result<Self, BitfieldError> {
        let expected = Self::byte_len(validators);
        if bytes.len() != expected {
            return Err(BitfieldError::WrongLength {
                got: bytes.len(),
                expected,
                validators,
            });
        }
        if validators % 8 != 0 {
            if let Some(last) = bytes.last() {
                let used = validators % 8;
                if last >> used != 0 {
                    return Err(BitfieldError::TrailingBits { validators });
                }
            }
        }
        Ok(SignerBitfield {
            validators: validators as u32,
            bits: bytes.to_vec(),
        })
    }

    /// Mark roster position `index` as a signer.
    pub fn set(&mut self, index: usize) {
        if index < self.validators as usize {
            self.bits[index / 8] |= 1 << (index % 8);
        }
    }

    /// Whether roster position `index` signed.
    pub fn is_set(&self, index: usize) -> bool {
        index < self.validators as usize && self.bits[index / 8] & (1 << (index % 8)) != 0
    }

    /// Number of signers.
    pub fn count(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Roster size this bitfield covers.
    pub fn len(&self) -> usize {
        self.validators as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// The raw wire bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }
}

impl fmt::Debug for SignerBitfield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignerBitfield({}/{})", self.count(), self.validators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_count() {
        let mut bits = SignerBitfield::new(10);
        assert_eq!(bits.count(), 0);
        bits.set(0);
        bits.set(7);
        bits.set(9);
        assert_eq!(bits.count(), 3);
        assert!(bits.is_set(0));
        assert!(bits.is_set(9));
        assert!(!bits.is_set(1));
        assert_eq!(bits.as_bytes().len(), 2);
    }

    #[test]
    fn test_set_out_of_range_is_ignored() {
        let mut bits = SignerBitfield::new(4);
        bits.set(4);
        assert_eq!(bits.count(), 0);
        assert!(!bits.is_set(4));
    }

    #[test]
    fn test_from_bytes_round_trip() {
        let mut bits = SignerBitfield::new(12);
        bits.set(3);
        bits.set(11);
        let rebuilt = SignerBitfield::from_bytes(bits.as_bytes(), 12).unwrap();
        assert_eq!(rebuilt, bits);
    }

    #[test]
    fn test_from_bytes_wrong_length() {
        let err = SignerBitfield::from_bytes(&[0u8; 3], 12).unwrap_err();
        assert_eq!(
            err,
            BitfieldError::WrongLength {
                got: 3,
                expected: 2,
                validators: 12
            }
        );
    }

    #[test]
    fn test_from_bytes_trailing_bits() {
        // 4 validators fit in one byte; the upper nibble must be clear.
        let err = SignerBitfield::from_bytes(&[0b0001_0001], 4).unwrap_err();
        assert_eq!(err, BitfieldError::TrailingBits { validators: 4 });

        // A full byte of signers is fine when the roster is a multiple of 8.
        assert!(SignerBitfield::from_bytes(&[0xff], 8).is_ok());
    }
}
