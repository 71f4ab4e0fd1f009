//! BLS12-381 keys and signatures.
//!
//! Uses the `min_sig` parameterization: signatures are 48-byte compressed G1
//! points, public keys are 96-byte compressed G2 points. This keeps the
//! aggregate signatures carried in every consensus message small.
//!
//! Messages are signed as raw bytes (hashed to the curve internally); callers
//! pass either a 32-byte block hash or a concatenated evidence blob.

use blst::min_sig as bls;
use blst::BLST_ERROR;
use rand::RngCore;
use sbor::prelude::BasicSbor;
use std::fmt;
use thiserror::Error;

use crate::identifiers::Address;

/// Ciphersuite domain separation tag (basic scheme, min_sig).
const DST: &[u8] = b"BLS_SIG_BLS12381G1_XMD:SHA-256_SSWU_RO_NUL_";

/// Compressed public key length in bytes.
pub const PUBLIC_KEY_LEN: usize = 96;

/// Compressed signature length in bytes.
pub const SIGNATURE_LEN: usize = 48;

/// Errors from aggregating keys or signatures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("cannot aggregate an empty set")]
    EmptySet,

    #[error("invalid curve point at index {0}")]
    InvalidPoint(usize),
}

/// A BLS12-381 public key in compressed form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BasicSbor)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

/// A BLS12-381 signature in compressed form.
///
/// May hold the zero sentinel (all zero bytes), which is not a valid curve
/// point and never verifies.
#[derive(Clone, Copy, PartialEq, Eq, BasicSbor)]
pub struct Signature([u8; SIGNATURE_LEN]);

/// A BLS signing keypair.
#[derive(Clone)]
pub struct KeyPair {
    secret: bls::SecretKey,
    public: PublicKey,
}

impl PublicKey {
    /// Construct from compressed bytes, validating the point.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let pk = bls::PublicKey::key_validate(bytes).ok()?;
        Some(PublicKey(pk.compress()))
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Verify a signature over raw message bytes under this key.
    ///
    /// Returns `false` for malformed keys or signatures rather than erroring;
    /// a failed deserialization and a failed pairing check are equivalent to
    /// the caller.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(pk) = bls::PublicKey::uncompress(&self.0) else {
            return false;
        };
        let Ok(sig) = bls::Signature::uncompress(&signature.0) else {
            return false;
        };
        sig.verify(true, message, DST, &[], &pk, true) == BLST_ERROR::BLST_SUCCESS
    }

    /// Aggregate a set of public keys into one.
    ///
    /// Used to build the aggregate key of a signer subset before verifying an
    /// aggregated signature.
    pub fn aggregate_bls(keys: &[PublicKey]) -> Result<PublicKey, AggregateError> {
        if keys.is_empty() {
            return Err(AggregateError::EmptySet);
        }
        let points: Vec<bls::PublicKey> = keys
            .iter()
            .enumerate()
            .map(|(i, k)| {
                bls::PublicKey::uncompress(&k.0).map_err(|_| AggregateError::InvalidPoint(i))
            })
            .collect::<Result<_, _>>()?;
        let refs: Vec<&bls::PublicKey> = points.iter().collect();
        let agg = bls::AggregatePublicKey::aggregate(&refs, false)
            .map_err(|_| AggregateError::InvalidPoint(0))?;
        Ok(PublicKey(agg.to_public_key().compress()))
    }

    /// Derive the 20-byte chain address for this key.
    pub fn address(&self) -> Address {
        Address::from_public_key_bytes(&self.0)
    }
}

impl Signature {
    /// The zero sentinel. Not a valid curve point; never verifies.
    pub fn zero() -> Self {
        Signature([0u8; SIGNATURE_LEN])
    }

    /// Construct from compressed bytes without point validation.
    ///
    /// Validation happens at verification time; an invalid point simply fails
    /// to verify.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; SIGNATURE_LEN] = bytes.try_into().ok()?;
        Some(Signature(arr))
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; SIGNATURE_LEN]
    }

    /// Aggregate signatures over the same message into one.
    pub fn aggregate(signatures: &[Signature]) -> Result<Signature, AggregateError> {
        if signatures.is_empty() {
            return Err(AggregateError::EmptySet);
        }
        let points: Vec<bls::Signature> = signatures
            .iter()
            .enumerate()
            .map(|(i, s)| {
                bls::Signature::uncompress(&s.0).map_err(|_| AggregateError::InvalidPoint(i))
            })
            .collect::<Result<_, _>>()?;
        let refs: Vec<&bls::Signature> = points.iter().collect();
        let agg = bls::AggregateSignature::aggregate(&refs, false)
            .map_err(|_| AggregateError::InvalidPoint(0))?;
        Ok(Signature(agg.to_signature().compress()))
    }
}

impl KeyPair {
    /// Generate a fresh BLS keypair from OS entropy.
    pub fn generate_bls() -> Self {
        let mut ikm = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut ikm);
        Self::from_seed(&ikm)
    }

    /// Derive a keypair deterministically from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let secret = bls::SecretKey::key_gen(seed, &[])
            .expect("key_gen only fails for ikm shorter than 32 bytes");
        let public = PublicKey(secret.sk_to_pk().compress());
        KeyPair { secret, public }
    }

    /// Sign raw message bytes.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.secret.sign(message, DST, &[]).compress())
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// The chain address of this keypair's public key.
    pub fn address(&self) -> Address {
        self.public.address()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}..)", hex::encode(&self.0[..4]))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}..)", hex::encode(&self.0[..4]))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let kp = KeyPair::generate_bls();
        let sig = kp.sign(b"hello");
        assert!(kp.public_key().verify(b"hello", &sig));
        assert!(!kp.public_key().verify(b"other", &sig));
    }

    #[test]
    fn test_wrong_key_rejects() {
        let a = KeyPair::generate_bls();
        let b = KeyPair::generate_bls();
        let sig = a.sign(b"msg");
        assert!(!b.public_key().verify(b"msg", &sig));
    }

    #[test]
    fn test_zero_signature_never_verifies() {
        let kp = KeyPair::generate_bls();
        assert!(!kp.public_key().verify(b"msg", &Signature::zero()));
    }

    #[test]
    fn test_aggregate_subset_verifies() {
        let keys: Vec<KeyPair> = (0..4).map(|_| KeyPair::generate_bls()).collect();
        let msg = b"agreement";

        // Three of four sign.
        let sigs: Vec<Signature> = keys[..3].iter().map(|k| k.sign(msg)).collect();
        let agg_sig = Signature::aggregate(&sigs).unwrap();
        let agg_pk =
            PublicKey::aggregate_bls(&keys[..3].iter().map(|k| k.public_key()).collect::<Vec<_>>())
                .unwrap();

        assert!(agg_pk.verify(msg, &agg_sig));

        // The aggregate over a different subset must not match.
        let other_pk =
            PublicKey::aggregate_bls(&keys[1..].iter().map(|k| k.public_key()).collect::<Vec<_>>())
                .unwrap();
        assert!(!other_pk.verify(msg, &agg_sig));
    }

    #[test]
    fn test_aggregate_empty_set() {
        assert_eq!(
            PublicKey::aggregate_bls(&[]),
            Err(AggregateError::EmptySet)
        );
        assert_eq!(Signature::aggregate(&[]), Err(AggregateError::EmptySet));
    }

    #[test]
    fn test_deterministic_from_seed() {
        let a = KeyPair::from_seed(&[7u8; 32]);
        let b = KeyPair::from_seed(&[7u8; 32]);
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_public_key_round_trip() {
        let kp = KeyPair::generate_bls();
        let pk = PublicKey::from_bytes(kp.public_key().as_bytes()).unwrap();
        assert_eq!(pk, kp.public_key());
    }

    #[test]
    fn test_garbage_public_key_rejected() {
        assert!(PublicKey::from_bytes(&[0xffu8; PUBLIC_KEY_LEN]).is_none());
        assert!(PublicKey::from_bytes(&[1, 2, 3]).is_none());
    }
}
