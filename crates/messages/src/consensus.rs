//! Consensus message types.
//!
//! One message shape, five tags. `ANNOUNCE`, `PREPARED` and `COMMITTED` flow
//! leader → validators; `PREPARE` and `COMMIT` flow validator → leader. All
//! five share the envelope `{view, block_hash, sender_pubkey, payload,
//! signature}`, where the signature covers the canonical envelope bytes under
//! the sender's key.
//!
//! Payloads per tag:
//! - `ANNOUNCE`: the encoded block under agreement.
//! - `PREPARE`: the validator's 48-byte signature over the block hash.
//! - `PREPARED` / `COMMITTED`: 48-byte aggregate signature ‖ signer bitmap.
//! - `COMMIT`: the validator's 48-byte signature over the prepare evidence
//!   (`prepare_sig ‖ prepare_bitmap`), chaining the commit phase to the exact
//!   prepare-phase signer set.

use sbor::prelude::BasicSbor;

use helix_types::{Hash, KeyPair, PublicKey, Signature};

use crate::wire::CodecError;

/// Length of the aggregate signature prefix in PREPARED/COMMITTED payloads.
pub const AGGREGATE_SIG_LEN: usize = 48;

/// Message tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BasicSbor)]
pub enum MessageKind {
    Announce,
    Prepare,
    Prepared,
    Commit,
    Committed,
}

impl MessageKind {
    /// Wire tag byte.
    pub fn as_byte(self) -> u8 {
        match self {
            MessageKind::Announce => 1,
            MessageKind::Prepare => 2,
            MessageKind::Prepared => 3,
            MessageKind::Commit => 4,
            MessageKind::Committed => 5,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(MessageKind::Announce),
            2 => Some(MessageKind::Prepare),
            3 => Some(MessageKind::Prepared),
            4 => Some(MessageKind::Commit),
            5 => Some(MessageKind::Committed),
            _ => None,
        }
    }

    /// Whether this tag is addressed to the leader only. Validators receiving
    /// one via broadcast relay drop it.
    pub fn leader_bound(self) -> bool {
        matches!(self, MessageKind::Prepare | MessageKind::Commit)
    }
}

/// Common envelope carried by every consensus message.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct MessageBody {
    /// Consensus view this message belongs to.
    pub view: u64,
    /// Hash of the block under agreement.
    pub block_hash: Hash,
    /// Sender's BLS public key in compressed form.
    pub sender_pubkey: PublicKey,
    /// Tag-specific payload.
    pub payload: Vec<u8>,
    /// Sender's signature over the canonical envelope bytes.
    pub signature: Signature,
}

/// A tagged consensus message.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub enum ConsensusMessage {
    Announce(MessageBody),
    Prepare(MessageBody),
    Prepared(MessageBody),
    Commit(MessageBody),
    Committed(MessageBody),
}

impl ConsensusMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            ConsensusMessage::Announce(_) => MessageKind::Announce,
            ConsensusMessage::Prepare(_) => MessageKind::Prepare,
            ConsensusMessage::Prepared(_) => MessageKind::Prepared,
            ConsensusMessage::Commit(_) => MessageKind::Commit,
            ConsensusMessage::Committed(_) => MessageKind::Committed,
        }
    }

    pub fn body(&self) -> &MessageBody {
        match self {
            ConsensusMessage::Announce(b)
            | ConsensusMessage::Prepare(b)
            | ConsensusMessage::Prepared(b)
            | ConsensusMessage::Commit(b)
            | ConsensusMessage::Committed(b) => b,
        }
    }

    /// Build and envelope-sign a message of the given kind.
    pub fn new_signed(
        kind: MessageKind,
        view: u64,
        block_hash: Hash,
        payload: Vec<u8>,
        key: &KeyPair,
    ) -> Self {
        let sender_pubkey = key.public_key();
        let signature = key.sign(&signable_bytes(
            kind,
            view,
            &block_hash,
            &sender_pubkey,
            &payload,
        ));
        let body = MessageBody {
            view,
            block_hash,
            sender_pubkey,
            payload,
            signature,
        };
        match kind {
            MessageKind::Announce => ConsensusMessage::Announce(body),
            MessageKind::Prepare => ConsensusMessage::Prepare(body),
            MessageKind::Prepared => ConsensusMessage::Prepared(body),
            MessageKind::Commit => ConsensusMessage::Commit(body),
            MessageKind::Committed => ConsensusMessage::Committed(body),
        }
    }

    /// A validator's PREPARE: the payload is its signature over the block hash.
    pub fn prepare(view: u64, block_hash: Hash, key: &KeyPair) -> Self {
        let payload = key.sign(block_hash.as_bytes()).to_bytes().to_vec();
        Self::new_signed(MessageKind::Prepare, view, block_hash, payload, key)
    }

    /// A validator's COMMIT: the payload is its signature over the prepare
    /// evidence (`prepare_sig ‖ prepare_bitmap`).
    pub fn commit(view: u64, block_hash: Hash, evidence: &[u8], key: &KeyPair) -> Self {
        let payload = key.sign(evidence).to_bytes().to_vec();
        Self::new_signed(MessageKind::Commit, view, block_hash, payload, key)
    }

    /// Verify the envelope signature under the claimed sender key.
    pub fn verify_envelope(&self) -> bool {
        let body = self.body();
        body.sender_pubkey.verify(
            &signable_bytes(
                self.kind(),
                body.view,
                &body.block_hash,
                &body.sender_pubkey,
                &body.payload,
            ),
            &body.signature,
        )
    }
}

/// Canonical bytes the envelope signature covers.
pub fn signable_bytes(
    kind: MessageKind,
    view: u64,
    block_hash: &Hash,
    sender_pubkey: &PublicKey,
    payload: &[u8],
) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(1 + 8 + 32 + 96 + payload.len());
    bytes.push(kind.as_byte());
    bytes.extend_from_slice(&view.to_le_bytes());
    bytes.extend_from_slice(block_hash.as_bytes());
    bytes.extend_from_slice(sender_pubkey.as_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

/// Parsed PREPARED/COMMITTED payload: aggregate signature plus signer bitmap.
#[derive(Debug, Clone)]
pub struct AggregateEvidence<'a> {
    pub signature: Signature,
    pub bitmap: &'a [u8],
}

impl<'a> AggregateEvidence<'a> {
    /// Split a payload into its 48-byte aggregate signature and the bitmap.
    pub fn parse(payload: &'a [u8]) -> Result<Self, CodecError> {
        if payload.len() < AGGREGATE_SIG_LEN {
            return Err(CodecError::ShortEvidence {
                got: payload.len(),
                need: AGGREGATE_SIG_LEN,
            });
        }
        let (sig_bytes, bitmap) = payload.split_at(AGGREGATE_SIG_LEN);
        let signature =
            Signature::from_bytes(sig_bytes).expect("split_at yields exactly 48 bytes");
        Ok(AggregateEvidence { signature, bitmap })
    }
}

/// Concatenate a signature and bitmap into the evidence blob the commit phase
/// signs and verifies.
pub fn evidence_bytes(signature: &Signature, bitmap: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(AGGREGATE_SIG_LEN + bitmap.len());
    bytes.extend_from_slice(signature.as_bytes());
    bytes.extend_from_slice(bitmap);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_byte_round_trip() {
        for kind in [
            MessageKind::Announce,
            MessageKind::Prepare,
            MessageKind::Prepared,
            MessageKind::Commit,
            MessageKind::Committed,
        ] {
            assert_eq!(MessageKind::from_byte(kind.as_byte()), Some(kind));
        }
        assert_eq!(MessageKind::from_byte(0), None);
        assert_eq!(MessageKind::from_byte(99), None);
    }

    #[test]
    fn test_leader_bound_tags() {
        assert!(MessageKind::Prepare.leader_bound());
        assert!(MessageKind::Commit.leader_bound());
        assert!(!MessageKind::Announce.leader_bound());
        assert!(!MessageKind::Prepared.leader_bound());
        assert!(!MessageKind::Committed.leader_bound());
    }

    #[test]
    fn test_envelope_signature_verifies() {
        let key = KeyPair::generate_bls();
        let msg = ConsensusMessage::new_signed(
            MessageKind::Announce,
            7,
            Hash::from_bytes(b"block"),
            b"payload".to_vec(),
            &key,
        );
        assert!(msg.verify_envelope());
    }

    #[test]
    fn test_tampered_envelope_rejected() {
        let key = KeyPair::generate_bls();
        let msg =
            ConsensusMessage::prepare(7, Hash::from_bytes(b"block"), &key);
        let ConsensusMessage::Prepare(mut body) = msg else {
            unreachable!()
        };
        body.view = 8;
        assert!(!ConsensusMessage::Prepare(body).verify_envelope());
    }

    #[test]
    fn test_prepare_payload_signs_block_hash() {
        let key = KeyPair::generate_bls();
        let block_hash = Hash::from_bytes(b"block");
        let msg = ConsensusMessage::prepare(7, block_hash, &key);
        let sig = Signature::from_bytes(&msg.body().payload).unwrap();
        assert!(key.public_key().verify(block_hash.as_bytes(), &sig));
    }

    #[test]
    fn test_evidence_parse() {
        let sig = Signature::zero();
        let payload = evidence_bytes(&sig, &[0b101]);
        let evidence = AggregateEvidence::parse(&payload).unwrap();
        assert_eq!(evidence.signature, sig);
        assert_eq!(evidence.bitmap, &[0b101]);
    }

    #[test]
    fn test_evidence_parse_short_payload() {
        let err = AggregateEvidence::parse(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, CodecError::ShortEvidence { got: 10, .. }));
    }
}
