//! Block and header types.
//!
//! Blocks travel the wire in SBOR encoding inside announce payloads. The
//! consensus seals (aggregated prepare and commit signatures with their
//! signer bitfields) are zeroed while the block is under agreement and
//! attached by the validator at finalization, which is why header
//! verification during consensus runs with `seal_check` disabled.

use sbor::prelude::BasicSbor;
use thiserror::Error;

use crate::crypto::Signature;
use crate::hash::Hash;
use crate::identifiers::{BlockHeight, ShardGroupId};
use crate::signer_bitfield::SignerBitfield;

/// Errors encoding or decoding a block.
#[derive(Debug, Error)]
pub enum BlockCodecError {
    #[error("block encode error: {0}")]
    Encode(String),

    #[error("block decode error: {0}")]
    Decode(String),
}

/// Consensus metadata for a block.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct BlockHeader {
    /// Position in the chain.
    pub height: BlockHeight,
    /// Consensus view that agreed on this block.
    pub view: u64,
    /// Shard this block belongs to.
    pub shard: ShardGroupId,
    /// Hash of the parent block.
    pub parent_hash: Hash,
    /// Root over the block's transactions.
    pub tx_root: Hash,
    /// Proposal timestamp (milliseconds since epoch).
    pub timestamp: u64,
}

impl BlockHeader {
    /// Content hash of the header. Identifies the block during consensus.
    pub fn hash(&self) -> Hash {
        let mut bytes = Vec::with_capacity(8 + 8 + 8 + 32 + 32 + 8);
        bytes.extend_from_slice(&self.height.0.to_le_bytes());
        bytes.extend_from_slice(&self.view.to_le_bytes());
        bytes.extend_from_slice(&self.shard.0.to_le_bytes());
        bytes.extend_from_slice(self.parent_hash.as_bytes());
        bytes.extend_from_slice(self.tx_root.as_bytes());
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        Hash::from_bytes(&bytes)
    }
}

/// Root over a list of encoded transactions.
pub fn transaction_root(transactions: &[Vec<u8>]) -> Hash {
    let mut leaves = Vec::with_capacity(transactions.len() * 32);
    for tx in transactions {
        leaves.extend_from_slice(Hash::from_bytes(tx).as_bytes());
    }
    Hash::from_bytes(&leaves)
}

/// A block under (or past) consensus.
///
/// Transactions are opaque at this layer; decoding and applying them is the
/// chain consumer's concern.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Vec<u8>>,

    /// Aggregated signature over the block hash from the prepare phase.
    pub prepare_signature: Signature,
    /// Which roster members contributed to the prepare signature.
    pub prepare_signers: SignerBitfield,
    /// Aggregated signature over the prepare evidence from the commit phase.
    pub commit_signature: Signature,
    /// Which roster members contributed to the commit signature.
    pub commit_signers: SignerBitfield,
}

impl Block {
    /// A new unsealed block.
    pub fn new(header: BlockHeader, transactions: Vec<Vec<u8>>) -> Self {
        Block {
            header,
            transactions,
            prepare_signature: Signature::zero(),
            prepare_signers: SignerBitfield::new(0),
            commit_signature: Signature::zero(),
            commit_signers: SignerBitfield::new(0),
        }
    }

    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Attach the prepare-phase seal.
    pub fn set_prepare_seal(&mut self, signature: Signature, signers: SignerBitfield) {
        self.prepare_signature = signature;
        self.prepare_signers = signers;
    }

    /// Attach the commit-phase seal.
    pub fn set_commit_seal(&mut self, signature: Signature, signers: SignerBitfield) {
        self.commit_signature = signature;
        self.commit_signers = signers;
    }

    /// Whether both consensus seals have been attached.
    pub fn is_sealed(&self) -> bool {
        !self.prepare_signature.is_zero() && !self.commit_signature.is_zero()
    }

    pub fn encode(&self) -> Result<Vec<u8>, BlockCodecError> {
        sbor::basic_encode(self).map_err(|e| BlockCodecError::Encode(format!("{:?}", e)))
    }

    pub fn decode(bytes: &[u8]) -> Result<Block, BlockCodecError> {
        sbor::basic_decode(bytes).map_err(|e| BlockCodecError::Decode(format!("{:?}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_block() -> Block {
        let transactions = vec![b"tx-a".to_vec(), b"tx-b".to_vec()];
        let header = BlockHeader {
            height: BlockHeight(3),
            view: 7,
            shard: ShardGroupId(0),
            parent_hash: Hash::from_bytes(b"parent"),
            tx_root: transaction_root(&transactions),
            timestamp: 1_000,
        };
        Block::new(header, transactions)
    }

    #[test]
    fn test_header_hash_changes_with_content() {
        let block = make_block();
        let mut other = block.clone();
        other.header.view = 8;
        assert_ne!(block.hash(), other.hash());
    }

    #[test]
    fn test_encode_decode() {
        let block = make_block();
        let decoded = Block::decode(&block.encode().unwrap()).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn test_seals_do_not_change_hash() {
        let mut block = make_block();
        let unsealed_hash = block.hash();
        assert!(!block.is_sealed());

        let mut signers = SignerBitfield::new(4);
        signers.set(0);
        signers.set(2);
        block.set_prepare_seal(Signature::zero(), signers.clone());
        block.set_commit_seal(Signature::zero(), signers);

        // The hash covers the header only; seals are attachments.
        assert_eq!(block.hash(), unsealed_hash);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(Block::decode(b"not a block").is_err());
    }
}
