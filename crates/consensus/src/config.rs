//! Validator configuration.

use helix_types::{Address, KeyPair, PublicKey, ShardGroupId, ValidatorRoster};

/// Identity bundle for one validator in one shard.
///
/// `roster` is the ordered public-key set whose indices define bitmap
/// positions; it must be identical across the shard. `start_view` is normally
/// zero and nonzero only when resuming against an already-advanced chain.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// This validator's chain address.
    pub self_address: Address,
    /// Shard this validator participates in.
    pub shard: ShardGroupId,
    /// Key used to sign PREPARE and COMMIT responses.
    pub signing_key: KeyPair,
    /// The current shard leader's public key.
    pub leader_pubkey: PublicKey,
    /// Ordered roster of shard validator keys.
    pub roster: ValidatorRoster,
    /// View to start consensus at.
    pub start_view: u64,
}

impl ValidatorConfig {
    /// A config with the address derived from the signing key and consensus
    /// starting at view zero.
    pub fn new(
        shard: ShardGroupId,
        signing_key: KeyPair,
        leader_pubkey: PublicKey,
        roster: ValidatorRoster,
    ) -> Self {
        ValidatorConfig {
            self_address: signing_key.address(),
            shard,
            signing_key,
            leader_pubkey,
            roster,
            start_view: 0,
        }
    }

    pub fn with_start_view(mut self, view: u64) -> Self {
        self.start_view = view;
        self
    }
}
