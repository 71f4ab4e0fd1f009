//! Capability handles injected into the validator.
//!
//! The validator performs no I/O of its own; everything it needs from the
//! host node arrives through these narrow interfaces at construction time.

use helix_messages::MessageKind;
use helix_types::{Block, BlockHeader, ShardGroupId};

/// Read-side view of the local chain, used to validate announced headers.
pub trait ChainReader: Send + Sync {
    /// Verify a block header against local chain state.
    ///
    /// `seal_check` controls whether the consensus seals are required; it is
    /// `false` during consensus since the seals are attached post-finalize.
    fn verify_header(&self, header: &BlockHeader, seal_check: bool) -> Result<(), String>;
}

/// Optional full-block verification beyond the header check.
pub trait BlockVerifier: Send + Sync {
    fn verify_block(&self, block: &Block) -> Result<(), String>;
}

/// Outbound broadcast to the shard group.
///
/// Best-effort: no delivery acknowledgement is expected at this layer. The
/// host wraps the body in the wire framing before handing it to its
/// transport.
pub trait ShardTransport: Send + Sync {
    fn send_to_shard(&self, shard: ShardGroupId, kind: MessageKind, body: Vec<u8>);
}

/// Synchronous notification that a block is finalized.
///
/// Invoked exactly once per committed view, with both consensus seals
/// attached, before delivery on the verified-block channel.
pub trait CommitHook: Send + Sync {
    fn on_consensus_done(&self, block: &Block);
}

/// Fault-injection capability.
///
/// Production binds [`NoopFaultModel`]; tests bind a programmable model to
/// exercise misbehaving-validator paths.
pub trait FaultModel: Send + Sync {
    /// When `true`, the validator drops the message instead of responding.
    fn incorrect_response(&self) -> bool {
        false
    }

    /// Observation point: consensus reached the given view.
    fn consensus_ready(&self, _view: u64) {}
}

/// The production fault model: injects nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFaultModel;

impl FaultModel for NoopFaultModel {}
