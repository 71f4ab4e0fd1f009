//! Error taxonomy for the validator handlers.

use thiserror::Error;

use helix_types::{AggregateError, BlockCodecError, RosterError};

/// Why a consensus message was dropped.
///
/// Handlers are fire-and-forget: these are logged, never returned to the
/// transport. The variants mirror the drop policies: codec and
/// authenticity failures are expected noise (debug/warn), verification
/// failures are suspicious (warn), delivery failures never roll back a
/// finalized block.
#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error(transparent)]
    Codec(#[from] helix_messages::CodecError),

    #[error("sender is not the current shard leader")]
    NotLeader,

    #[error("message view {got} does not match current view {current}")]
    ViewMismatch { got: u64, current: u64 },

    #[error("leader envelope signature rejected")]
    BadLeaderSignature,

    #[error(transparent)]
    Block(#[from] BlockCodecError),

    #[error("header verification failed: {0}")]
    Header(String),

    #[error("block verification failed: {0}")]
    BlockVerify(String),

    #[error(transparent)]
    Mask(#[from] RosterError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("{phase} aggregate signature does not verify against its mask")]
    BadAggregateSignature { phase: &'static str },

    #[error("committed received with no stored prepare evidence")]
    MissingPrepareEvidence,
}
