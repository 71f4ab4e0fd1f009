//! Validator-side consensus state machine.
//!
//! This crate implements the non-leader half of the three-phase shard
//! consensus: a validator receives `ANNOUNCE`, `PREPARED` and `COMMITTED`
//! messages broadcast by the shard leader, checks each against the current
//! proposal and the aggregated signature evidence, and appends the finalized
//! block (with both aggregate seals attached) to the local chain.
//!
//! # Protocol
//!
//! 1. **Announce**: the leader broadcasts the encoded block. The validator
//!    buffers it, verifies the header, and answers with a `PREPARE` carrying
//!    its signature over the block hash.
//! 2. **Prepared**: the leader broadcasts the aggregated prepare signature
//!    and the bitmap of contributing signers. The validator verifies the
//!    aggregate against the masked roster key and answers with a `COMMIT`
//!    carrying its signature over the prepare evidence
//!    (`prepare_sig ‖ bitmap`), chaining the two phases: a leader cannot swap
//!    the prepare signer set between phases without invalidating the commit
//!    signatures it collects.
//! 3. **Committed**: the leader broadcasts the aggregated commit signature.
//!    The validator verifies it over the stored prepare evidence, attaches
//!    both seals to the block, delivers it to the chain, and drains any
//!    buffered blocks whose views have become current.
//!
//! # Concurrency
//!
//! Handlers are synchronous and run under a single context lock; messages may
//! arrive on any transport worker thread. Finalized blocks are additionally
//! delivered over a bounded channel with a non-blocking send, so a slow chain
//! consumer never stalls consensus.
//!
//! All I/O goes through injected capability handles: [`ShardTransport`] for
//! outbound broadcast, [`ChainReader`]/[`BlockVerifier`] for block
//! verification, [`CommitHook`] for finalization, and [`FaultModel`] for
//! fault-injection experiments (a no-op in production).

mod config;
mod error;
mod outbound;
mod traits;
mod validator;

pub use config::ValidatorConfig;
pub use error::ConsensusError;
pub use outbound::FramedTransport;
pub use traits::{
    BlockVerifier, ChainReader, CommitHook, FaultModel, NoopFaultModel, ShardTransport,
};
pub use validator::{Phase, ValidatorConsensus};
