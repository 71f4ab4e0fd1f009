//! Network messages for the consensus protocol.
//!
//! Defines the tagged consensus message exchanged between the shard leader
//! and its validators, and the length-prefixed wire framing used to carry it
//! over the host transport.

pub mod consensus;
pub mod wire;

// Re-export commonly used types
pub use consensus::{
    evidence_bytes, signable_bytes, AggregateEvidence, ConsensusMessage, MessageBody, MessageKind,
    AGGREGATE_SIG_LEN,
};
pub use wire::{
    decode_frame, decode_message, encode_frame, encode_framed, encode_message, CodecError,
    WIRE_VERSION,
};
