//! Core types for helix consensus.
//!
//! This crate provides the foundational types used throughout the consensus
//! implementation:
//!
//! - **Primitives**: Hash, BLS keys and signatures, signer bitfields
//! - **Identifiers**: Address, ShardGroupId, BlockHeight
//! - **Consensus types**: Block, BlockHeader, ValidatorRoster, SignerMask
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer.

mod block;
mod crypto;
mod hash;
mod identifiers;
mod roster;
mod signer_bitfield;

pub use block::{transaction_root, Block, BlockCodecError, BlockHeader};
pub use crypto::{AggregateError, KeyPair, PublicKey, Signature};
pub use hash::{Hash, HexError};
pub use identifiers::{Address, BlockHeight, ShardGroupId};
pub use roster::{RosterError, SignerMask, ValidatorRoster};
pub use signer_bitfield::{BitfieldError, SignerBitfield};
