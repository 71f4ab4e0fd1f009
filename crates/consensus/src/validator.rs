//! The validator consensus state machine.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, instrument, trace, warn};

use helix_messages::{
    decode_frame, encode_message, evidence_bytes, AggregateEvidence, ConsensusMessage,
    MessageBody, MessageKind,
};
use helix_types::{
    Address, Block, Hash, KeyPair, PublicKey, ShardGroupId, Signature, SignerBitfield,
    ValidatorRoster,
};

use crate::config::ValidatorConfig;
use crate::error::ConsensusError;
use crate::traits::{BlockVerifier, ChainReader, CommitHook, FaultModel, ShardTransport};

/// Consensus phase within the current view.
///
/// Advances only forward through the cycle
/// `Finished → AnnounceDone → PrepareDone → CommitDone → CommittedDone → Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No consensus in flight; waiting for the next announce.
    Finished,
    /// Announce received (recorded in the block buffer).
    AnnounceDone,
    /// PREPARE sent in response to a verified announce.
    PrepareDone,
    /// COMMIT sent in response to verified prepare evidence.
    CommitDone,
    /// Commit evidence verified; the view is being finalized.
    CommittedDone,
}

/// A block retained for catch-up, together with the phase at arrival.
#[derive(Debug, Clone)]
struct ReceivedBlock {
    /// Encoded block bytes from the announce payload.
    block: Vec<u8>,
    /// Phase the validator was in when the announce arrived.
    #[allow(dead_code)]
    phase_at_arrival: Phase,
}

/// All mutable consensus state, guarded by one lock.
struct ConsensusInner {
    /// Current leader's public key (replaced on view change).
    leader_pubkey: PublicKey,
    /// Ordered roster of shard validator keys (replaced on epoch change).
    roster: ValidatorRoster,

    /// Current consensus view. Monotonic non-decreasing.
    view: u64,
    /// Phase within the current view.
    phase: Phase,

    /// Hash of the block currently under agreement.
    block_hash: Hash,
    /// Encoded bytes of the block currently under agreement.
    block: Vec<u8>,

    /// Aggregated prepare signature from the leader, once verified.
    aggregated_prepare_sig: Option<Signature>,
    /// Signer set of the prepare signature.
    prepare_signers: Option<SignerBitfield>,
    /// Aggregated commit signature from the leader, once verified.
    aggregated_commit_sig: Option<Signature>,
    /// Signer set of the commit signature.
    commit_signers: Option<SignerBitfield>,

    /// Announced blocks keyed by view, retained for post-commit catch-up.
    blocks_received: BTreeMap<u64, ReceivedBlock>,
}

/// Validator-side consensus handler for one shard.
///
/// One long-lived instance per shard; handlers may be invoked from any
/// transport worker thread. See the crate docs for the protocol walkthrough.
pub struct ValidatorConsensus {
    /// This validator's chain address.
    self_address: Address,
    /// Shard this validator participates in.
    shard: ShardGroupId,
    /// Key for signing PREPARE and COMMIT responses.
    signing_key: KeyPair,

    chain: Arc<dyn ChainReader>,
    block_verifier: Option<Arc<dyn BlockVerifier>>,
    transport: Arc<dyn ShardTransport>,
    commit_hook: Arc<dyn CommitHook>,
    fault_model: Arc<dyn FaultModel>,

    /// Bounded channel for finalized blocks. Sends never block; a full
    /// channel drops the delivery, not the commit.
    verified_blocks: mpsc::Sender<Block>,

    inner: Mutex<ConsensusInner>,
}

impl std::fmt::Debug for ValidatorConsensus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ValidatorConsensus")
            .field("validator", &self.self_address)
            .field("shard", &self.shard)
            .field("view", &inner.view)
            .field("phase", &inner.phase)
            .field("buffered", &inner.blocks_received.len())
            .finish()
    }
}

impl ValidatorConsensus {
    /// Create the consensus handler for one shard.
    pub fn new(
        config: ValidatorConfig,
        chain: Arc<dyn ChainReader>,
        block_verifier: Option<Arc<dyn BlockVerifier>>,
        transport: Arc<dyn ShardTransport>,
        commit_hook: Arc<dyn CommitHook>,
        fault_model: Arc<dyn FaultModel>,
        verified_blocks: mpsc::Sender<Block>,
    ) -> Self {
        ValidatorConsensus {
            self_address: config.self_address,
            shard: config.shard,
            signing_key: config.signing_key,
            chain,
            block_verifier,
            transport,
            commit_hook,
            fault_model,
            verified_blocks,
            inner: Mutex::new(ConsensusInner {
                leader_pubkey: config.leader_pubkey,
                roster: config.roster,
                view: config.start_view,
                phase: Phase::Finished,
                block_hash: Hash::ZERO,
                block: Vec::new(),
                aggregated_prepare_sig: None,
                prepare_signers: None,
                aggregated_commit_sig: None,
                commit_signers: None,
                blocks_received: BTreeMap::new(),
            }),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Dispatch
    // ═══════════════════════════════════════════════════════════════════════════

    /// Process one inbound wire frame.
    ///
    /// Fire-and-forget: malformed frames, stale messages and failed
    /// verifications are logged and dropped. Leader-bound tags (`PREPARE`,
    /// `COMMIT`) arrive here through the broadcast relay and are discarded.
    pub fn process(&self, frame: &[u8]) {
        let message = match decode_frame(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!(validator = %self.self_address, error = %e, "failed to decode consensus frame");
                return;
            }
        };

        let handler = match message.kind() {
            MessageKind::Announce => "announce",
            MessageKind::Prepared => "prepared",
            MessageKind::Committed => "committed",
            MessageKind::Prepare | MessageKind::Commit => {
                // Relayed by pubsub to the whole group; only the leader reads these.
                trace!(validator = %self.self_address, "dropping leader-bound message");
                return;
            }
        };

        let result = match message {
            ConsensusMessage::Announce(body) => self.on_announce(body),
            ConsensusMessage::Prepared(body) => self.on_prepared(body),
            ConsensusMessage::Committed(body) => self.on_committed(body),
            ConsensusMessage::Prepare(_) | ConsensusMessage::Commit(_) => Ok(()),
        };
        if let Err(e) = result {
            self.log_drop(handler, &e);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Message Authenticity
    // ═══════════════════════════════════════════════════════════════════════════

    /// Validate a message against the current expected leader.
    ///
    /// The sender key must be the leader's, the view must be current, and the
    /// envelope signature must verify under the leader key. Stale and future
    /// views are both rejected here; announce buffers future blocks before
    /// this check so they survive for catch-up.
    fn check_consensus_message(
        &self,
        inner: &ConsensusInner,
        kind: MessageKind,
        body: &MessageBody,
    ) -> Result<(), ConsensusError> {
        if body.sender_pubkey != inner.leader_pubkey {
            return Err(ConsensusError::NotLeader);
        }
        if body.view != inner.view {
            return Err(ConsensusError::ViewMismatch {
                got: body.view,
                current: inner.view,
            });
        }
        let signed = helix_messages::signable_bytes(
            kind,
            body.view,
            &body.block_hash,
            &body.sender_pubkey,
            &body.payload,
        );
        if !inner.leader_pubkey.verify(&signed, &body.signature) {
            return Err(ConsensusError::BadLeaderSignature);
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Announce (leader → validator)
    // ═══════════════════════════════════════════════════════════════════════════

    #[instrument(skip(self, body), fields(view = body.view, block_hash = ?body.block_hash))]
    fn on_announce(&self, body: MessageBody) -> Result<(), ConsensusError> {
        info!(validator = %self.self_address, "received announce");

        let mut inner = self.inner.lock();

        // Buffer before any verification, keyed by the view the announce
        // carries. A validator whose view lags can still accept this block
        // and finalize it from the buffer once its own view catches up.
        // Re-announce for the same view overwrites. The entry is retained
        // even when the checks below fail.
        let phase_at_arrival = inner.phase;
        inner.blocks_received.insert(
            body.view,
            ReceivedBlock {
                block: body.payload.clone(),
                phase_at_arrival,
            },
        );
        inner.block_hash = body.block_hash;
        inner.block = body.payload.clone();

        self.check_consensus_message(&inner, MessageKind::Announce, &body)?;

        if self.fault_model.incorrect_response() {
            warn!(validator = %self.self_address, "fault model suppressed announce response");
            return Ok(());
        }

        let block = Block::decode(&body.payload)?;

        // Seals are attached post-finalize, so the header check runs sealless.
        self.chain
            .verify_header(&block.header, false)
            .map_err(ConsensusError::Header)?;
        if let Some(verifier) = &self.block_verifier {
            verifier
                .verify_block(&block)
                .map_err(ConsensusError::BlockVerify)?;
        }

        let prepare = ConsensusMessage::prepare(inner.view, inner.block_hash, &self.signing_key);
        self.broadcast(&prepare);
        inner.phase = Phase::PrepareDone;

        debug!(validator = %self.self_address, view = inner.view, "prepare sent");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Prepared (leader → validator)
    // ═══════════════════════════════════════════════════════════════════════════

    #[instrument(skip(self, body), fields(view = body.view, block_hash = ?body.block_hash))]
    fn on_prepared(&self, body: MessageBody) -> Result<(), ConsensusError> {
        info!(validator = %self.self_address, "received prepared");

        let evidence = AggregateEvidence::parse(&body.payload)?;

        self.fault_model.consensus_ready(body.view);

        let mut inner = self.inner.lock();

        self.check_consensus_message(&inner, MessageKind::Prepared, &body)?;

        if self.fault_model.incorrect_response() {
            warn!(validator = %self.self_address, "fault model suppressed prepared response");
            return Ok(());
        }

        // Bind the bitmap to the roster and verify the aggregate over the
        // announced block hash.
        let mask = inner.roster.mask_from_bytes(evidence.bitmap)?;
        let aggregate_key = mask.aggregate_public_key()?;
        if !aggregate_key.verify(body.block_hash.as_bytes(), &evidence.signature) {
            warn!(
                validator = %self.self_address,
                signers = mask.count(),
                roster = inner.roster.len(),
                "prepare aggregate signature rejected"
            );
            return Err(ConsensusError::BadAggregateSignature { phase: "prepare" });
        }

        let bitfield = mask.into_bitfield();
        inner.aggregated_prepare_sig = Some(evidence.signature);
        inner.prepare_signers = Some(bitfield.clone());

        // The commit signature covers the exact prepare evidence, chaining
        // the phases: replacing the prepare set would invalidate every commit
        // signature the leader later aggregates.
        let prepare_evidence = evidence_bytes(&evidence.signature, bitfield.as_bytes());
        let commit = ConsensusMessage::commit(
            inner.view,
            inner.block_hash,
            &prepare_evidence,
            &self.signing_key,
        );
        self.broadcast(&commit);
        inner.phase = Phase::CommitDone;

        debug!(validator = %self.self_address, view = inner.view, "commit sent");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Committed (leader → validator)
    // ═══════════════════════════════════════════════════════════════════════════

    #[instrument(skip(self, body), fields(view = body.view, block_hash = ?body.block_hash))]
    fn on_committed(&self, body: MessageBody) -> Result<(), ConsensusError> {
        info!(validator = %self.self_address, "received committed");

        let evidence = AggregateEvidence::parse(&body.payload)?;

        self.fault_model.consensus_ready(body.view);

        let mut inner = self.inner.lock();

        self.check_consensus_message(&inner, MessageKind::Committed, &body)?;

        if self.fault_model.incorrect_response() {
            warn!(validator = %self.self_address, "fault model suppressed committed response");
            return Ok(());
        }

        let mask = inner.roster.mask_from_bytes(evidence.bitmap)?;
        let aggregate_key = mask.aggregate_public_key()?;

        // The commit aggregate covers the prepare evidence stored when the
        // PREPARED message verified, not the block hash.
        let (Some(prepare_sig), Some(prepare_signers)) =
            (inner.aggregated_prepare_sig, inner.prepare_signers.clone())
        else {
            return Err(ConsensusError::MissingPrepareEvidence);
        };
        let prepare_evidence = evidence_bytes(&prepare_sig, prepare_signers.as_bytes());
        if !aggregate_key.verify(&prepare_evidence, &evidence.signature) {
            warn!(
                validator = %self.self_address,
                signers = mask.count(),
                "commit aggregate signature rejected"
            );
            return Err(ConsensusError::BadAggregateSignature { phase: "commit" });
        }

        inner.aggregated_commit_sig = Some(evidence.signature);
        inner.commit_signers = Some(mask.into_bitfield());
        inner.phase = Phase::CommittedDone;

        self.drain_committed(&mut inner);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Commit Finalizer & Catch-up Drain
    // ═══════════════════════════════════════════════════════════════════════════

    /// Finalize the committed view and any buffered successors.
    ///
    /// Consumes `blocks_received[view]` in a loop: each drained block gets the
    /// just-verified seal pair attached, is handed to the commit hook and
    /// offered to the verified-block channel, and the view advances by one.
    /// Stops when no block is buffered for the current view or a drained
    /// block fails header verification.
    ///
    /// The same seal pair is carried across every view drained in one pass.
    /// Seals for buffered successor views are not independently known here,
    /// so finality of those blocks rests on the chain consumer re-validating;
    /// callers should not treat drained successors as cryptographically
    /// final.
    fn drain_committed(&self, inner: &mut ConsensusInner) {
        let (Some(prepare_sig), Some(prepare_signers)) =
            (inner.aggregated_prepare_sig, inner.prepare_signers.clone())
        else {
            return;
        };
        let (Some(commit_sig), Some(commit_signers)) =
            (inner.aggregated_commit_sig, inner.commit_signers.clone())
        else {
            return;
        };

        loop {
            let view = inner.view;
            let Some(entry) = inner.blocks_received.remove(&view) else {
                break;
            };

            inner.block_hash = Hash::ZERO;
            inner.view += 1;

            let mut block = match Block::decode(&entry.block) {
                Ok(block) => block,
                Err(e) => {
                    debug!(validator = %self.self_address, view, error = %e, "buffered block failed to decode");
                    break;
                }
            };
            if let Err(e) = self.chain.verify_header(&block.header, false) {
                debug!(validator = %self.self_address, view, error = %e, "buffered block header rejected");
                break;
            }

            block.set_prepare_seal(prepare_sig, prepare_signers.clone());
            block.set_commit_seal(commit_sig, commit_signers.clone());

            info!(
                validator = %self.self_address,
                view,
                height = block.header.height.0,
                transactions = block.transactions.len(),
                "adding block to chain"
            );
            self.commit_hook.on_consensus_done(&block);
            Self::reset_view_state(inner);

            // Delivery is best-effort: a full channel drops the block, never
            // the commit, and the drain continues.
            match self.verified_blocks.try_send(block) {
                Ok(()) => {}
                Err(TrySendError::Full(block)) => {
                    info!(
                        validator = %self.self_address,
                        block_hash = ?block.hash(),
                        "verified-block channel full, dropping delivery"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(validator = %self.self_address, "verified-block channel closed");
                }
            }
        }
    }

    /// Clear per-view transient state after finalization.
    fn reset_view_state(inner: &mut ConsensusInner) {
        inner.phase = Phase::Finished;
        inner.block_hash = Hash::ZERO;
        inner.block.clear();
        inner.aggregated_prepare_sig = None;
        inner.prepare_signers = None;
        inner.aggregated_commit_sig = None;
        inner.commit_signers = None;
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Outbound
    // ═══════════════════════════════════════════════════════════════════════════

    /// Encode and hand a message to the shard transport. Best-effort.
    fn broadcast(&self, message: &ConsensusMessage) {
        match encode_message(message) {
            Ok(body) => {
                self.transport
                    .send_to_shard(self.shard, message.kind(), body);
            }
            Err(e) => {
                warn!(validator = %self.self_address, error = %e, "failed to encode outbound message");
            }
        }
    }

    /// Log a dropped message at the level its failure class warrants.
    fn log_drop(&self, handler: &str, error: &ConsensusError) {
        match error {
            // Expected noise: relayed stale traffic, other shards' leaders.
            ConsensusError::NotLeader
            | ConsensusError::ViewMismatch { .. }
            | ConsensusError::BadLeaderSignature => {
                debug!(validator = %self.self_address, handler, error = %error, "dropping message");
            }
            _ => {
                warn!(validator = %self.self_address, handler, error = %error, "dropping message");
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Roster & Leader Updates
    // ═══════════════════════════════════════════════════════════════════════════

    /// Replace the expected leader key (view change, external protocol).
    pub fn set_leader(&self, leader_pubkey: PublicKey) {
        self.inner.lock().leader_pubkey = leader_pubkey;
    }

    /// Replace the validator roster (epoch change, external protocol).
    pub fn set_roster(&self, roster: ValidatorRoster) {
        self.inner.lock().roster = roster;
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════════

    /// This validator's chain address.
    pub fn self_address(&self) -> Address {
        self.self_address
    }

    /// The shard this validator participates in.
    pub fn shard(&self) -> ShardGroupId {
        self.shard
    }

    /// Current consensus view.
    pub fn view(&self) -> u64 {
        self.inner.lock().view
    }

    /// Current phase within the view.
    pub fn phase(&self) -> Phase {
        self.inner.lock().phase
    }

    /// Views with a buffered announce (for testing/debugging).
    pub fn buffered_views(&self) -> Vec<u64> {
        self.inner.lock().blocks_received.keys().copied().collect()
    }

    /// Stored prepare evidence, once a PREPARED message has verified.
    pub fn prepare_evidence(&self) -> Option<(Signature, SignerBitfield)> {
        let inner = self.inner.lock();
        Some((inner.aggregated_prepare_sig?, inner.prepare_signers.clone()?))
    }

    /// Stored commit evidence, once a COMMITTED message has verified.
    pub fn commit_evidence(&self) -> Option<(Signature, SignerBitfield)> {
        let inner = self.inner.lock();
        Some((inner.aggregated_commit_sig?, inner.commit_signers.clone()?))
    }
}
