//! A single simulated validator node.
//!
//! Each node exclusively owns its consensus core (`Blockchain`) and talks to
//! the rest of the network through its bus handle. Slot ticks drive proposal
//! and attestation; sync ticks gossip the GHOST head and close gaps by
//! requesting branches from peers.

use forkcast_chain::{
    unix_now_millis, unix_now_secs, BlockOutcome, Blockchain, ChainError, ChainSummary,
    ProposalParams,
};
use forkcast_consensus::casper;
use forkcast_crypto::{Keypair, RandaoKeypair};
use forkcast_network::{Envelope, Message, NetworkHandle};
use forkcast_types::{Address, Attestation, Block, GenesisConfig};
use tracing::{debug, info, warn};

/// A validator participating in the simulation.
pub struct ValidatorNode {
    keypair: Keypair,
    randao: RandaoKeypair,
    chain: Blockchain,
    network: NetworkHandle,
    genesis_time: u64,
    /// Highest slot already handled by a tick
    last_seen_slot: u64,
}

impl ValidatorNode {
    /// Create a node from the shared genesis and its own keys.
    pub fn new(
        genesis: GenesisConfig,
        keypair: Keypair,
        randao: RandaoKeypair,
        network: NetworkHandle,
    ) -> Self {
        let genesis_time = genesis.timestamp;
        Self {
            keypair,
            randao,
            chain: Blockchain::new(genesis),
            network,
            genesis_time,
            last_seen_slot: 0,
        }
    }

    /// This node's validator address.
    pub fn address(&self) -> Address {
        self.keypair.address()
    }

    /// The node's consensus core.
    pub fn chain(&self) -> &Blockchain {
        &self.chain
    }

    /// Point-in-time counters for reporting.
    pub fn summary(&self) -> ChainSummary {
        self.chain.summary()
    }

    /// Slot timer callback: resolve the slot's proposer via the RANDAO
    /// schedule and, when this node is it, build and broadcast a block.
    pub fn on_slot_tick(&mut self) {
        let now = unix_now_secs();
        let slot = self.chain.beacon().current_slot(self.genesis_time, now);
        if slot == 0 || slot <= self.last_seen_slot {
            return;
        }

        let proposer = match self.chain.beacon_mut().proposer_for_slot(slot) {
            Ok(proposer) => proposer,
            Err(e) => {
                // Mix not known yet (unsynced); schedule stays deferred.
                debug!(slot, error = %e, "proposer schedule deferred");
                return;
            }
        };
        self.last_seen_slot = slot;

        if proposer != self.address() {
            // Queue a small payment to the slot's proposer; it rides in one
            // of this node's own future blocks and keeps transaction traffic
            // flowing through the mempool.
            self.submit_transfer(proposer, 1);
            return;
        }

        let peers = self.network.peers();
        let block = match self.chain.build_block(ProposalParams {
            proposer: &self.keypair,
            randao: &self.randao,
            slot,
            peers: &peers,
            timestamp_secs: now,
            timestamp_millis: unix_now_millis(),
        }) {
            Ok(block) => block,
            Err(e) => {
                warn!(slot, error = %e, "failed to build block");
                return;
            }
        };

        info!(slot, block = %block.hash().short(), txs = block.tx_count(), "proposing block");
        self.network.broadcast(Message::ProposerBlockBroadcast {
            block: block.clone(),
            slot,
        });
        self.process_new_block(None, block);
    }

    /// Queue a signed transfer in the local mempool. Skipped (returns false)
    /// when the spendable balance does not cover it; the nonce accounts for
    /// transfers already waiting in the pool.
    pub fn submit_transfer(&mut self, to: Address, value: u64) -> bool {
        let sender = self.address();
        let (pending_count, pending_outflow) = self.chain.mempool().pending_from(&sender);
        let balance = self.chain.world().balance(&sender);
        if balance < pending_outflow + value {
            return false;
        }

        let nonce = self.chain.world().nonce(&sender) + pending_count;
        let tx = forkcast_types::Transaction::new(sender, to, value, nonce, unix_now_millis());
        let signed = self.keypair.sign_transaction(tx);
        self.chain.mempool_mut().submit(signed)
    }

    /// Sync timer callback: gossip the current GHOST head.
    pub fn on_sync_tick(&mut self) {
        self.network.broadcast(Message::LmdGhostBroadcast {
            ghost_head_hash: self.chain.ghost_head_hash(),
        });
    }

    /// Inbound message dispatch.
    pub fn on_message(&mut self, envelope: Envelope) {
        match envelope.message {
            Message::ProposerBlockBroadcast { block, slot: _ } => {
                self.process_new_block(Some(envelope.from), block);
            }
            Message::Attestation { attestation } => {
                if let Err(e) = self.chain.on_attestation_received(attestation) {
                    warn!(error = %e, "attestation processing failed");
                }
            }
            Message::LmdGhostBroadcast { ghost_head_hash } => {
                if !self.chain.tree().contains(&ghost_head_hash) {
                    debug!(
                        head = %ghost_head_hash.short(),
                        peer = %envelope.from.short(),
                        "unknown head announced, requesting chain"
                    );
                    let _ = self.network.send(
                        envelope.from,
                        Message::ChainRequest {
                            requested_head_hash: ghost_head_hash,
                        },
                    );
                }
            }
            Message::ChainRequest {
                requested_head_hash,
            } => {
                // Empty when the head is unknown locally (we may have since
                // advanced past it); the requester retries on the next gossip.
                let blocks = self.chain.tree().chain_from(&requested_head_hash);
                let _ = self.network.send(
                    envelope.from,
                    Message::ChainResponse {
                        requested_head_hash,
                        blocks,
                    },
                );
            }
            Message::ChainResponse {
                requested_head_hash: _,
                blocks,
            } => {
                if let Err(e) = self.chain.add_chain(&blocks) {
                    warn!(error = %e, "rejected synced chain");
                }
            }
        }
    }

    /// Insert a received (or self-proposed) block and, when accepted, emit
    /// this node's attestation for the current slot.
    fn process_new_block(&mut self, from: Option<Address>, block: Block) {
        let hash = block.hash();
        match self.chain.add_block(block) {
            Ok(BlockOutcome::Duplicate) => {}
            Ok(_) => self.emit_attestation(),
            Err(ChainError::UnknownParent(_)) => {
                if let Some(peer) = from {
                    debug!(block = %hash.short(), "parent missing, requesting branch");
                    let _ = self.network.send(
                        peer,
                        Message::ChainRequest {
                            requested_head_hash: hash,
                        },
                    );
                }
            }
            Err(e) => {
                warn!(block = %hash.short(), error = %e, "rejected block");
            }
        }
    }

    /// Attest to the head block of the current slot (or the canonical tip),
    /// carrying FFG source and target checkpoints.
    fn emit_attestation(&mut self) {
        let slot = self
            .chain
            .beacon()
            .current_slot(self.genesis_time, unix_now_secs());
        let canonical = self.chain.canonical_chain();
        let Some(tip) = canonical.last() else {
            return;
        };
        let target_block = canonical
            .iter()
            .rev()
            .find(|b| b.slot() == slot)
            .unwrap_or(tip);

        let (source, target) = casper::compute_checkpoints(self.chain.beacon(), &canonical, slot);
        let attestation = Attestation::new(self.address(), target_block.hash(), unix_now_millis())
            .with_checkpoints(source, target);

        debug!(block = %attestation.block_hash.short(), slot, "attesting");
        self.network.broadcast(Message::Attestation {
            attestation: attestation.clone(),
        });
        if let Err(e) = self.chain.on_attestation_received(attestation) {
            warn!(error = %e, "own attestation rejected");
        }
    }
}
