//! Top-level chain coordinator.
//!
//! `Blockchain` owns the block tree, the beacon state, and the world state,
//! and is the only writer of the latter. Incoming blocks and attestations
//! funnel through it; whenever fork choice moves the head, the coordinator
//! reconciles the execution layer: new blocks are applied forward on the
//! same branch, and a head that switched branches clears and rebuilds the
//! world state.

use crate::block_builder;
use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::world_state::WorldState;
use forkcast_consensus::{casper, lmd_ghost, BeaconState, BlockTree, NodeId};
use forkcast_types::{
    Attestation, Block, ChainConfig, Checkpoint, GenesisConfig, Hash,
};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Accepted validation window around a block's timestamp.
const TIMESTAMP_WINDOW_SECS: u64 = 5 * 60 * 60;

/// What happened to a block handed to [`Blockchain::add_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// The block extended the canonical chain and was applied
    Extended,
    /// The block was inserted into the tree; validation is deferred until
    /// fork choice promotes its branch
    Inserted,
    /// The block was already known
    Duplicate,
}

/// Point-in-time counters for observability.
#[derive(Debug, Clone)]
pub struct ChainSummary {
    pub head: Hash,
    pub height: u64,
    pub justified: Checkpoint,
    pub finalized: Checkpoint,
    pub total_blocks: usize,
    pub forks: usize,
    pub invalid_blocks: usize,
    pub accounts: usize,
}

/// The chain coordinator. See the module docs for the ingestion flow.
pub struct Blockchain {
    config: ChainConfig,
    genesis: GenesisConfig,
    genesis_hash: Hash,
    tree: BlockTree,
    beacon: BeaconState,
    world: WorldState,
    mempool: Mempool,
    /// Tip currently reflected by the world state
    applied_head: Hash,
}

impl Blockchain {
    /// Create a chain from its genesis configuration. The genesis block is
    /// inserted, applied by fiat, and becomes the initial justified and
    /// finalized checkpoint.
    pub fn new(genesis: GenesisConfig) -> Self {
        let config = genesis.chain_config.clone();
        let genesis_block = genesis.genesis_block();
        let genesis_hash = genesis_block.hash();

        let mut tree = BlockTree::new();
        tree.add_block(genesis_block)
            .expect("fresh tree accepts genesis");
        tree.set_ghost_head(&genesis_hash)
            .expect("genesis was inserted");

        let mut beacon = BeaconState::new(config.clone(), genesis.validator_set());
        let genesis_checkpoint = Checkpoint::new(0, genesis_hash);
        beacon.justified_checkpoint = genesis_checkpoint;
        beacon.previous_justified_checkpoint = genesis_checkpoint;
        beacon.finalized_checkpoint = genesis_checkpoint;

        let world = WorldState::from_genesis(&genesis.alloc);

        Self {
            config,
            genesis,
            genesis_hash,
            tree,
            beacon,
            world,
            mempool: Mempool::new(),
            applied_head: genesis_hash,
        }
    }

    /// Chain parameters.
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Genesis configuration.
    pub fn genesis(&self) -> &GenesisConfig {
        &self.genesis
    }

    /// Hash of the genesis block.
    pub fn genesis_hash(&self) -> Hash {
        self.genesis_hash
    }

    /// The block tree.
    pub fn tree(&self) -> &BlockTree {
        &self.tree
    }

    /// The beacon state.
    pub fn beacon(&self) -> &BeaconState {
        &self.beacon
    }

    /// Mutable beacon state (proposer schedule cache, pool submissions).
    pub fn beacon_mut(&mut self) -> &mut BeaconState {
        &mut self.beacon
    }

    /// The execution-layer world state.
    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// The pending-transaction pool.
    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    /// Mutable mempool for transaction submission.
    pub fn mempool_mut(&mut self) -> &mut Mempool {
        &mut self.mempool
    }

    /// Current GHOST head hash.
    pub fn ghost_head_hash(&self) -> Hash {
        self.tree.ghost_head_hash().unwrap_or(self.genesis_hash)
    }

    /// Tip currently reflected by the world state.
    pub fn applied_head(&self) -> Hash {
        self.applied_head
    }

    /// The canonical chain, genesis-first.
    pub fn canonical_chain(&self) -> Vec<Block> {
        self.tree.canonical_chain()
    }

    /// Build a block on the canonical tip. See [`block_builder`].
    pub fn build_block(
        &self,
        params: block_builder::ProposalParams<'_>,
    ) -> Result<Block, ChainError> {
        block_builder::build_block(self, params)
    }

    /// Ingest a block.
    ///
    /// The block is inserted into the tree, pending attestation weight is
    /// applied, and the head is recomputed. If the block became the new
    /// canonical tip it is validated and applied immediately; an invalid
    /// block is marked in the tree and reported as an error. Otherwise the
    /// block sits in the tree until attestations promote its branch.
    pub fn add_block(&mut self, block: Block) -> Result<BlockOutcome, ChainError> {
        let block = if block.verify_hash() {
            block
        } else {
            // Peers may ship blocks with an unset digest; seal locally.
            Block::new(
                block.header,
                block.transactions,
                block.attestations,
                block.randao_reveal,
            )
        };
        let hash = block.hash();

        use forkcast_consensus::ConsensusError;
        match self.tree.add_block(block) {
            Ok(_) => {}
            Err(ConsensusError::DuplicateBlock(_)) => {
                debug!(block = %hash.short(), "duplicate block ignored");
                return Ok(BlockOutcome::Duplicate);
            }
            Err(ConsensusError::UnknownParent(parent)) => {
                debug!(block = %hash.short(), parent = %parent.short(), "block parent unknown");
                return Err(ChainError::UnknownParent(parent));
            }
            Err(e) => return Err(e.into()),
        }

        // Attestations observed before this block arrived now get weight.
        lmd_ghost::on_new_block(&mut self.tree, &self.beacon, &hash);
        lmd_ghost::recompute_head(&mut self.tree);

        let reconciled = self.reconcile();

        let marked_invalid = self
            .tree
            .get(&hash)
            .map(|id| self.tree.node(id).invalid)
            .unwrap_or(false);
        if marked_invalid {
            return Err(ChainError::invalid(hash, "validate-and-apply failed"));
        }
        reconciled?;

        Ok(if self.applied_head == hash {
            BlockOutcome::Extended
        } else {
            BlockOutcome::Inserted
        })
    }

    /// Ingest an attestation.
    ///
    /// The attestation joins the beacon pool (for later inclusion) and, when
    /// strictly newer than the validator's current latest message, replaces
    /// it: weights shift, the head is recomputed, and the execution layer is
    /// reconciled. Returns `false` for stale or unknown-validator messages.
    pub fn on_attestation_received(&mut self, attestation: Attestation) -> Result<bool, ChainError> {
        self.beacon.add_attestation_to_pool(attestation.clone());

        let Some(change) = self.beacon.observe_attestation(attestation) else {
            return Ok(false);
        };
        lmd_ghost::on_attestation_set_changed(&mut self.tree, &self.beacon, &[change]);

        self.reconcile()?;
        Ok(true)
    }

    /// Ingest a chain received from a peer (genesis-first).
    ///
    /// The chain is structurally validated as a whole (hash integrity,
    /// linkage, contiguous heights, monotonic slots, genesis previous-hash)
    /// and rejected outright on any violation. Blocks are then added one by
    /// one; individually invalid blocks are marked in the tree and do not
    /// stop the rest. Returns the number of newly inserted blocks.
    pub fn add_chain(&mut self, blocks: &[Block]) -> Result<usize, ChainError> {
        if blocks.is_empty() {
            return Ok(0);
        }

        let first = &blocks[0];
        if first.height() != 0 {
            return Err(ChainError::InvalidChain(
                "chain does not start at height 0".to_string(),
            ));
        }
        if first.header.previous_header_hash != self.config.genesis_prev_hash {
            return Err(ChainError::InvalidChain(
                "genesis previous-hash mismatch".to_string(),
            ));
        }
        for block in blocks {
            if !block.verify_hash() {
                return Err(ChainError::InvalidChain(format!(
                    "block {} fails hash verification",
                    block.hash().short()
                )));
            }
        }
        for pair in blocks.windows(2) {
            if pair[1].header.previous_header_hash != pair[0].hash() {
                return Err(ChainError::InvalidChain("broken parent linkage".to_string()));
            }
            if pair[1].height() != pair[0].height() + 1 {
                return Err(ChainError::InvalidChain("non-contiguous heights".to_string()));
            }
            if pair[1].slot() <= pair[0].slot() {
                return Err(ChainError::InvalidChain("non-monotonic slots".to_string()));
            }
        }

        let mut added = 0;
        for block in blocks {
            match self.add_block(block.clone()) {
                Ok(BlockOutcome::Duplicate) => {}
                Ok(_) => added += 1,
                // Marked in the tree; fork choice routes around it.
                Err(ChainError::InvalidBlock { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        info!(added, total = blocks.len(), "synced chain from peer");
        Ok(added)
    }

    /// Point-in-time counters.
    pub fn summary(&self) -> ChainSummary {
        let stats = self.tree.stats();
        let height = self
            .tree
            .get(&self.ghost_head_hash())
            .and_then(|id| self.tree.node(id).height())
            .unwrap_or(0);
        ChainSummary {
            head: self.ghost_head_hash(),
            height,
            justified: self.beacon.justified_checkpoint,
            finalized: self.beacon.finalized_checkpoint,
            total_blocks: stats.total_blocks,
            forks: stats.forks,
            invalid_blocks: stats.invalid,
            accounts: self.world.account_count(),
        }
    }

    // ---- head reconciliation ----

    /// Drive the execution layer to the current GHOST head.
    ///
    /// Convergence: the head equals the applied tip, or sits on its ancestor
    /// path (fork choice halted at a tie below blocks that are already
    /// applied; nothing to do until the tie breaks). A head that descends
    /// from the applied tip is applied forward block by block; a head on
    /// another branch triggers a full rebuild. Validation failures mark the
    /// offending node invalid and re-enter with the re-picked head, up to
    /// `reorg_retry_limit` failures.
    fn reconcile(&mut self) -> Result<(), ChainError> {
        let limit = self.config.reorg_retry_limit.max(1);
        let mut failures = 0u32;

        loop {
            let Some(head_hash) = self.tree.ghost_head_hash() else {
                return Ok(());
            };
            if head_hash == self.applied_head {
                return Ok(());
            }

            let head_id = self.tree.get(&head_hash).expect("head is in the tree");
            let applied_id = self
                .tree
                .get(&self.applied_head)
                .expect("applied head is in the tree");

            let done = if self.tree.is_ancestor(head_id, applied_id) {
                // Head retreated to an ancestor (tie); applied state stays.
                return Ok(());
            } else if self.tree.is_ancestor(applied_id, head_id) {
                self.apply_forward(applied_id, head_id)
            } else {
                info!(
                    old = %self.applied_head.short(),
                    new = %head_hash.short(),
                    "reorg: head switched branches, rebuilding state"
                );
                self.rebuild()
            };

            if !done {
                failures += 1;
                if failures >= limit {
                    warn!(failures, "giving up head reconciliation, state left partial");
                    return Err(ChainError::ReorgRetriesExhausted(failures));
                }
            }
        }
    }

    /// Validate and apply every block between the applied tip (exclusive)
    /// and `to` (inclusive). Returns false when a block failed and was
    /// marked invalid.
    fn apply_forward(&mut self, from: NodeId, to: NodeId) -> bool {
        let path = self
            .tree
            .path_between(from, to)
            .expect("`to` descends from `from`");

        for id in path {
            let block = self
                .tree
                .node(id)
                .block
                .clone()
                .expect("non-root nodes carry a block");
            if let Err(e) = self.validate_and_apply(&block) {
                warn!(block = %block.hash().short(), error = %e, "block failed validation");
                lmd_ghost::mark_invalid(&mut self.tree, id);
                lmd_ghost::recompute_head(&mut self.tree);
                return false;
            }
        }
        true
    }

    /// Full state rebuild: clear the world state, the processed-attestation
    /// set, and the RANDAO state, then replay the canonical chain from
    /// genesis. Returns false when a block failed and was marked invalid.
    fn rebuild(&mut self) -> bool {
        self.world.clear();
        self.world.init_genesis(&self.genesis.alloc);
        self.beacon.clear_processed_attestations();
        self.beacon.clear_randao_state();
        self.applied_head = self.genesis_hash;

        let chain = self.tree.canonical_chain();
        let Some((first, rest)) = chain.split_first() else {
            return true;
        };
        if first.hash() != self.genesis_hash {
            warn!(block = %first.hash().short(), "canonical chain does not start at genesis");
            let id = self.tree.get(&first.hash()).expect("canonical block is in the tree");
            lmd_ghost::mark_invalid(&mut self.tree, id);
            lmd_ghost::recompute_head(&mut self.tree);
            return false;
        }

        for block in rest {
            if let Err(e) = self.validate_and_apply(block) {
                warn!(block = %block.hash().short(), error = %e, "block failed validation during rebuild");
                let id = self.tree.get(&block.hash()).expect("canonical block is in the tree");
                lmd_ghost::mark_invalid(&mut self.tree, id);
                lmd_ghost::recompute_head(&mut self.tree);
                return false;
            }
        }
        debug!(blocks = chain.len(), "state rebuild complete");
        true
    }

    /// Validate a block against the applied tip and, on success, commit its
    /// transactions, receipts, RANDAO reveal, and included attestations.
    fn validate_and_apply(&mut self, block: &Block) -> Result<(), ChainError> {
        let hash = block.hash();
        let prev_id = self
            .tree
            .get(&self.applied_head)
            .expect("applied head is in the tree");
        let prev = self.tree.node(prev_id);
        let (prev_height, prev_slot) = (
            prev.height().unwrap_or(0),
            prev.slot().unwrap_or(0),
        );

        // Structural integrity.
        if block.header.previous_header_hash != self.applied_head {
            return Err(ChainError::invalid(hash, "does not link to the applied tip"));
        }
        if !block.verify_hash() {
            return Err(ChainError::invalid(hash, "header digest mismatch"));
        }
        if block.height() != prev_height + 1 {
            return Err(ChainError::invalid(
                hash,
                format!("height {} not contiguous after {}", block.height(), prev_height),
            ));
        }
        if block.slot() <= prev_slot {
            return Err(ChainError::invalid(
                hash,
                format!("slot {} not after {}", block.slot(), prev_slot),
            ));
        }
        let now = unix_now_secs();
        if block.header.timestamp.abs_diff(now) > TIMESTAMP_WINDOW_SECS {
            return Err(ChainError::invalid(hash, "timestamp outside accepted window"));
        }
        if !block.verify_transactions_root() {
            return Err(ChainError::invalid(hash, "transactions root mismatch"));
        }

        // Execution payload; commits only if every transaction validates.
        let txids = self.world.apply_block(block, &self.config)?;
        self.mempool.remove(&txids);

        // RANDAO: fold this block's reveal into the next epoch's mix.
        let epoch = self.config.epoch_of(block.slot());
        self.beacon.apply_randao_reveal(epoch, &block.randao_reveal);

        // Included attestations: latest-message bookkeeping, then FFG.
        let mut changes = Vec::new();
        for attestation in &block.attestations {
            if let Some(change) = self.beacon.observe_attestation(attestation.clone()) {
                changes.push(change);
            }
            self.beacon
                .mark_attestation_processed(attestation.block_hash, attestation.validator);
            self.beacon
                .remove_from_pool(&attestation.block_hash, &attestation.validator);
        }
        casper::apply_attestations(&mut self.beacon, &block.attestations);
        lmd_ghost::on_attestation_set_changed(&mut self.tree, &self.beacon, &changes);

        self.applied_head = hash;
        debug!(block = %hash.short(), height = block.height(), "block applied");
        Ok(())
    }
}

/// Current unix time in seconds.
pub fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Current unix time in milliseconds.
pub fn unix_now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use forkcast_types::{Address, BlockHeader, BlsSignature, SignedTransaction, Transaction};

    fn validator(i: u8) -> Address {
        Address::from_bytes([i; 20])
    }

    fn test_genesis() -> GenesisConfig {
        let mut genesis = GenesisConfig::new(ChainConfig::default(), unix_now_secs());
        for i in 1..=3u8 {
            genesis.add_validator(
                validator(i),
                32,
                Default::default(),
                Default::default(),
            );
        }
        genesis
    }

    fn new_chain() -> (Blockchain, Block) {
        let genesis = test_genesis();
        let genesis_block = genesis.genesis_block();
        (Blockchain::new(genesis), genesis_block)
    }

    /// A structurally valid coinbase-only block; `salt` varies the hash for
    /// sibling blocks at the same slot.
    fn make_child(config: &ChainConfig, parent: &Block, slot: u64, salt: u8) -> Block {
        let coinbase = SignedTransaction::coinbase(Transaction::coinbase(
            config.protocol_node_id,
            validator(salt),
            config.block_reward,
            unix_now_millis() + salt as u64,
        ));
        let transactions = vec![coinbase];
        let header = BlockHeader::new(
            parent.height() + 1,
            slot,
            parent.hash(),
            Block::transactions_root(&transactions),
            unix_now_secs(),
        );
        Block::new(header, transactions, vec![], BlsSignature::default())
    }

    fn attest(chain: &mut Blockchain, v: u8, block: Hash, ts: u64) {
        chain
            .on_attestation_received(Attestation::new(validator(v), block, ts))
            .unwrap();
    }

    /// Invariant 1: a node's attested weight equals the stakes of the
    /// validators whose latest attestation lands in its valid subtree.
    fn check_weight_invariant(chain: &Blockchain) {
        let tree = chain.tree();
        let cap = chain.config().max_effective_balance;
        let attestations = chain.beacon().latest_attestations();

        for leaf in tree.leaves() {
            let mut current = Some(leaf);
            while let Some(id) = current {
                let node = tree.node(id);
                if node.is_null_root() {
                    break;
                }
                if !node.invalid {
                    let expected: u64 = attestations
                        .values()
                        .filter_map(|att| {
                            let att_id = tree.get(&att.block_hash)?;
                            // Attestations under an invalid node are excluded.
                            let mut walk = Some(att_id);
                            let mut inside = false;
                            let mut blocked = false;
                            while let Some(w) = walk {
                                if tree.node(w).invalid {
                                    blocked = true;
                                    break;
                                }
                                if w == id {
                                    inside = true;
                                    break;
                                }
                                walk = tree.parent_of(w);
                            }
                            if inside && !blocked {
                                Some(
                                    chain
                                        .beacon()
                                        .validators()
                                        .effective_stake_of(&att.validator, cap),
                                )
                            } else {
                                None
                            }
                        })
                        .sum();
                    assert_eq!(
                        node.attested_eth, expected,
                        "weight invariant violated at {:?}",
                        node.hash
                    );
                }
                current = node.parent;
            }
        }
    }

    #[test]
    fn test_new_chain_applies_genesis() {
        let (chain, genesis_block) = new_chain();

        assert_eq!(chain.ghost_head_hash(), genesis_block.hash());
        assert_eq!(chain.applied_head(), genesis_block.hash());
        assert_eq!(chain.canonical_chain().len(), 1);
        assert_eq!(chain.beacon().justified_checkpoint.root, genesis_block.hash());
        assert_eq!(chain.beacon().finalized_checkpoint.epoch, 0);
    }

    #[test]
    fn test_extending_block_is_applied() {
        let (mut chain, genesis_block) = new_chain();
        let block = make_child(chain.config(), &genesis_block, 1, 1);
        let proposer = block.transactions[0].tx.to;

        assert_eq!(chain.add_block(block.clone()).unwrap(), BlockOutcome::Extended);
        assert_eq!(chain.applied_head(), block.hash());
        assert_eq!(chain.world().balance(&proposer), chain.config().block_reward);
    }

    #[test]
    fn test_duplicate_block_is_noop() {
        let (mut chain, genesis_block) = new_chain();
        let block = make_child(chain.config(), &genesis_block, 1, 1);

        chain.add_block(block.clone()).unwrap();
        let world_before = chain.world().clone();

        assert_eq!(chain.add_block(block).unwrap(), BlockOutcome::Duplicate);
        assert_eq!(chain.world(), &world_before);
        assert_eq!(chain.tree().stats().total_blocks, 2);
    }

    #[test]
    fn test_unknown_parent_reported() {
        let (mut chain, genesis_block) = new_chain();
        let a = make_child(chain.config(), &genesis_block, 1, 1);
        let orphan = make_child(chain.config(), &a, 2, 2);

        assert!(matches!(
            chain.add_block(orphan),
            Err(ChainError::UnknownParent(_))
        ));
    }

    #[test]
    fn test_scenario_a_attestations_tip_the_fork() {
        let (mut chain, g) = new_chain();
        let a = make_child(chain.config(), &g, 1, 1);
        let b = make_child(chain.config(), &g, 1, 2);
        chain.add_block(a.clone()).unwrap();
        chain.add_block(b.clone()).unwrap();

        let t = unix_now_millis();
        attest(&mut chain, 1, b.hash(), t);
        attest(&mut chain, 2, b.hash(), t + 1);
        attest(&mut chain, 3, a.hash(), t + 2);

        assert_eq!(chain.ghost_head_hash(), b.hash());
        let canonical = chain.canonical_chain();
        assert_eq!(canonical.len(), 2);
        assert_eq!(canonical[0].hash(), g.hash());
        assert_eq!(canonical[1].hash(), b.hash());
        assert_eq!(chain.applied_head(), b.hash());
        check_weight_invariant(&chain);
    }

    #[test]
    fn test_scenario_b_forward_progress() {
        let (mut chain, g) = new_chain();
        let a = make_child(chain.config(), &g, 1, 1);
        let b = make_child(chain.config(), &g, 1, 2);
        chain.add_block(a.clone()).unwrap();
        chain.add_block(b.clone()).unwrap();

        let t = unix_now_millis();
        attest(&mut chain, 1, b.hash(), t);
        attest(&mut chain, 2, b.hash(), t + 1);
        attest(&mut chain, 3, a.hash(), t + 2);

        let c = make_child(chain.config(), &b, 2, 3);
        chain.add_block(c.clone()).unwrap();
        attest(&mut chain, 3, c.hash(), t + 3);

        assert_eq!(chain.ghost_head_hash(), c.hash());
        assert_eq!(chain.applied_head(), c.hash());

        // World state equals a from-scratch application of [g, b, c].
        let mut expected = WorldState::from_genesis(&chain.genesis().alloc);
        expected.apply_block(&b, chain.config()).unwrap();
        expected.apply_block(&c, chain.config()).unwrap();
        assert_eq!(chain.world(), &expected);
        check_weight_invariant(&chain);
    }

    #[test]
    fn test_scenario_c_reorg_rebuilds_state() {
        let (mut chain, g) = new_chain();
        let a = make_child(chain.config(), &g, 1, 1);
        let b = make_child(chain.config(), &g, 1, 2);
        chain.add_block(a.clone()).unwrap();
        chain.add_block(b.clone()).unwrap();

        let t = unix_now_millis();
        attest(&mut chain, 1, b.hash(), t);
        attest(&mut chain, 2, b.hash(), t + 1);
        attest(&mut chain, 3, a.hash(), t + 2);

        let c = make_child(chain.config(), &b, 2, 3);
        chain.add_block(c.clone()).unwrap();
        attest(&mut chain, 3, c.hash(), t + 3);

        // Build out the a-branch and move a supermajority onto it.
        let a2 = make_child(chain.config(), &a, 2, 4);
        let a3 = make_child(chain.config(), &a2, 3, 5);
        chain.add_block(a2.clone()).unwrap();
        chain.add_block(a3.clone()).unwrap();
        attest(&mut chain, 1, a3.hash(), t + 4);
        attest(&mut chain, 2, a3.hash(), t + 5);

        assert_eq!(chain.ghost_head_hash(), a3.hash());
        assert_eq!(chain.applied_head(), a3.hash());

        // World state equals rebuild([g, a, a2, a3]).
        let mut expected = WorldState::from_genesis(&chain.genesis().alloc);
        expected.apply_block(&a, chain.config()).unwrap();
        expected.apply_block(&a2, chain.config()).unwrap();
        expected.apply_block(&a3, chain.config()).unwrap();
        assert_eq!(chain.world(), &expected);

        // Receipts for the abandoned branch are gone.
        assert!(!chain.world().has_receipts_for(&b.hash()));
        assert!(!chain.world().has_receipts_for(&c.hash()));
        assert!(chain.world().has_receipts_for(&a3.hash()));
        check_weight_invariant(&chain);
    }

    #[test]
    fn test_scenario_d_tie_halts_at_parent() {
        let (mut chain, g) = new_chain();
        let a = make_child(chain.config(), &g, 1, 1);
        let b = make_child(chain.config(), &g, 1, 2);
        chain.add_block(a.clone()).unwrap();
        chain.add_block(b.clone()).unwrap();

        let t = unix_now_millis();
        attest(&mut chain, 1, a.hash(), t);
        attest(&mut chain, 2, b.hash(), t + 1);

        assert_eq!(chain.ghost_head_hash(), g.hash());
        assert_eq!(chain.canonical_chain().len(), 1);
        check_weight_invariant(&chain);
    }

    #[test]
    fn test_scenario_e_justification_and_finalization() {
        let (mut chain, g) = new_chain();

        // One block per checkpoint slot: slot 4 opens epoch 1.
        let b4 = make_child(chain.config(), &g, 4, 1);
        chain.add_block(b4.clone()).unwrap();

        let e0 = Checkpoint::new(0, g.hash());
        let e1 = Checkpoint::new(1, b4.hash());
        let t = unix_now_millis();
        let attestations: Vec<Attestation> = (1..=3u8)
            .map(|v| {
                Attestation::new(validator(v), b4.hash(), t + v as u64)
                    .with_checkpoints(e0, e1)
            })
            .collect();

        // The attestations ride inside the next block of epoch 1.
        let coinbase = SignedTransaction::coinbase(Transaction::coinbase(
            chain.config().protocol_node_id,
            validator(9),
            chain.config().block_reward,
            t + 10,
        ));
        let transactions = vec![coinbase];
        let header = BlockHeader::new(
            2,
            5,
            b4.hash(),
            Block::transactions_root(&transactions),
            unix_now_secs(),
        );
        let b5 = Block::new(header, transactions, attestations, BlsSignature::default());
        chain.add_block(b5).unwrap();

        assert_eq!(chain.beacon().justified_checkpoint, e1);
        assert_eq!(chain.beacon().previous_justified_checkpoint, e0);
        assert_eq!(chain.beacon().finalized_checkpoint, e0);
    }

    #[test]
    fn test_scenario_f_invalid_block_routed_around() {
        let (mut chain, g) = new_chain();
        let a = make_child(chain.config(), &g, 1, 1);
        chain.add_block(a.clone()).unwrap();

        // b carries a transfer from an account with no funds.
        let keypair = forkcast_crypto::Keypair::from_seed(&[42u8; 32]);
        let coinbase = SignedTransaction::coinbase(Transaction::coinbase(
            chain.config().protocol_node_id,
            validator(2),
            chain.config().block_reward,
            unix_now_millis(),
        ));
        let broke = keypair.sign_transaction(Transaction::new(
            keypair.address(),
            validator(9),
            1_000,
            0,
            unix_now_millis() + 1,
        ));
        let transactions = vec![coinbase, broke];
        let header = BlockHeader::new(
            1,
            1,
            g.hash(),
            Block::transactions_root(&transactions),
            unix_now_secs(),
        );
        let b = Block::new(header, transactions, vec![], BlsSignature::default());
        chain.add_block(b.clone()).unwrap();

        let t = unix_now_millis();
        attest(&mut chain, 1, b.hash(), t);
        attest(&mut chain, 2, b.hash(), t + 1);

        // b gathered more raw weight, but fork choice skips invalid subtrees.
        let b_id = chain.tree().get(&b.hash()).unwrap();
        assert!(chain.tree().node(b_id).invalid);
        assert_eq!(chain.ghost_head_hash(), a.hash());
        assert_eq!(chain.applied_head(), a.hash());
        check_weight_invariant(&chain);
    }

    #[test]
    fn test_stale_attestation_dropped() {
        let (mut chain, g) = new_chain();
        let a = make_child(chain.config(), &g, 1, 1);
        let b = make_child(chain.config(), &g, 1, 2);
        chain.add_block(a.clone()).unwrap();
        chain.add_block(b.clone()).unwrap();

        let t = unix_now_millis();
        attest(&mut chain, 1, a.hash(), t + 10);

        // Older message from the same validator must not move the vote.
        let stale = Attestation::new(validator(1), b.hash(), t);
        assert!(!chain.on_attestation_received(stale).unwrap());
        assert_eq!(
            chain
                .beacon()
                .latest_attestation(&validator(1))
                .unwrap()
                .block_hash,
            a.hash()
        );
        assert_eq!(chain.ghost_head_hash(), a.hash());
    }

    #[test]
    fn test_attestation_to_unknown_block_weighted_on_arrival() {
        let (mut chain, g) = new_chain();
        let a = make_child(chain.config(), &g, 1, 1);

        // Attestation arrives before its block.
        let t = unix_now_millis();
        attest(&mut chain, 1, a.hash(), t);
        attest(&mut chain, 2, a.hash(), t + 1);
        assert_eq!(chain.ghost_head_hash(), g.hash());

        chain.add_block(a.clone()).unwrap();
        assert_eq!(chain.ghost_head_hash(), a.hash());
        check_weight_invariant(&chain);
    }

    #[test]
    fn test_duplicate_attestation_idempotent() {
        let (mut chain, g) = new_chain();
        let a = make_child(chain.config(), &g, 1, 1);
        chain.add_block(a.clone()).unwrap();

        let t = unix_now_millis();
        attest(&mut chain, 1, a.hash(), t);
        let weight_before = {
            let id = chain.tree().get(&a.hash()).unwrap();
            chain.tree().node(id).attested_eth
        };

        let duplicate = Attestation::new(validator(1), a.hash(), t);
        assert!(!chain.on_attestation_received(duplicate).unwrap());
        let id = chain.tree().get(&a.hash()).unwrap();
        assert_eq!(chain.tree().node(id).attested_eth, weight_before);
    }

    #[test]
    fn test_add_chain_syncs_branch() {
        // Both nodes share one genesis, as peers on a real bus would.
        let genesis = test_genesis();
        let g = genesis.genesis_block();
        let mut source = Blockchain::new(genesis.clone());
        let mut target = Blockchain::new(genesis);

        let b1 = make_child(source.config(), &g, 1, 1);
        source.add_block(b1.clone()).unwrap();
        let b2 = make_child(source.config(), &b1, 2, 2);
        source.add_block(b2.clone()).unwrap();
        let branch = source.canonical_chain();

        let added = target.add_chain(&branch).unwrap();

        assert_eq!(added, 2); // genesis was already known
        assert_eq!(target.ghost_head_hash(), b2.hash());
        assert_eq!(target.world(), source.world());
    }

    #[test]
    fn test_add_chain_rejects_broken_linkage() {
        let (mut chain, g) = new_chain();
        let b1 = make_child(chain.config(), &g, 1, 1);
        let unrelated = make_child(chain.config(), &b1, 2, 2);

        let err = chain
            .add_chain(&[g.clone(), unrelated])
            .unwrap_err();
        assert!(matches!(err, ChainError::InvalidChain(_)));
        assert_eq!(chain.tree().stats().total_blocks, 1);
    }

    #[test]
    fn test_add_chain_rejects_non_monotonic_slots() {
        let (mut chain, g) = new_chain();
        let b1 = make_child(chain.config(), &g, 3, 1);
        let b2 = make_child(chain.config(), &b1, 3, 2);

        let err = chain.add_chain(&[g.clone(), b1, b2]).unwrap_err();
        assert!(matches!(err, ChainError::InvalidChain(_)));
    }

    #[test]
    fn test_add_chain_rejects_wrong_genesis_prev() {
        let (mut chain, _) = new_chain();
        let bogus_header = BlockHeader::new(0, 0, Hash::compute(b"not zero"), Hash::ZERO, unix_now_secs());
        let bogus = Block::new(bogus_header, vec![], vec![], BlsSignature::default());

        // A height-1 start is also rejected.
        let err = chain.add_chain(std::slice::from_ref(&bogus)).unwrap_err();
        assert!(matches!(err, ChainError::InvalidChain(_)));
    }

    #[test]
    fn test_rebuild_matches_incremental_application() {
        let (mut incremental, g) = new_chain();
        let b1 = make_child(incremental.config(), &g, 1, 1);
        incremental.add_block(b1.clone()).unwrap();
        let b2 = make_child(incremental.config(), &b1, 2, 2);
        incremental.add_block(b2.clone()).unwrap();

        // Force a rebuild through a reorg to a heavier sibling branch.
        let f1 = make_child(incremental.config(), &g, 2, 7);
        let f2 = make_child(incremental.config(), &f1, 3, 8);
        incremental.add_block(f1.clone()).unwrap();
        incremental.add_block(f2.clone()).unwrap();
        let t = unix_now_millis();
        attest(&mut incremental, 1, f2.hash(), t);
        attest(&mut incremental, 2, f2.hash(), t + 1);
        assert_eq!(incremental.applied_head(), f2.hash());

        let mut expected = WorldState::from_genesis(&incremental.genesis().alloc);
        expected.apply_block(&f1, incremental.config()).unwrap();
        expected.apply_block(&f2, incremental.config()).unwrap();
        assert_eq!(incremental.world(), &expected);
    }

    #[test]
    fn test_processed_attestations_disjoint_from_pool() {
        let (mut chain, g) = new_chain();
        let t = unix_now_millis();
        let att = Attestation::new(validator(1), g.hash(), t);
        chain.on_attestation_received(att.clone()).unwrap();
        assert_eq!(chain.beacon().pool_len(), 1);

        // A block including the attestation removes it from the pool.
        let coinbase = SignedTransaction::coinbase(Transaction::coinbase(
            chain.config().protocol_node_id,
            validator(2),
            chain.config().block_reward,
            t + 1,
        ));
        let transactions = vec![coinbase];
        let header = BlockHeader::new(
            1,
            1,
            g.hash(),
            Block::transactions_root(&transactions),
            unix_now_secs(),
        );
        let block = Block::new(header, transactions, vec![att.clone()], BlsSignature::default());
        chain.add_block(block).unwrap();

        assert_eq!(chain.beacon().pool_len(), 0);
        assert!(chain
            .beacon()
            .is_processed(&att.block_hash, &att.validator));
        // Re-gossip of the included attestation no longer enters the pool.
        assert!(!chain.beacon_mut().add_attestation_to_pool(att));
    }

    #[test]
    fn test_summary_counters() {
        let (mut chain, g) = new_chain();
        let a = make_child(chain.config(), &g, 1, 1);
        let b = make_child(chain.config(), &g, 1, 2);
        chain.add_block(a).unwrap();
        chain.add_block(b).unwrap();

        let summary = chain.summary();
        assert_eq!(summary.total_blocks, 3);
        assert_eq!(summary.forks, 1);
        assert_eq!(summary.invalid_blocks, 0);
    }
}
