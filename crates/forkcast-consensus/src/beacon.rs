//! Consensus state that lives outside the block tree.
//!
//! `BeaconState` is the single writer for attestation pools, the
//! latest-attestation map, RANDAO mixes, proposer schedule caches, and the
//! Casper FFG checkpoints and vote buckets.

use crate::error::ConsensusError;
use crate::randao;
use forkcast_types::{Address, Attestation, BlsSignature, ChainConfig, Checkpoint, Hash, ValidatorSet};
use std::collections::{HashMap, HashSet};

/// All consensus state that is not inside the tree itself.
pub struct BeaconState {
    config: ChainConfig,
    validators: ValidatorSet,

    /// Attestations received but not yet included in a block
    beacon_pool: Vec<Attestation>,
    /// Keys of attestations already included in an applied block
    processed_attestations: HashSet<(Hash, Address)>,
    /// Newest observed attestation per validator (drives LMD-GHOST)
    latest_attestations: HashMap<Address, Attestation>,

    /// RANDAO mix per epoch; `mix(e+1) = mix(e) XOR reveal_in_epoch_e`
    randao_mixes: HashMap<u64, Hash>,
    /// Cache epoch -> (slot offset -> proposer), recomputed lazily
    proposer_schedules: HashMap<u64, Vec<Address>>,

    /// Current justified checkpoint
    pub justified_checkpoint: Checkpoint,
    /// Justified checkpoint before the last promotion
    pub previous_justified_checkpoint: Checkpoint,
    /// Finalized checkpoint; never moves backward
    pub finalized_checkpoint: Checkpoint,

    /// FFG vote buckets: epoch -> target root -> voters
    ffg_votes: HashMap<u64, HashMap<Hash, HashSet<Address>>>,
    /// Latest block-included attestation per validator
    latest_included: HashMap<Address, Attestation>,
}

impl BeaconState {
    /// Create the beacon state for a fresh chain. Seeds the epoch-0 RANDAO
    /// mix from the configured genesis values.
    pub fn new(config: ChainConfig, validators: ValidatorSet) -> Self {
        let mut state = Self {
            config,
            validators,
            beacon_pool: Vec::new(),
            processed_attestations: HashSet::new(),
            latest_attestations: HashMap::new(),
            randao_mixes: HashMap::new(),
            proposer_schedules: HashMap::new(),
            justified_checkpoint: Checkpoint::default(),
            previous_justified_checkpoint: Checkpoint::default(),
            finalized_checkpoint: Checkpoint::default(),
            ffg_votes: HashMap::new(),
            latest_included: HashMap::new(),
        };
        state.seed_genesis_mix();
        state
    }

    /// Chain parameters.
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// The active validator set.
    pub fn validators(&self) -> &ValidatorSet {
        &self.validators
    }

    /// FFG justification threshold in validator count.
    pub fn ffg_threshold(&self) -> usize {
        self.validators.ffg_threshold()
    }

    // ---- slot arithmetic ----

    /// Slot for a wall-clock time: `floor((now - genesis_time) / seconds_per_slot)`.
    pub fn current_slot(&self, genesis_time: u64, now: u64) -> u64 {
        now.saturating_sub(genesis_time) / self.config.seconds_per_slot
    }

    /// Epoch a slot falls into.
    pub fn epoch_of(&self, slot: u64) -> u64 {
        self.config.epoch_of(slot)
    }

    /// Whether a slot is the first of its epoch.
    pub fn is_first_slot_of_epoch(&self, slot: u64) -> bool {
        self.config.is_first_slot_of_epoch(slot)
    }

    // ---- attestation pool ----

    /// Add an attestation to the beacon pool unless it was already included
    /// in an applied block. The pool itself is not deduplicated; inclusion
    /// dedups through the processed set.
    pub fn add_attestation_to_pool(&mut self, attestation: Attestation) -> bool {
        if self.processed_attestations.contains(&attestation.processed_key()) {
            return false;
        }
        self.beacon_pool.push(attestation);
        true
    }

    /// Unprocessed pool entries, up to `cap`, for block construction.
    pub fn unprocessed_pool(&self, cap: usize) -> Vec<Attestation> {
        let mut seen = HashSet::new();
        self.beacon_pool
            .iter()
            .filter(|a| !self.processed_attestations.contains(&a.processed_key()))
            .filter(|a| seen.insert(a.processed_key()))
            .take(cap)
            .cloned()
            .collect()
    }

    /// Number of attestations waiting in the pool.
    pub fn pool_len(&self) -> usize {
        self.beacon_pool.len()
    }

    /// Mark an attestation as included in an applied block.
    pub fn mark_attestation_processed(&mut self, block_hash: Hash, validator: Address) {
        self.processed_attestations.insert((block_hash, validator));
    }

    /// Check whether an attestation was already included.
    pub fn is_processed(&self, block_hash: &Hash, validator: &Address) -> bool {
        self.processed_attestations.contains(&(*block_hash, *validator))
    }

    /// Drop pool copies matching an included attestation.
    pub fn remove_from_pool(&mut self, block_hash: &Hash, validator: &Address) {
        self.beacon_pool
            .retain(|a| !(a.block_hash == *block_hash && a.validator == *validator));
    }

    /// Forget the processed set (reorg state rebuild).
    pub fn clear_processed_attestations(&mut self) {
        self.processed_attestations.clear();
    }

    // ---- latest attestations (LMD-GHOST input) ----

    /// Newest observed attestation for a validator.
    pub fn latest_attestation(&self, validator: &Address) -> Option<&Attestation> {
        self.latest_attestations.get(validator)
    }

    /// The full latest-attestation map.
    pub fn latest_attestations(&self) -> &HashMap<Address, Attestation> {
        &self.latest_attestations
    }

    /// Record a newly observed attestation. Returns `None` when the message
    /// is stale (not strictly newer than the validator's current latest);
    /// otherwise returns the replaced attestation for weight adjustment.
    pub fn observe_attestation(
        &mut self,
        attestation: Attestation,
    ) -> Option<(Option<Attestation>, Attestation)> {
        if !self.validators.contains(&attestation.validator) {
            return None;
        }
        if let Some(existing) = self.latest_attestations.get(&attestation.validator) {
            if attestation.timestamp <= existing.timestamp {
                return None;
            }
        }
        let old = self
            .latest_attestations
            .insert(attestation.validator, attestation.clone());
        Some((old, attestation))
    }

    // ---- RANDAO ----

    fn seed_genesis_mix(&mut self) {
        let seed = self
            .config
            .genesis_randao_mix
            .xor(&self.config.genesis_randao_reveal);
        self.randao_mixes.insert(0, seed);
    }

    /// The mix for an epoch, if known.
    pub fn randao_mix(&self, epoch: u64) -> Option<Hash> {
        self.randao_mixes.get(&epoch).copied()
    }

    /// Fold a block's reveal into the mix history: ensures mixes up to the
    /// block's epoch exist (copying across empty epochs), then writes
    /// `mix(e+1) = mix(e) XOR H(reveal)`.
    pub fn apply_randao_reveal(&mut self, block_epoch: u64, reveal: &BlsSignature) {
        let (base_epoch, base_mix) = self
            .randao_mixes
            .iter()
            .filter(|(e, _)| **e <= block_epoch)
            .max_by_key(|(e, _)| **e)
            .map(|(e, m)| (*e, *m))
            .unwrap_or((0, Hash::ZERO));

        for epoch in base_epoch + 1..=block_epoch {
            self.randao_mixes.insert(epoch, base_mix);
        }

        let mixed = base_mix.xor(&reveal.to_mix_contribution());
        self.randao_mixes.insert(block_epoch + 1, mixed);

        // Mixes downstream of this epoch are stale now.
        self.proposer_schedules.retain(|e, _| *e <= block_epoch);
    }

    /// Forget all RANDAO state and re-seed the genesis mix (reorg rebuild).
    pub fn clear_randao_state(&mut self) {
        self.randao_mixes.clear();
        self.proposer_schedules.clear();
        self.seed_genesis_mix();
    }

    // ---- proposer schedule ----

    /// The proposer schedule for an epoch, computing and caching it when the
    /// epoch's mix is available. Deferred (error) while unsynced.
    pub fn ensure_proposer_schedule(&mut self, epoch: u64) -> Result<&[Address], ConsensusError> {
        if !self.proposer_schedules.contains_key(&epoch) {
            let mix = self
                .randao_mix(epoch)
                .ok_or(ConsensusError::MissingRandaoMix(epoch))?;
            let schedule = randao::proposer_schedule(
                &mix,
                epoch,
                &self.validators,
                self.config.slots_per_epoch,
            )?;
            self.proposer_schedules.insert(epoch, schedule);
        }
        Ok(self.proposer_schedules[&epoch].as_slice())
    }

    /// Proposer for an absolute slot.
    pub fn proposer_for_slot(&mut self, slot: u64) -> Result<Address, ConsensusError> {
        let epoch = self.epoch_of(slot);
        let offset = (slot % self.config.slots_per_epoch) as usize;
        let schedule = self.ensure_proposer_schedule(epoch)?;
        Ok(schedule[offset])
    }

    // ---- FFG vote buckets ----

    /// Latest block-included attestation for a validator.
    pub fn latest_included(&self, validator: &Address) -> Option<&Attestation> {
        self.latest_included.get(validator)
    }

    /// Record a validator's latest block-included attestation.
    pub fn record_included(&mut self, attestation: Attestation) {
        self.latest_included
            .insert(attestation.validator, attestation);
    }

    /// Remove a validator's vote from a target bucket, cleaning up empties.
    pub fn remove_ffg_vote(&mut self, epoch: u64, root: &Hash, validator: &Address) {
        if let Some(buckets) = self.ffg_votes.get_mut(&epoch) {
            if let Some(voters) = buckets.get_mut(root) {
                voters.remove(validator);
                if voters.is_empty() {
                    buckets.remove(root);
                }
            }
            if buckets.is_empty() {
                self.ffg_votes.remove(&epoch);
            }
        }
    }

    /// Add a validator's vote to a target bucket; returns the bucket size.
    pub fn add_ffg_vote(&mut self, epoch: u64, root: Hash, validator: Address) -> usize {
        let voters = self
            .ffg_votes
            .entry(epoch)
            .or_default()
            .entry(root)
            .or_default();
        voters.insert(validator);
        voters.len()
    }

    /// Size of a target bucket.
    pub fn ffg_bucket_len(&self, epoch: u64, root: &Hash) -> usize {
        self.ffg_votes
            .get(&epoch)
            .and_then(|b| b.get(root))
            .map(|v| v.len())
            .unwrap_or(0)
    }

    /// Drop vote buckets at or below the finalized epoch.
    pub fn gc_ffg_votes(&mut self, finalized_epoch: u64) {
        self.ffg_votes.retain(|epoch, _| *epoch > finalized_epoch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forkcast_types::Validator;

    fn test_state(n: usize) -> BeaconState {
        let mut set = ValidatorSet::new();
        for i in 0..n {
            set.push(Validator::new(Address::from_bytes([i as u8 + 1; 20]), 32));
        }
        BeaconState::new(ChainConfig::default(), set)
    }

    fn validator(i: u8) -> Address {
        Address::from_bytes([i; 20])
    }

    #[test]
    fn test_pool_rejects_processed() {
        let mut state = test_state(3);
        let block = Hash::compute(b"b");
        let att = Attestation::new(validator(1), block, 1000);

        assert!(state.add_attestation_to_pool(att.clone()));
        assert_eq!(state.pool_len(), 1);

        state.mark_attestation_processed(block, validator(1));
        assert!(!state.add_attestation_to_pool(att));
        assert_eq!(state.pool_len(), 1);
    }

    #[test]
    fn test_unprocessed_pool_filters_and_caps() {
        let mut state = test_state(3);
        let block = Hash::compute(b"b");
        for i in 1..=3 {
            state.add_attestation_to_pool(Attestation::new(validator(i), block, 1000 + i as u64));
        }
        state.mark_attestation_processed(block, validator(2));

        let unprocessed = state.unprocessed_pool(10);
        assert_eq!(unprocessed.len(), 2);
        assert!(unprocessed.iter().all(|a| a.validator != validator(2)));

        assert_eq!(state.unprocessed_pool(1).len(), 1);
    }

    #[test]
    fn test_observe_attestation_replacement() {
        let mut state = test_state(3);
        let first = Attestation::new(validator(1), Hash::compute(b"a"), 1000);
        let newer = Attestation::new(validator(1), Hash::compute(b"b"), 2000);
        let stale = Attestation::new(validator(1), Hash::compute(b"c"), 1500);

        let (old, _) = state.observe_attestation(first.clone()).unwrap();
        assert!(old.is_none());

        let (old, _) = state.observe_attestation(newer.clone()).unwrap();
        assert_eq!(old, Some(first));

        // Older and equal timestamps are dropped.
        assert!(state.observe_attestation(stale).is_none());
        assert!(state.observe_attestation(newer.clone()).is_none());
        assert_eq!(
            state.latest_attestation(&validator(1)).unwrap().block_hash,
            newer.block_hash
        );
    }

    #[test]
    fn test_observe_attestation_rejects_non_validator() {
        let mut state = test_state(1);
        let att = Attestation::new(validator(9), Hash::compute(b"a"), 1000);
        assert!(state.observe_attestation(att).is_none());
    }

    #[test]
    fn test_randao_mix_fold() {
        let mut state = test_state(3);
        let genesis_mix = state.randao_mix(0).unwrap();

        let reveal = BlsSignature::from_bytes(&[9u8; 96]).unwrap();
        state.apply_randao_reveal(0, &reveal);

        let expected = genesis_mix.xor(&reveal.to_mix_contribution());
        assert_eq!(state.randao_mix(1), Some(expected));
    }

    #[test]
    fn test_randao_mix_copies_across_empty_epochs() {
        let mut state = test_state(3);
        let genesis_mix = state.randao_mix(0).unwrap();

        // Next block lands in epoch 3; epochs 1-2 saw no blocks.
        let reveal = BlsSignature::from_bytes(&[7u8; 96]).unwrap();
        state.apply_randao_reveal(3, &reveal);

        assert_eq!(state.randao_mix(1), Some(genesis_mix));
        assert_eq!(state.randao_mix(2), Some(genesis_mix));
        assert_eq!(state.randao_mix(3), Some(genesis_mix));
        assert_eq!(
            state.randao_mix(4),
            Some(genesis_mix.xor(&reveal.to_mix_contribution()))
        );
    }

    #[test]
    fn test_clear_randao_state_reseeds() {
        let mut state = test_state(3);
        let seed = state.randao_mix(0).unwrap();
        state.apply_randao_reveal(0, &BlsSignature::from_bytes(&[1u8; 96]).unwrap());

        state.clear_randao_state();
        assert_eq!(state.randao_mix(0), Some(seed));
        assert_eq!(state.randao_mix(1), None);
    }

    #[test]
    fn test_proposer_schedule_deferred_without_mix() {
        let mut state = test_state(3);
        assert!(state.ensure_proposer_schedule(0).is_ok());
        assert_eq!(
            state.ensure_proposer_schedule(5).unwrap_err(),
            ConsensusError::MissingRandaoMix(5)
        );
    }

    #[test]
    fn test_proposer_schedule_cached_and_deterministic() {
        let mut a = test_state(3);
        let mut b = test_state(3);

        let sa: Vec<Address> = a.ensure_proposer_schedule(0).unwrap().to_vec();
        let sb: Vec<Address> = b.ensure_proposer_schedule(0).unwrap().to_vec();
        assert_eq!(sa, sb);
        assert_eq!(sa.len(), a.config().slots_per_epoch as usize);

        let proposer = a.proposer_for_slot(2).unwrap();
        assert_eq!(proposer, sa[2]);
    }

    #[test]
    fn test_ffg_vote_buckets() {
        let mut state = test_state(3);
        let root = Hash::compute(b"target");

        assert_eq!(state.add_ffg_vote(1, root, validator(1)), 1);
        assert_eq!(state.add_ffg_vote(1, root, validator(2)), 2);
        // Set semantics: re-voting does not grow the bucket.
        assert_eq!(state.add_ffg_vote(1, root, validator(2)), 2);

        state.remove_ffg_vote(1, &root, &validator(1));
        assert_eq!(state.ffg_bucket_len(1, &root), 1);

        state.gc_ffg_votes(1);
        assert_eq!(state.ffg_bucket_len(1, &root), 0);
    }

    #[test]
    fn test_current_slot() {
        let state = test_state(1);
        let genesis = 1_000_000;
        let sps = state.config().seconds_per_slot;

        assert_eq!(state.current_slot(genesis, genesis), 0);
        assert_eq!(state.current_slot(genesis, genesis + sps - 1), 0);
        assert_eq!(state.current_slot(genesis, genesis + 3 * sps), 3);
        // Clock before genesis clamps to slot 0.
        assert_eq!(state.current_slot(genesis, genesis - 10), 0);
    }
}
