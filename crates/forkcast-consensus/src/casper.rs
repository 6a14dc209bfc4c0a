//! Casper FFG justification and finalization.
//!
//! Attestations carry a source and a target checkpoint. Votes whose source
//! matches the current justified checkpoint accumulate in per-target
//! buckets; a bucket reaching `ceil(2n/3)` voters justifies its checkpoint,
//! and two consecutively justified epochs finalize the older one
//! (1-finality).

use crate::beacon::BeaconState;
use forkcast_types::{Attestation, Block, Checkpoint, Hash};
use tracing::{debug, info};

/// Derive the FFG source and target for an attestation made at
/// `current_slot` on the given canonical chain (genesis-first).
///
/// The target root is the checkpoint block of the current epoch; the source
/// is the justified checkpoint, falling back to the epoch-0 checkpoint block
/// while nothing is justified yet.
pub fn compute_checkpoints(
    state: &BeaconState,
    canonical: &[Block],
    current_slot: u64,
) -> (Checkpoint, Checkpoint) {
    let target_epoch = state.epoch_of(current_slot);
    let target = Checkpoint::new(
        target_epoch,
        checkpoint_root(canonical, state.config().checkpoint_slot(target_epoch)),
    );

    let source = if state.justified_checkpoint.has_root() {
        state.justified_checkpoint
    } else {
        Checkpoint::new(0, checkpoint_root(canonical, state.config().checkpoint_slot(0)))
    };

    (source, target)
}

/// The hash of the highest canonical block whose slot is at or before
/// `checkpoint_slot`; `Hash::ZERO` when the chain has no such block.
pub fn checkpoint_root(canonical: &[Block], checkpoint_slot: u64) -> Hash {
    canonical
        .iter()
        .rev()
        .find(|b| b.slot() <= checkpoint_slot)
        .map(|b| b.hash())
        .unwrap_or(Hash::ZERO)
}

/// Apply the attestations included in an applied block to the FFG vote
/// buckets, promoting justification and finalization as thresholds are met.
///
/// Attestations without checkpoints are skipped. A vote whose source does
/// not match the current justified checkpoint is not counted, but still
/// replaces the validator's previous vote so a later vote starts clean.
pub fn apply_attestations(state: &mut BeaconState, attestations: &[Attestation]) {
    for attestation in attestations {
        let (Some(source), Some(target)) = (attestation.source, attestation.target) else {
            continue;
        };
        if !state.validators().contains(&attestation.validator) {
            continue;
        }

        let old_target = state
            .latest_included(&attestation.validator)
            .and_then(|previous| previous.target);
        if let Some(old_target) = old_target {
            state.remove_ffg_vote(old_target.epoch, &old_target.root, &attestation.validator);
        }
        state.record_included(attestation.clone());

        if source != state.justified_checkpoint {
            debug!(
                validator = %attestation.validator.short(),
                source = %source,
                justified = %state.justified_checkpoint,
                "FFG vote source does not match justified checkpoint, not counted"
            );
            continue;
        }

        let voters = state.add_ffg_vote(target.epoch, target.root, attestation.validator);
        try_promote(state, target, voters);
    }
}

/// Promote a target checkpoint to justified when its bucket reaches the
/// threshold, and finalize under the 1-finality rule.
fn try_promote(state: &mut BeaconState, target: Checkpoint, voters: usize) {
    if voters < state.ffg_threshold() {
        return;
    }
    if target.epoch <= state.justified_checkpoint.epoch {
        return;
    }

    state.previous_justified_checkpoint = state.justified_checkpoint;
    state.justified_checkpoint = target;
    info!(checkpoint = %target, voters, "checkpoint justified");

    if state.previous_justified_checkpoint.epoch + 1 == state.justified_checkpoint.epoch {
        state.finalized_checkpoint = state.previous_justified_checkpoint;
        info!(checkpoint = %state.finalized_checkpoint, "checkpoint finalized");
    }

    let finalized_epoch = state.finalized_checkpoint.epoch;
    state.gc_ffg_votes(finalized_epoch);
}

#[cfg(test)]
mod tests {
    use super::*;
    use forkcast_types::{
        Address, BlockHeader, BlsSignature, ChainConfig, Validator, ValidatorSet,
    };

    fn validator(i: u8) -> Address {
        Address::from_bytes([i; 20])
    }

    fn test_state(n: usize) -> BeaconState {
        let mut set = ValidatorSet::new();
        for i in 0..n {
            set.push(Validator::new(validator(i as u8 + 1), 32));
        }
        BeaconState::new(ChainConfig::default(), set)
    }

    /// One block per checkpoint slot: slots 0, 4, 8, ... (slots_per_epoch=4).
    fn checkpoint_chain(epochs: u64) -> Vec<Block> {
        let mut chain = Vec::new();
        let mut parent = Hash::ZERO;
        for epoch in 0..epochs {
            let header = BlockHeader::new(epoch, epoch * 4, parent, Hash::ZERO, 1_000 + epoch);
            let block = Block::new(header, vec![], vec![], BlsSignature::default());
            parent = block.hash();
            chain.push(block);
        }
        chain
    }

    fn ffg_attestation(v: u8, source: Checkpoint, target: Checkpoint, ts: u64) -> Attestation {
        Attestation::new(validator(v), target.root, ts).with_checkpoints(source, target)
    }

    #[test]
    fn test_checkpoint_root_selection() {
        let chain = checkpoint_chain(3); // blocks at slots 0, 4, 8

        assert_eq!(checkpoint_root(&chain, 0), chain[0].hash());
        assert_eq!(checkpoint_root(&chain, 3), chain[0].hash());
        assert_eq!(checkpoint_root(&chain, 4), chain[1].hash());
        assert_eq!(checkpoint_root(&chain, 100), chain[2].hash());
        assert_eq!(checkpoint_root(&[], 4), Hash::ZERO);
    }

    #[test]
    fn test_compute_checkpoints_bootstrap() {
        // Nothing justified yet: source falls back to the epoch-0 block.
        let state = test_state(3);
        let chain = checkpoint_chain(2);

        let (source, target) = compute_checkpoints(&state, &chain, 5);
        assert_eq!(source, Checkpoint::new(0, chain[0].hash()));
        assert_eq!(target, Checkpoint::new(1, chain[1].hash()));
    }

    #[test]
    fn test_compute_checkpoints_uses_justified_source() {
        let mut state = test_state(3);
        let chain = checkpoint_chain(2);
        state.justified_checkpoint = Checkpoint::new(1, chain[1].hash());

        let (source, target) = compute_checkpoints(&state, &chain, 5);
        assert_eq!(source, state.justified_checkpoint);
        assert_eq!(target.epoch, 1);
    }

    #[test]
    fn test_justification_and_finalization() {
        // Scenario E: three votes (0, rootE0) -> (1, rootE1).
        let mut state = test_state(3);
        let chain = checkpoint_chain(2);
        let e0 = Checkpoint::new(0, chain[0].hash());
        let e1 = Checkpoint::new(1, chain[1].hash());
        state.justified_checkpoint = e0;
        state.finalized_checkpoint = e0;

        let attestations = vec![
            ffg_attestation(1, e0, e1, 1000),
            ffg_attestation(2, e0, e1, 1001),
            ffg_attestation(3, e0, e1, 1002),
        ];
        apply_attestations(&mut state, &attestations);

        assert_eq!(state.justified_checkpoint, e1);
        assert_eq!(state.previous_justified_checkpoint, e0);
        assert_eq!(state.finalized_checkpoint, e0);
    }

    #[test]
    fn test_below_threshold_does_not_justify() {
        // ceil(2*3/3) = 2: one vote is not enough.
        let mut state = test_state(3);
        let chain = checkpoint_chain(2);
        let e0 = Checkpoint::new(0, chain[0].hash());
        let e1 = Checkpoint::new(1, chain[1].hash());
        state.justified_checkpoint = e0;

        apply_attestations(&mut state, &[ffg_attestation(1, e0, e1, 1000)]);
        assert_eq!(state.justified_checkpoint, e0);
    }

    #[test]
    fn test_exact_threshold_justifies() {
        let mut state = test_state(3);
        let chain = checkpoint_chain(2);
        let e0 = Checkpoint::new(0, chain[0].hash());
        let e1 = Checkpoint::new(1, chain[1].hash());
        state.justified_checkpoint = e0;

        let attestations = vec![
            ffg_attestation(1, e0, e1, 1000),
            ffg_attestation(2, e0, e1, 1001),
        ];
        apply_attestations(&mut state, &attestations);
        assert_eq!(state.justified_checkpoint, e1);
    }

    #[test]
    fn test_mismatched_source_not_counted_but_recorded() {
        let mut state = test_state(3);
        let chain = checkpoint_chain(2);
        let e0 = Checkpoint::new(0, chain[0].hash());
        let e1 = Checkpoint::new(1, chain[1].hash());
        state.justified_checkpoint = e0;

        let wrong_source = Checkpoint::new(0, Hash::compute(b"other"));
        apply_attestations(&mut state, &[ffg_attestation(1, wrong_source, e1, 1000)]);

        assert_eq!(state.ffg_bucket_len(1, &e1.root), 0);
        assert!(state.latest_included(&validator(1)).is_some());
    }

    #[test]
    fn test_revote_replaces_old_bucket_entry() {
        let mut state = test_state(4); // threshold 3
        let chain = checkpoint_chain(2);
        let e0 = Checkpoint::new(0, chain[0].hash());
        let target_a = Checkpoint::new(1, Hash::compute(b"a"));
        let target_b = Checkpoint::new(1, Hash::compute(b"b"));
        state.justified_checkpoint = e0;

        apply_attestations(&mut state, &[ffg_attestation(1, e0, target_a, 1000)]);
        assert_eq!(state.ffg_bucket_len(1, &target_a.root), 1);

        // v1 switches targets: the old bucket entry is removed.
        apply_attestations(&mut state, &[ffg_attestation(1, e0, target_b, 2000)]);
        assert_eq!(state.ffg_bucket_len(1, &target_a.root), 0);
        assert_eq!(state.ffg_bucket_len(1, &target_b.root), 1);
    }

    #[test]
    fn test_duplicate_votes_idempotent() {
        let mut state = test_state(3);
        let chain = checkpoint_chain(2);
        let e0 = Checkpoint::new(0, chain[0].hash());
        let e1 = Checkpoint::new(1, chain[1].hash());
        state.justified_checkpoint = e0;

        let att = ffg_attestation(1, e0, e1, 1000);
        apply_attestations(&mut state, &[att.clone(), att.clone()]);
        apply_attestations(&mut state, &[att]);

        assert_eq!(state.ffg_bucket_len(1, &e1.root), 1);
    }

    #[test]
    fn test_justification_monotonic() {
        let mut state = test_state(3);
        let chain = checkpoint_chain(4);
        let e0 = Checkpoint::new(0, chain[0].hash());
        let e2 = Checkpoint::new(2, chain[2].hash());
        state.justified_checkpoint = e0;

        // Justify epoch 2 directly (skipping 1: no finalization).
        let attestations = vec![
            ffg_attestation(1, e0, e2, 1000),
            ffg_attestation(2, e0, e2, 1001),
        ];
        apply_attestations(&mut state, &attestations);
        assert_eq!(state.justified_checkpoint, e2);
        assert_eq!(state.finalized_checkpoint.epoch, 0);
        assert!(!state.finalized_checkpoint.has_root());

        // A lagging vote for epoch 1 cannot move justification backward.
        let e1 = Checkpoint::new(1, chain[1].hash());
        let laggards = vec![
            ffg_attestation(1, e2, e1, 2000),
            ffg_attestation(2, e2, e1, 2001),
        ];
        apply_attestations(&mut state, &laggards);
        assert_eq!(state.justified_checkpoint, e2);
    }

    #[test]
    fn test_finalization_chains_across_epochs() {
        let mut state = test_state(3);
        let chain = checkpoint_chain(4);
        let e0 = Checkpoint::new(0, chain[0].hash());
        let e1 = Checkpoint::new(1, chain[1].hash());
        let e2 = Checkpoint::new(2, chain[2].hash());
        state.justified_checkpoint = e0;
        state.finalized_checkpoint = e0;

        for (i, ts) in [(1u8, 1000u64), (2, 1001), (3, 1002)] {
            apply_attestations(&mut state, &[ffg_attestation(i, e0, e1, ts)]);
        }
        assert_eq!(state.finalized_checkpoint, e0);

        for (i, ts) in [(1u8, 2000u64), (2, 2001), (3, 2002)] {
            apply_attestations(&mut state, &[ffg_attestation(i, e1, e2, ts)]);
        }
        assert_eq!(state.justified_checkpoint, e2);
        assert_eq!(state.finalized_checkpoint, e1);

        // Buckets at or below the finalized epoch were collected.
        assert_eq!(state.ffg_bucket_len(1, &e1.root), 0);
    }
}
